// techlog - data-quality audit and cleaning for the TechLogistics tables

mod exit_codes;
mod insights;
mod mock;
mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{recon_exit_code, recon_hint, EXIT_SUCCESS, EXIT_USAGE};
use techlog_recon::ReconError;

#[derive(Parser)]
#[command(name = "techlog")]
#[command(about = "Reconcile inventory, transactions and feedback; audit and clean the result")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the three sources and report data quality
    #[command(after_help = "\
Examples:
  techlog audit techlog.toml
  techlog audit techlog.toml --json
  techlog audit techlog.toml --output report.json --fail-under 80")]
    Audit {
        /// Path to the techlog.toml config file
        config: PathBuf,

        /// Output JSON to stdout instead of the human summary
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit with code 6 when the health score is below this value
        #[arg(long, value_name = "SCORE")]
        fail_under: Option<f64>,
    },

    /// Audit, apply the configured clean policies, and re-audit
    #[command(after_help = "\
Examples:
  techlog clean techlog.toml
  techlog clean techlog.toml --output master_clean.csv
  techlog clean techlog.toml --json")]
    Clean {
        /// Path to the techlog.toml config file
        config: PathBuf,

        /// Write the cleaned master table as CSV (overrides [output].cleaned)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output JSON to stdout instead of the human summary
        #[arg(long)]
        json: bool,
    },

    /// Write the joined master table without cleaning
    #[command(after_help = "\
Examples:
  techlog join techlog.toml --output master.csv")]
    Join {
        /// Path to the techlog.toml config file
        config: PathBuf,

        /// Destination CSV
        #[arg(long)]
        output: PathBuf,
    },

    /// Margin leaks, delivery vs satisfaction, and per-region summary
    #[command(after_help = "\
Examples:
  techlog insights techlog.toml
  techlog insights techlog.toml --region Norte --region Sur --top 3
  techlog insights techlog.toml --clean --json")]
    Insights {
        /// Path to the techlog.toml config file
        config: PathBuf,

        /// Only rows whose feedback region matches (repeatable)
        #[arg(long = "region", value_name = "REGION")]
        regions: Vec<String>,

        /// Number of margin leaks to list
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Compute insights on the cleaned table
        #[arg(long)]
        clean: bool,

        /// Output JSON to stdout instead of the human summary
        #[arg(long)]
        json: bool,
    },

    /// Generate a seeded demo dataset plus a config that reads it
    #[command(after_help = "\
Examples:
  techlog mock --out-dir demo
  techlog mock --out-dir demo --seed 7 --transactions 5000
  techlog audit demo/techlog.toml")]
    Mock {
        /// Directory to write the CSVs and techlog.toml into
        #[arg(long)]
        out_dir: PathBuf,

        /// RNG seed; the same seed always produces the same files
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of transactions
        #[arg(long)]
        transactions: Option<usize>,
    },

    /// Validate a config without reading any source
    #[command(after_help = "\
Examples:
  techlog validate techlog.toml")]
    Validate {
        /// Path to the techlog.toml config file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Audit { config, json, output, fail_under } => {
            pipeline::cmd_audit(config, json, output, fail_under)
        }
        Commands::Clean { config, output, json } => pipeline::cmd_clean(config, output, json),
        Commands::Join { config, output } => pipeline::cmd_join(config, output),
        Commands::Insights { config, regions, top, clean, json } => {
            insights::cmd_insights(config, regions, top, clean, json)
        }
        Commands::Mock { out_dir, seed, transactions } => {
            mock::cmd_mock(out_dir, seed, transactions)
        }
        Commands::Validate { config } => pipeline::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        Self { code: recon_exit_code(&err), hint: recon_hint(&err), message: err.to_string() }
    }
}
