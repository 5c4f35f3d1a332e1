//! `techlog audit | clean | join | validate`: config-driven pipeline runs.

use std::path::{Path, PathBuf};

use log::debug;
use techlog_recon::config::SourcesConfig;
use techlog_recon::engine::{run, RunOutput};
use techlog_recon::export::write_master;
use techlog_recon::model::QualityReport;
use techlog_recon::{MasterTable, ReconConfig, SourceSet};

use crate::exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_HEALTH_BELOW, EXIT_OUTPUT};
use crate::CliError;

/// A parsed config plus the directory its relative paths resolve against.
pub struct LoadedConfig {
    pub config: ReconConfig,
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    pub fn read(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::new(EXIT_CONFIG, format!("cannot read config {}: {e}", path.display()))
        })?;
        let config = ReconConfig::from_toml(&text)?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        debug!("config '{}' from {}, sources relative to {}", config.name, path.display(), base_dir.display());
        Ok(Self { config, base_dir })
    }

    pub fn sources(&self) -> Result<SourceSet, CliError> {
        Ok(SourceSet::from_config(&self.config.sources, &self.config.columns, &self.base_dir)?)
    }

    pub fn run(&self, apply_clean: bool) -> Result<RunOutput, CliError> {
        Ok(run(&self.config, &self.sources()?, apply_clean)?)
    }

    /// `[output]` paths are relative to the config file.
    fn output_path(&self, configured: &Option<String>) -> Option<PathBuf> {
        configured.as_ref().map(|p| self.base_dir.join(p))
    }
}

pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|e| {
        CliError::new(EXIT_OUTPUT, format!("cannot write {}: {e}", path.display()))
    })
}

fn write_table(path: &Path, table: &MasterTable) -> Result<(), CliError> {
    let file = std::fs::File::create(path).map_err(|e| {
        CliError::new(EXIT_OUTPUT, format!("cannot create {}: {e}", path.display()))
    })?;
    write_master(table, std::io::BufWriter::new(file))?;
    eprintln!("wrote {} ({} rows)", path.display(), table.len());
    Ok(())
}

fn print_report(label: &str, r: &QualityReport) {
    eprintln!(
        "{label}: {} rows, health {:.1}/100, {} ghost, {} outlier, {} negative stock (of {} items), {} null price, {} null cost",
        r.total_rows,
        r.health_score,
        r.ghost_rows,
        r.outlier_rows,
        r.negative_stock_rows,
        r.inventory_rows,
        r.null_price_rows,
        r.null_cost_rows,
    );
}

// ---------------------------------------------------------------------------
// audit
// ---------------------------------------------------------------------------

pub fn cmd_audit(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    fail_under: Option<f64>,
) -> Result<(), CliError> {
    if let Some(floor) = fail_under {
        if !(0.0..=100.0).contains(&floor) {
            return Err(CliError::args(format!("--fail-under must be between 0 and 100, got {floor}")));
        }
    }

    let loaded = LoadedConfig::read(&config_path)?;
    let result = loaded.run(false)?;
    let json_str = to_json(&result)?;

    if let Some(path) = output_file.or_else(|| loaded.output_path(&loaded.config.output.report)) {
        write_file(&path, &json_str)?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_report(&result.meta.config_name, &result.report);
    let d = &result.diagnostics;
    if d.duplicate_inventory_keys + d.duplicate_feedback_keys + d.orphan_feedback_rows > 0 {
        eprintln!(
            "join: {} duplicate inventory sku(s), {} duplicate feedback id(s), {} orphan feedback row(s)",
            d.duplicate_inventory_keys, d.duplicate_feedback_keys, d.orphan_feedback_rows,
        );
    }

    match fail_under {
        Some(floor) if result.report.health_score < floor => Err(CliError::new(
            EXIT_HEALTH_BELOW,
            format!("health score {:.1} is below {floor}", result.report.health_score),
        )
        .with_hint("run `techlog clean` with the configured policies")),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// clean
// ---------------------------------------------------------------------------

pub fn cmd_clean(
    config_path: PathBuf,
    output_file: Option<PathBuf>,
    json_output: bool,
) -> Result<(), CliError> {
    let loaded = LoadedConfig::read(&config_path)?;
    let result = loaded.run(true)?;

    if let Some(path) = output_file.or_else(|| loaded.output_path(&loaded.config.output.cleaned)) {
        write_table(&path, result.final_table())?;
    }

    if json_output {
        println!("{}", to_json(&result)?);
    }

    print_report("before", &result.report);
    if let Some(cleaned) = &result.cleaned {
        print_report("after", &cleaned.report);
        let policies = &loaded.config.clean;
        for (concern, policy, log) in [
            ("ghost", policies.ghost.as_str(), cleaned.log.ghost),
            ("negative_stock", policies.negative_stock.as_str(), cleaned.log.negative_stock),
            ("outlier", policies.outlier.as_str(), cleaned.log.outlier),
            ("null", policies.null.as_str(), cleaned.log.null),
        ] {
            eprintln!(
                "  {concern:<15} {policy:<14} dropped {:>5}  imputed {:>5}  marked {:>5}",
                log.rows_dropped, log.rows_imputed, log.rows_marked,
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// join
// ---------------------------------------------------------------------------

pub fn cmd_join(config_path: PathBuf, output_file: PathBuf) -> Result<(), CliError> {
    let loaded = LoadedConfig::read(&config_path)?;
    let result = loaded.run(false)?;
    write_table(&output_file, &result.master)
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let loaded = LoadedConfig::read(&config_path)?;
    let config = &loaded.config;

    let sources = match &config.sources {
        SourcesConfig::Files { .. } => "files".to_string(),
        SourcesConfig::Mock(spec) => format!("mock (seed {})", spec.seed),
    };
    eprintln!("valid: {}", config.name);
    eprintln!("  sources: {sources}");
    eprintln!("  outlier rule: {}", config.audit.outlier);
    eprintln!(
        "  clean: ghost={} negative_stock={} outlier={} null={}",
        config.clean.ghost, config.clean.negative_stock, config.clean.outlier, config.clean.null,
    );
    Ok(())
}
