//! `techlog mock`: write a seeded demo dataset and a config that reads it.

use std::path::{Path, PathBuf};

use log::debug;
use techlog_recon::config::ColumnConfig;
use techlog_recon::export::{write_feedback, write_inventory, write_transactions};
use techlog_recon::mock::{MockDataset, MockSpec};
use techlog_recon::ReconError;

use crate::exit_codes::EXIT_OUTPUT;
use crate::CliError;

const INVENTORY_FILE: &str = "inventory.csv";
const TRANSACTIONS_FILE: &str = "transactions.csv";
const FEEDBACK_FILE: &str = "feedback.csv";
const CONFIG_FILE: &str = "techlog.toml";

pub fn cmd_mock(out_dir: PathBuf, seed: u64, transactions: Option<usize>) -> Result<(), CliError> {
    let defaults = MockSpec::default();
    let spec = match transactions {
        // Keep the default share of planted outliers
        Some(n) => MockSpec { seed, transactions: n, outliers: n / 20, ..defaults },
        None => MockSpec { seed, ..defaults },
    };
    spec.validate()?;
    debug!("mock spec: {spec:?}");

    std::fs::create_dir_all(&out_dir).map_err(|e| {
        CliError::new(EXIT_OUTPUT, format!("cannot create {}: {e}", out_dir.display()))
    })?;

    let data = MockDataset::generate(&spec);
    let columns = ColumnConfig::default();
    write_inventory(&data.inventory, &columns.inventory, create(&out_dir, INVENTORY_FILE)?)?;
    write_transactions(&data.transactions, &columns.transactions, create(&out_dir, TRANSACTIONS_FILE)?)?;
    write_feedback(&data.feedback, &columns.feedback, create(&out_dir, FEEDBACK_FILE)?)?;

    let config = format!(
        "name = \"Mock dataset (seed {seed})\"\n\
         \n\
         [sources]\n\
         kind = \"files\"\n\
         inventory = \"{INVENTORY_FILE}\"\n\
         transactions = \"{TRANSACTIONS_FILE}\"\n\
         feedback = \"{FEEDBACK_FILE}\"\n"
    );
    let config_path = out_dir.join(CONFIG_FILE);
    std::fs::write(&config_path, config).map_err(|e| {
        CliError::new(EXIT_OUTPUT, format!("cannot write {}: {e}", config_path.display()))
    })?;

    eprintln!(
        "wrote {} inventory, {} transaction, {} feedback rows to {}",
        data.inventory.len(),
        data.transactions.len(),
        data.feedback.len(),
        out_dir.display(),
    );
    eprintln!("next:  techlog audit {}", config_path.display());
    Ok(())
}

fn create(dir: &Path, name: &str) -> Result<std::fs::File, ReconError> {
    let path = dir.join(name);
    std::fs::File::create(&path)
        .map_err(|e| ReconError::Io(format!("cannot create {}: {e}", path.display())))
}
