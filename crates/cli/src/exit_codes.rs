//! CLI Exit Code Registry
//!
//! Single source of truth for `techlog` exit codes. Scripts and schedulers
//! rely on them, so codes are only ever added, never renumbered.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | General error (unspecified)                              |
//! | 2    | Usage error (bad arguments)                              |
//! | 3    | Config could not be read, parsed or validated            |
//! | 4    | A source table could not be read                         |
//! | 5    | Source data does not fit the schema (columns, values)    |
//! | 6    | Health score below `--fail-under`                        |
//! | 7    | Output could not be written                              |

use techlog_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments that clap itself cannot reject.
pub const EXIT_USAGE: u8 = 2;

/// Config file unreadable, malformed TOML, or failed validation.
pub const EXIT_CONFIG: u8 = 3;

/// Source file missing, unreadable, empty upload or malformed CSV.
pub const EXIT_SOURCE: u8 = 4;

/// Missing column, invalid cell value or uncoercible join key.
pub const EXIT_DATA: u8 = 5;

/// Audit succeeded but the health score is under the requested floor.
pub const EXIT_HEALTH_BELOW: u8 = 6;

/// Report, CSV or mock file could not be written.
pub const EXIT_OUTPUT: u8 = 7;

/// Map a library error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG,
        ReconError::SourceUnavailable { .. } => EXIT_SOURCE,
        ReconError::MissingColumn { .. }
        | ReconError::InvalidValue { .. }
        | ReconError::JoinKeyType { .. } => EXIT_DATA,
        ReconError::Io(_) => EXIT_OUTPUT,
    }
}

/// A next step for the user, where one is obvious.
pub fn recon_hint(err: &ReconError) -> Option<String> {
    match err {
        ReconError::MissingColumn { table, .. } => Some(format!(
            "map the header under [columns.{table}] in the config"
        )),
        ReconError::SourceUnavailable { .. } => {
            Some("source paths are resolved relative to the config file".to_string())
        }
        ReconError::JoinKeyType { .. } => {
            Some("keys must be text or finite numbers without control characters".to_string())
        }
        _ => None,
    }
}
