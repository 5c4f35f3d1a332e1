use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad threshold, missing source path, etc.).
    ConfigValidation(String),
    /// A source could not be read (missing file, permission, bad upload).
    SourceUnavailable { source: String, reason: String },
    /// Missing required column in a source header.
    MissingColumn { table: String, column: String },
    /// A join key could not be coerced to its canonical string form.
    JoinKeyType { table: String, row: usize, column: String, value: String },
    /// A cell that cannot hold a value of its declared column type.
    InvalidValue { table: String, row: usize, column: String, value: String, reason: String },
    /// IO error while writing output.
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::SourceUnavailable { source, reason } => {
                write!(f, "source unavailable: {source}: {reason}")
            }
            Self::MissingColumn { table, column } => {
                write!(f, "table '{table}': missing column '{column}'")
            }
            Self::JoinKeyType { table, row, column, value } => {
                write!(f, "table '{table}', row {row}: cannot coerce join key '{column}' value '{value}'")
            }
            Self::InvalidValue { table, row, column, value, reason } => {
                write!(f, "table '{table}', row {row}: invalid '{column}' value '{value}' ({reason})")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

impl From<csv::Error> for ReconError {
    fn from(err: csv::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<std::io::Error> for ReconError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
