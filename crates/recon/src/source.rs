//! Input sources. The pipeline only ever sees a `TableSource`; local files,
//! uploaded bytes and generated mock data are interchangeable.

use std::path::{Path, PathBuf};

use crate::config::{ColumnConfig, SourcesConfig};
use crate::error::ReconError;
use crate::mock::MockDataset;

pub trait TableSource {
    /// Human-readable origin, used in errors and logs.
    fn label(&self) -> String;

    /// Full delimited text of the table.
    fn read_text(&self) -> Result<String, ReconError>;
}

/// A named local path.
#[derive(Debug, Clone)]
pub struct PathSource {
    path: PathBuf,
}

impl PathSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TableSource for PathSource {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn read_text(&self) -> Result<String, ReconError> {
        let bytes = std::fs::read(&self.path).map_err(|e| ReconError::SourceUnavailable {
            source: self.label(),
            reason: e.to_string(),
        })?;
        Ok(decode_text(bytes))
    }
}

/// A file the user uploaded, already in memory.
#[derive(Debug, Clone)]
pub struct UploadSource {
    name: String,
    bytes: Vec<u8>,
}

impl UploadSource {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }
}

impl TableSource for UploadSource {
    fn label(&self) -> String {
        format!("upload:{}", self.name)
    }

    fn read_text(&self) -> Result<String, ReconError> {
        if self.bytes.is_empty() {
            return Err(ReconError::SourceUnavailable {
                source: self.label(),
                reason: "upload is empty".into(),
            });
        }
        Ok(decode_text(self.bytes.clone()))
    }
}

/// Literal text, e.g. generated mock tables.
#[derive(Debug, Clone)]
pub struct MemorySource {
    label: String,
    text: String,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self { label: label.into(), text: text.into() }
    }
}

impl TableSource for MemorySource {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn read_text(&self) -> Result<String, ReconError> {
        Ok(self.text.clone())
    }
}

/// The three sources of one run.
pub struct SourceSet {
    pub inventory: Box<dyn TableSource>,
    pub transactions: Box<dyn TableSource>,
    pub feedback: Box<dyn TableSource>,
}

impl SourceSet {
    pub fn new(
        inventory: impl TableSource + 'static,
        transactions: impl TableSource + 'static,
        feedback: impl TableSource + 'static,
    ) -> Self {
        Self {
            inventory: Box::new(inventory),
            transactions: Box::new(transactions),
            feedback: Box::new(feedback),
        }
    }

    /// Build the sources a config names. File paths resolve against `base_dir`;
    /// mock tables are rendered with the configured column names.
    pub fn from_config(
        sources: &SourcesConfig,
        columns: &ColumnConfig,
        base_dir: &Path,
    ) -> Result<Self, ReconError> {
        match sources {
            SourcesConfig::Files { inventory, transactions, feedback } => Ok(Self::new(
                PathSource::new(base_dir.join(inventory)),
                PathSource::new(base_dir.join(transactions)),
                PathSource::new(base_dir.join(feedback)),
            )),
            SourcesConfig::Mock(spec) => MockDataset::generate(spec).into_sources(columns),
        }
    }
}

/// UTF-8 first; on failure fall back to Windows-1252 (common for Excel-exported CSVs).
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_unavailable() {
        let src = PathSource::new("/definitely/not/here/inventory.csv");
        let err = src.read_text().unwrap_err();
        assert!(matches!(err, ReconError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("inventory.csv"));
    }

    #[test]
    fn empty_upload_is_unavailable() {
        let src = UploadSource::new("inv.csv", Vec::new());
        assert!(matches!(src.read_text(), Err(ReconError::SourceUnavailable { .. })));
    }

    #[test]
    fn decode_strips_bom_and_handles_latin1() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFsku\n".to_vec()), "sku\n");
        // 0xED is 'í' in Windows-1252
        assert_eq!(decode_text(b"Regi\xF3n,D\xEDas".to_vec()), "Región,Días");
    }

    #[test]
    fn path_source_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.csv");
        std::fs::write(&path, "sku,unit_cost,stock_quantity\nA,1,2\n").unwrap();
        let text = PathSource::new(&path).read_text().unwrap();
        assert!(text.starts_with("sku,"));
    }
}
