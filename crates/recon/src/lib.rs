//! `techlog-recon`: three-table logistics reconciler.
//!
//! Loads inventory, transactions and customer feedback, joins them into one
//! master table, audits its data quality and cleans it under explicit
//! policies. No CLI dependencies; sources are abstracted behind
//! `TableSource`.

pub mod audit;
pub mod cache;
pub mod clean;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod insights;
pub mod join;
pub mod keys;
pub mod load;
pub mod mock;
pub mod model;
pub mod source;
pub mod stats;

pub use audit::audit;
pub use cache::ReconCache;
pub use clean::clean;
pub use config::{CleanPolicies, CleanPolicy, OutlierRule, ReconConfig};
pub use engine::{run, run_with_cache, RunOutput};
pub use error::ReconError;
pub use join::join;
pub use model::{CleanLog, MasterTable, QualityFlags, QualityReport, Region};
pub use source::{MemorySource, PathSource, SourceSet, TableSource, UploadSource};
