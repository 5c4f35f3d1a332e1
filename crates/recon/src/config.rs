use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::mock::MockSpec;

/// Delivery time at or above which a sale counts as an outlier when the
/// caller does not choose a rule. The only place this default lives.
pub const DEFAULT_OUTLIER_THRESHOLD_DAYS: f64 = 30.0;

pub const DEFAULT_IQR_K: f64 = 1.5;

pub const DEFAULT_ZSCORE: f64 = 3.0;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub columns: ColumnConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub clean: CleanPolicies,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where the three tables come from. File paths are resolved relative to
/// the config file's directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourcesConfig {
    Files {
        inventory: String,
        transactions: String,
        feedback: String,
    },
    Mock(MockSpec),
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Exact header names per table. Defaults are the canonical names, so a
/// config only lists the columns a given export spells differently
/// (`SKU_ID`, `Transaccion_ID`, ...).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ColumnConfig {
    #[serde(default)]
    pub inventory: InventoryColumns,
    #[serde(default)]
    pub transactions: TransactionColumns,
    #[serde(default)]
    pub feedback: FeedbackColumns,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InventoryColumns {
    pub sku: String,
    pub unit_cost: String,
    pub stock_quantity: String,
}

impl Default for InventoryColumns {
    fn default() -> Self {
        Self {
            sku: "sku".into(),
            unit_cost: "unit_cost".into(),
            stock_quantity: "stock_quantity".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionColumns {
    pub transaction_id: String,
    pub sku: String,
    pub sale_price: String,
    pub delivery_days: String,
    /// Optional in the header; when absent every sale date loads as null.
    pub sale_date: String,
}

impl Default for TransactionColumns {
    fn default() -> Self {
        Self {
            transaction_id: "transaction_id".into(),
            sku: "sku".into(),
            sale_price: "sale_price".into(),
            delivery_days: "delivery_days".into(),
            sale_date: "sale_date".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedbackColumns {
    pub customer_id: String,
    pub transaction_id: String,
    pub satisfaction_score: String,
    pub region: String,
}

impl Default for FeedbackColumns {
    fn default() -> Self {
        Self {
            customer_id: "customer_id".into(),
            transaction_id: "transaction_id".into(),
            satisfaction_score: "satisfaction_score".into(),
            region: "region".into(),
        }
    }
}

impl InventoryColumns {
    pub fn names(&self) -> [&str; 3] {
        [&self.sku, &self.unit_cost, &self.stock_quantity]
    }
}

impl TransactionColumns {
    pub fn names(&self) -> [&str; 5] {
        [&self.transaction_id, &self.sku, &self.sale_price, &self.delivery_days, &self.sale_date]
    }
}

impl FeedbackColumns {
    pub fn names(&self) -> [&str; 4] {
        [&self.customer_id, &self.transaction_id, &self.satisfaction_score, &self.region]
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub outlier: OutlierRule,
}

/// How `delivery_days` outliers are detected.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OutlierRule {
    /// `delivery_days >= days`.
    Threshold {
        #[serde(default = "default_threshold_days")]
        days: f64,
    },
    /// Tukey fences: below `Q1 - k*IQR` or above `Q3 + k*IQR`.
    Iqr {
        #[serde(default = "default_iqr_k")]
        k: f64,
    },
    /// More than `z` population standard deviations from the mean.
    #[serde(rename = "zscore")]
    ZScore {
        #[serde(default = "default_zscore")]
        z: f64,
    },
}

impl Default for OutlierRule {
    fn default() -> Self {
        Self::Threshold { days: DEFAULT_OUTLIER_THRESHOLD_DAYS }
    }
}

impl std::fmt::Display for OutlierRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Threshold { days } => write!(f, "threshold >= {days} days"),
            Self::Iqr { k } => write!(f, "iqr (k = {k})"),
            Self::ZScore { z } => write!(f, "zscore (z = {z})"),
        }
    }
}

fn default_threshold_days() -> f64 {
    DEFAULT_OUTLIER_THRESHOLD_DAYS
}

fn default_iqr_k() -> f64 {
    DEFAULT_IQR_K
}

fn default_zscore() -> f64 {
    DEFAULT_ZSCORE
}

// ---------------------------------------------------------------------------
// Clean
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanPolicy {
    Drop,
    ImputeMean,
    ImputeMedian,
    #[default]
    MarkOnly,
}

impl CleanPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::ImputeMean => "impute_mean",
            Self::ImputeMedian => "impute_median",
            Self::MarkOnly => "mark_only",
        }
    }
}

impl std::fmt::Display for CleanPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One policy per concern. Concerns never act on each other's rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CleanPolicies {
    #[serde(default)]
    pub ghost: CleanPolicy,
    #[serde(default)]
    pub negative_stock: CleanPolicy,
    #[serde(default)]
    pub outlier: CleanPolicy,
    #[serde(default)]
    pub null: CleanPolicy,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Cleaned master table (delimited text).
    #[serde(default)]
    pub cleaned: Option<String>,
    /// JSON run report.
    #[serde(default)]
    pub report: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        match &self.sources {
            SourcesConfig::Files { inventory, transactions, feedback } => {
                for (table, path) in [
                    ("inventory", inventory),
                    ("transactions", transactions),
                    ("feedback", feedback),
                ] {
                    if path.trim().is_empty() {
                        return Err(ReconError::ConfigValidation(format!(
                            "sources.{table}: path must not be empty"
                        )));
                    }
                }
            }
            SourcesConfig::Mock(spec) => spec.validate()?,
        }

        validate_columns("inventory", &self.columns.inventory.names())?;
        validate_columns("transactions", &self.columns.transactions.names())?;
        validate_columns("feedback", &self.columns.feedback.names())?;

        validate_outlier_rule(&self.audit.outlier)
    }
}

pub fn validate_outlier_rule(rule: &OutlierRule) -> Result<(), ReconError> {
    let (label, value) = match rule {
        OutlierRule::Threshold { days } => ("threshold days", *days),
        OutlierRule::Iqr { k } => ("iqr k", *k),
        OutlierRule::ZScore { z } => ("zscore z", *z),
    };
    if !value.is_finite() || value <= 0.0 {
        return Err(ReconError::ConfigValidation(format!(
            "audit.outlier: {label} must be a positive number, got {value}"
        )));
    }
    Ok(())
}

fn validate_columns(table: &str, names: &[&str]) -> Result<(), ReconError> {
    for (i, name) in names.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ReconError::ConfigValidation(format!(
                "columns.{table}: column names must not be empty"
            )));
        }
        if names[..i].contains(name) {
            return Err(ReconError::ConfigValidation(format!(
                "columns.{table}: '{name}' is mapped to more than one field"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
