use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Input tables
// ---------------------------------------------------------------------------

/// One inventory item. `stock_quantity < 0` is invalid data, reported by audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryRecord {
    pub sku: String,
    pub unit_cost: Option<f64>,
    pub stock_quantity: i64,
}

/// One sale. `sku` is a foreign key into inventory and may point nowhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub sku: Option<String>,
    pub sale_price: Option<f64>,
    pub delivery_days: Option<f64>,
    pub sale_date: Option<NaiveDate>,
}

/// One customer response, linked to a sale by `transaction_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub customer_id: String,
    pub transaction_id: Option<String>,
    pub satisfaction_score: u8,
    pub region: Option<Region>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryTable {
    pub rows: Vec<InventoryRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionTable {
    pub rows: Vec<TransactionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackTable {
    pub rows: Vec<FeedbackRecord>,
}

macro_rules! table_len {
    ($($table:ty),*) => {
        $(
            impl $table {
                pub fn len(&self) -> usize {
                    self.rows.len()
                }

                pub fn is_empty(&self) -> bool {
                    self.rows.is_empty()
                }
            }
        )*
    };
}

table_len!(InventoryTable, TransactionTable, FeedbackTable, MasterTable);

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// Sales region. The four known regions parse case-insensitively; anything
/// else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Norte,
    Sur,
    Centro,
    Occidente,
    Other(String),
}

impl Region {
    pub const KNOWN: [Region; 4] = [Region::Norte, Region::Sur, Region::Centro, Region::Occidente];

    pub fn parse(raw: &str) -> Option<Region> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.to_lowercase().as_str() {
            "norte" => Region::Norte,
            "sur" => Region::Sur,
            "centro" => Region::Centro,
            "occidente" => Region::Occidente,
            _ => Region::Other(trimmed.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Norte => "Norte",
            Self::Sur => "Sur",
            Self::Centro => "Centro",
            Self::Occidente => "Occidente",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Quality flags
// ---------------------------------------------------------------------------

/// Per-row markers written by `clean`. Serialized as `ghost|outlier`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QualityFlags(u8);

impl QualityFlags {
    pub const GHOST: QualityFlags = QualityFlags(1);
    pub const OUTLIER: QualityFlags = QualityFlags(1 << 1);
    pub const NEGATIVE_STOCK: QualityFlags = QualityFlags(1 << 2);
    pub const NULL_VALUE: QualityFlags = QualityFlags(1 << 3);
    pub const IMPUTED: QualityFlags = QualityFlags(1 << 4);

    const NAMES: [(QualityFlags, &'static str); 5] = [
        (Self::GHOST, "ghost"),
        (Self::OUTLIER, "outlier"),
        (Self::NEGATIVE_STOCK, "negative_stock"),
        (Self::NULL_VALUE, "null_value"),
        (Self::IMPUTED, "imputed"),
    ];

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: QualityFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set `other`; returns true when any bit was newly set.
    pub fn insert(&mut self, other: QualityFlags) -> bool {
        let before = self.0;
        self.0 |= other.0;
        self.0 != before
    }

    /// Parse the `a|b|c` form. Unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut flags = Self::empty();
        for part in raw.split('|').map(str::trim).filter(|p| !p.is_empty()) {
            let (flag, _) = Self::NAMES.iter().find(|(_, name)| *name == part)?;
            flags.insert(*flag);
        }
        Some(flags)
    }
}

impl fmt::Display for QualityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl Serialize for QualityFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ---------------------------------------------------------------------------
// Master table
// ---------------------------------------------------------------------------

/// One transaction with its inventory and feedback columns attached.
///
/// `inventory_sku == None` marks a ghost sale; `customer_id == None` means no
/// response was recorded for the transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasterRecord {
    pub transaction_id: String,
    pub sku: Option<String>,
    pub sale_price: Option<f64>,
    pub delivery_days: Option<f64>,
    pub sale_date: Option<NaiveDate>,
    pub inventory_sku: Option<String>,
    pub unit_cost: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub customer_id: Option<String>,
    pub satisfaction_score: Option<u8>,
    pub region: Option<Region>,
    pub flags: QualityFlags,
}

impl MasterRecord {
    pub fn is_ghost(&self) -> bool {
        self.inventory_sku.is_none()
    }

    /// Sale price minus unit cost, when both are known.
    pub fn margin(&self) -> Option<f64> {
        Some(self.sale_price? - self.unit_cost?)
    }
}

/// Join side-effects worth surfacing: the join keeps the first of any
/// duplicate right-hand key so that cardinality is preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinDiagnostics {
    pub duplicate_inventory_keys: usize,
    pub duplicate_feedback_keys: usize,
    pub duplicate_transaction_ids: usize,
    pub orphan_feedback_rows: usize,
}

/// Output of `join`: one row per transaction, plus the inventory snapshot it
/// was joined against (negative stock is an inventory-level count).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MasterTable {
    pub rows: Vec<MasterRecord>,
    pub inventory: InventoryTable,
    pub diagnostics: JoinDiagnostics,
}

impl MasterTable {
    /// Rows whose feedback region is one of `regions`. Rows without feedback
    /// are excluded. An empty filter keeps everything.
    pub fn filter_regions(&self, regions: &[Region]) -> MasterTable {
        if regions.is_empty() {
            return self.clone();
        }
        MasterTable {
            rows: self
                .rows
                .iter()
                .filter(|r| r.region.as_ref().is_some_and(|reg| regions.contains(reg)))
                .cloned()
                .collect(),
            inventory: self.inventory.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Concrete outlier limits for `delivery_days`.
///
/// A value is an outlier when it is below `lower`, or above `upper`
/// (at-or-above when `upper_inclusive`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierBounds {
    pub lower: Option<f64>,
    pub upper: f64,
    pub upper_inclusive: bool,
}

impl OutlierBounds {
    /// Fixed threshold: `value >= days` is an outlier.
    pub fn at_or_above(days: f64) -> Self {
        Self { lower: None, upper: days, upper_inclusive: true }
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        if self.lower.is_some_and(|low| value < low) {
            return true;
        }
        if self.upper_inclusive {
            value >= self.upper
        } else {
            value > self.upper
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub inventory_rows: usize,
    pub ghost_rows: usize,
    pub outlier_rows: usize,
    pub negative_stock_rows: usize,
    pub null_price_rows: usize,
    pub null_cost_rows: usize,
    pub outlier_bounds: OutlierBounds,
    pub health_score: f64,
}

impl QualityReport {
    pub fn anomalies(&self) -> usize {
        self.ghost_rows
            + self.outlier_rows
            + self.negative_stock_rows
            + self.null_price_rows
            + self.null_cost_rows
    }
}

// ---------------------------------------------------------------------------
// Clean
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConcernLog {
    pub rows_dropped: usize,
    pub rows_imputed: usize,
    pub rows_marked: usize,
}

impl ConcernLog {
    pub fn is_noop(&self) -> bool {
        self.rows_dropped == 0 && self.rows_imputed == 0 && self.rows_marked == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanLog {
    pub ghost: ConcernLog,
    pub negative_stock: ConcernLog,
    pub outlier: ConcernLog,
    pub null: ConcernLog,
}

impl CleanLog {
    pub fn is_noop(&self) -> bool {
        self.ghost.is_noop()
            && self.negative_stock.is_noop()
            && self.outlier.is_noop()
            && self.null.is_noop()
    }

    pub fn rows_dropped(&self) -> usize {
        self.ghost.rows_dropped
            + self.negative_stock.rows_dropped
            + self.outlier.rows_dropped
            + self.null.rows_dropped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanOutcome {
    pub table: MasterTable,
    pub log: CleanLog,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
