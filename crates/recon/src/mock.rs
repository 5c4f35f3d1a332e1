//! Seeded demo dataset: three related tables with known anomalies planted.
//!
//! Every table draws from its own stream derived from the one seed, so the
//! same spec always renders the same CSV text.

use chrono::{Duration, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

use crate::config::ColumnConfig;
use crate::error::ReconError;
use crate::export;
use crate::model::{
    FeedbackRecord, FeedbackTable, InventoryRecord, InventoryTable, Region, TransactionRecord,
    TransactionTable,
};
use crate::source::{MemorySource, SourceSet};

/// Delivery time written into the planted outlier rows.
pub const OUTLIER_DELIVERY_DAYS: f64 = 999.0;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MockSpec {
    pub seed: u64,
    /// Inventory items `PROD-0 .. PROD-{skus-1}`.
    pub skus: usize,
    /// Extra SKU numbers sold but never stocked.
    pub ghost_skus: usize,
    pub transactions: usize,
    /// Trailing transactions whose delivery time is [`OUTLIER_DELIVERY_DAYS`].
    pub outliers: usize,
    pub feedback: usize,
    /// Share of transactions with no sale price.
    pub null_price_rate: f64,
    /// Share of feedback rows pointing at a transaction that does not exist.
    pub orphan_feedback_rate: f64,
}

impl Default for MockSpec {
    fn default() -> Self {
        Self {
            seed: 42,
            skus: 100,
            ghost_skus: 10,
            transactions: 1000,
            outliers: 50,
            feedback: 500,
            null_price_rate: 0.0,
            orphan_feedback_rate: 0.02,
        }
    }
}

impl MockSpec {
    pub fn validate(&self) -> Result<(), ReconError> {
        let invalid = |msg: String| Err(ReconError::ConfigValidation(format!("sources: {msg}")));
        if self.outliers > self.transactions {
            return invalid(format!(
                "outliers ({}) must not exceed transactions ({})",
                self.outliers, self.transactions
            ));
        }
        if self.transactions > 0 && self.skus + self.ghost_skus == 0 {
            return invalid("transactions need at least one sku or ghost sku".into());
        }
        for (name, rate) in [
            ("null_price_rate", self.null_price_rate),
            ("orphan_feedback_rate", self.orphan_feedback_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return invalid(format!("{name} must be between 0 and 1, got {rate}"));
            }
        }
        Ok(())
    }
}

/// Stable stream slots. Append only: reordering changes every table.
#[derive(Clone, Copy)]
#[repr(u64)]
enum Stream {
    Inventory = 0,
    Transactions = 1,
    Feedback = 2,
}

fn stream(seed: u64, slot: Stream) -> Pcg64Mcg {
    Pcg64Mcg::seed_from_u64(seed ^ (slot as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

fn cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Box-Muller draw from N(mean, sd).
fn normal(rng: &mut impl Rng, mean: f64, sd: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-12);
    let u2: f64 = rng.gen();
    mean + sd * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockDataset {
    pub inventory: InventoryTable,
    pub transactions: TransactionTable,
    pub feedback: FeedbackTable,
}

impl MockDataset {
    pub fn generate(spec: &MockSpec) -> Self {
        Self {
            inventory: gen_inventory(spec),
            transactions: gen_transactions(spec),
            feedback: gen_feedback(spec),
        }
    }

    /// Render the tables as CSV under the configured headers.
    pub fn into_sources(self, columns: &ColumnConfig) -> Result<SourceSet, ReconError> {
        Ok(SourceSet::new(
            MemorySource::new(
                "mock:inventory",
                export::inventory_to_string(&self.inventory, &columns.inventory)?,
            ),
            MemorySource::new(
                "mock:transactions",
                export::transactions_to_string(&self.transactions, &columns.transactions)?,
            ),
            MemorySource::new(
                "mock:feedback",
                export::feedback_to_string(&self.feedback, &columns.feedback)?,
            ),
        ))
    }
}

fn gen_inventory(spec: &MockSpec) -> InventoryTable {
    let mut rng = stream(spec.seed, Stream::Inventory);
    let rows = (0..spec.skus)
        .map(|i| InventoryRecord {
            sku: format!("PROD-{i}"),
            unit_cost: Some(cents(rng.gen_range(10.0..100.0))),
            // A few negatives on purpose
            stock_quantity: rng.gen_range(-10..500),
        })
        .collect();
    InventoryTable { rows }
}

fn gen_transactions(spec: &MockSpec) -> TransactionTable {
    let mut rng = stream(spec.seed, Stream::Transactions);
    let sku_space = spec.skus + spec.ghost_skus;
    let first_outlier = spec.transactions.saturating_sub(spec.outliers);
    let year_start = NaiveDate::from_ymd_opt(2024, 1, 1);

    let rows = (0..spec.transactions)
        .map(|i| {
            let sku = (sku_space > 0).then(|| format!("PROD-{}", rng.gen_range(0..sku_space)));
            let price = cents(rng.gen_range(20.0..150.0));
            let delivery = if i >= first_outlier {
                OUTLIER_DELIVERY_DAYS
            } else {
                cents(normal(&mut rng, 5.0, 2.0).max(0.0))
            };
            let offset = Duration::days(rng.gen_range(0..366));
            TransactionRecord {
                transaction_id: i.to_string(),
                sku,
                sale_price: (!rng.gen_bool(spec.null_price_rate.clamp(0.0, 1.0))).then_some(price),
                delivery_days: Some(delivery),
                sale_date: year_start.map(|d| d + offset),
            }
        })
        .collect();
    TransactionTable { rows }
}

fn gen_feedback(spec: &MockSpec) -> FeedbackTable {
    let mut rng = stream(spec.seed, Stream::Feedback);
    let rows = (0..spec.feedback)
        .map(|i| {
            let orphan = rng.gen_bool(spec.orphan_feedback_rate.clamp(0.0, 1.0));
            let transaction_id = if spec.transactions == 0 || orphan {
                spec.transactions + i
            } else {
                rng.gen_range(0..spec.transactions)
            };
            let region = Region::KNOWN[rng.gen_range(0..Region::KNOWN.len())].clone();
            FeedbackRecord {
                customer_id: format!("C-{i}"),
                transaction_id: Some(transaction_id.to_string()),
                satisfaction_score: rng.gen_range(0..=10),
                region: Some(region),
            }
        })
        .collect();
    FeedbackTable { rows }
}
