//! Data-quality audit over a master table.
//!
//! # Health score
//!
//! ```text
//! row_penalty = min(80, (80 * (ghost_rows + outlier_rows)
//!                        + 40 * (null_price_rows + null_cost_rows)) / total_rows)
//! score = 100 - row_penalty - 20 * negative_stock_rows / inventory_rows
//! ```
//!
//! A ghost or outlier costs a full row weight, a missing numeric cell half of
//! one. The row penalty is capped at one row weight, so a table where every
//! row carries every anomaly scores 0 and a table with none scores 100.
//!
//! Appending an outlier row never raises the score: it adds a full row
//! weight, which is never below the current per-row penalty. Below the cap,
//! each count strictly lowers the score for a fixed row count.

use log::debug;

use crate::config::OutlierRule;
use crate::model::{MasterTable, OutlierBounds, QualityReport};
use crate::stats;

/// Cost of one ghost or outlier row, and the cap on the whole row penalty.
pub const ROW_WEIGHT: f64 = 80.0;
/// Cost of one missing price or cost cell.
pub const NULL_CELL_WEIGHT: f64 = 40.0;
pub const NEGATIVE_STOCK_WEIGHT: f64 = 20.0;

impl OutlierRule {
    /// Turn the rule into concrete limits for the given delivery values.
    /// Data-driven rules over no data flag nothing.
    pub fn resolve(&self, values: &[f64]) -> OutlierBounds {
        let flag_nothing = OutlierBounds { lower: None, upper: f64::INFINITY, upper_inclusive: false };
        match *self {
            OutlierRule::Threshold { days } => OutlierBounds::at_or_above(days),
            OutlierRule::Iqr { k } => {
                let (Some(q1), Some(q3)) = (stats::quantile(values, 0.25), stats::quantile(values, 0.75))
                else {
                    return flag_nothing;
                };
                let iqr = q3 - q1;
                OutlierBounds { lower: Some(q1 - k * iqr), upper: q3 + k * iqr, upper_inclusive: false }
            }
            OutlierRule::ZScore { z } => {
                let (Some(m), Some(sd)) = (stats::mean(values), stats::std_dev(values)) else {
                    return flag_nothing;
                };
                OutlierBounds { lower: Some(m - z * sd), upper: m + z * sd, upper_inclusive: false }
            }
        }
    }
}

/// Present `delivery_days` values, in row order.
pub fn delivery_values(master: &MasterTable) -> Vec<f64> {
    master.rows.iter().filter_map(|r| r.delivery_days).collect()
}

/// Audit `master`, resolving `rule` against its own delivery values.
pub fn audit(master: &MasterTable, rule: &OutlierRule) -> QualityReport {
    let bounds = rule.resolve(&delivery_values(master));
    audit_with_bounds(master, bounds)
}

/// Audit with already-resolved outlier limits.
pub fn audit_with_bounds(master: &MasterTable, bounds: OutlierBounds) -> QualityReport {
    if master.rows.is_empty() {
        return QualityReport {
            total_rows: 0,
            inventory_rows: 0,
            ghost_rows: 0,
            outlier_rows: 0,
            negative_stock_rows: 0,
            null_price_rows: 0,
            null_cost_rows: 0,
            outlier_bounds: bounds,
            health_score: 100.0,
        };
    }

    let mut ghost_rows = 0;
    let mut outlier_rows = 0;
    let mut null_price_rows = 0;
    let mut null_cost_rows = 0;
    for row in &master.rows {
        if row.is_ghost() {
            ghost_rows += 1;
        } else if row.unit_cost.is_none() {
            null_cost_rows += 1;
        }
        if row.delivery_days.is_some_and(|d| bounds.is_outlier(d)) {
            outlier_rows += 1;
        }
        if row.sale_price.is_none() {
            null_price_rows += 1;
        }
    }
    let negative_stock_rows = master
        .inventory
        .rows
        .iter()
        .filter(|item| item.stock_quantity < 0)
        .count();

    let mut report = QualityReport {
        total_rows: master.rows.len(),
        inventory_rows: master.inventory.len(),
        ghost_rows,
        outlier_rows,
        negative_stock_rows,
        null_price_rows,
        null_cost_rows,
        outlier_bounds: bounds,
        health_score: 100.0,
    };
    report.health_score = health_score(&report);

    debug!(
        "audit: {} rows, {} ghost, {} outlier, {} negative stock, {} null price, {} null cost -> {:.2}",
        report.total_rows,
        report.ghost_rows,
        report.outlier_rows,
        report.negative_stock_rows,
        report.null_price_rows,
        report.null_cost_rows,
        report.health_score,
    );
    report
}

/// Weighted score from the report's counts (see module docs).
pub fn health_score(report: &QualityReport) -> f64 {
    if report.total_rows == 0 {
        return 100.0;
    }
    (100.0 - row_penalty(report) - inventory_penalty(report)).clamp(0.0, 100.0)
}

/// Per-row share of the penalty, in `[0, ROW_WEIGHT]`.
pub fn row_penalty(report: &QualityReport) -> f64 {
    if report.total_rows == 0 {
        return 0.0;
    }
    let weighted = ROW_WEIGHT * (report.ghost_rows + report.outlier_rows) as f64
        + NULL_CELL_WEIGHT * (report.null_price_rows + report.null_cost_rows) as f64;
    (weighted / report.total_rows as f64).min(ROW_WEIGHT)
}

fn inventory_penalty(report: &QualityReport) -> f64 {
    if report.inventory_rows == 0 {
        return 0.0;
    }
    NEGATIVE_STOCK_WEIGHT * report.negative_stock_rows as f64 / report.inventory_rows as f64
}
