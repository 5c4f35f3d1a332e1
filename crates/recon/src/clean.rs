//! Policy-driven cleaning of a master table.
//!
//! Concerns run in a fixed order (ghost, negative stock, outlier, null) and
//! each one only looks at its own predicate. Imputed values always satisfy
//! the predicate they were imputed for, so a second pass with the same
//! policies and bounds changes nothing.

use log::{info, warn};

use crate::config::{CleanPolicies, CleanPolicy};
use crate::model::{
    CleanLog, CleanOutcome, ConcernLog, MasterRecord, MasterTable, OutlierBounds, QualityFlags,
};
use crate::stats;

/// Apply `policies` to a copy of `master`. `outlier_bounds` are taken as
/// given; resolve data-driven rules once, before the first pass.
pub fn clean(
    master: &MasterTable,
    policies: &CleanPolicies,
    outlier_bounds: OutlierBounds,
) -> CleanOutcome {
    let mut table = master.clone();
    let log = CleanLog {
        ghost: clean_ghosts(&mut table, policies.ghost),
        negative_stock: clean_negative_stock(&mut table, policies.negative_stock),
        outlier: clean_outliers(&mut table, policies.outlier, outlier_bounds),
        null: clean_nulls(&mut table, policies.null),
    };

    info!(
        "clean: {} -> {} rows (ghost {:?}, negative stock {:?}, outlier {:?}, null {:?})",
        master.len(),
        table.len(),
        policies.ghost,
        policies.negative_stock,
        policies.outlier,
        policies.null,
    );
    CleanOutcome { table, log }
}

fn statistic(policy: CleanPolicy, values: &[f64]) -> Option<f64> {
    match policy {
        CleanPolicy::ImputeMean => stats::mean(values),
        CleanPolicy::ImputeMedian => stats::median(values),
        CleanPolicy::Drop | CleanPolicy::MarkOnly => None,
    }
}

/// Drop rows matching `pred`, returning how many went.
fn drop_rows(table: &mut MasterTable, pred: impl Fn(&MasterRecord) -> bool) -> usize {
    let before = table.rows.len();
    table.rows.retain(|r| !pred(r));
    before - table.rows.len()
}

/// Flag rows matching `pred`, returning how many were newly flagged.
fn mark_rows(
    table: &mut MasterTable,
    flag: QualityFlags,
    pred: impl Fn(&MasterRecord) -> bool,
) -> usize {
    table
        .rows
        .iter_mut()
        .filter(|r| pred(r))
        .map(|r| r.flags.insert(flag))
        .filter(|&newly| newly)
        .count()
}

fn snapshot_costs(table: &MasterTable) -> Vec<f64> {
    table.inventory.rows.iter().filter_map(|i| i.unit_cost).collect()
}

// ---------------------------------------------------------------------------
// Ghost SKUs
// ---------------------------------------------------------------------------

fn clean_ghosts(table: &mut MasterTable, policy: CleanPolicy) -> ConcernLog {
    let mut log = ConcernLog::default();
    let is_ghost = |r: &MasterRecord| r.is_ghost();

    match policy {
        CleanPolicy::Drop => log.rows_dropped = drop_rows(table, is_ghost),
        CleanPolicy::MarkOnly => log.rows_marked = mark_rows(table, QualityFlags::GHOST, is_ghost),
        CleanPolicy::ImputeMean | CleanPolicy::ImputeMedian => {
            let Some(cost) = statistic(policy, &snapshot_costs(table)) else {
                warn!("ghost rows: no inventory costs to impute from; marking only");
                log.rows_marked = mark_rows(table, QualityFlags::GHOST, is_ghost);
                return log;
            };
            for row in table.rows.iter_mut().filter(|r| r.is_ghost()) {
                let newly_flagged = row.flags.insert(QualityFlags::GHOST);
                if row.unit_cost.is_none() {
                    row.unit_cost = Some(cost);
                    row.flags.insert(QualityFlags::IMPUTED);
                    log.rows_imputed += 1;
                } else if newly_flagged {
                    log.rows_marked += 1;
                }
            }
        }
    }
    log
}

// ---------------------------------------------------------------------------
// Negative stock
// ---------------------------------------------------------------------------

fn clean_negative_stock(table: &mut MasterTable, policy: CleanPolicy) -> ConcernLog {
    let mut log = ConcernLog::default();
    let is_negative = |r: &MasterRecord| r.stock_quantity.is_some_and(|s| s < 0);

    match policy {
        CleanPolicy::Drop => {
            log.rows_dropped = drop_rows(table, is_negative);
            table.inventory.rows.retain(|i| i.stock_quantity >= 0);
        }
        CleanPolicy::MarkOnly => {
            log.rows_marked = mark_rows(table, QualityFlags::NEGATIVE_STOCK, is_negative);
        }
        CleanPolicy::ImputeMean | CleanPolicy::ImputeMedian => {
            let valid: Vec<f64> = table
                .inventory
                .rows
                .iter()
                .filter(|i| i.stock_quantity >= 0)
                .map(|i| i.stock_quantity as f64)
                .collect();
            // No valid stock at all: fall back to zero
            let stock = statistic(policy, &valid).map(|v| v.round() as i64).unwrap_or(0);

            for item in table.inventory.rows.iter_mut().filter(|i| i.stock_quantity < 0) {
                item.stock_quantity = stock;
            }
            for row in table.rows.iter_mut().filter(|r| is_negative(r)) {
                row.stock_quantity = Some(stock);
                row.flags.insert(QualityFlags::NEGATIVE_STOCK);
                row.flags.insert(QualityFlags::IMPUTED);
                log.rows_imputed += 1;
            }
        }
    }
    log
}

// ---------------------------------------------------------------------------
// Delivery outliers
// ---------------------------------------------------------------------------

fn clean_outliers(table: &mut MasterTable, policy: CleanPolicy, bounds: OutlierBounds) -> ConcernLog {
    let mut log = ConcernLog::default();
    let is_outlier = |r: &MasterRecord| r.delivery_days.is_some_and(|d| bounds.is_outlier(d));

    match policy {
        CleanPolicy::Drop => log.rows_dropped = drop_rows(table, is_outlier),
        CleanPolicy::MarkOnly => {
            log.rows_marked = mark_rows(table, QualityFlags::OUTLIER, is_outlier);
        }
        CleanPolicy::ImputeMean | CleanPolicy::ImputeMedian => {
            let inliers: Vec<f64> = table
                .rows
                .iter()
                .filter_map(|r| r.delivery_days)
                .filter(|&d| !bounds.is_outlier(d))
                .collect();
            let Some(days) = statistic(policy, &inliers) else {
                warn!("outliers: no inlier delivery values to impute from; marking only");
                log.rows_marked = mark_rows(table, QualityFlags::OUTLIER, is_outlier);
                return log;
            };
            for row in table.rows.iter_mut().filter(|r| is_outlier(r)) {
                row.delivery_days = Some(days);
                row.flags.insert(QualityFlags::OUTLIER);
                row.flags.insert(QualityFlags::IMPUTED);
                log.rows_imputed += 1;
            }
        }
    }
    log
}

// ---------------------------------------------------------------------------
// Missing numeric values
// ---------------------------------------------------------------------------

fn clean_nulls(table: &mut MasterTable, policy: CleanPolicy) -> ConcernLog {
    let mut log = ConcernLog::default();
    let null_price = |r: &MasterRecord| r.sale_price.is_none();
    let null_cost = |r: &MasterRecord| !r.is_ghost() && r.unit_cost.is_none();
    let has_null = |r: &MasterRecord| null_price(r) || null_cost(r);

    match policy {
        CleanPolicy::Drop => log.rows_dropped = drop_rows(table, has_null),
        CleanPolicy::MarkOnly => {
            log.rows_marked = mark_rows(table, QualityFlags::NULL_VALUE, has_null);
        }
        CleanPolicy::ImputeMean | CleanPolicy::ImputeMedian => {
            let prices: Vec<f64> = table.rows.iter().filter_map(|r| r.sale_price).collect();
            let price = statistic(policy, &prices);
            let cost = statistic(policy, &snapshot_costs(table));

            if let Some(cost) = cost {
                for item in table.inventory.rows.iter_mut().filter(|i| i.unit_cost.is_none()) {
                    item.unit_cost = Some(cost);
                }
            }

            for row in table.rows.iter_mut().filter(|r| has_null(r)) {
                let mut imputed = false;
                if let (None, Some(p)) = (row.sale_price, price) {
                    row.sale_price = Some(p);
                    imputed = true;
                }
                if let (true, Some(c)) = (null_cost(&*row), cost) {
                    row.unit_cost = Some(c);
                    imputed = true;
                }
                let newly_flagged = row.flags.insert(QualityFlags::NULL_VALUE);
                if imputed {
                    row.flags.insert(QualityFlags::IMPUTED);
                    log.rows_imputed += 1;
                } else if newly_flagged {
                    log.rows_marked += 1;
                }
            }
            if price.is_none() && table.rows.iter().any(null_price) {
                warn!("null prices: no present prices to impute from; marking only");
            }
        }
    }
    log
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
