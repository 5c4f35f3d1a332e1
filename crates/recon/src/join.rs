use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::error::ReconError;
use crate::keys::canonical_key;
use crate::model::{
    FeedbackRecord, FeedbackTable, InventoryRecord, InventoryTable, JoinDiagnostics,
    MasterRecord, MasterTable, QualityFlags, TransactionTable,
};

/// Left-join transactions onto inventory (by sku) and feedback (by
/// transaction_id).
///
/// Every transaction yields exactly one row, in input order. When a
/// right-hand key repeats, the first occurrence is used and the repeat is
/// counted in `JoinDiagnostics`.
pub fn join(
    inventory: &InventoryTable,
    transactions: &TransactionTable,
    feedback: &FeedbackTable,
) -> Result<MasterTable, ReconError> {
    let mut diagnostics = JoinDiagnostics::default();

    // Inventory snapshot with canonical keys, indexed first-wins
    let mut snapshot = Vec::with_capacity(inventory.len());
    let mut inv_index: HashMap<String, usize> = HashMap::with_capacity(inventory.len());
    for (i, item) in inventory.rows.iter().enumerate() {
        let key = canonical_key("inventory", i + 1, "sku", &item.sku)?;
        match &key {
            Some(k) if inv_index.contains_key(k) => diagnostics.duplicate_inventory_keys += 1,
            Some(k) => {
                inv_index.insert(k.clone(), snapshot.len());
            }
            None => debug!("inventory row {}: null sku '{}' cannot be joined", i + 1, item.sku),
        }
        snapshot.push(InventoryRecord {
            sku: key.unwrap_or_else(|| item.sku.trim().to_string()),
            unit_cost: item.unit_cost,
            stock_quantity: item.stock_quantity,
        });
    }

    // Transaction keys, needed up front to spot orphaned feedback
    let mut trans_keys = Vec::with_capacity(transactions.len());
    let mut seen_ids: HashSet<String> = HashSet::with_capacity(transactions.len());
    for (i, t) in transactions.rows.iter().enumerate() {
        let row = i + 1;
        let tid = canonical_key("transactions", row, "transaction_id", &t.transaction_id)?
            .ok_or_else(|| ReconError::JoinKeyType {
                table: "transactions".into(),
                row,
                column: "transaction_id".into(),
                value: t.transaction_id.clone(),
            })?;
        if !seen_ids.insert(tid.clone()) {
            diagnostics.duplicate_transaction_ids += 1;
        }
        let sku = match &t.sku {
            Some(raw) => canonical_key("transactions", row, "sku", raw)?,
            None => None,
        };
        trans_keys.push((tid, sku));
    }

    let mut feed_index: HashMap<String, &FeedbackRecord> = HashMap::with_capacity(feedback.len());
    for (i, f) in feedback.rows.iter().enumerate() {
        let key = match &f.transaction_id {
            Some(raw) => canonical_key("feedback", i + 1, "transaction_id", raw)?,
            None => None,
        };
        let Some(key) = key else {
            diagnostics.orphan_feedback_rows += 1;
            continue;
        };
        if !seen_ids.contains(&key) {
            diagnostics.orphan_feedback_rows += 1;
        }
        if feed_index.contains_key(&key) {
            diagnostics.duplicate_feedback_keys += 1;
        } else {
            feed_index.insert(key, f);
        }
    }

    let rows: Vec<MasterRecord> = transactions
        .rows
        .iter()
        .zip(trans_keys)
        .map(|(t, (tid, sku))| {
            let item = sku
                .as_ref()
                .and_then(|k| inv_index.get(k))
                .map(|&i| &snapshot[i]);
            let response = feed_index.get(&tid);
            MasterRecord {
                transaction_id: tid,
                sku,
                sale_price: t.sale_price,
                delivery_days: t.delivery_days,
                sale_date: t.sale_date,
                inventory_sku: item.map(|inv| inv.sku.clone()),
                unit_cost: item.and_then(|inv| inv.unit_cost),
                stock_quantity: item.map(|inv| inv.stock_quantity),
                customer_id: response
                    .map(|f| f.customer_id.clone())
                    .filter(|c| !c.is_empty()),
                satisfaction_score: response.map(|f| f.satisfaction_score),
                region: response.and_then(|f| f.region.clone()),
                flags: QualityFlags::empty(),
            }
        })
        .collect();

    if diagnostics.duplicate_inventory_keys > 0 {
        warn!("{} duplicate inventory sku(s); first occurrence used", diagnostics.duplicate_inventory_keys);
    }
    if diagnostics.duplicate_feedback_keys > 0 {
        warn!("{} duplicate feedback transaction id(s); first response used", diagnostics.duplicate_feedback_keys);
    }
    debug!(
        "joined {} rows ({} ghost, {} with feedback, {} orphan feedback)",
        rows.len(),
        rows.iter().filter(|r| r.is_ghost()).count(),
        rows.iter().filter(|r| r.satisfaction_score.is_some()).count(),
        diagnostics.orphan_feedback_rows,
    );

    Ok(MasterTable {
        rows,
        inventory: InventoryTable { rows: snapshot },
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Region, TransactionRecord};

    fn inv(sku: &str, cost: f64, stock: i64) -> InventoryRecord {
        InventoryRecord { sku: sku.into(), unit_cost: Some(cost), stock_quantity: stock }
    }

    fn sale(id: &str, sku: Option<&str>, price: f64, days: f64) -> TransactionRecord {
        TransactionRecord {
            transaction_id: id.into(),
            sku: sku.map(Into::into),
            sale_price: Some(price),
            delivery_days: Some(days),
            sale_date: None,
        }
    }

    fn response(customer: &str, tid: &str, score: u8, region: &str) -> FeedbackRecord {
        FeedbackRecord {
            customer_id: customer.into(),
            transaction_id: Some(tid.into()),
            satisfaction_score: score,
            region: Region::parse(region),
        }
    }

    #[test]
    fn preserves_transaction_order_and_count() {
        let inventory = InventoryTable { rows: vec![inv("B", 2.0, 1), inv("A", 1.0, 1)] };
        let transactions = TransactionTable {
            rows: vec![
                sale("T3", Some("A"), 5.0, 1.0),
                sale("T1", Some("B"), 5.0, 1.0),
                sale("T2", Some("A"), 5.0, 1.0),
            ],
        };
        let master = join(&inventory, &transactions, &FeedbackTable::default()).unwrap();
        let ids: Vec<_> = master.rows.iter().map(|r| r.transaction_id.as_str()).collect();
        assert_eq!(ids, ["T3", "T1", "T2"]);
        assert_eq!(master.rows[1].unit_cost, Some(2.0));
    }

    #[test]
    fn ghost_sku_has_null_inventory_fields() {
        let inventory = InventoryTable { rows: vec![inv("PROD-1", 10.0, 3)] };
        let transactions = TransactionTable { rows: vec![sale("T1", Some("PROD-999"), 50.0, 2.0)] };
        let master = join(&inventory, &transactions, &FeedbackTable::default()).unwrap();
        let row = &master.rows[0];
        assert!(row.is_ghost());
        assert_eq!(row.sku.as_deref(), Some("PROD-999"));
        assert_eq!(row.unit_cost, None);
        assert_eq!(row.stock_quantity, None);
    }

    #[test]
    fn long_numeric_skus_join_to_their_own_item() {
        let inventory = InventoryTable {
            rows: vec![inv("12345678901234567891", 1.0, 1), inv("12345678901234567892", 99.0, 1)],
        };
        let transactions = TransactionTable { rows: vec![sale("T1", Some("12345678901234567892"), 120.0, 2.0)] };
        let master = join(&inventory, &transactions, &FeedbackTable::default()).unwrap();
        let row = &master.rows[0];
        assert_eq!(row.inventory_sku.as_deref(), Some("12345678901234567892"));
        assert_eq!(row.unit_cost, Some(99.0));
        assert_eq!(master.diagnostics.duplicate_inventory_keys, 0);
    }

    #[test]
    fn numeric_and_text_keys_meet() {
        let inventory = InventoryTable { rows: vec![inv("101", 4.0, 1)] };
        let transactions = TransactionTable { rows: vec![sale("1.0", Some("101.0"), 9.0, 2.0)] };
        let feedback = FeedbackTable { rows: vec![response("C1", " 1 ", 8, "Sur")] };
        let master = join(&inventory, &transactions, &feedback).unwrap();
        let row = &master.rows[0];
        assert_eq!(row.transaction_id, "1");
        assert_eq!(row.inventory_sku.as_deref(), Some("101"));
        assert_eq!(row.satisfaction_score, Some(8));
        assert_eq!(row.region, Some(Region::Sur));
    }

    #[test]
    fn duplicates_keep_first_and_preserve_cardinality() {
        let inventory = InventoryTable { rows: vec![inv("A", 1.0, 1), inv("A", 99.0, 1)] };
        let transactions = TransactionTable {
            rows: vec![sale("T1", Some("A"), 5.0, 1.0), sale("T1", Some("A"), 6.0, 1.0)],
        };
        let feedback = FeedbackTable {
            rows: vec![response("C1", "T1", 3, "Norte"), response("C2", "T1", 9, "Sur")],
        };
        let master = join(&inventory, &transactions, &feedback).unwrap();
        assert_eq!(master.len(), 2);
        assert!(master.rows.iter().all(|r| r.unit_cost == Some(1.0)));
        assert!(master.rows.iter().all(|r| r.customer_id.as_deref() == Some("C1")));
        assert_eq!(master.diagnostics.duplicate_inventory_keys, 1);
        assert_eq!(master.diagnostics.duplicate_feedback_keys, 1);
        assert_eq!(master.diagnostics.duplicate_transaction_ids, 1);
        // Snapshot keeps every inventory row
        assert_eq!(master.inventory.len(), 2);
    }

    #[test]
    fn orphan_feedback_is_counted_not_joined() {
        let transactions = TransactionTable { rows: vec![sale("T1", None, 5.0, 1.0)] };
        let feedback = FeedbackTable {
            rows: vec![
                response("C1", "T404", 3, "Norte"),
                FeedbackRecord {
                    customer_id: "C2".into(),
                    transaction_id: None,
                    satisfaction_score: 5,
                    region: None,
                },
            ],
        };
        let master = join(&InventoryTable::default(), &transactions, &feedback).unwrap();
        assert_eq!(master.len(), 1);
        assert_eq!(master.rows[0].customer_id, None);
        assert_eq!(master.diagnostics.orphan_feedback_rows, 2);
    }

    #[test]
    fn uncoercible_key_is_surfaced() {
        let transactions = TransactionTable { rows: vec![sale("T1", Some("inf"), 5.0, 1.0)] };
        let err = join(&InventoryTable::default(), &transactions, &FeedbackTable::default())
            .unwrap_err();
        assert!(matches!(err, ReconError::JoinKeyType { ref column, row: 1, .. } if column == "sku"));
    }
}
