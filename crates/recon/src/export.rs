//! Deterministic CSV writers for the source tables and the master table.
//!
//! Numbers use Rust's shortest round-trip formatting, dates are
//! `YYYY-MM-DD` and missing values are empty fields, so every table written
//! here reads back through `load` unchanged.

use std::io::Write;

use chrono::NaiveDate;

use crate::config::{FeedbackColumns, InventoryColumns, TransactionColumns};
use crate::error::ReconError;
use crate::model::{FeedbackTable, InventoryTable, MasterTable, TransactionTable};

/// Header of an exported master table. `flags` is optional on read.
pub const MASTER_COLUMNS: [&str; 12] = [
    "transaction_id",
    "sku",
    "inventory_sku",
    "unit_cost",
    "stock_quantity",
    "sale_price",
    "delivery_days",
    "sale_date",
    "customer_id",
    "satisfaction_score",
    "region",
    "flags",
];

fn num(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out)
}

fn write_err(e: csv::Error) -> ReconError {
    ReconError::Io(format!("CSV write error: {e}"))
}

fn flush<W: Write>(mut csv: csv::Writer<W>) -> Result<(), ReconError> {
    csv.flush().map_err(|e| ReconError::Io(format!("CSV flush error: {e}")))
}

pub fn write_inventory(
    table: &InventoryTable,
    cols: &InventoryColumns,
    out: impl Write,
) -> Result<(), ReconError> {
    let mut csv = writer(out);
    csv.write_record(cols.names()).map_err(write_err)?;
    for item in &table.rows {
        csv.write_record([
            item.sku.clone(),
            num(item.unit_cost),
            item.stock_quantity.to_string(),
        ])
        .map_err(write_err)?;
    }
    flush(csv)
}

pub fn write_transactions(
    table: &TransactionTable,
    cols: &TransactionColumns,
    out: impl Write,
) -> Result<(), ReconError> {
    let mut csv = writer(out);
    csv.write_record(cols.names()).map_err(write_err)?;
    for t in &table.rows {
        csv.write_record([
            t.transaction_id.clone(),
            t.sku.clone().unwrap_or_default(),
            num(t.sale_price),
            num(t.delivery_days),
            date(t.sale_date),
        ])
        .map_err(write_err)?;
    }
    flush(csv)
}

pub fn write_feedback(
    table: &FeedbackTable,
    cols: &FeedbackColumns,
    out: impl Write,
) -> Result<(), ReconError> {
    let mut csv = writer(out);
    csv.write_record(cols.names()).map_err(write_err)?;
    for f in &table.rows {
        csv.write_record([
            f.customer_id.clone(),
            f.transaction_id.clone().unwrap_or_default(),
            f.satisfaction_score.to_string(),
            f.region.as_ref().map(|r| r.to_string()).unwrap_or_default(),
        ])
        .map_err(write_err)?;
    }
    flush(csv)
}

/// Write `table` under [`MASTER_COLUMNS`]. Readable with `load::load_master`.
pub fn write_master(table: &MasterTable, out: impl Write) -> Result<(), ReconError> {
    let mut csv = writer(out);
    csv.write_record(MASTER_COLUMNS).map_err(write_err)?;
    for r in &table.rows {
        csv.write_record([
            r.transaction_id.clone(),
            r.sku.clone().unwrap_or_default(),
            r.inventory_sku.clone().unwrap_or_default(),
            num(r.unit_cost),
            r.stock_quantity.map(|s| s.to_string()).unwrap_or_default(),
            num(r.sale_price),
            num(r.delivery_days),
            date(r.sale_date),
            r.customer_id.clone().unwrap_or_default(),
            r.satisfaction_score.map(|s| s.to_string()).unwrap_or_default(),
            r.region.as_ref().map(|g| g.to_string()).unwrap_or_default(),
            r.flags.to_string(),
        ])
        .map_err(write_err)?;
    }
    flush(csv)
}

pub fn master_to_string(table: &MasterTable) -> Result<String, ReconError> {
    let mut buf = Vec::new();
    write_master(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ReconError::Io(e.to_string()))
}

pub fn inventory_to_string(
    table: &InventoryTable,
    cols: &InventoryColumns,
) -> Result<String, ReconError> {
    let mut buf = Vec::new();
    write_inventory(table, cols, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ReconError::Io(e.to_string()))
}

pub fn transactions_to_string(
    table: &TransactionTable,
    cols: &TransactionColumns,
) -> Result<String, ReconError> {
    let mut buf = Vec::new();
    write_transactions(table, cols, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ReconError::Io(e.to_string()))
}

pub fn feedback_to_string(
    table: &FeedbackTable,
    cols: &FeedbackColumns,
) -> Result<String, ReconError> {
    let mut buf = Vec::new();
    write_feedback(table, cols, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ReconError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{parse_inventory, parse_master};
    use crate::model::{InventoryRecord, MasterRecord, QualityFlags, Region};

    fn master_row() -> MasterRecord {
        MasterRecord {
            transaction_id: "T1".into(),
            sku: Some("PROD-1".into()),
            sale_price: Some(49.99),
            delivery_days: Some(4.25),
            sale_date: NaiveDate::from_ymd_opt(2024, 5, 17),
            inventory_sku: Some("PROD-1".into()),
            unit_cost: Some(10.0),
            stock_quantity: Some(-5),
            customer_id: Some("C-9".into()),
            satisfaction_score: Some(7),
            region: Some(Region::Occidente),
            flags: QualityFlags::NEGATIVE_STOCK,
        }
    }

    #[test]
    fn master_header_and_formatting() {
        let mut ghost = master_row();
        ghost.transaction_id = "T2".into();
        ghost.sku = Some("PROD-999".into());
        ghost.inventory_sku = None;
        ghost.unit_cost = None;
        ghost.stock_quantity = None;
        ghost.sale_date = None;
        ghost.flags = QualityFlags::empty();

        let table = MasterTable { rows: vec![master_row(), ghost], ..Default::default() };
        let text = master_to_string(&table).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], MASTER_COLUMNS.join(","));
        assert_eq!(
            lines[1],
            "T1,PROD-1,PROD-1,10,-5,49.99,4.25,2024-05-17,C-9,7,Occidente,negative_stock"
        );
        assert_eq!(lines[2], "T2,PROD-999,,,,49.99,4.25,,C-9,7,Occidente,");
    }

    #[test]
    fn master_reads_back() {
        let table = MasterTable { rows: vec![master_row()], ..Default::default() };
        let back = parse_master(&master_to_string(&table).unwrap()).unwrap();
        assert_eq!(back.rows, table.rows);
        assert_eq!(back.inventory.rows[0].stock_quantity, -5);
    }

    #[test]
    fn inventory_uses_configured_headers() {
        let cols = InventoryColumns {
            sku: "SKU_ID".into(),
            unit_cost: "Costo".into(),
            stock_quantity: "Stock".into(),
        };
        let table = InventoryTable {
            rows: vec![InventoryRecord { sku: "A".into(), unit_cost: None, stock_quantity: 3 }],
        };
        let text = inventory_to_string(&table, &cols).unwrap();
        assert_eq!(text, "SKU_ID,Costo,Stock\nA,,3\n");
        assert_eq!(parse_inventory(&text, &cols).unwrap(), table);
    }
}
