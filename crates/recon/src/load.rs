use std::cmp::Reverse;

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::config::{ColumnConfig, FeedbackColumns, InventoryColumns, TransactionColumns};
use crate::error::ReconError;
use crate::export::MASTER_COLUMNS;
use crate::keys::is_null_token;
use crate::model::{
    FeedbackRecord, FeedbackTable, InventoryRecord, InventoryTable, JoinDiagnostics,
    MasterRecord, MasterTable, QualityFlags, Region, TransactionRecord, TransactionTable,
};
use crate::source::TableSource;

/// Read and parse the three source tables.
pub fn load(
    inventory: &dyn TableSource,
    transactions: &dyn TableSource,
    feedback: &dyn TableSource,
    columns: &ColumnConfig,
) -> Result<(InventoryTable, TransactionTable, FeedbackTable), ReconError> {
    let inv = parse_inventory(&inventory.read_text()?, &columns.inventory)
        .map_err(|e| with_source(e, inventory))?;
    let trans = parse_transactions(&transactions.read_text()?, &columns.transactions)
        .map_err(|e| with_source(e, transactions))?;
    let feed = parse_feedback(&feedback.read_text()?, &columns.feedback)
        .map_err(|e| with_source(e, feedback))?;

    debug!(
        "loaded {} inventory, {} transaction, {} feedback rows",
        inv.len(),
        trans.len(),
        feed.len()
    );
    Ok((inv, trans, feed))
}

/// Read back a master table written by `export::write_master`.
pub fn load_master(source: &dyn TableSource) -> Result<MasterTable, ReconError> {
    parse_master(&source.read_text()?).map_err(|e| with_source(e, source))
}

/// Malformed delimited text is reported against the source it came from.
fn with_source(err: ReconError, source: &dyn TableSource) -> ReconError {
    match err {
        ReconError::SourceUnavailable { reason, .. } => {
            ReconError::SourceUnavailable { source: source.label(), reason }
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

struct Sheet {
    table: &'static str,
    headers: Vec<String>,
    records: Vec<csv::StringRecord>,
}

impl Sheet {
    fn parse(table: &'static str, text: &str) -> Result<Self, ReconError> {
        let unreadable = |e: csv::Error| ReconError::SourceUnavailable {
            source: table.into(),
            reason: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(sniff_delimiter(text))
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(unreadable)?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(unreadable)?;

        Ok(Self { table, headers, records })
    }

    fn idx(&self, name: &str) -> Result<usize, ReconError> {
        self.optional_idx(name).ok_or_else(|| ReconError::MissingColumn {
            table: self.table.into(),
            column: name.into(),
        })
    }

    fn optional_idx(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Data rows with their 1-based row number.
    fn rows(&self) -> impl Iterator<Item = (usize, &csv::StringRecord)> {
        self.records.iter().enumerate().map(|(i, r)| (i + 1, r))
    }
}

/// Pick the delimiter among tab, `;`, `,` and `|` that splits the header
/// into more than one field and agrees with the most sample rows. Earlier
/// candidates win ties. Comma when the text is blank or nothing splits.
fn sniff_delimiter(content: &str) -> u8 {
    const CANDIDATES: [u8; 4] = [b'\t', b';', b',', b'|'];
    let sample: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();
    let Some(header) = sample.first() else {
        return b',';
    };

    CANDIDATES
        .iter()
        .enumerate()
        .filter_map(|(rank, &delim)| {
            let width = field_count(header, delim);
            if width <= 1 {
                return None;
            }
            let agreeing = sample.iter().filter(|line| field_count(line, delim) == width).count();
            Some((agreeing * width, Reverse(rank), delim))
        })
        .max_by_key(|&(score, rank, _)| (score, rank))
        .map_or(b',', |(_, _, delim)| delim)
}

fn field_count(line: &str, delim: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |r| r.len())
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

struct Cell<'a> {
    table: &'static str,
    row: usize,
    column: &'a str,
    raw: &'a str,
}

impl<'a> Cell<'a> {
    fn at(sheet: &Sheet, record: &'a csv::StringRecord, row: usize, idx: usize, column: &'a str) -> Self {
        Self { table: sheet.table, row, column, raw: record.get(idx).unwrap_or("") }
    }

    fn invalid(&self, reason: &str) -> ReconError {
        ReconError::InvalidValue {
            table: self.table.into(),
            row: self.row,
            column: self.column.into(),
            value: self.raw.into(),
            reason: reason.into(),
        }
    }

    fn trimmed(&self) -> &'a str {
        self.raw.trim()
    }

    fn text(&self) -> Option<String> {
        let t = self.trimmed();
        (!t.is_empty()).then(|| t.to_string())
    }

    fn required_text(&self) -> Result<String, ReconError> {
        self.text().ok_or_else(|| self.invalid("value is required"))
    }

    /// Optional non-negative number.
    fn amount(&self) -> Result<Option<f64>, ReconError> {
        let t = self.trimmed();
        if is_null_token(t) {
            return Ok(None);
        }
        let n: f64 = t.parse().map_err(|_| self.invalid("not a number"))?;
        if !n.is_finite() {
            return Err(self.invalid("not a finite number"));
        }
        if n < 0.0 {
            return Err(self.invalid("must not be negative"));
        }
        Ok(Some(n))
    }

    /// Optional integer; integral floats (`12.0`) are accepted.
    fn integer(&self) -> Result<Option<i64>, ReconError> {
        let t = self.trimmed();
        if is_null_token(t) {
            return Ok(None);
        }
        if let Ok(n) = t.parse::<i64>() {
            return Ok(Some(n));
        }
        match t.parse::<f64>() {
            Ok(n) if n.is_finite() && n.fract() == 0.0 => {
                // i64::MAX rounds up to 2^63 as f64, so the upper bound is exclusive
                if n < i64::MIN as f64 || n >= i64::MAX as f64 {
                    return Err(self.invalid("out of range"));
                }
                Ok(Some(n as i64))
            }
            _ => Err(self.invalid("not an integer")),
        }
    }

    fn required_integer(&self) -> Result<i64, ReconError> {
        self.integer()?.ok_or_else(|| self.invalid("value is required"))
    }

    fn score(&self) -> Result<Option<u8>, ReconError> {
        match self.integer()? {
            None => Ok(None),
            Some(n) if (0..=10).contains(&n) => Ok(Some(n as u8)),
            Some(_) => Err(self.invalid("must be between 0 and 10")),
        }
    }

    fn date(&self) -> Result<Option<NaiveDate>, ReconError> {
        let t = self.trimmed();
        if is_null_token(t) {
            return Ok(None);
        }
        NaiveDate::parse_from_str(t, "%Y-%m-%d")
            .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
            .map(Some)
            .map_err(|_| self.invalid("expected YYYY-MM-DD"))
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

pub fn parse_inventory(text: &str, cols: &InventoryColumns) -> Result<InventoryTable, ReconError> {
    let sheet = Sheet::parse("inventory", text)?;
    let sku_idx = sheet.idx(&cols.sku)?;
    let cost_idx = sheet.idx(&cols.unit_cost)?;
    let stock_idx = sheet.idx(&cols.stock_quantity)?;

    let mut rows = Vec::with_capacity(sheet.records.len());
    for (row, record) in sheet.rows() {
        rows.push(InventoryRecord {
            sku: Cell::at(&sheet, record, row, sku_idx, &cols.sku).required_text()?,
            unit_cost: Cell::at(&sheet, record, row, cost_idx, &cols.unit_cost).amount()?,
            stock_quantity: Cell::at(&sheet, record, row, stock_idx, &cols.stock_quantity)
                .required_integer()?,
        });
    }
    Ok(InventoryTable { rows })
}

pub fn parse_transactions(
    text: &str,
    cols: &TransactionColumns,
) -> Result<TransactionTable, ReconError> {
    let sheet = Sheet::parse("transactions", text)?;
    let id_idx = sheet.idx(&cols.transaction_id)?;
    let sku_idx = sheet.idx(&cols.sku)?;
    let price_idx = sheet.idx(&cols.sale_price)?;
    let days_idx = sheet.idx(&cols.delivery_days)?;
    let date_idx = sheet.optional_idx(&cols.sale_date);

    let mut rows = Vec::with_capacity(sheet.records.len());
    for (row, record) in sheet.rows() {
        let sale_date = match date_idx {
            Some(i) => Cell::at(&sheet, record, row, i, &cols.sale_date).date()?,
            None => None,
        };
        rows.push(TransactionRecord {
            transaction_id: Cell::at(&sheet, record, row, id_idx, &cols.transaction_id)
                .required_text()?,
            sku: Cell::at(&sheet, record, row, sku_idx, &cols.sku).text(),
            sale_price: Cell::at(&sheet, record, row, price_idx, &cols.sale_price).amount()?,
            delivery_days: Cell::at(&sheet, record, row, days_idx, &cols.delivery_days).amount()?,
            sale_date,
        });
    }
    Ok(TransactionTable { rows })
}

pub fn parse_feedback(text: &str, cols: &FeedbackColumns) -> Result<FeedbackTable, ReconError> {
    let sheet = Sheet::parse("feedback", text)?;
    let customer_idx = sheet.idx(&cols.customer_id)?;
    let tid_idx = sheet.idx(&cols.transaction_id)?;
    let score_idx = sheet.idx(&cols.satisfaction_score)?;
    let region_idx = sheet.idx(&cols.region)?;

    let mut rows = Vec::with_capacity(sheet.records.len());
    for (row, record) in sheet.rows() {
        let score_cell = Cell::at(&sheet, record, row, score_idx, &cols.satisfaction_score);
        rows.push(FeedbackRecord {
            customer_id: Cell::at(&sheet, record, row, customer_idx, &cols.customer_id)
                .text()
                .unwrap_or_default(),
            transaction_id: Cell::at(&sheet, record, row, tid_idx, &cols.transaction_id).text(),
            satisfaction_score: score_cell
                .score()?
                .ok_or_else(|| score_cell.invalid("value is required"))?,
            region: Region::parse(record.get(region_idx).unwrap_or("")),
        });
    }
    Ok(FeedbackTable { rows })
}

pub fn parse_master(text: &str) -> Result<MasterTable, ReconError> {
    let sheet = Sheet::parse("master", text)?;
    let [tid, sku, inv_sku, cost, stock, price, days, date, customer, score, region, flags] =
        MASTER_COLUMNS;

    let tid_i = sheet.idx(tid)?;
    let sku_i = sheet.idx(sku)?;
    let inv_i = sheet.idx(inv_sku)?;
    let cost_i = sheet.idx(cost)?;
    let stock_i = sheet.idx(stock)?;
    let price_i = sheet.idx(price)?;
    let days_i = sheet.idx(days)?;
    let date_i = sheet.idx(date)?;
    let cust_i = sheet.idx(customer)?;
    let score_i = sheet.idx(score)?;
    let region_i = sheet.idx(region)?;
    let flags_i = sheet.optional_idx(flags);

    let mut rows = Vec::with_capacity(sheet.records.len());
    for (row, record) in sheet.rows() {
        let cell = |i: usize, name: &'static str| Cell::at(&sheet, record, row, i, name);
        let parsed_flags = match flags_i {
            Some(i) => {
                let c = cell(i, flags);
                QualityFlags::parse(c.trimmed()).ok_or_else(|| c.invalid("unknown flag"))?
            }
            None => QualityFlags::empty(),
        };
        rows.push(MasterRecord {
            transaction_id: cell(tid_i, tid).required_text()?,
            sku: cell(sku_i, sku).text(),
            sale_price: cell(price_i, price).amount()?,
            delivery_days: cell(days_i, days).amount()?,
            sale_date: cell(date_i, date).date()?,
            inventory_sku: cell(inv_i, inv_sku).text(),
            unit_cost: cell(cost_i, cost).amount()?,
            stock_quantity: cell(stock_i, stock).integer()?,
            customer_id: cell(cust_i, customer).text(),
            satisfaction_score: cell(score_i, score).score()?,
            region: Region::parse(record.get(region_i).unwrap_or("")),
            flags: parsed_flags,
        });
    }

    let inventory = inventory_from_rows(&rows);
    Ok(MasterTable { rows, inventory, diagnostics: JoinDiagnostics::default() })
}

/// Distinct matched inventory items, in order of first appearance.
fn inventory_from_rows(rows: &[MasterRecord]) -> InventoryTable {
    let mut seen = std::collections::HashSet::new();
    let rows = rows
        .iter()
        .filter_map(|r| {
            let sku = r.inventory_sku.as_ref()?;
            let stock = r.stock_quantity?;
            seen.insert(sku.clone()).then(|| InventoryRecord {
                sku: sku.clone(),
                unit_cost: r.unit_cost,
                stock_quantity: stock,
            })
        })
        .collect();
    InventoryTable { rows }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
