use std::path::PathBuf;

use techlog_recon::audit::audit;
use techlog_recon::clean::clean;
use techlog_recon::config::{ColumnConfig, OutlierRule, ReconConfig};
use techlog_recon::engine::run;
use techlog_recon::error::ReconError;
use techlog_recon::export::write_master;
use techlog_recon::insights::insights;
use techlog_recon::join::join;
use techlog_recon::load::{load, load_master};
use techlog_recon::model::{QualityFlags, Region};
use techlog_recon::source::{MemorySource, PathSource, SourceSet, UploadSource};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_config() -> ReconConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("techlog.toml")).unwrap();
    ReconConfig::from_toml(&toml).unwrap()
}

fn fixture_sources(config: &ReconConfig) -> SourceSet {
    SourceSet::from_config(&config.sources, &config.columns, &fixtures_dir()).unwrap()
}

// -------------------------------------------------------------------------
// Fixture pipeline
// -------------------------------------------------------------------------

#[test]
fn fixture_audit_counts_and_score() {
    let config = fixture_config();
    let out = run(&config, &fixture_sources(&config), false).unwrap();

    assert_eq!(out.rows.inventory, 4);
    assert_eq!(out.rows.transactions, 6);
    assert_eq!(out.rows.feedback, 4);
    assert_eq!(out.master.len(), 6);

    let r = &out.report;
    assert_eq!(r.ghost_rows, 1);
    assert_eq!(r.outlier_rows, 2);
    assert_eq!(r.negative_stock_rows, 1);
    assert_eq!(r.null_price_rows, 1);
    assert_eq!(r.null_cost_rows, 1);
    // 100 - (80*3 + 40*2)/6 - 20/4
    assert!((r.health_score - (100.0 - 320.0 / 6.0 - 5.0)).abs() < 1e-9);
    assert_eq!(out.diagnostics.orphan_feedback_rows, 1);

    // "101.0" in transactions meets "101" in inventory
    let t5 = &out.master.rows[4];
    assert_eq!(t5.inventory_sku.as_deref(), Some("101"));
    assert_eq!(t5.region, Some(Region::Norte));
}

#[test]
fn fixture_clean_then_reaudit() {
    let config = fixture_config();
    let out = run(&config, &fixture_sources(&config), true).unwrap();
    let cleaned = out.cleaned.as_ref().unwrap();

    assert_eq!(cleaned.log.ghost.rows_dropped, 1);
    assert_eq!(cleaned.log.negative_stock.rows_imputed, 1);
    assert_eq!(cleaned.log.outlier.rows_dropped, 2);
    assert_eq!(cleaned.log.null.rows_imputed, 1);

    let ids: Vec<_> = cleaned.table.rows.iter().map(|r| r.transaction_id.as_str()).collect();
    assert_eq!(ids, ["T2", "T4", "T5"]);

    let t4 = &cleaned.table.rows[1];
    assert_eq!(t4.sale_price, Some(12.0));
    assert!(t4.flags.contains(QualityFlags::NULL_VALUE));
    assert!(t4.flags.contains(QualityFlags::IMPUTED));
    // Median of the non-negative stock 100, 40, 12
    let prod1 = cleaned.table.inventory.rows.iter().find(|i| i.sku == "PROD-1").unwrap();
    assert_eq!(prod1.stock_quantity, 40);

    assert_eq!(cleaned.report.anomalies(), 0);
    assert_eq!(cleaned.report.health_score, 100.0);
}

#[test]
fn fixture_clean_is_idempotent() {
    let config = fixture_config();
    let out = run(&config, &fixture_sources(&config), true).unwrap();
    let first = out.cleaned.unwrap();
    let again = clean(&first.table, &config.clean, out.report.outlier_bounds);
    assert_eq!(again.table, first.table);
    assert!(again.log.is_noop());
}

#[test]
fn fixture_insights() {
    let config = fixture_config();
    let out = run(&config, &fixture_sources(&config), false).unwrap();
    let view = insights(&out.master, 10);

    assert_eq!(view.margin_leaks.len(), 1);
    assert_eq!(view.margin_leaks[0].sku, "PROD-2");
    assert_eq!(view.margin_leaks[0].total_loss, -5.0);

    let norte = &view.regions[0];
    assert_eq!(norte.region, Region::Norte);
    assert_eq!(norte.responses, 2);
    assert_eq!(norte.mean_satisfaction, Some(6.0));
    assert_eq!(view.delivery_vs_satisfaction.pairs, 3);
}

#[test]
fn cleaned_table_round_trips_through_csv() {
    let config = fixture_config();
    let out = run(&config, &fixture_sources(&config), true).unwrap();
    let table = out.final_table();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("master.csv");
    write_master(table, std::fs::File::create(&path).unwrap()).unwrap();

    let back = load_master(&PathSource::new(&path)).unwrap();
    assert_eq!(back.rows, table.rows);
}

// -------------------------------------------------------------------------
// Worked examples
// -------------------------------------------------------------------------

fn tiny(sku_sold: &str) -> SourceSet {
    SourceSet::new(
        MemorySource::new("inventory", "sku,unit_cost,stock_quantity\nPROD-1,10,-5\n"),
        MemorySource::new(
            "transactions",
            format!("transaction_id,sku,sale_price,delivery_days\nT1,{sku_sold},50,40\n"),
        ),
        MemorySource::new("feedback", "customer_id,transaction_id,satisfaction_score,region\n"),
    )
}

fn tiny_audit(sku_sold: &str) -> techlog_recon::QualityReport {
    let sources = tiny(sku_sold);
    let (inv, trans, feed) = load(
        sources.inventory.as_ref(),
        sources.transactions.as_ref(),
        sources.feedback.as_ref(),
        &ColumnConfig::default(),
    )
    .unwrap();
    let master = join(&inv, &trans, &feed).unwrap();
    assert_eq!(master.len(), 1);
    audit(&master, &OutlierRule::Threshold { days: 30.0 })
}

#[test]
fn matched_sale_with_slow_delivery_and_negative_stock() {
    let report = tiny_audit("PROD-1");
    assert_eq!(report.total_rows, 1);
    assert_eq!(report.ghost_rows, 0);
    assert_eq!(report.outlier_rows, 1);
    assert_eq!(report.negative_stock_rows, 1);
    assert!(report.health_score < 100.0);
}

#[test]
fn sale_of_unknown_sku_is_a_ghost() {
    let report = tiny_audit("PROD-999");
    assert_eq!(report.ghost_rows, 1);
}

// -------------------------------------------------------------------------
// Mock sources
// -------------------------------------------------------------------------

#[test]
fn mock_run_plants_known_anomalies() {
    let config = ReconConfig::from_toml("name = \"demo\"\n[sources]\nkind = \"mock\"\n").unwrap();
    let sources = SourceSet::from_config(&config.sources, &config.columns, &fixtures_dir()).unwrap();
    let out = run(&config, &sources, false).unwrap();

    assert_eq!(out.master.len(), 1000);
    assert_eq!(out.report.outlier_rows, 50);
    assert!(out.report.ghost_rows > 0);
    assert!(out.report.health_score < 100.0);
}

#[test]
fn mock_run_is_reproducible() {
    let config = ReconConfig::from_toml("name = \"demo\"\n[sources]\nkind = \"mock\"\nseed = 9\n").unwrap();
    let sources = |c: &ReconConfig| SourceSet::from_config(&c.sources, &c.columns, &fixtures_dir()).unwrap();
    let a = run(&config, &sources(&config), true).unwrap();
    let b = run(&config, &sources(&config), true).unwrap();
    assert_eq!(a.meta.content_hash, b.meta.content_hash);
    assert_eq!(a.report, b.report);
}

// -------------------------------------------------------------------------
// Errors
// -------------------------------------------------------------------------

#[test]
fn wrong_mapping_names_the_missing_column() {
    let toml = std::fs::read_to_string(fixtures_dir().join("techlog.toml"))
        .unwrap()
        .replace("unit_cost = \"Costo\"", "unit_cost = \"Cost\"");
    let config = ReconConfig::from_toml(&toml).unwrap();
    let err = run(&config, &fixture_sources(&config), false).unwrap_err();
    assert_eq!(
        err,
        ReconError::MissingColumn { table: "inventory".into(), column: "Cost".into() }
    );
}

#[test]
fn missing_file_is_source_unavailable() {
    let toml = std::fs::read_to_string(fixtures_dir().join("techlog.toml"))
        .unwrap()
        .replace("feedback.csv", "nope.csv");
    let config = ReconConfig::from_toml(&toml).unwrap();
    let err = run(&config, &fixture_sources(&config), false).unwrap_err();
    match err {
        ReconError::SourceUnavailable { source, .. } => assert!(source.ends_with("nope.csv")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn empty_upload_is_source_unavailable() {
    let sources = SourceSet::new(
        UploadSource::new("inventario.csv", Vec::new()),
        MemorySource::new("t", "transaction_id,sku,sale_price,delivery_days\n"),
        MemorySource::new("f", "customer_id,transaction_id,satisfaction_score,region\n"),
    );
    let config = ReconConfig::from_toml("name = \"up\"\n[sources]\nkind = \"mock\"\n").unwrap();
    let err = run(&config, &sources, false).unwrap_err();
    assert!(matches!(err, ReconError::SourceUnavailable { ref source, .. } if source == "upload:inventario.csv"));
}
