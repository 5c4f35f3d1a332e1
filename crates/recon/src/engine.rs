use log::info;
use serde::Serialize;

use crate::audit::{audit_with_bounds, delivery_values};
use crate::cache::{reconcile, ReconCache, Reconciled};
use crate::clean::clean;
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::model::{CleanLog, JoinDiagnostics, MasterTable, QualityReport};
use crate::source::SourceSet;

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub content_hash: String,
    pub outlier_rule: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceCounts {
    pub inventory: usize,
    pub transactions: usize,
    pub feedback: usize,
}

/// Cleaned table plus its re-audit under the same outlier bounds.
#[derive(Debug, Clone, Serialize)]
pub struct CleanedRun {
    pub log: CleanLog,
    pub report: QualityReport,
    #[serde(skip)]
    pub table: MasterTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub meta: RunMeta,
    pub rows: SourceCounts,
    pub diagnostics: JoinDiagnostics,
    pub report: QualityReport,
    pub cleaned: Option<CleanedRun>,
    #[serde(skip)]
    pub master: MasterTable,
}

impl RunOutput {
    /// Table to export: the cleaned one when cleaning ran.
    pub fn final_table(&self) -> &MasterTable {
        self.cleaned.as_ref().map(|c| &c.table).unwrap_or(&self.master)
    }

    /// Score of `final_table`.
    pub fn final_score(&self) -> f64 {
        self.cleaned.as_ref().map(|c| &c.report).unwrap_or(&self.report).health_score
    }
}

/// Load, join, audit and, when `apply_clean` is set, clean and re-audit.
pub fn run(
    config: &ReconConfig,
    sources: &SourceSet,
    apply_clean: bool,
) -> Result<RunOutput, ReconError> {
    let reconciled = reconcile(sources, &config.columns)?;
    Ok(finish(config, &reconciled, apply_clean))
}

/// Same as [`run`], reusing a previous load + join when the contents match.
pub fn run_with_cache(
    config: &ReconConfig,
    sources: &SourceSet,
    apply_clean: bool,
    cache: &mut ReconCache,
) -> Result<RunOutput, ReconError> {
    let reconciled = cache.get_or_load(sources, &config.columns)?;
    Ok(finish(config, &reconciled, apply_clean))
}

fn finish(config: &ReconConfig, reconciled: &Reconciled, apply_clean: bool) -> RunOutput {
    let master = reconciled.master.clone();
    // Resolved once so the cleaned table is judged by the same limits
    let bounds = config.audit.outlier.resolve(&delivery_values(&master));
    let report = audit_with_bounds(&master, bounds);

    let cleaned = apply_clean.then(|| {
        let outcome = clean(&master, &config.clean, bounds);
        CleanedRun {
            report: audit_with_bounds(&outcome.table, bounds),
            log: outcome.log,
            table: outcome.table,
        }
    });

    match &cleaned {
        Some(c) => info!(
            "{}: health {:.1} -> {:.1} after clean ({} rows dropped)",
            config.name,
            report.health_score,
            c.report.health_score,
            c.log.rows_dropped()
        ),
        None => info!("{}: health {:.1} over {} rows", config.name, report.health_score, report.total_rows),
    }

    RunOutput {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            content_hash: reconciled.content_hash.clone(),
            outlier_rule: config.audit.outlier.to_string(),
        },
        rows: SourceCounts {
            inventory: reconciled.inventory_rows,
            transactions: reconciled.transaction_rows,
            feedback: reconciled.feedback_rows,
        },
        diagnostics: master.diagnostics.clone(),
        report,
        cleaned,
        master,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CleanPolicy;
    use crate::source::MemorySource;

    fn config(clean_outliers: CleanPolicy) -> ReconConfig {
        let mut config = ReconConfig::from_toml(
            "name = \"unit\"\n[sources]\nkind = \"mock\"\n",
        )
        .unwrap();
        config.clean.outlier = clean_outliers;
        config
    }

    fn sources() -> SourceSet {
        SourceSet::new(
            MemorySource::new("inv", "sku,unit_cost,stock_quantity\nPROD-1,10,-5\nPROD-2,4,3\n"),
            MemorySource::new(
                "trans",
                "transaction_id,sku,sale_price,delivery_days\nT1,PROD-1,50,40\nT2,PROD-2,8,2\nT3,PROD-9,8,3\n",
            ),
            MemorySource::new("feed", "customer_id,transaction_id,satisfaction_score,region\nC1,T2,9,Norte\n"),
        )
    }

    #[test]
    fn audit_only_run() {
        let out = run(&config(CleanPolicy::Drop), &sources(), false).unwrap();
        assert!(out.cleaned.is_none());
        assert_eq!(out.rows.transactions, 3);
        assert_eq!(out.report.ghost_rows, 1);
        assert_eq!(out.report.outlier_rows, 1);
        assert_eq!(out.report.negative_stock_rows, 1);
        assert_eq!(out.final_table().len(), 3);
        assert_eq!(out.meta.config_name, "unit");
        assert!(out.meta.content_hash.starts_with("sha256:"));
    }

    #[test]
    fn clean_run_reaudits_with_same_bounds() {
        let out = run(&config(CleanPolicy::Drop), &sources(), true).unwrap();
        let cleaned = out.cleaned.as_ref().unwrap();
        assert_eq!(cleaned.log.outlier.rows_dropped, 1);
        assert_eq!(cleaned.report.outlier_rows, 0);
        assert_eq!(cleaned.report.outlier_bounds, out.report.outlier_bounds);
        assert_eq!(out.final_table().len(), 2);
        assert!(out.final_score() > out.report.health_score);
    }

    #[test]
    fn cached_run_matches_uncached() {
        let mut cache = ReconCache::new();
        let cfg = config(CleanPolicy::MarkOnly);
        let a = run_with_cache(&cfg, &sources(), false, &mut cache).unwrap();
        let b = run_with_cache(&cfg, &sources(), false, &mut cache).unwrap();
        assert_eq!(a.report, b.report);
        assert_eq!(cache.hits(), 1);
        assert_eq!(a.report, run(&cfg, &sources(), false).unwrap().report);
    }

    #[test]
    fn json_omits_tables() {
        let out = run(&config(CleanPolicy::Drop), &sources(), true).unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("master").is_none());
        assert!(json["cleaned"].get("table").is_none());
        assert_eq!(json["report"]["ghost_rows"], 1);
    }
}
