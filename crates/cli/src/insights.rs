//! `techlog insights`: margin leaks, delivery vs satisfaction, regions.

use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;
use techlog_recon::insights::{insights, Insights};
use techlog_recon::Region;

use crate::exit_codes::EXIT_OUTPUT;
use crate::pipeline::{to_json, LoadedConfig};
use crate::CliError;

#[derive(Serialize)]
struct InsightsOutput<'a> {
    config_name: &'a str,
    cleaned: bool,
    regions: Vec<String>,
    rows: usize,
    #[serde(flatten)]
    insights: Insights,
}

fn parse_regions(raw: &[String]) -> Result<Vec<Region>, CliError> {
    raw.iter()
        .map(|r| {
            Region::parse(r).ok_or_else(|| {
                CliError::args("--region must not be empty")
                    .with_hint("known regions: Norte, Sur, Centro, Occidente")
            })
        })
        .collect()
}

pub fn cmd_insights(
    config_path: PathBuf,
    regions: Vec<String>,
    top: usize,
    clean: bool,
    json_output: bool,
) -> Result<(), CliError> {
    let filter = parse_regions(&regions)?;
    let loaded = LoadedConfig::read(&config_path)?;
    let result = loaded.run(clean)?;
    let table = result.final_table().filter_regions(&filter);
    let view = insights(&table, top);

    if json_output {
        let out = InsightsOutput {
            config_name: &result.meta.config_name,
            cleaned: clean,
            regions: filter.iter().map(|r| r.to_string()).collect(),
            rows: table.len(),
            insights: view,
        };
        println!("{}", to_json(&out)?);
        return Ok(());
    }

    print_human(&view, table.len()).map_err(|e| CliError::new(EXIT_OUTPUT, e.to_string()))
}

fn print_human(view: &Insights, rows: usize) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "{rows} rows")?;
    writeln!(out, "\nmargin leaks (sold below cost)")?;
    if view.margin_leaks.is_empty() {
        writeln!(out, "  none")?;
    }
    for leak in &view.margin_leaks {
        writeln!(out, "  {:<12} {:>4} sales  {:>12.2}", leak.sku, leak.units, leak.total_loss)?;
    }

    let d = &view.delivery_vs_satisfaction;
    match d.correlation {
        Some(r) => writeln!(out, "\ndelivery vs satisfaction: r = {r:.3} over {} responses", d.pairs)?,
        None => writeln!(out, "\ndelivery vs satisfaction: not enough data ({} responses)", d.pairs)?,
    }

    writeln!(out, "\nregions")?;
    for region in &view.regions {
        let fmt = |v: Option<f64>| v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "-".into());
        writeln!(
            out,
            "  {:<12} {:>5} responses  satisfaction {:>6}  delivery {:>8} days",
            region.region.as_str(),
            region.responses,
            fmt(region.mean_satisfaction),
            fmt(region.mean_delivery_days),
        )?;
    }
    Ok(())
}
