//! Business views over a master table: where margin leaks, whether slow
//! deliveries hurt satisfaction, and how regions compare.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::model::{MasterTable, Region};
use crate::stats;

/// A SKU sold below its unit cost at least once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginLeak {
    pub sku: String,
    /// Sales below cost.
    pub units: usize,
    /// Sum of negative margins (always < 0).
    pub total_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliverySatisfaction {
    /// Rows with both a delivery time and a satisfaction score.
    pub pairs: usize,
    /// Pearson r; `None` with fewer than two pairs or no variance.
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    pub region: Region,
    pub responses: usize,
    pub mean_satisfaction: Option<f64>,
    pub mean_delivery_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub margin_leaks: Vec<MarginLeak>,
    pub delivery_vs_satisfaction: DeliverySatisfaction,
    pub regions: Vec<RegionSummary>,
}

/// All three views. `limit` caps the margin leak list.
pub fn insights(master: &MasterTable, limit: usize) -> Insights {
    Insights {
        margin_leaks: margin_leaks(master, limit),
        delivery_vs_satisfaction: delivery_vs_satisfaction(master),
        regions: region_breakdown(master),
    }
}

/// SKUs with negative margin, most negative total first. Ties go by sku.
pub fn margin_leaks(master: &MasterTable, limit: usize) -> Vec<MarginLeak> {
    let mut by_sku: HashMap<&str, MarginLeak> = HashMap::new();
    for row in &master.rows {
        let (Some(sku), Some(margin)) = (row.inventory_sku.as_deref(), row.margin()) else {
            continue;
        };
        if margin >= 0.0 {
            continue;
        }
        let leak = by_sku.entry(sku).or_insert_with(|| MarginLeak {
            sku: sku.to_string(),
            units: 0,
            total_loss: 0.0,
        });
        leak.units += 1;
        leak.total_loss += margin;
    }

    let mut leaks: Vec<MarginLeak> = by_sku.into_values().collect();
    leaks.sort_by(|a, b| a.total_loss.total_cmp(&b.total_loss).then_with(|| a.sku.cmp(&b.sku)));
    leaks.truncate(limit);
    leaks
}

pub fn delivery_vs_satisfaction(master: &MasterTable) -> DeliverySatisfaction {
    let pairs: Vec<(f64, f64)> = master
        .rows
        .iter()
        .filter_map(|r| Some((r.delivery_days?, f64::from(r.satisfaction_score?))))
        .collect();
    DeliverySatisfaction { pairs: pairs.len(), correlation: stats::pearson(&pairs) }
}

/// One entry per region that has responses, known regions first.
pub fn region_breakdown(master: &MasterTable) -> Vec<RegionSummary> {
    let mut groups: BTreeMap<&Region, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in &master.rows {
        let (Some(region), Some(score)) = (row.region.as_ref(), row.satisfaction_score) else {
            continue;
        };
        let (scores, days) = groups.entry(region).or_default();
        scores.push(f64::from(score));
        days.extend(row.delivery_days);
    }

    groups
        .into_iter()
        .map(|(region, (scores, days))| RegionSummary {
            region: region.clone(),
            responses: scores.len(),
            mean_satisfaction: stats::mean(&scores),
            mean_delivery_days: stats::mean(&days),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MasterRecord, QualityFlags};

    fn row(sku: &str, price: f64, cost: f64, days: f64, score: Option<u8>, region: Option<Region>) -> MasterRecord {
        MasterRecord {
            transaction_id: format!("T-{sku}-{price}"),
            sku: Some(sku.into()),
            sale_price: Some(price),
            delivery_days: Some(days),
            sale_date: None,
            inventory_sku: Some(sku.into()),
            unit_cost: Some(cost),
            stock_quantity: Some(1),
            customer_id: score.map(|_| "C".into()),
            satisfaction_score: score,
            region,
            flags: QualityFlags::empty(),
        }
    }

    fn table() -> MasterTable {
        MasterTable {
            rows: vec![
                row("A", 50.0, 60.0, 2.0, Some(9), Some(Region::Norte)),
                row("A", 40.0, 60.0, 4.0, Some(7), Some(Region::Sur)),
                row("B", 10.0, 15.0, 8.0, Some(3), Some(Region::Norte)),
                row("C", 90.0, 15.0, 10.0, Some(1), Some(Region::Other("Caribe".into()))),
                row("D", 20.0, 25.0, 12.0, None, None),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn leaks_grouped_and_ordered() {
        let leaks = margin_leaks(&table(), 10);
        let skus: Vec<_> = leaks.iter().map(|l| l.sku.as_str()).collect();
        assert_eq!(skus, ["A", "B", "D"]);
        assert_eq!(leaks[0].units, 2);
        assert_eq!(leaks[0].total_loss, -30.0);
        // B and D both lose 5; ties fall back to sku order
        assert_eq!(leaks[1].total_loss, -5.0);

        assert_eq!(margin_leaks(&table(), 1).len(), 1);
    }

    #[test]
    fn ghost_rows_never_leak() {
        let mut m = table();
        for r in &mut m.rows {
            r.inventory_sku = None;
            r.unit_cost = None;
        }
        assert!(margin_leaks(&m, 10).is_empty());
    }

    #[test]
    fn slower_delivery_lower_score() {
        let result = delivery_vs_satisfaction(&table());
        assert_eq!(result.pairs, 4);
        assert!(result.correlation.is_some_and(|r| r < -0.9));
    }

    #[test]
    fn regions_in_enum_order() {
        let regions = region_breakdown(&table());
        let names: Vec<_> = regions.iter().map(|r| r.region.to_string()).collect();
        assert_eq!(names, ["Norte", "Sur", "Caribe"]);
        assert_eq!(regions[0].responses, 2);
        assert_eq!(regions[0].mean_satisfaction, Some(6.0));
        assert_eq!(regions[0].mean_delivery_days, Some(5.0));
    }

    #[test]
    fn region_filter_narrows_every_view() {
        let north = table().filter_regions(&[Region::Norte]);
        let all = insights(&north, 5);
        assert_eq!(all.regions.len(), 1);
        assert_eq!(all.delivery_vs_satisfaction.pairs, 2);
        let skus: Vec<_> = all.margin_leaks.iter().map(|l| l.sku.as_str()).collect();
        assert_eq!(skus, ["A", "B"]);
    }
}
