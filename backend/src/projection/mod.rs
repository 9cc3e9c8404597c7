//! Read-only queries over a published ledger.
//!
//! The projector borrows the ledger and on-hand levels of one snapshot and
//! never mutates them; any number of projectors may read the same snapshot
//! concurrently.

use chrono::{Local, NaiveDate};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{
    AvailabilityProjection, ItemSiteGroup, OnHandLevel, ReferenceSummary, Timeline,
    TimelinePoint, UnifiedLedgerEntry,
};

/// Queries over one ledger snapshot.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityProjector<'a> {
    ledger: &'a [UnifiedLedgerEntry],
    on_hand: &'a [OnHandLevel],
}

impl<'a> AvailabilityProjector<'a> {
    pub fn new(ledger: &'a [UnifiedLedgerEntry], on_hand: &'a [OnHandLevel]) -> Self {
        Self { ledger, on_hand }
    }

    /// All ledger entries carrying `reference_number`, in ledger order.
    pub fn lookup_by_reference(&self, reference_number: &str) -> Vec<UnifiedLedgerEntry> {
        self.ledger
            .iter()
            .filter(|e| e.reference_number == reference_number)
            .cloned()
            .collect()
    }

    /// All ledger entries of an item, optionally at one site, in ledger order.
    pub fn lookup_by_item(&self, item_code: &str, site: Option<&str>) -> Vec<UnifiedLedgerEntry> {
        self.entries_for(item_code, site).cloned().collect()
    }

    /// Most recent positive on-hand level of an item, 0 when none is recorded.
    pub fn baseline_on_hand(&self, item_code: &str, site: Option<&str>) -> f64 {
        self.on_hand
            .iter()
            .enumerate()
            .filter(|(_, l)| l.item_code == item_code && l.on_hand > 0.0)
            .filter(|(_, l)| site.map_or(true, |s| l.site == s))
            // latest date wins; undated or equal dates fall back to record order
            .max_by_key(|(idx, l)| (l.as_of, *idx))
            .map(|(_, l)| l.on_hand)
            .unwrap_or(0.0)
    }

    /// Net change per ship date and the running balance from the baseline.
    ///
    /// Entries without a ship date count on `today`.
    pub fn timeline(&self, item_code: &str, site: Option<&str>, today: NaiveDate) -> Timeline {
        let baseline = self.baseline_on_hand(item_code, site);

        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for entry in self.entries_for(item_code, site) {
            *by_date.entry(entry.ship_date.unwrap_or(today)).or_insert(0.0) += entry.net_change();
        }

        let mut running = baseline;
        let points = by_date
            .into_iter()
            .map(|(date, net_change)| {
                running += net_change;
                TimelinePoint {
                    date,
                    net_change,
                    cumulative_available: running,
                }
            })
            .collect();

        Timeline {
            item_code: item_code.to_string(),
            site: site.map(str::to_string),
            baseline_on_hand: baseline,
            points,
        }
    }

    /// Earliest date on which `needed_qty` of the item is available.
    pub fn project_availability(
        &self,
        item_code: &str,
        needed_qty: f64,
        site: Option<&str>,
    ) -> AvailabilityProjection {
        self.project_availability_on(item_code, needed_qty, site, Local::now().date_naive())
    }

    /// [`Self::project_availability`] with an explicit current date.
    pub fn project_availability_on(
        &self,
        item_code: &str,
        needed_qty: f64,
        site: Option<&str>,
        today: NaiveDate,
    ) -> AvailabilityProjection {
        let timeline = self.timeline(item_code, site, today);
        let earliest_date = timeline
            .points
            .iter()
            .find(|p| p.cumulative_available >= needed_qty)
            .map(|p| p.date);

        AvailabilityProjection {
            item_code: item_code.to_string(),
            site: site.map(str::to_string),
            needed_qty,
            earliest_date,
            baseline_on_hand: timeline.baseline_on_hand,
            timeline,
        }
    }

    /// Lines, totals and, when stock falls short, a projection for one reference.
    pub fn reference_summary(&self, reference_number: &str) -> Option<ReferenceSummary> {
        self.reference_summary_on(reference_number, Local::now().date_naive())
    }

    pub fn reference_summary_on(
        &self,
        reference_number: &str,
        today: NaiveDate,
    ) -> Option<ReferenceSummary> {
        let mut lines = self.lookup_by_reference(reference_number);
        if lines.is_empty() {
            return None;
        }
        lines.sort_by(|a, b| {
            a.item_code
                .cmp(&b.item_code)
                .then_with(|| dates_unknown_last(a.ship_date, b.ship_date))
        });

        // Main line: earliest ship date, unknown dates first
        let main = lines
            .iter()
            .min_by(|a, b| match (a.ship_date, b.ship_date) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(&y),
            })?
            .clone();

        let site = (!main.site.is_empty()).then_some(main.site.as_str());
        let need_qty = main.qty_demand;
        let on_hand = self.baseline_on_hand(&main.item_code, site);
        let shortfall = (need_qty > on_hand).then(|| {
            self.project_availability_on(&main.item_code, need_qty.max(1.0), site, today)
        });

        Some(ReferenceSummary {
            reference_number: reference_number.to_string(),
            item_code: main.item_code.clone(),
            site: main.site.clone(),
            ship_date: main.ship_date,
            need_qty,
            on_hand,
            total_demand: lines.iter().map(|l| l.qty_demand).sum(),
            total_supply: lines.iter().map(|l| l.qty_supply).sum(),
            lines,
            shortfall,
        })
    }

    /// Ledger lines of an item grouped by site.
    ///
    /// Groups are ordered by site name with the blank site last. Inside a
    /// group, lines without an order date come first, then by ship date.
    pub fn item_rows_by_site(&self, item_code: &str) -> Vec<ItemSiteGroup> {
        let mut groups: BTreeMap<&str, Vec<UnifiedLedgerEntry>> = BTreeMap::new();
        for entry in self.entries_for(item_code, None) {
            groups.entry(entry.site.as_str()).or_default().push(entry.clone());
        }

        let mut out: Vec<ItemSiteGroup> = groups
            .into_iter()
            .map(|(site, mut rows)| {
                rows.sort_by(|a, b| {
                    b.order_date
                        .is_none()
                        .cmp(&a.order_date.is_none())
                        .then_with(|| dates_unknown_last(a.ship_date, b.ship_date))
                });
                ItemSiteGroup {
                    site: site.to_string(),
                    count: rows.len(),
                    rows,
                }
            })
            .collect();

        out.sort_by_key(|g| g.site.is_empty());
        out
    }

    fn entries_for<'s>(
        &'s self,
        item_code: &'s str,
        site: Option<&'s str>,
    ) -> impl Iterator<Item = &'a UnifiedLedgerEntry> + 's {
        self.ledger.iter().filter(move |e| {
            e.item_code == item_code && site.map_or(true, |s| e.site == s)
        })
    }
}

fn dates_unknown_last(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn entry(reference: &str, item: &str, site: &str, ship: Option<u32>, supply: f64, demand: f64) -> UnifiedLedgerEntry {
        UnifiedLedgerEntry {
            reference_number: reference.into(),
            item_code: item.into(),
            site: site.into(),
            ship_date: ship.map(day),
            qty_supply: supply,
            qty_demand: demand,
            ..Default::default()
        }
    }

    fn level(item: &str, site: &str, qty: f64, as_of: Option<u32>) -> OnHandLevel {
        OnHandLevel {
            item_code: item.into(),
            site: site.into(),
            on_hand: qty,
            as_of: as_of.map(day),
        }
    }

    fn sample_ledger() -> Vec<UnifiedLedgerEntry> {
        vec![
            entry("PO-1", "A", "Main", Some(1), 5.0, 0.0),
            entry("SO-1", "A", "Main", Some(2), 0.0, 3.0),
            entry("PO-2", "A", "Main", Some(3), 10.0, 0.0),
            entry("PO-3", "B", "Main", Some(1), 4.0, 0.0),
        ]
    }

    #[test]
    fn test_cumulative_series_and_earliest_date() {
        let ledger = sample_ledger();
        let projector = AvailabilityProjector::new(&ledger, &[]);

        let hit = projector.project_availability_on("A", 10.0, None, day(15));
        let cumulative: Vec<f64> = hit
            .timeline
            .points
            .iter()
            .map(|p| p.cumulative_available)
            .collect();
        assert_eq!(cumulative, vec![5.0, 2.0, 12.0]);
        assert_eq!(hit.earliest_date, Some(day(3)));
        assert_eq!(hit.baseline_on_hand, 0.0);

        let miss = projector.project_availability_on("A", 13.0, None, day(15));
        assert_eq!(miss.earliest_date, None);
    }

    #[test]
    fn test_baseline_seeds_series() {
        let ledger = sample_ledger();
        let on_hand = vec![level("A", "Main", 4.0, Some(1))];
        let projector = AvailabilityProjector::new(&ledger, &on_hand);

        let projection = projector.project_availability_on("A", 8.0, None, day(15));
        assert_eq!(projection.baseline_on_hand, 4.0);
        assert_eq!(projection.timeline.points[0].cumulative_available, 9.0);
        assert_eq!(projection.earliest_date, Some(day(1)));
    }

    #[test]
    fn test_baseline_most_recent_positive() {
        let on_hand = vec![
            level("A", "Main", 7.0, Some(5)),
            level("A", "Main", 9.0, Some(2)),
            level("A", "Main", 0.0, Some(9)),
            level("A", "East", 30.0, Some(8)),
        ];
        let projector = AvailabilityProjector::new(&[], &on_hand);

        assert_eq!(projector.baseline_on_hand("A", Some("Main")), 7.0);
        assert_eq!(projector.baseline_on_hand("A", None), 30.0);
        assert_eq!(projector.baseline_on_hand("Z", None), 0.0);
    }

    #[test]
    fn test_baseline_undated_uses_record_order() {
        let on_hand = vec![level("A", "Main", 2.0, None), level("A", "Main", 6.0, None)];
        let projector = AvailabilityProjector::new(&[], &on_hand);
        assert_eq!(projector.baseline_on_hand("A", None), 6.0);
    }

    #[test]
    fn test_missing_ship_date_counts_today() {
        let ledger = vec![
            entry("PO-1", "A", "Main", None, 5.0, 0.0),
            entry("PO-2", "A", "Main", Some(20), 1.0, 0.0),
            entry("PO-3", "A", "Main", Some(10), 1.0, 0.0),
        ];
        let projector = AvailabilityProjector::new(&ledger, &[]);
        let timeline = projector.timeline("A", None, day(10));

        assert_eq!(timeline.points.len(), 2);
        assert_eq!(timeline.points[0].date, day(10));
        assert_eq!(timeline.points[0].net_change, 6.0);
    }

    #[test]
    fn test_lookups() {
        let mut ledger = sample_ledger();
        ledger.push(entry("PO-9", "A", "East", Some(4), 1.0, 0.0));
        let projector = AvailabilityProjector::new(&ledger, &[]);

        assert_eq!(projector.lookup_by_reference("SO-1").len(), 1);
        assert!(projector.lookup_by_reference("NOPE").is_empty());
        assert_eq!(projector.lookup_by_item("A", None).len(), 4);
        assert_eq!(projector.lookup_by_item("A", Some("East")).len(), 1);
    }

    #[test]
    fn test_reference_summary_with_shortfall() {
        let mut ledger = sample_ledger();
        ledger.push(entry("SO-1", "B", "Main", None, 0.0, 2.0));
        let on_hand = vec![level("B", "Main", 1.0, Some(1))];
        let projector = AvailabilityProjector::new(&ledger, &on_hand);

        let summary = projector.reference_summary_on("SO-1", day(15)).unwrap();
        // undated line is the main line
        assert_eq!(summary.item_code, "B");
        assert_eq!(summary.need_qty, 2.0);
        assert_eq!(summary.on_hand, 1.0);
        assert_eq!(summary.total_demand, 5.0);
        assert_eq!(summary.lines[0].item_code, "A");

        let shortfall = summary.shortfall.unwrap();
        assert_eq!(shortfall.needed_qty, 2.0);
        // 1 on hand + 4 supply on day 1, then -2 today
        assert_eq!(shortfall.earliest_date, Some(day(1)));

        assert!(projector.reference_summary("NOPE").is_none());
    }

    #[test]
    fn test_reference_summary_covered_has_no_shortfall() {
        let ledger = sample_ledger();
        let on_hand = vec![level("A", "Main", 50.0, None)];
        let projector = AvailabilityProjector::new(&ledger, &on_hand);

        let summary = projector.reference_summary_on("SO-1", day(15)).unwrap();
        assert!(summary.shortfall.is_none());
    }

    #[test]
    fn test_item_rows_by_site() {
        let mut undated_order = entry("SO-7", "A", "Main", Some(9), 0.0, 1.0);
        undated_order.order_date = None;
        let dated = |reference: &str, site: &str, ship: Option<u32>| {
            let mut e = entry(reference, "A", site, ship, 1.0, 0.0);
            e.order_date = Some(day(1));
            e
        };
        let ledger = vec![
            dated("PO-1", "Main", Some(5)),
            dated("PO-2", "", Some(1)),
            dated("PO-3", "Main", None),
            dated("PO-4", "East", Some(2)),
            dated("PO-5", "Main", Some(3)),
            undated_order,
        ];
        let projector = AvailabilityProjector::new(&ledger, &[]);
        let groups = projector.item_rows_by_site("A");

        let sites: Vec<_> = groups.iter().map(|g| g.site.as_str()).collect();
        assert_eq!(sites, vec!["East", "Main", ""]);

        let main: Vec<_> = groups[1]
            .rows
            .iter()
            .map(|r| r.reference_number.as_str())
            .collect();
        assert_eq!(main, vec!["SO-7", "PO-5", "PO-1", "PO-3"]);
        assert_eq!(groups[1].count, 4);
    }
}
