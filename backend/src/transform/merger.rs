//! Source merging: sales orders, purchase orders and the reconciled shipping
//! schedule into one ledger.
//!
//! The shipping schedule is the preferred source of supply detail. Purchase
//! orders only contribute header fields to it, except for purchase orders the
//! schedule never mentions once reconciled: those are recovered from the raw
//! purchase-order lines so no open purchase order disappears from the ledger.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{CanonicalOrderLine, ScheduleLine, UnifiedLedgerEntry};

/// Header fields shared by every line of one purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PurchaseOrderHeader {
    pub reference_number: String,
    pub order_date: Option<NaiveDate>,
    pub po_number: String,
    pub site: String,
    pub party_name: String,
}

impl PurchaseOrderHeader {
    fn of(line: &CanonicalOrderLine) -> Self {
        Self {
            reference_number: line.reference_number.clone(),
            order_date: line.order_date,
            po_number: line.po_number.clone(),
            site: line.site.clone(),
            party_name: line.party_name.clone(),
        }
    }
}

/// Distinct purchase orders and the items they carry.
#[derive(Debug, Clone, Default)]
pub struct PurchaseOrderIndex {
    /// Distinct headers, first-seen order.
    pub headers: Vec<PurchaseOrderHeader>,
    /// Items seen on any purchase-order line.
    pub known_items: HashSet<String>,
}

impl PurchaseOrderIndex {
    /// Deduplicate purchase-order lines on header plus item, then on header alone.
    pub fn build(lines: &[CanonicalOrderLine]) -> Self {
        let mut seen_lines = HashSet::new();
        let mut seen_headers = HashSet::new();
        let mut index = Self::default();

        for line in lines {
            let header = PurchaseOrderHeader::of(line);
            if !seen_lines.insert((header.clone(), line.item_code.clone())) {
                continue;
            }
            index.known_items.insert(line.item_code.clone());
            if seen_headers.insert(header.clone()) {
                index.headers.push(header);
            }
        }

        index
    }
}

/// Ledger plus bookkeeping of the recovery pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeOutcome {
    pub ledger: Vec<UnifiedLedgerEntry>,
    /// Purchase-order references with no schedule line after reconciliation
    pub orphaned_refs: Vec<String>,
    /// Orphaned references that made it into the ledger via recovery
    pub recovered_refs: Vec<String>,
    /// Orphaned references still absent from the ledger
    pub unresolved_refs: Vec<String>,
    /// Entries dropped for lacking an item code
    pub dropped_without_item: usize,
}

/// Left join of schedule lines onto purchase-order headers by reference.
///
/// A schedule line yields one entry per matching header, or one entry with
/// empty header fields when no header matches.
pub fn primary_merge(
    schedule: &[ScheduleLine],
    headers: &[PurchaseOrderHeader],
) -> Vec<UnifiedLedgerEntry> {
    let mut by_ref: HashMap<&str, Vec<&PurchaseOrderHeader>> = HashMap::new();
    for header in headers {
        by_ref
            .entry(header.reference_number.as_str())
            .or_default()
            .push(header);
    }

    let mut out = Vec::new();
    for sched in schedule {
        let line = &sched.line;
        let base = UnifiedLedgerEntry {
            order_date: None,
            ship_date: line.ship_date,
            reference_number: line.reference_number.clone(),
            po_number: String::new(),
            party_name: String::new(),
            qty_demand: 0.0,
            qty_supply: line.qty_supply,
            item_code: line.item_code.clone(),
            site: String::new(),
            remark: line.remark.clone(),
        };

        match by_ref.get(line.reference_number.as_str()) {
            Some(matches) => {
                for header in matches {
                    out.push(UnifiedLedgerEntry {
                        order_date: header.order_date,
                        po_number: header.po_number.clone(),
                        party_name: header.party_name.clone(),
                        site: header.site.clone(),
                        ..base.clone()
                    });
                }
            }
            None => out.push(base),
        }
    }

    out
}

/// Purchase-order lines of headers whose reference is absent from `merged`.
///
/// Returns the recovered entries and the orphaned references.
pub fn recover_orphans(
    purchase_orders: &[CanonicalOrderLine],
    headers: &[PurchaseOrderHeader],
    merged: &[UnifiedLedgerEntry],
) -> (Vec<UnifiedLedgerEntry>, Vec<String>) {
    let merged_refs: HashSet<&str> = merged.iter().map(|e| e.reference_number.as_str()).collect();

    let orphans: HashSet<&PurchaseOrderHeader> = headers
        .iter()
        .filter(|h| !merged_refs.contains(h.reference_number.as_str()))
        .collect();

    let orphaned_refs: Vec<String> = orphans
        .iter()
        .map(|h| h.reference_number.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let recovered = purchase_orders
        .iter()
        .filter(|line| orphans.contains(&PurchaseOrderHeader::of(line)))
        .map(|line| UnifiedLedgerEntry {
            qty_demand: 0.0,
            ..UnifiedLedgerEntry::from(line.clone())
        })
        .collect();

    (recovered, orphaned_refs)
}

/// Descending by site, then item, then ship date; unknown dates last.
pub fn ledger_order(a: &UnifiedLedgerEntry, b: &UnifiedLedgerEntry) -> Ordering {
    b.site
        .cmp(&a.site)
        .then_with(|| b.item_code.cmp(&a.item_code))
        .then_with(|| match (a.ship_date, b.ship_date) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Merge the three canonical inputs into the sorted ledger.
pub fn merge_sources(
    sales_orders: &[CanonicalOrderLine],
    purchase_orders: &[CanonicalOrderLine],
    index: &PurchaseOrderIndex,
    schedule: &[ScheduleLine],
) -> MergeOutcome {
    let merged = primary_merge(schedule, &index.headers);
    let (recovered, orphaned_refs) = recover_orphans(purchase_orders, &index.headers, &merged);

    let mut ledger: Vec<UnifiedLedgerEntry> = sales_orders
        .iter()
        .cloned()
        .map(UnifiedLedgerEntry::from)
        .chain(merged)
        .chain(recovered)
        .collect();

    let before = ledger.len();
    ledger.retain(|e| !e.item_code.trim().is_empty());
    let dropped_without_item = before - ledger.len();

    ledger.sort_by(ledger_order);

    let present: HashSet<&str> = ledger.iter().map(|e| e.reference_number.as_str()).collect();
    let (recovered_refs, unresolved_refs): (Vec<String>, Vec<String>) = orphaned_refs
        .iter()
        .cloned()
        .partition(|r| present.contains(r.as_str()));

    MergeOutcome {
        ledger,
        orphaned_refs,
        recovered_refs,
        unresolved_refs,
        dropped_without_item,
    }
}
