//! Domain models for the reconciliation pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Feed`] - The source exports the engine consumes
//! - [`CanonicalField`] - Target fields of the feed matrices
//! - [`CanonicalOrderLine`] - One cleaned demand or supply line
//! - [`ScheduleLine`] - A shipping-schedule line with its kit description
//! - [`ItemAliasMap`] - Shipping-schedule naming to canonical item codes
//! - [`UnifiedLedgerEntry`] - One row of the merged ledger
//! - [`OnHandLevel`] - Recorded on-hand quantity for an item/site
//! - [`Timeline`] / [`AvailabilityProjection`] - Available-to-promise output

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Feeds
// =============================================================================

/// Source export consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    /// Open sales orders (demand).
    SalesOrders,
    /// Open purchase orders (supply).
    PurchaseOrders,
    /// Vendor shipping schedule (supply detail, may contain kits).
    ShippingSchedule,
    /// Two-column alias table.
    ItemAliases,
    /// On-hand inventory report.
    OnHand,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::SalesOrders => "sales_orders",
            Feed::PurchaseOrders => "purchase_orders",
            Feed::ShippingSchedule => "shipping_schedule",
            Feed::ItemAliases => "item_aliases",
            Feed::OnHand => "on_hand",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Canonical fields
// =============================================================================

/// Field of the canonical line schema a feed column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    OrderDate,
    ShipDate,
    ReferenceNumber,
    PoNumber,
    PartyName,
    ItemCode,
    QtyDemand,
    QtySupply,
    Site,
    Remark,
    /// Long-form kit description (shipping schedule only).
    Description,
    /// Vendor-side item number (shipping schedule only).
    VendorItemNo,
    /// Recorded on-hand quantity (on-hand report only).
    OnHand,
    /// Date the on-hand quantity was recorded.
    SnapshotDate,
}

// =============================================================================
// Canonical lines
// =============================================================================

/// One cleaned order line, whatever feed it came from.
///
/// Quantities default to `0.0` and text fields to the empty string when the
/// feed does not provide them. Dates are `None` when absent or unparsable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalOrderLine {
    pub order_date: Option<NaiveDate>,
    pub ship_date: Option<NaiveDate>,
    pub reference_number: String,
    pub po_number: String,
    pub party_name: String,
    pub item_code: String,
    pub qty_demand: f64,
    pub qty_supply: f64,
    pub site: String,
    pub remark: String,
}

/// A shipping-schedule line.
///
/// `line.item_code` holds the ordering model; for kit lines the model is
/// replaced by the decomposed component codes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleLine {
    pub line: CanonicalOrderLine,
    pub vendor_item_no: String,
    pub description: String,
}

/// Recorded on-hand quantity for one item at one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnHandLevel {
    pub item_code: String,
    pub site: String,
    pub on_hand: f64,
    pub as_of: Option<NaiveDate>,
}

// =============================================================================
// Item aliases
// =============================================================================

/// Mapping from shipping-schedule item naming to canonical item codes.
///
/// Lookups are total: an unmapped code resolves to itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemAliasMap {
    aliases: HashMap<String, String>,
}

impl ItemAliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an alias. A later insert for the same key replaces the earlier one.
    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.aliases.insert(from.into(), to.into());
    }

    /// Canonical code for `code`, or `code` itself when unmapped.
    pub fn resolve<'a>(&'a self, code: &'a str) -> &'a str {
        self.aliases.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl FromIterator<(String, String)> for ItemAliasMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (from, to) in iter {
            map.insert(from, to);
        }
        map
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// One row of the unified demand/supply ledger.
///
/// `item_code` is never empty in a published ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedLedgerEntry {
    pub order_date: Option<NaiveDate>,
    pub ship_date: Option<NaiveDate>,
    pub reference_number: String,
    pub po_number: String,
    pub party_name: String,
    pub qty_demand: f64,
    pub qty_supply: f64,
    pub item_code: String,
    pub site: String,
    pub remark: String,
}

impl UnifiedLedgerEntry {
    /// Supply minus demand carried by this entry.
    pub fn net_change(&self) -> f64 {
        self.qty_supply - self.qty_demand
    }
}

impl From<CanonicalOrderLine> for UnifiedLedgerEntry {
    fn from(line: CanonicalOrderLine) -> Self {
        Self {
            order_date: line.order_date,
            ship_date: line.ship_date,
            reference_number: line.reference_number,
            po_number: line.po_number,
            party_name: line.party_name,
            qty_demand: line.qty_demand,
            qty_supply: line.qty_supply,
            item_code: line.item_code,
            site: line.site,
            remark: line.remark,
        }
    }
}

// =============================================================================
// Projection output
// =============================================================================

/// Net change on one date and the running balance after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub net_change: f64,
    pub cumulative_available: f64,
}

/// Date-ordered net-change series for one item (and optionally one site).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub item_code: String,
    pub site: Option<String>,
    pub baseline_on_hand: f64,
    pub points: Vec<TimelinePoint>,
}

/// Answer to "when can `needed_qty` of this item be satisfied?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityProjection {
    pub item_code: String,
    pub site: Option<String>,
    pub needed_qty: f64,
    /// First date on which the running balance reaches `needed_qty`.
    pub earliest_date: Option<NaiveDate>,
    pub baseline_on_hand: f64,
    pub timeline: Timeline,
}

/// Everything the ledger knows about one reference number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSummary {
    pub reference_number: String,
    /// Item, site and ship date of the main line (earliest ship date).
    pub item_code: String,
    pub site: String,
    pub ship_date: Option<NaiveDate>,
    pub need_qty: f64,
    pub on_hand: f64,
    pub total_demand: f64,
    pub total_supply: f64,
    pub lines: Vec<UnifiedLedgerEntry>,
    /// Present when recorded stock does not cover the main line.
    pub shortfall: Option<AvailabilityProjection>,
}

/// Ledger lines of one item at one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSiteGroup {
    pub site: String,
    pub count: usize,
    pub rows: Vec<UnifiedLedgerEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolve_is_total() {
        let mut aliases = ItemAliasMap::new();
        aliases.insert("NAV-100", "QB-100");

        assert_eq!(aliases.resolve("NAV-100"), "QB-100");
        assert_eq!(aliases.resolve("UNMAPPED"), "UNMAPPED");
    }

    #[test]
    fn test_alias_last_insert_wins() {
        let aliases: ItemAliasMap = vec![
            ("A".to_string(), "first".to_string()),
            ("A".to_string(), "second".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases.resolve("A"), "second");
    }

    #[test]
    fn test_feed_serde_name_matches_display() {
        let json = serde_json::to_string(&Feed::ShippingSchedule).unwrap();
        assert_eq!(json, format!("\"{}\"", Feed::ShippingSchedule));
    }

    #[test]
    fn test_net_change() {
        let entry = UnifiedLedgerEntry {
            qty_supply: 10.0,
            qty_demand: 4.0,
            ..Default::default()
        };
        assert_eq!(entry.net_change(), 6.0);
    }
}
