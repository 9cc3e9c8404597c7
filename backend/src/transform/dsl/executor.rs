//! DSL Executor
//!
//! Executes feed matrices on parsed CSV rows to produce typed canonical lines.
//! Nothing in here fails: unreadable dates become `None`, unreadable
//! quantities become `0.0`, and sparse rows are reported as skipped.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::matrix::{FeedMatrix, FieldTransform};
use crate::models::{CanonicalField, CanonicalOrderLine, OnHandLevel, ScheduleLine};

/// Result of executing a matrix
#[derive(Debug, Default)]
pub struct NormalizeResult {
    /// Rows that passed the sparse-row filter
    pub rows: Vec<NormalizedRow>,
    /// Rows dropped as empty or too sparse
    pub skipped: Vec<SkippedRow>,
}

/// A row that was dropped
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
    /// Number of non-empty mapped columns
    pub filled: usize,
}

/// Cleaned string values of one row, keyed by canonical field
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub row: usize,
    pub values: BTreeMap<CanonicalField, String>,
}

impl NormalizeResult {
    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Normalized: {} rows, {} skipped",
            self.rows.len(),
            self.skipped.len()
        )
    }

    pub fn into_order_lines(self) -> Vec<CanonicalOrderLine> {
        self.rows.iter().map(NormalizedRow::to_order_line).collect()
    }

    pub fn into_schedule_lines(self) -> Vec<ScheduleLine> {
        self.rows.iter().map(NormalizedRow::to_schedule_line).collect()
    }

    pub fn into_on_hand_levels(self) -> Vec<OnHandLevel> {
        self.rows.iter().map(NormalizedRow::to_on_hand_level).collect()
    }
}

impl NormalizedRow {
    /// Cleaned text of a field, empty when absent
    pub fn text(&self, field: CanonicalField) -> String {
        self.values.get(&field).cloned().unwrap_or_default()
    }

    pub fn date(&self, field: CanonicalField) -> Option<NaiveDate> {
        self.values.get(&field).and_then(|v| parse_date(v))
    }

    pub fn quantity(&self, field: CanonicalField) -> f64 {
        self.values
            .get(&field)
            .map(|v| parse_quantity(v))
            .unwrap_or(0.0)
    }

    pub fn to_order_line(&self) -> CanonicalOrderLine {
        CanonicalOrderLine {
            order_date: self.date(CanonicalField::OrderDate),
            ship_date: self.date(CanonicalField::ShipDate),
            reference_number: self.text(CanonicalField::ReferenceNumber),
            po_number: self.text(CanonicalField::PoNumber),
            party_name: self.text(CanonicalField::PartyName),
            item_code: self.text(CanonicalField::ItemCode),
            qty_demand: self.quantity(CanonicalField::QtyDemand),
            qty_supply: self.quantity(CanonicalField::QtySupply),
            site: self.text(CanonicalField::Site),
            remark: self.text(CanonicalField::Remark),
        }
    }

    pub fn to_schedule_line(&self) -> ScheduleLine {
        ScheduleLine {
            line: self.to_order_line(),
            vendor_item_no: self.text(CanonicalField::VendorItemNo),
            description: self.text(CanonicalField::Description),
        }
    }

    pub fn to_on_hand_level(&self) -> OnHandLevel {
        OnHandLevel {
            item_code: self.text(CanonicalField::ItemCode),
            site: self.text(CanonicalField::Site),
            on_hand: self.quantity(CanonicalField::OnHand),
            as_of: self.date(CanonicalField::SnapshotDate),
        }
    }
}

/// Execute a feed matrix on CSV data
///
/// # Arguments
/// * `csv_data` - Vector of JSON objects from CSV parsing (each object is a row)
/// * `matrix` - The feed matrix to apply
pub fn execute(csv_data: &[Value], matrix: &FeedMatrix) -> NormalizeResult {
    let mut result = NormalizeResult::default();
    let columns = matrix.source_columns();

    for (row_idx, row) in csv_data.iter().enumerate() {
        let row_obj = match row.as_object() {
            Some(obj) => obj,
            None => {
                result.skipped.push(SkippedRow {
                    row: row_idx,
                    reason: "Row is not a JSON object".to_string(),
                    filled: 0,
                });
                continue;
            }
        };

        let filled = columns
            .iter()
            .filter(|c| row_obj.get(**c).map(|v| !as_string(v).trim().is_empty()).unwrap_or(false))
            .count();

        if filled == 0 {
            result.skipped.push(SkippedRow {
                row: row_idx,
                reason: "Empty row".to_string(),
                filled,
            });
            continue;
        }

        if filled < matrix.min_filled {
            result.skipped.push(SkippedRow {
                row: row_idx,
                reason: format!("Only {} of {} required columns filled", filled, matrix.min_filled),
                filled,
            });
            continue;
        }

        let values = matrix
            .fields
            .iter()
            .filter_map(|(field, transform)| {
                apply_transform(row_obj, transform).map(|v| (*field, v))
            })
            .collect();

        result.rows.push(NormalizedRow { row: row_idx, values });
    }

    result
}

/// Apply a field transformation
fn apply_transform(row: &Map<String, Value>, transform: &FieldTransform) -> Option<String> {
    let raw = match (&transform.source, &transform.constant) {
        (Some(source), _) => row.get(source).map(as_string),
        (None, Some(constant)) => Some(constant.clone()),
        (None, None) => None,
    };

    let cleaned = raw.map(|mut v| {
        for op in &transform.operations {
            v = op.apply(&v);
        }
        v
    });

    match cleaned {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => transform.default.clone(),
    }
}

fn as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// =============================================================================
// Value typing
// =============================================================================

const DATE_FORMATS: [&str; 9] = [
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%y", "%m/%d/%Y", "%m-%d-%Y", "%Y%m%d", "%d-%b-%y", "%d-%b-%Y",
    "%Y.%m.%d",
];

/// Parse a date leniently. Time parts are ignored; anything unreadable is `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let mut date_part = raw.split_whitespace().next().unwrap_or("");
    // ISO datetime: 2025-03-01T08:30:00
    if date_part.len() > 10 && date_part.as_bytes()[10] == b'T' {
        date_part = &date_part[..10];
    }
    if date_part.is_empty() {
        return None;
    }

    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(date_part, fmt)
            .ok()
            // %Y happily reads "25" as year 25
            .filter(|d| d.year() >= 1000)
    })
}

/// Parse a quantity. Thousands separators are accepted; anything else unreadable is `0.0`.
pub fn parse_quantity(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::dsl::matrix::{
        purchase_order_matrix, sales_order_matrix, shipping_schedule_matrix,
    };
    use serde_json::json;

    fn po_row(filled: usize) -> Value {
        let full = [
            ("Date", "01/15/2025"),
            ("Deliv Date", "03/01/2025"),
            ("Num", "PO-1001 (Main)"),
            ("P. O. #", "C-77"),
            ("Source Name", "Acme"),
            ("Item", "Inventory:A100"),
            ("Backordered", "12"),
            ("Inventory Site", "Main"),
        ];
        let mut obj = Map::new();
        for (i, (k, v)) in full.iter().enumerate() {
            let value = if i < filled { *v } else { "" };
            obj.insert(k.to_string(), Value::String(value.to_string()));
        }
        Value::Object(obj)
    }

    #[test]
    fn test_purchase_order_threshold() {
        let matrix = purchase_order_matrix();

        let result = execute(&[po_row(4)], &matrix);
        assert!(result.rows.is_empty());
        assert_eq!(result.skipped[0].filled, 4);

        let result = execute(&[po_row(5)], &matrix);
        assert_eq!(result.rows.len(), 1);
    }

    fn so_row(filled: usize) -> Value {
        let full = [
            ("Date", "02/01/2025"),
            ("Ship Date", "03/15/2025"),
            ("Num", "SO-1"),
            ("P. O. #", "C-9"),
            ("Name", "Beta Corp"),
            ("Item", "Inventory:A100"),
            ("Backordered", "4"),
            ("Inventory Site", "Main"),
        ];
        let mut obj = Map::new();
        for (i, (k, v)) in full.iter().enumerate() {
            let value = if i < filled { *v } else { "" };
            obj.insert(k.to_string(), Value::String(value.to_string()));
        }
        Value::Object(obj)
    }

    #[test]
    fn test_sales_order_threshold() {
        let matrix = sales_order_matrix();

        let result = execute(&[so_row(5)], &matrix);
        assert!(result.rows.is_empty());
        assert_eq!(result.skipped[0].filled, 5);
        assert_eq!(result.skipped[0].reason, "Only 5 of 6 required columns filled");

        let result = execute(&[so_row(6)], &matrix);
        assert_eq!(result.rows.len(), 1);
        assert!(result.skipped.is_empty());
        // Backordered was left blank
        assert_eq!(result.into_order_lines()[0].qty_demand, 0.0);
    }

    #[test]
    fn test_empty_row_dropped() {
        let matrix = shipping_schedule_matrix();
        let result = execute(&[json!({"Quantity": "  ", "Other": "x"})], &matrix);

        assert!(result.rows.is_empty());
        assert_eq!(result.skipped[0].reason, "Empty row");
    }

    #[test]
    fn test_order_line_cleaning() {
        let matrix = purchase_order_matrix();
        let lines = execute(&[po_row(8)], &matrix).into_order_lines();
        let line = &lines[0];

        assert_eq!(line.item_code, "A100");
        assert_eq!(line.reference_number, "PO-1001");
        assert_eq!(line.party_name, "Acme");
        assert_eq!(line.qty_supply, 12.0);
        assert_eq!(line.qty_demand, 0.0);
        assert_eq!(line.order_date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(line.ship_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(line.remark, "");
    }

    #[test]
    fn test_constant_and_default() {
        let matrix = FeedMatrix::new(crate::models::Feed::OnHand)
            .with_field(CanonicalField::ItemCode, FieldTransform::from_source("Item"))
            .with_field(CanonicalField::Site, FieldTransform::from_constant("Main"))
            .with_field(
                CanonicalField::OnHand,
                FieldTransform::from_source("Missing").with_default("7"),
            );

        let levels = execute(&[json!({"Item": "A100"})], &matrix).into_on_hand_levels();
        assert_eq!(levels[0].site, "Main");
        assert_eq!(levels[0].on_hand, 7.0);
        assert_eq!(levels[0].as_of, None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert_eq!(parse_date("2025-03-01"), expected);
        assert_eq!(parse_date("2025/03/01"), expected);
        assert_eq!(parse_date("03/01/2025"), expected);
        assert_eq!(parse_date("03/01/25"), expected);
        assert_eq!(parse_date("2025-03-01 00:00:00"), expected);
        assert_eq!(parse_date("2025-03-01T08:30:00"), expected);
        assert_eq!(parse_date("01-Mar-25"), expected);
    }

    #[test]
    fn test_parse_date_garbage_is_none() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("TBD"), None);
        assert_eq!(parse_date("13/45/2025"), None);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("1,200"), 1200.0);
        assert_eq!(parse_quantity(" 3.5 "), 3.5);
        assert_eq!(parse_quantity(""), 0.0);
        assert_eq!(parse_quantity("n/a"), 0.0);
        assert_eq!(parse_quantity("NaN"), 0.0);
    }
}
