//! Feed Matrix definition
//!
//! A matrix describes how one feed's columns map onto the canonical line
//! schema, how each value is cleaned, and how sparse a row may be before it
//! is treated as a corrupted export row.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::operations::Operation;
use crate::error::{MatrixError, MatrixResult};
use crate::models::{CanonicalField, Feed};

/// A complete feed matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMatrix {
    /// Version of the matrix format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Feed this matrix reads
    pub feed: Feed,

    /// Minimum number of non-empty mapped columns for a row to be kept
    #[serde(default)]
    pub min_filled: usize,

    /// Field transformations: key = canonical field, value = transformation rule
    pub fields: BTreeMap<CanonicalField, FieldTransform>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Transformation rule for a single canonical field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTransform {
    /// Source column name (mutually exclusive with constant)
    #[serde(default)]
    pub source: Option<String>,

    /// Constant value
    #[serde(default)]
    pub constant: Option<String>,

    /// Ordered list of operations to apply
    #[serde(default)]
    pub operations: Vec<Operation>,

    /// Value used when the source is missing or cleans to nothing
    #[serde(default)]
    pub default: Option<String>,
}

impl FeedMatrix {
    /// Create an empty matrix for a feed
    pub fn new(feed: Feed) -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            feed,
            min_filled: 0,
            fields: BTreeMap::new(),
        }
    }

    /// Parse a matrix from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Builder: set description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Builder: set the sparse-row threshold
    pub fn with_min_filled(mut self, min_filled: usize) -> Self {
        self.min_filled = min_filled;
        self
    }

    /// Builder: add a field transform
    pub fn with_field(mut self, field: CanonicalField, transform: FieldTransform) -> Self {
        self.fields.insert(field, transform);
        self
    }

    /// Distinct source columns read by this matrix, in field order
    pub fn source_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for transform in self.fields.values() {
            if let Some(source) = transform.source.as_deref() {
                if !columns.contains(&source) {
                    columns.push(source);
                }
            }
        }
        columns
    }

    /// Fail when this matrix was written for another feed
    pub fn expect_feed(&self, expected: Feed) -> MatrixResult<()> {
        if self.feed == expected {
            Ok(())
        } else {
            Err(MatrixError::FeedMismatch {
                expected,
                found: self.feed,
            })
        }
    }
}

impl FieldTransform {
    /// Create a transform from a source column
    pub fn from_source(column: &str) -> Self {
        Self {
            source: Some(column.to_string()),
            constant: None,
            operations: Vec::new(),
            default: None,
        }
    }

    /// Create a constant transform
    pub fn from_constant(value: &str) -> Self {
        Self {
            source: None,
            constant: Some(value.to_string()),
            operations: Vec::new(),
            default: None,
        }
    }

    /// Add an operation
    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Set default value
    pub fn with_default(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }
}

// =============================================================================
// Built-in matrices
// =============================================================================

/// Item cleaning shared by every order feed: inventory path, asterisk markers.
fn item_column(column: &str) -> FieldTransform {
    FieldTransform::from_source(column)
        .with_operation(Operation::PathSegment { separator: ":".into() })
        .with_operation(Operation::RemoveChars { chars: "*".into() })
        .with_operation(Operation::Trim)
}

/// Reference cleaning shared by every order feed: drop "(...)" suffixes.
fn reference_column(column: &str) -> FieldTransform {
    FieldTransform::from_source(column)
        .with_operation(Operation::BeforeFirst { separator: "(".into() })
        .with_operation(Operation::Trim)
}

fn text_column(column: &str) -> FieldTransform {
    FieldTransform::from_source(column).with_operation(Operation::Trim)
}

/// Quantity columns may be absent from an export; they then read as 0.
fn quantity_column(column: &str) -> FieldTransform {
    FieldTransform::from_source(column).with_default("0")
}

/// QuickBooks "open sales orders" export.
pub fn sales_order_matrix() -> FeedMatrix {
    FeedMatrix::new(Feed::SalesOrders)
        .with_description("QuickBooks open sales orders")
        .with_min_filled(6)
        .with_field(CanonicalField::OrderDate, FieldTransform::from_source("Date"))
        .with_field(CanonicalField::ShipDate, FieldTransform::from_source("Ship Date"))
        .with_field(CanonicalField::ReferenceNumber, reference_column("Num"))
        .with_field(CanonicalField::PoNumber, text_column("P. O. #"))
        .with_field(CanonicalField::PartyName, text_column("Name"))
        .with_field(CanonicalField::ItemCode, item_column("Item"))
        .with_field(CanonicalField::QtyDemand, quantity_column("Backordered"))
        .with_field(CanonicalField::Site, text_column("Inventory Site"))
}

/// QuickBooks "open purchase orders" export.
pub fn purchase_order_matrix() -> FeedMatrix {
    FeedMatrix::new(Feed::PurchaseOrders)
        .with_description("QuickBooks open purchase orders")
        .with_min_filled(5)
        .with_field(CanonicalField::OrderDate, FieldTransform::from_source("Date"))
        .with_field(CanonicalField::ShipDate, FieldTransform::from_source("Deliv Date"))
        .with_field(CanonicalField::ReferenceNumber, reference_column("Num"))
        .with_field(CanonicalField::PoNumber, text_column("P. O. #"))
        .with_field(CanonicalField::PartyName, text_column("Source Name"))
        .with_field(CanonicalField::ItemCode, item_column("Item"))
        .with_field(CanonicalField::QtySupply, quantity_column("Backordered"))
        .with_field(CanonicalField::Site, text_column("Inventory Site"))
}

/// Vendor shipping schedule ("Sales Date return platform") export.
pub fn shipping_schedule_matrix() -> FeedMatrix {
    FeedMatrix::new(Feed::ShippingSchedule)
        .with_description("Vendor shipping schedule")
        .with_field(CanonicalField::Remark, text_column("Document No.").with_default(""))
        .with_field(CanonicalField::ReferenceNumber, reference_column("Customer PO No."))
        .with_field(CanonicalField::ItemCode, item_column("Customer Ordering Model"))
        .with_field(
            CanonicalField::ShipDate,
            FieldTransform::from_source("OP Estimated Shipping Date"),
        )
        .with_field(CanonicalField::QtySupply, quantity_column("Quantity"))
        .with_field(CanonicalField::VendorItemNo, text_column("No."))
        .with_field(
            CanonicalField::Description,
            FieldTransform::from_source("Customer Ordering Desc.")
                .with_operation(Operation::NormalizeSpaces),
        )
}

/// On-hand inventory report.
pub fn on_hand_matrix() -> FeedMatrix {
    FeedMatrix::new(Feed::OnHand)
        .with_description("On-hand inventory report")
        .with_field(CanonicalField::ItemCode, item_column("Item"))
        .with_field(CanonicalField::Site, text_column("Inventory Site"))
        .with_field(CanonicalField::OnHand, FieldTransform::from_source("On Hand"))
        .with_field(
            CanonicalField::SnapshotDate,
            // optional column
            FieldTransform::from_source("As Of").with_default(""),
        )
}

/// The matrix set used by one rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMatrices {
    #[serde(default = "sales_order_matrix")]
    pub sales_orders: FeedMatrix,
    #[serde(default = "purchase_order_matrix")]
    pub purchase_orders: FeedMatrix,
    #[serde(default = "shipping_schedule_matrix")]
    pub shipping_schedule: FeedMatrix,
    #[serde(default = "on_hand_matrix")]
    pub on_hand: FeedMatrix,
}

impl FeedMatrices {
    /// Check every slot holds a matrix for the right feed
    pub fn validate(&self) -> MatrixResult<()> {
        self.sales_orders.expect_feed(Feed::SalesOrders)?;
        self.purchase_orders.expect_feed(Feed::PurchaseOrders)?;
        self.shipping_schedule.expect_feed(Feed::ShippingSchedule)?;
        self.on_hand.expect_feed(Feed::OnHand)
    }
}

impl Default for FeedMatrices {
    fn default() -> Self {
        Self {
            sales_orders: sales_order_matrix(),
            purchase_orders: purchase_order_matrix(),
            shipping_schedule: shipping_schedule_matrix(),
            on_hand: on_hand_matrix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_json_round_trip() {
        let matrix = purchase_order_matrix();
        let json = matrix.to_json().unwrap();
        let parsed = FeedMatrix::from_json(&json).unwrap();

        assert_eq!(parsed, matrix);
        assert!(json.contains("\"reference_number\""));
    }

    #[test]
    fn test_source_columns_are_distinct() {
        let matrix = sales_order_matrix();
        let columns = matrix.source_columns();

        assert_eq!(columns.len(), 8);
        assert!(columns.contains(&"Backordered"));
    }

    #[test]
    fn test_feed_mismatch_detected() {
        let mut matrices = FeedMatrices::default();
        assert!(matrices.validate().is_ok());

        matrices.purchase_orders = sales_order_matrix();
        let err = matrices.validate().unwrap_err();
        assert!(err.to_string().contains("purchase_orders"));
    }

    #[test]
    fn test_quantity_and_remark_columns_optional() {
        let matrices = FeedMatrices::default();
        let qty = |m: &FeedMatrix, f: CanonicalField| m.fields[&f].default.clone();

        assert_eq!(qty(&matrices.sales_orders, CanonicalField::QtyDemand), Some("0".into()));
        assert_eq!(qty(&matrices.purchase_orders, CanonicalField::QtySupply), Some("0".into()));
        assert_eq!(qty(&matrices.shipping_schedule, CanonicalField::QtySupply), Some("0".into()));
        assert_eq!(qty(&matrices.shipping_schedule, CanonicalField::Remark), Some(String::new()));
    }

    #[test]
    fn test_partial_matrices_fill_defaults() {
        let matrices: FeedMatrices = serde_json::from_str("{}").unwrap();
        assert_eq!(matrices, FeedMatrices::default());
    }
}
