//! DSL for mapping feed exports onto the canonical line schema
//!
//! This module provides:
//! - `matrix`: Feed matrix definition and the built-in matrices
//! - `operations`: Available cleaning operations
//! - `executor`: Execute matrices on CSV data
//!
//! ## Usage Flow
//!
//! ```text
//! CSV → parser::parse_csv_file_auto → executor::execute(matrix) → CanonicalOrderLine
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ltcheck::parser::csv_to_json;
//! use ltcheck::transform::dsl::{execute, purchase_order_matrix};
//!
//! let rows = csv_to_json(csv_content, ',').unwrap();
//! let result = execute(&rows, &purchase_order_matrix());
//! println!("{}", result.summary());
//! let lines = result.into_order_lines();
//! ```

pub mod executor;
pub mod matrix;
pub mod operations;

// Re-exports for convenience
pub use executor::{
    execute, parse_date, parse_quantity, NormalizeResult, NormalizedRow, SkippedRow,
};
pub use matrix::{
    on_hand_matrix, purchase_order_matrix, sales_order_matrix, shipping_schedule_matrix,
    FeedMatrices, FeedMatrix, FieldTransform,
};
pub use operations::{normalize_spaces, operations_description, Operation};
