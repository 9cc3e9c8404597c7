//! # LT Check - demand/supply reconciliation and availability projection
//!
//! LT Check reads the open sales orders, open purchase orders and vendor
//! shipping schedule exported by two ERP systems, reconciles item names and
//! kit bundles between them, and merges everything into one item/site ledger.
//! The ledger answers "when can I ship N of this item?" queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV feeds  │────▶│   Parser    │────▶│  Transform  │────▶│   Ledger    │
//! │ SO/PO/sched │     │  (auto-enc) │     │ (DSL, kits, │     │  snapshot   │
//! │  aliases    │     │             │     │ alias,merge)│     │ (projector) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ltcheck::{rebuild_from_paths, LedgerSnapshot, ReconcileOptions, SourcePaths};
//!
//! let output = rebuild_from_paths(&SourcePaths::in_dir("data"), &ReconcileOptions::default())?;
//! let snapshot = LedgerSnapshot::new(output);
//! let projection = snapshot.projector().project_availability("A100", 25.0, Some("Main"));
//! println!("earliest: {:?}", projection.earliest_date);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Feed locations and server settings
//! - [`models`] - Canonical lines, ledger entries, projections
//! - [`parser`] - CSV parsing with auto-detection, ledger export
//! - [`transform`] - Feed matrices, kit decomposition, aliases, merge
//! - [`projection`] - Availability timeline and lookups
//! - [`cache`] - Published ledger snapshot
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Reconciliation
pub mod transform;

// Queries
pub mod projection;

// Snapshot store
pub mod cache;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError, CsvResult, LedgerError, LedgerResult, MatrixError, MatrixResult, ServerError,
    ServerResult, SnapshotError, SnapshotResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AvailabilityProjection, CanonicalField, CanonicalOrderLine, Feed, ItemAliasMap,
    ItemSiteGroup, OnHandLevel, ReferenceSummary, ScheduleLine, Timeline, TimelinePoint,
    UnifiedLedgerEntry,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    csv_to_json, parse_bytes_auto, parse_csv_file_auto, write_ledger_csv,
    write_ledger_csv_file, ParseResult,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    decompose, load_aliases, merge_sources, parse_description, reconcile, rebuild_from_paths,
    rebuild_ledger, FeedMatrices, FeedMatrix, ReconcileOptions, ReconcileOutput,
    ReconcileReport, SourceSnapshots,
};

// =============================================================================
// Re-exports - Projection, store, config
// =============================================================================

pub use cache::{LedgerSnapshot, LedgerStore};
pub use config::{ServerConfig, SourcePaths};
pub use projection::AvailabilityProjector;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
