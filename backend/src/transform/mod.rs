//! Ledger construction.
//!
//! - `dsl`: Feed matrices that normalize raw exports into canonical lines
//! - `bundle`: Kit decomposition of shipping-schedule lines
//! - `alias`: Item name reconciliation
//! - `merger`: Sales, purchase and schedule lines into one ledger
//! - `pipeline`: The rebuild entry point chaining all of the above

pub mod alias;
pub mod bundle;
pub mod dsl;
pub mod merger;
pub mod pipeline;

pub use alias::{load_aliases, reconcile, AliasColumns};
pub use bundle::{decompose, is_kit, parse_description, BundleDescriptor, ComponentToken};
pub use dsl::*;
pub use merger::{merge_sources, MergeOutcome, PurchaseOrderHeader, PurchaseOrderIndex};
pub use pipeline::*;
