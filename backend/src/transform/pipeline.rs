//! Ledger rebuild pipeline.
//!
//! Combines every stage into a single rebuild over one set of feed snapshots:
//! normalization, service-line filtering, kit decomposition, alias
//! reconciliation and source merging.
//!
//! # Example
//!
//! ```rust,ignore
//! use ltcheck::config::SourcePaths;
//! use ltcheck::transform::{rebuild_from_paths, ReconcileOptions};
//!
//! let output = rebuild_from_paths(&SourcePaths::from_env(), &ReconcileOptions::default())?;
//! println!("{} ledger entries", output.ledger.len());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::alias::{load_aliases, reconcile, AliasColumns};
use super::bundle::{decompose, is_kit};
use super::dsl::{execute, FeedMatrices, FeedMatrix, NormalizeResult};
use super::merger::{merge_sources, PurchaseOrderIndex};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::config::SourcePaths;
use crate::error::{LedgerError, LedgerResult, MatrixResult};
use crate::models::{Feed, OnHandLevel, UnifiedLedgerEntry};
use crate::parser::parse_csv_file_auto;

/// Options for the rebuild pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    /// Item codes starting with this prefix are kits
    pub kit_prefix: String,

    /// Schedule models that are charges, not goods
    pub excluded_models: Vec<String>,

    /// Column names of the alias table
    pub alias_columns: AliasColumns,

    /// Column mappings of each feed
    pub matrices: FeedMatrices,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            kit_prefix: "S".to_string(),
            excluded_models: vec![
                "Engineer Service- COS".to_string(),
                "CUSTOMER SERVICES".to_string(),
                "FORWARDING CHARGE, EXCLUDING IMPORT DUTY.".to_string(),
            ],
            alias_columns: AliasColumns::default(),
            matrices: FeedMatrices::default(),
        }
    }
}

impl ReconcileOptions {
    pub fn from_json(json: &str) -> MatrixResult<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.matrices.validate()?;
        Ok(options)
    }

    pub fn from_file(path: &Path) -> MatrixResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Parsed rows of every feed, as read at one point in time.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshots {
    pub sales_orders: Vec<Value>,
    pub purchase_orders: Vec<Value>,
    pub shipping_schedule: Vec<Value>,
    pub item_aliases: Vec<Value>,
    pub on_hand: Vec<Value>,
}

impl SourceSnapshots {
    /// Read every feed. Any unreadable feed aborts the load.
    pub fn load(paths: &SourcePaths) -> LedgerResult<Self> {
        log_info("📖 Reading feeds...");
        let on_hand = match &paths.on_hand {
            Some(path) => read_feed(Feed::OnHand, path)?,
            None => Vec::new(),
        };

        Ok(Self {
            sales_orders: read_feed(Feed::SalesOrders, &paths.sales_orders)?,
            purchase_orders: read_feed(Feed::PurchaseOrders, &paths.purchase_orders)?,
            shipping_schedule: read_feed(Feed::ShippingSchedule, &paths.shipping_schedule)?,
            item_aliases: read_feed(Feed::ItemAliases, &paths.item_aliases)?,
            on_hand,
        })
    }
}

fn read_feed(feed: Feed, path: &Path) -> LedgerResult<Vec<Value>> {
    let parsed = parse_csv_file_auto(path)
        .map_err(|e| LedgerError::unavailable(feed, format!("{}: {}", path.display(), e)))?;
    log_info_indent(
        format!(
            "{}: {} rows ({}, '{}')",
            feed,
            parsed.records.len(),
            parsed.encoding,
            parsed.delimiter.escape_default()
        ),
        1,
    );
    Ok(parsed.records)
}

/// Row counts of one normalized feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedStats {
    pub feed: Feed,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_skipped: usize,
}

/// What a rebuild did, stage by stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub feeds: Vec<FeedStats>,
    pub excluded_service_lines: usize,
    pub kit_lines: usize,
    pub lines_after_decomposition: usize,
    pub aliases_loaded: usize,
    pub schedule_lines_filtered: usize,
    pub orphaned_refs: Vec<String>,
    pub recovered_refs: Vec<String>,
    pub unresolved_refs: Vec<String>,
    pub dropped_without_item: usize,
    pub ledger_entries: usize,
}

/// Result of a rebuild
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutput {
    pub ledger: Vec<UnifiedLedgerEntry>,
    pub on_hand: Vec<OnHandLevel>,
    pub report: ReconcileReport,
}

/// Rebuild the ledger from feed files.
pub fn rebuild_from_paths(
    paths: &SourcePaths,
    options: &ReconcileOptions,
) -> LedgerResult<ReconcileOutput> {
    let sources = SourceSnapshots::load(paths)?;
    rebuild_ledger(&sources, options)
}

/// Rebuild the ledger from already-read feed snapshots.
///
/// Pure over its inputs: the same snapshots and options always give the same
/// ledger. Only a feed missing required columns fails the rebuild.
pub fn rebuild_ledger(
    sources: &SourceSnapshots,
    options: &ReconcileOptions,
) -> LedgerResult<ReconcileOutput> {
    let matrices = &options.matrices;
    matrices.validate()?;
    let mut report = ReconcileReport::default();

    // Step 1: Normalize
    log_info("🔄 Normalizing feeds...");
    let sales = normalize(&sources.sales_orders, &matrices.sales_orders, &mut report)?;
    let sales_orders = sales.into_order_lines();
    let purchases = normalize(&sources.purchase_orders, &matrices.purchase_orders, &mut report)?;
    let purchase_orders = purchases.into_order_lines();
    let schedule = normalize(&sources.shipping_schedule, &matrices.shipping_schedule, &mut report)?;
    let mut schedule_lines = schedule.into_schedule_lines();
    let on_hand = normalize(&sources.on_hand, &matrices.on_hand, &mut report)?.into_on_hand_levels();

    // Step 2: Drop service and freight charges
    let before = schedule_lines.len();
    schedule_lines.retain(|l| !options.excluded_models.contains(&l.line.item_code));
    report.excluded_service_lines = before - schedule_lines.len();
    if report.excluded_service_lines > 0 {
        log_info_indent(
            format!("{} service/charge lines removed", report.excluded_service_lines),
            1,
        );
    }

    // Step 3: Expand kits
    log_info("📦 Expanding kits...");
    report.kit_lines = schedule_lines
        .iter()
        .filter(|l| is_kit(&l.line.item_code, &options.kit_prefix))
        .count();
    let schedule_lines = decompose(schedule_lines, &options.kit_prefix);
    report.lines_after_decomposition = schedule_lines.len();
    log_success(format!(
        "{} kit lines expanded, {} schedule lines",
        report.kit_lines, report.lines_after_decomposition
    ));

    // Step 4: Reconcile item names
    log_info("🔗 Reconciling item names...");
    let aliases = load_aliases(&sources.item_aliases, &options.alias_columns)?;
    report.aliases_loaded = aliases.len();
    let index = PurchaseOrderIndex::build(&purchase_orders);
    let reconciled = reconcile(schedule_lines, &aliases, &index.known_items);
    report.schedule_lines_filtered = report.lines_after_decomposition - reconciled.len();
    log_success(format!(
        "{} aliases, {} lines kept, {} not tracked by purchase orders",
        report.aliases_loaded,
        reconciled.len(),
        report.schedule_lines_filtered
    ));

    // Step 5: Merge
    log_info("🧮 Merging sources...");
    let outcome = merge_sources(&sales_orders, &purchase_orders, &index, &reconciled);
    report.orphaned_refs = outcome.orphaned_refs;
    report.recovered_refs = outcome.recovered_refs;
    report.unresolved_refs = outcome.unresolved_refs;
    report.dropped_without_item = outcome.dropped_without_item;
    report.ledger_entries = outcome.ledger.len();

    if !report.orphaned_refs.is_empty() {
        log_info_indent(
            format!(
                "{} purchase orders recovered without schedule detail",
                report.recovered_refs.len()
            ),
            1,
        );
    }
    if !report.unresolved_refs.is_empty() {
        log_warning(format!(
            "Purchase orders absent from ledger: {}",
            report.unresolved_refs.join(", ")
        ));
    }
    if report.dropped_without_item > 0 {
        log_warning(format!("{} lines without item dropped", report.dropped_without_item));
    }
    log_success(format!("Ledger rebuilt: {} entries", report.ledger_entries));

    Ok(ReconcileOutput {
        ledger: outcome.ledger,
        on_hand,
        report,
    })
}

fn normalize(
    records: &[Value],
    matrix: &FeedMatrix,
    report: &mut ReconcileReport,
) -> LedgerResult<NormalizeResult> {
    check_columns(records, matrix)?;
    let result = execute(records, matrix);

    report.feeds.push(FeedStats {
        feed: matrix.feed,
        rows_read: records.len(),
        rows_kept: result.rows.len(),
        rows_skipped: result.skipped.len(),
    });
    if !records.is_empty() {
        log_info_indent(format!("{}: {}", matrix.feed, result.summary()), 1);
    }
    Ok(result)
}

/// A non-empty feed must carry every mapped column that has no default.
fn check_columns(records: &[Value], matrix: &FeedMatrix) -> LedgerResult<()> {
    let Some(first) = records.first().and_then(Value::as_object) else {
        return Ok(());
    };

    let missing: Vec<&str> = matrix
        .fields
        .values()
        .filter(|t| t.default.is_none())
        .filter_map(|t| t.source.as_deref())
        .filter(|c| !first.contains_key(*c))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::unavailable(
            matrix.feed,
            format!("missing columns: {}", missing.join(", ")),
        ))
    }
}
