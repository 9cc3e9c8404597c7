//! REST API request and response types.
//!
//! Query strings are taken as raw strings and validated by the handlers so a
//! malformed value yields a JSON error rather than an extractor rejection.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::LedgerSnapshot;
use crate::error::{ServerError, ServerResult};
use crate::models::{
    AvailabilityProjection, ItemSiteGroup, ReferenceSummary, TimelinePoint, UnifiedLedgerEntry,
};
use crate::transform::pipeline::ReconcileReport;

/// Timeline points returned by the projection endpoints
pub const TIMELINE_LIMIT: usize = 50;

/// `?site=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteQuery {
    pub site: Option<String>,
}

/// `?item=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemQuery {
    pub item: Option<String>,
}

/// `?item=&need_qty=&site=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignQuery {
    pub item: Option<String>,
    pub need_qty: Option<String>,
    pub site: Option<String>,
}

/// Blank or whitespace-only query values count as absent
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A checked `/api/assign` query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignRequest<'q> {
    pub item: &'q str,
    pub need_qty: f64,
    pub site: Option<&'q str>,
}

/// Item is required and `need_qty` must be a finite number above 0.
pub fn parse_assign_query(query: &AssignQuery) -> ServerResult<AssignRequest<'_>> {
    let item = non_blank(query.item.as_deref())
        .ok_or_else(|| ServerError::BadRequest("Missing item".into()))?;
    let need_qty = non_blank(query.need_qty.as_deref())
        .and_then(|q| q.parse::<f64>().ok())
        .filter(|q| q.is_finite() && *q > 0.0)
        .ok_or_else(|| ServerError::BadRequest("Need qty must be > 0".into()))?;

    Ok(AssignRequest {
        item,
        need_qty,
        site: non_blank(query.site.as_deref()),
    })
}

/// Earliest availability of an item
#[derive(Debug, Clone, Serialize)]
pub struct AssignResponse {
    pub item: String,
    pub site: Option<String>,
    pub need_qty: f64,
    pub earliest_date: Option<NaiveDate>,
    pub start_on_hand: f64,
    pub timeline: Vec<TimelinePoint>,
}

impl From<AvailabilityProjection> for AssignResponse {
    fn from(projection: AvailabilityProjection) -> Self {
        let mut timeline = projection.timeline.points;
        timeline.truncate(TIMELINE_LIMIT);
        Self {
            item: projection.item_code,
            site: projection.site,
            need_qty: projection.needed_qty,
            earliest_date: projection.earliest_date,
            start_on_hand: projection.baseline_on_hand,
            timeline,
        }
    }
}

/// One reference number with its shortfall projection, if any
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceResponse {
    pub summary: ReferenceSummary,
    pub assign: Option<AssignResponse>,
}

impl From<ReferenceSummary> for ReferenceResponse {
    fn from(mut summary: ReferenceSummary) -> Self {
        let assign = summary.shortfall.take().map(AssignResponse::from);
        Self { summary, assign }
    }
}

/// Ledger lines of one item
#[derive(Debug, Clone, Serialize)]
pub struct ItemResponse {
    pub item: String,
    pub site: Option<String>,
    pub count: usize,
    pub rows: Vec<UnifiedLedgerEntry>,
}

/// Ledger lines of one item grouped by site
#[derive(Debug, Clone, Serialize)]
pub struct ItemRowsResponse {
    pub item: String,
    pub count: usize,
    pub groups: Vec<ItemSiteGroup>,
}

impl ItemRowsResponse {
    pub fn new(item: String, groups: Vec<ItemSiteGroup>) -> Self {
        Self {
            item,
            count: groups.iter().map(|g| g.count).sum(),
            groups,
        }
    }
}

/// Result of `POST /api/reload`
#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub snapshot_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub entries: usize,
    pub report: ReconcileReport,
}

impl From<&LedgerSnapshot> for ReloadResponse {
    fn from(snapshot: &LedgerSnapshot) -> Self {
        Self {
            snapshot_id: snapshot.id,
            built_at: snapshot.built_at,
            entries: snapshot.ledger.len(),
            report: snapshot.report.clone(),
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}
