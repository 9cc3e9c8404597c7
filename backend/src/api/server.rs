//! HTTP server for LT Check.
//!
//! Read endpoints answer from the published ledger snapshot; `POST
//! /api/reload` rebuilds it from the feed files.
//!
//! # API Endpoints
//!
//! | Method | Path                        | Description                          |
//! |--------|-----------------------------|--------------------------------------|
//! | GET    | `/health`                   | Health check and store status        |
//! | POST   | `/api/reload`               | Rebuild the ledger                   |
//! | GET    | `/api/reference/{reference}`| Lines and shortfall of one reference |
//! | GET    | `/api/items/{item}`         | Ledger lines of one item (`?site=`)  |
//! | GET    | `/api/item_rows`            | Lines of `?item=` grouped by site    |
//! | GET    | `/api/assign`               | Earliest availability                |
//! | GET    | `/api/logs`                 | SSE stream of rebuild logs           |

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{
    error_response, non_blank, parse_assign_query, AssignQuery, AssignResponse, ItemQuery,
    ItemResponse, ItemRowsResponse, ReferenceResponse, ReloadResponse, SiteQuery,
};
use crate::cache::{LedgerSnapshot, LedgerStore};
use crate::config::{ServerConfig, SourcePaths};
use crate::error::{ServerError, ServerResult};
use crate::transform::pipeline::ReconcileOptions;

/// Shared handler state
pub struct AppState {
    pub store: LedgerStore,
    pub sources: SourcePaths,
    pub options: ReconcileOptions,
}

type SharedState = Arc<AppState>;
type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

/// Build the router
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/reload", post(reload))
        .route("/api/reference/{reference}", get(reference))
        .route("/api/items/{item}", get(item_lines))
        .route("/api/item_rows", get(item_rows))
        .route("/api/assign", get(assign))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(
    config: ServerConfig,
    state: SharedState,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 LT Check server running on http://localhost:{}", config.port);
    println!("   POST /api/reload              - Rebuild ledger");
    println!("   GET  /api/reference/{{ref}}     - Reference summary");
    println!("   GET  /api/assign?item=&need_qty=");
    println!("   GET  /api/logs                - SSE log stream");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn reject(err: ServerError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        ServerError::Snapshot(_) | ServerError::Ledger(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(error_response(&err.to_string())))
}

fn current(state: &AppState) -> ServerResult<Arc<LedgerSnapshot>> {
    Ok(state.store.snapshot()?)
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ltcheck",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store.status(),
    }))
}

async fn reload(State(state): State<SharedState>) -> ApiResult<ReloadResponse> {
    log_info("♻️  Reload requested");
    let worker = state.clone();
    let snapshot = tokio::task::spawn_blocking(move || {
        worker.store.reload(&worker.sources, &worker.options)
    })
    .await
    .map_err(|e| reject(ServerError::Internal(e.to_string())))?
    .map_err(|e| reject(e.into()))?;

    Ok(Json(ReloadResponse::from(snapshot.as_ref())))
}

async fn reference(
    State(state): State<SharedState>,
    Path(reference): Path<String>,
) -> ApiResult<ReferenceResponse> {
    let snapshot = current(&state).map_err(reject)?;
    let reference = reference.trim();
    let summary = snapshot
        .projector()
        .reference_summary(reference)
        .ok_or_else(|| reject(ServerError::NotFound(format!("reference {}", reference))))?;

    Ok(Json(ReferenceResponse::from(summary)))
}

async fn item_lines(
    State(state): State<SharedState>,
    Path(item): Path<String>,
    Query(query): Query<SiteQuery>,
) -> ApiResult<ItemResponse> {
    let snapshot = current(&state).map_err(reject)?;
    let site = non_blank(query.site.as_deref());
    let rows = snapshot.projector().lookup_by_item(item.trim(), site);

    Ok(Json(ItemResponse {
        item: item.trim().to_string(),
        site: site.map(str::to_string),
        count: rows.len(),
        rows,
    }))
}

async fn item_rows(
    State(state): State<SharedState>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<ItemRowsResponse> {
    let item = non_blank(query.item.as_deref())
        .ok_or_else(|| reject(ServerError::BadRequest("Missing item".into())))?;
    let snapshot = current(&state).map_err(reject)?;
    let groups = snapshot.projector().item_rows_by_site(item);

    Ok(Json(ItemRowsResponse::new(item.to_string(), groups)))
}

async fn assign(
    State(state): State<SharedState>,
    Query(query): Query<AssignQuery>,
) -> ApiResult<AssignResponse> {
    let request = parse_assign_query(&query).map_err(reject)?;

    let snapshot = current(&state).map_err(reject)?;
    let projection = snapshot
        .projector()
        .project_availability(request.item, request.need_qty, request.site);

    Ok(Json(AssignResponse::from(projection)))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // lagged receivers skip what they missed
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LedgerError, SnapshotError};
    use crate::models::{Feed, UnifiedLedgerEntry};
    use crate::transform::pipeline::{ReconcileOutput, ReconcileReport};

    fn state() -> SharedState {
        Arc::new(AppState {
            store: LedgerStore::new(),
            sources: SourcePaths::default(),
            options: ReconcileOptions::default(),
        })
    }

    fn loaded_state() -> SharedState {
        let state = state();
        state
            .store
            .reload_with(|| {
                Ok(ReconcileOutput {
                    ledger: vec![UnifiedLedgerEntry {
                        reference_number: "SO-1".into(),
                        item_code: "A100".into(),
                        qty_demand: 2.0,
                        ..Default::default()
                    }],
                    on_hand: Vec::new(),
                    report: ReconcileReport::default(),
                })
            })
            .unwrap();
        state
    }

    #[test]
    fn test_reject_status_codes() {
        let status = |err: ServerError| reject(err).0;

        assert_eq!(
            status(ServerError::Snapshot(SnapshotError::NotLoaded)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(LedgerError::unavailable(Feed::SalesOrders, "locked").into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status(ServerError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(ServerError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(ServerError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_reject_body() {
        let (_, Json(body)) = reject(ServerError::NotFound("reference SO-9".into()));
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Not found: reference SO-9");
    }

    #[tokio::test]
    async fn test_data_endpoints_unavailable_before_load() {
        let err = reference(State(state()), Path("SO-1".into())).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);

        let query = AssignQuery {
            item: Some("A100".into()),
            need_qty: Some("1".into()),
            site: None,
        };
        let err = assign(State(state()), Query(query)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_data_endpoints_unavailable_after_failed_reload() {
        let state = loaded_state();
        let _ = state
            .store
            .reload_with(|| Err(LedgerError::unavailable(Feed::ShippingSchedule, "locked")));

        let err = reference(State(state), Path("SO-1".into())).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
        assert!((err.1).0["error"].as_str().unwrap().contains("locked"));
    }

    #[tokio::test]
    async fn test_unknown_reference_not_found() {
        let err = reference(State(loaded_state()), Path("SO-404".into()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let Json(found) = reference(State(loaded_state()), Path(" SO-1 ".into()))
            .await
            .unwrap();
        assert_eq!(found.summary.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_assign_rejects_bad_query_first() {
        let query = AssignQuery {
            item: Some("A100".into()),
            need_qty: Some("0".into()),
            site: None,
        };
        // validation runs before the store is consulted
        let err = assign(State(state()), Query(query)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
