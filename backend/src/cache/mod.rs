//! Ledger store - the published ledger snapshot
//!
//! Holds the result of the last successful rebuild. A rebuild runs without
//! any lock held and is published by swapping one pointer, so readers see
//! either the old snapshot or the new one, never a half-built ledger. A
//! failed rebuild keeps the previous snapshot but marks the store as
//! unavailable until the next successful one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

use crate::api::logs::log_error;
use crate::config::SourcePaths;
use crate::error::{LedgerResult, SnapshotError, SnapshotResult};
use crate::models::{OnHandLevel, UnifiedLedgerEntry};
use crate::projection::AvailabilityProjector;
use crate::transform::pipeline::{rebuild_from_paths, ReconcileOptions, ReconcileOutput, ReconcileReport};

/// One immutable rebuild result
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    pub id: Uuid,
    pub built_at: DateTime<Utc>,
    pub ledger: Vec<UnifiedLedgerEntry>,
    pub on_hand: Vec<OnHandLevel>,
    pub report: ReconcileReport,
}

impl LedgerSnapshot {
    pub fn new(output: ReconcileOutput) -> Self {
        Self {
            id: Uuid::new_v4(),
            built_at: Utc::now(),
            ledger: output.ledger,
            on_hand: output.on_hand,
            report: output.report,
        }
    }

    /// Queries over this snapshot
    pub fn projector(&self) -> AvailabilityProjector<'_> {
        AvailabilityProjector::new(&self.ledger, &self.on_hand)
    }
}

/// Everything readers can observe, replaced as a whole
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    /// Last good snapshot
    pub current: Option<Arc<LedgerSnapshot>>,
    /// Error of the last rebuild, cleared by the next success
    pub last_error: Option<String>,
    pub attempted_at: Option<DateTime<Utc>>,
}

/// Store status, as reported by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub available: bool,
    pub snapshot_id: Option<Uuid>,
    pub built_at: Option<DateTime<Utc>>,
    pub entries: usize,
    pub last_error: Option<String>,
    pub attempted_at: Option<DateTime<Utc>>,
}

/// Holder of the published snapshot
#[derive(Debug, Default)]
pub struct LedgerStore {
    state: RwLock<Arc<StoreState>>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Arc<StoreState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `build` and publish its result.
    ///
    /// On failure the previous snapshot stays readable through
    /// [`Self::last_good`] and the error is returned.
    pub fn reload_with<F>(&self, build: F) -> LedgerResult<Arc<LedgerSnapshot>>
    where
        F: FnOnce() -> LedgerResult<ReconcileOutput>,
    {
        let result = build();
        let now = Utc::now();
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);

        match result {
            Ok(output) => {
                let snapshot = Arc::new(LedgerSnapshot::new(output));
                *guard = Arc::new(StoreState {
                    current: Some(snapshot.clone()),
                    last_error: None,
                    attempted_at: Some(now),
                });
                Ok(snapshot)
            }
            Err(err) => {
                log_error(format!("Rebuild failed: {}", err));
                let current = guard.current.clone();
                *guard = Arc::new(StoreState {
                    current,
                    last_error: Some(err.to_string()),
                    attempted_at: Some(now),
                });
                Err(err)
            }
        }
    }

    /// Rebuild from feed files and publish
    pub fn reload(
        &self,
        paths: &SourcePaths,
        options: &ReconcileOptions,
    ) -> LedgerResult<Arc<LedgerSnapshot>> {
        self.reload_with(|| rebuild_from_paths(paths, options))
    }

    /// The current snapshot, if the last rebuild succeeded
    pub fn snapshot(&self) -> SnapshotResult<Arc<LedgerSnapshot>> {
        let state = self.state();
        match (&state.last_error, &state.current) {
            (Some(reason), current) => Err(SnapshotError::Unavailable {
                reason: reason.clone(),
                stale: current.is_some(),
            }),
            (None, Some(snapshot)) => Ok(snapshot.clone()),
            (None, None) => Err(SnapshotError::NotLoaded),
        }
    }

    /// The last good snapshot, even when a later rebuild failed
    pub fn last_good(&self) -> Option<Arc<LedgerSnapshot>> {
        self.state().current.clone()
    }

    pub fn status(&self) -> StoreStatus {
        let state = self.state();
        let current = state.current.as_ref();
        StoreStatus {
            available: state.last_error.is_none() && current.is_some(),
            snapshot_id: current.map(|s| s.id),
            built_at: current.map(|s| s.built_at),
            entries: current.map_or(0, |s| s.ledger.len()),
            last_error: state.last_error.clone(),
            attempted_at: state.attempted_at,
        }
    }
}
