//! The durable queue of fulfillment markers.
//!
//! A marker `(target_dag_id, asset_id)` records that the asset has fired an
//! event since the workflow's last trigger. Insertion is idempotent: at most
//! one unconsumed marker exists per pair, and a second event before
//! consumption leaves the existing marker untouched. The atomic [`clear`]
//! is the coordination point that makes triggering exactly-once: only the
//! first evaluator to clear a satisfied set succeeds, any other observes
//! absence and aborts.
//!
//! [`clear`]: TriggerQueue::clear

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tributary_core::{AssetId, EventId};

use crate::error::{Error, Result};
use crate::store::{MarkerClearOutcome, TriggerStore};

/// A queued fulfillment marker.
///
/// `source_event_id` is the event whose arrival created the marker; it is
/// what the scheduler links to the run once the marker is consumed. Later
/// events for the same pair do not touch an existing marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMarker {
    /// The workflow waiting on the asset.
    pub target_dag_id: String,
    /// The asset that fired.
    pub asset_id: AssetId,
    /// When the marker was created.
    pub created_at: DateTime<Utc>,
    /// The event that created the marker.
    pub source_event_id: EventId,
}

/// Read/write surface over the fulfillment-marker table.
#[derive(Clone)]
pub struct TriggerQueue {
    store: Arc<dyn TriggerStore>,
}

impl TriggerQueue {
    /// Creates a queue over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn TriggerStore>) -> Self {
        Self { store }
    }

    /// Records that `asset_id` has fired for `dag_id`.
    ///
    /// Idempotent: returns `true` if a marker was created, `false` if one
    /// already existed for the pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn mark_fulfilled(
        &self,
        dag_id: &str,
        asset_id: AssetId,
        source_event_id: EventId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.store
            .enqueue_marker(QueuedMarker {
                target_dag_id: dag_id.to_string(),
                asset_id,
                created_at: now,
                source_event_id,
            })
            .await
    }

    /// Current markers for the workflow, sorted by asset id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn markers_for(&self, dag_id: &str) -> Result<Vec<QueuedMarker>> {
        self.store.markers_for(dag_id).await
    }

    /// Atomically removes exactly the named markers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MarkerConflict`] if any named marker is already
    /// absent (a concurrent evaluation consumed it); in that case nothing
    /// is removed and the caller must abort its run creation.
    pub async fn clear(&self, dag_id: &str, asset_ids: &[AssetId]) -> Result<()> {
        match self.store.clear_markers(dag_id, asset_ids).await? {
            MarkerClearOutcome::Cleared => Ok(()),
            MarkerClearOutcome::Missing { asset_id } => {
                tracing::debug!(
                    dag_id,
                    %asset_id,
                    "marker clear lost the race; aborting trigger"
                );
                Err(Error::MarkerConflict {
                    dag_id: dag_id.to_string(),
                })
            }
        }
    }

    /// Administrative list of markers, optionally filtered by workflow
    /// and/or asset. Bypasses the scheduler entirely.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn list(
        &self,
        dag_id: Option<&str>,
        asset_id: Option<AssetId>,
    ) -> Result<Vec<QueuedMarker>> {
        self.store.list_markers(dag_id, asset_id).await
    }

    /// Administrative single-marker delete.
    ///
    /// Returns `true` if a marker was removed, `false` if none existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn delete(&self, dag_id: &str, asset_id: AssetId) -> Result<bool> {
        self.store.delete_marker(dag_id, asset_id).await
    }

    /// Administrative bulk delete of a workflow's markers.
    ///
    /// Returns how many markers were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn delete_all_for_dag(&self, dag_id: &str) -> Result<u64> {
        self.store.delete_markers_for_dag(dag_id).await
    }
}

impl std::fmt::Debug for TriggerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerQueue").finish_non_exhaustive()
    }
}
