//! Pluggable storage for trigger-engine state.
//!
//! The [`TriggerStore`] trait defines the persistence layer for assets,
//! events, dependency edges, fulfillment markers, and triggered runs.
//!
//! ## Design Principles
//!
//! - **Conflict detection over locking**: the marker table is the single
//!   point of coordination; its conditional clear is the barrier that makes
//!   triggering exactly-once
//! - **One atomic unit per event**: [`commit_event`](TriggerStore::commit_event)
//!   applies an event, its marker upserts, and any triggered runs
//!   all-or-nothing
//! - **Testability**: in-memory implementation for testing; a SQL backend
//!   maps the commit to a single transaction

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tributary_core::{AssetId, EventId, RunId};

use crate::asset::{AssetRecord, AssetSpec, ExtraMap};
use crate::error::Result;
use crate::event::{AssetEvent, AssetEventDetail};
use crate::graph::{OutletAssetRef, ScheduleAssetRef};
use crate::query::{AssetQuery, EventQuery, Page};
use crate::queue::QueuedMarker;
use crate::run::TriggeredRun;

/// Result of a conditional marker clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerClearOutcome {
    /// Every named marker was present; all were removed.
    Cleared,
    /// A named marker was already absent; nothing was removed.
    Missing {
        /// The first asset whose marker was not found.
        asset_id: AssetId,
    },
}

impl MarkerClearOutcome {
    /// Returns true if the clear succeeded.
    #[must_use]
    pub const fn is_cleared(&self) -> bool {
        matches!(self, Self::Cleared)
    }
}

/// One consuming workflow's evaluation within an event commit.
///
/// Every consumer of the event's asset gets exactly one attempt: an
/// idempotent marker upsert plus a conditional trigger. The `run` is
/// pre-minted by the scheduler and materialized only if the workflow's
/// full required set is covered at apply time.
#[derive(Debug, Clone)]
pub struct RunAttempt {
    /// The run to create if the required set is covered.
    pub run: TriggeredRun,
    /// The workflow's full required-asset set; its markers are cleared
    /// together with the run creation.
    pub required: Vec<AssetId>,
    /// Whether the scheduler's pre-commit read observed the set as
    /// covered. Used only to report lost races: an observed-ready attempt
    /// that finds a marker missing at apply time was beaten by a
    /// concurrent evaluation.
    pub observed_ready: bool,
}

/// The atomic unit applied per recorded event.
#[derive(Debug, Clone)]
pub struct EventCommit {
    /// The event row to append.
    pub event: AssetEvent,
    /// One evaluation per workflow consuming the event's asset.
    pub attempts: Vec<RunAttempt>,
}

/// What a committed event actually did.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// The appended event.
    pub event_id: EventId,
    /// How many fulfillment markers the commit created (idempotent upserts
    /// that found an existing marker do not count).
    pub markers_created: u64,
    /// Runs created by this commit, in attempt order.
    pub created_runs: Vec<TriggeredRun>,
    /// Workflows whose attempt lost the race: their markers were consumed
    /// by a concurrent evaluation between observation and commit.
    pub skipped_dags: Vec<String>,
}

/// Storage abstraction for trigger-engine state.
///
/// ## Atomicity Contract
///
/// `commit_event` is the correctness-critical primitive. Implementations
/// MUST apply the whole commit as one atomic unit:
///
/// - The event append, every marker upsert, and every materialized run
///   become visible together or not at all.
/// - Each [`RunAttempt`] first upserts the fulfillment marker for the
///   event's asset (idempotent: an existing marker is left untouched),
///   then evaluates the workflow's full required set under the same
///   isolation. A covered set removes exactly its required markers,
///   inserts the attempt's run, and links the run to each cleared
///   marker's `source_event_id`. An uncovered set leaves everything
///   queued. The pre-commit observation is advisory only: evaluation at
///   apply time decides, so a set completed by a concurrent commit still
///   triggers, and one consumed by a concurrent commit is skipped
///   (reported in [`CommitReceipt::skipped_dags`], never an error).
/// - A storage failure anywhere rolls the entire unit back, event row
///   included, leaving every marker exactly as it was.
///
/// Isolation should be scoped to the marker sets being cleared (row-level
/// locking or an optimistic version check), not the whole table, so
/// unrelated workflows' triggers do not serialize.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` to support concurrent producers.
#[async_trait]
pub trait TriggerStore: Send + Sync {
    // --- Asset Operations ---

    /// Creates the asset if absent, else refreshes its mutable metadata.
    ///
    /// The URI is the identity: an existing asset keeps its `id` and
    /// `created_at` while name, group, extra, and `updated_at` are
    /// replaced from the spec.
    async fn upsert_asset(&self, spec: &AssetSpec, now: DateTime<Utc>) -> Result<AssetRecord>;

    /// Gets an asset by URI. Returns `None` if unregistered.
    async fn asset_by_uri(&self, uri: &str) -> Result<Option<AssetRecord>>;

    /// Gets an asset by internal id. Returns `None` if unknown.
    async fn asset_by_id(&self, asset_id: AssetId) -> Result<Option<AssetRecord>>;

    /// Replaces an asset's metadata map.
    ///
    /// Fails with `AssetNotFound` for an unregistered URI.
    async fn update_asset_extra(
        &self,
        uri: &str,
        extra: ExtraMap,
        now: DateTime<Utc>,
    ) -> Result<AssetRecord>;

    /// Lists assets matching the query, with the total count independent
    /// of the page slice.
    async fn list_assets(&self, query: &AssetQuery) -> Result<Page<AssetRecord>>;

    // --- Dependency Edge Operations ---

    /// Adds a schedule (consuming) reference. Idempotent per pair.
    ///
    /// Fails with `AssetNotFound` for an unregistered URI.
    async fn add_schedule_ref(&self, dag_id: &str, asset_uri: &str) -> Result<()>;

    /// Adds a task outlet (producing) reference. Idempotent per triple.
    ///
    /// Fails with `AssetNotFound` for an unregistered URI.
    async fn add_outlet_ref(&self, dag_id: &str, task_id: &str, asset_uri: &str) -> Result<()>;

    /// Workflows with a schedule reference to the asset, sorted by dag id.
    async fn consumers_of(&self, asset_id: AssetId) -> Result<Vec<String>>;

    /// Assets the workflow requires, via its schedule references.
    async fn required_assets_of(&self, dag_id: &str) -> Result<Vec<AssetId>>;

    /// Both edge kinds referencing an asset.
    async fn refs_for_asset(
        &self,
        asset_id: AssetId,
    ) -> Result<(Vec<ScheduleAssetRef>, Vec<OutletAssetRef>)>;

    // --- Event Operations ---

    /// Gets an event with its created-run join. Returns `None` if unknown.
    async fn event(&self, event_id: EventId) -> Result<Option<AssetEventDetail>>;

    /// Lists events matching the query, with the total count independent
    /// of the page slice.
    async fn list_events(&self, query: &EventQuery) -> Result<Page<AssetEventDetail>>;

    // --- Marker Operations ---

    /// Inserts a fulfillment marker if none exists for its pair.
    ///
    /// Returns `true` on insert, `false` when the pair already had one
    /// (the existing marker is left untouched).
    async fn enqueue_marker(&self, marker: QueuedMarker) -> Result<bool>;

    /// Markers for one workflow, sorted by asset id.
    async fn markers_for(&self, dag_id: &str) -> Result<Vec<QueuedMarker>>;

    /// Markers filtered by workflow and/or asset, sorted by (dag, asset).
    async fn list_markers(
        &self,
        dag_id: Option<&str>,
        asset_id: Option<AssetId>,
    ) -> Result<Vec<QueuedMarker>>;

    /// Conditionally removes exactly the named markers.
    ///
    /// This is the compare-and-delete barrier: if any named marker is
    /// absent, nothing is removed and the outcome reports the first
    /// missing asset.
    async fn clear_markers(
        &self,
        dag_id: &str,
        asset_ids: &[AssetId],
    ) -> Result<MarkerClearOutcome>;

    /// Removes one marker. Returns `true` if it existed.
    async fn delete_marker(&self, dag_id: &str, asset_id: AssetId) -> Result<bool>;

    /// Removes all markers for a workflow. Returns how many were removed.
    async fn delete_markers_for_dag(&self, dag_id: &str) -> Result<u64>;

    // --- Run Operations ---

    /// Gets a run by id. Returns `None` if unknown.
    async fn run(&self, run_id: RunId) -> Result<Option<TriggeredRun>>;

    /// Runs for a workflow, sorted by run id.
    async fn runs_for_dag(&self, dag_id: &str) -> Result<Vec<TriggeredRun>>;

    // --- Atomic Trigger Unit ---

    /// Applies one event's commit atomically. See the trait-level
    /// atomicity contract.
    ///
    /// Fails with `AssetNotFound` (and persists nothing) if the event's
    /// asset is not registered.
    async fn commit_event(&self, commit: EventCommit) -> Result<CommitReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_outcome_is_cleared() {
        assert!(MarkerClearOutcome::Cleared.is_cleared());
        assert!(!MarkerClearOutcome::Missing {
            asset_id: AssetId::generate()
        }
        .is_cleared());
    }
}
