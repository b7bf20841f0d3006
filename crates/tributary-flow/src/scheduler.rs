//! The run scheduler: the atomic read-check-clear-create procedure.
//!
//! Once per event, the scheduler resolves the consuming workflows, proposes
//! a fulfillment marker per consumer, and proposes a run for every consumer
//! whose full requirement set is covered. The store applies the whole unit
//! atomically, re-validating each proposed run's marker set under isolation:
//! the first evaluation to clear a satisfied set wins, any concurrent loser
//! observes absence and steps aside with no side effects.

use std::collections::HashSet;
use std::sync::Arc;

use tributary_core::AssetId;

use crate::error::Result;
use crate::event::AssetEvent;
use crate::graph::DependencyGraph;
use crate::metrics::TriggerMetrics;
use crate::queue::TriggerQueue;
use crate::run::TriggeredRun;
use crate::store::{CommitReceipt, EventCommit, RunAttempt, TriggerStore};

/// Evaluates asset events against the dependency graph and triggers runs.
#[derive(Clone)]
pub struct RunScheduler {
    store: Arc<dyn TriggerStore>,
    graph: DependencyGraph,
    queue: TriggerQueue,
    metrics: TriggerMetrics,
}

impl RunScheduler {
    /// Creates a scheduler over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn TriggerStore>) -> Self {
        Self {
            graph: DependencyGraph::new(store.clone()),
            queue: TriggerQueue::new(store.clone()),
            store,
            metrics: TriggerMetrics::new(),
        }
    }

    /// Evaluates and commits one asset event.
    ///
    /// The returned receipt reports what the commit actually did: markers
    /// created, runs triggered, and attempts skipped because a concurrent
    /// evaluation consumed their markers first. Skipped attempts are not
    /// errors; any such workflow was already triggered by the winner.
    ///
    /// # Errors
    ///
    /// Returns an error if the event's asset is unregistered or the store
    /// fails; either way nothing is persisted.
    #[tracing::instrument(
        skip(self, event),
        fields(event_id = %event.id, asset_uri = %event.asset_uri)
    )]
    pub async fn process(&self, event: AssetEvent) -> Result<CommitReceipt> {
        let external = event.source.is_external();
        let consumers = self.graph.consumers_of(event.asset_id).await?;

        let mut attempts = Vec::with_capacity(consumers.len());
        for dag_id in consumers {
            let required = self.graph.required_assets_of(&dag_id).await?;
            let have: HashSet<AssetId> = self
                .queue
                .markers_for(&dag_id)
                .await?
                .into_iter()
                .map(|marker| marker.asset_id)
                .collect();

            // The incoming event's own marker lands in the same commit, so
            // it counts toward coverage here. The observation is advisory:
            // the commit re-evaluates each set under isolation.
            let observed_ready = required
                .iter()
                .all(|asset| *asset == event.asset_id || have.contains(asset));
            attempts.push(RunAttempt {
                run: TriggeredRun::asset_triggered(dag_id, event.timestamp),
                required,
                observed_ready,
            });
        }

        let receipt = self
            .store
            .commit_event(EventCommit { event, attempts })
            .await?;

        for dag_id in &receipt.skipped_dags {
            tracing::warn!(
                dag_id,
                event_id = %receipt.event_id,
                "run attempt skipped; markers consumed by a concurrent evaluation"
            );
        }
        if !receipt.created_runs.is_empty() {
            tracing::debug!(
                event_id = %receipt.event_id,
                runs = receipt.created_runs.len(),
                "asset event triggered runs"
            );
        }

        self.metrics.record_event(external);
        self.metrics.record_markers_queued(receipt.markers_created);
        self.metrics
            .record_runs_triggered(receipt.created_runs.len() as u64);
        self.metrics
            .record_races_lost(receipt.skipped_dags.len() as u64);

        Ok(receipt)
    }
}

impl std::fmt::Debug for RunScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunScheduler").finish_non_exhaustive()
    }
}
