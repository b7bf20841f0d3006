//! In-memory store implementation for testing.
//!
//! This module provides [`InMemoryStore`], a thread-safe in-memory
//! implementation of the [`TriggerStore`] trait suitable for testing and
//! development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process
//!   coordination
//! - **Single-process only**: State is not shared across process boundaries
//! - **Whole-table isolation**: commits serialize behind one lock. A
//!   production backend must instead scope isolation to the marker sets
//!   being cleared so unrelated workflows' triggers do not serialize.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tributary_core::{AssetId, EventId, RunId};

use super::{CommitReceipt, EventCommit, MarkerClearOutcome, TriggerStore};
use crate::asset::{AssetRecord, AssetSpec, ExtraMap};
use crate::error::{Error, Result};
use crate::event::{AssetEvent, AssetEventDetail};
use crate::graph::{OutletAssetRef, ScheduleAssetRef};
use crate::query::{AssetQuery, EventQuery, OrderBy, Page, SortDirection};
use crate::queue::QueuedMarker;
use crate::run::TriggeredRun;

#[derive(Debug, Default)]
struct State {
    assets_by_uri: BTreeMap<String, AssetRecord>,
    uris_by_id: HashMap<AssetId, String>,
    schedule_refs: BTreeSet<(String, AssetId)>,
    outlet_refs: BTreeSet<(String, String, AssetId)>,
    events: BTreeMap<EventId, AssetEvent>,
    event_run_links: BTreeSet<(EventId, RunId)>,
    markers: BTreeMap<(String, AssetId), QueuedMarker>,
    runs: BTreeMap<RunId, TriggeredRun>,
}

impl State {
    fn event_detail(&self, event: &AssetEvent) -> AssetEventDetail {
        let created_runs = self
            .event_run_links
            .iter()
            .filter(|(event_id, _)| *event_id == event.id)
            .filter_map(|(_, run_id)| self.runs.get(run_id))
            .map(TriggeredRun::summary)
            .collect();
        AssetEventDetail {
            event: event.clone(),
            created_runs,
        }
    }
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

/// In-memory store for testing.
///
/// Provides a simple, thread-safe implementation of the [`TriggerStore`]
/// trait using `RwLock` for synchronization. `commit_event` validates the
/// whole unit before mutating anything, so a failed commit leaves the
/// state untouched.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of events currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn event_count(&self) -> Result<usize> {
        let count = {
            let state = self.state.read().map_err(poison_err)?;
            state.events.len()
        };
        Ok(count)
    }

    /// Returns the number of runs currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn run_count(&self) -> Result<usize> {
        let count = {
            let state = self.state.read().map_err(poison_err)?;
            state.runs.len()
        };
        Ok(count)
    }
}

fn apply_direction(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

fn compare_assets(a: &AssetRecord, b: &AssetRecord, order: OrderBy) -> Ordering {
    let primary = match order.field {
        "uri" => a.uri.cmp(&b.uri),
        "name" => a.name.cmp(&b.name),
        "group" => a.group.cmp(&b.group),
        "created_at" => a.created_at.cmp(&b.created_at),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        _ => a.id.cmp(&b.id),
    };
    apply_direction(primary, order.direction).then_with(|| a.uri.cmp(&b.uri))
}

fn compare_events(a: &AssetEvent, b: &AssetEvent, order: OrderBy) -> Ordering {
    let primary = match order.field {
        "timestamp" => a.timestamp.cmp(&b.timestamp),
        "asset_id" => a.asset_id.cmp(&b.asset_id),
        "source_dag_id" => a.source.dag_id.cmp(&b.source.dag_id),
        "source_task_id" => a.source.task_id.cmp(&b.source.task_id),
        "source_run_id" => a.source.run_id.cmp(&b.source.run_id),
        "source_map_index" => a.source.map_index.cmp(&b.source.map_index),
        _ => a.id.cmp(&b.id),
    };
    apply_direction(primary, order.direction).then_with(|| a.id.cmp(&b.id))
}

fn page_slice<T>(mut items: Vec<T>, limit: u32, offset: u32) -> Page<T> {
    let total_entries = items.len() as u64;
    let offset = offset as usize;
    let limit = limit as usize;
    let items = if offset >= items.len() {
        Vec::new()
    } else {
        items.drain(offset..).take(limit).collect()
    };
    Page {
        items,
        total_entries,
    }
}

#[async_trait]
impl TriggerStore for InMemoryStore {
    async fn upsert_asset(&self, spec: &AssetSpec, now: DateTime<Utc>) -> Result<AssetRecord> {
        let mut state = self.state.write().map_err(poison_err)?;

        if let Some(existing) = state.assets_by_uri.get_mut(&spec.uri) {
            existing.name = spec.resolved_name().to_string();
            existing.group = spec.resolved_group().to_string();
            existing.extra = spec.extra.clone();
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let record = AssetRecord {
            id: AssetId::generate(),
            uri: spec.uri.clone(),
            name: spec.resolved_name().to_string(),
            group: spec.resolved_group().to_string(),
            extra: spec.extra.clone(),
            created_at: now,
            updated_at: now,
        };
        state.uris_by_id.insert(record.id, record.uri.clone());
        state
            .assets_by_uri
            .insert(record.uri.clone(), record.clone());
        Ok(record)
    }

    async fn asset_by_uri(&self, uri: &str) -> Result<Option<AssetRecord>> {
        let result = {
            let state = self.state.read().map_err(poison_err)?;
            state.assets_by_uri.get(uri).cloned()
        };
        Ok(result)
    }

    async fn asset_by_id(&self, asset_id: AssetId) -> Result<Option<AssetRecord>> {
        let result = {
            let state = self.state.read().map_err(poison_err)?;
            state
                .uris_by_id
                .get(&asset_id)
                .and_then(|uri| state.assets_by_uri.get(uri))
                .cloned()
        };
        Ok(result)
    }

    async fn update_asset_extra(
        &self,
        uri: &str,
        extra: ExtraMap,
        now: DateTime<Utc>,
    ) -> Result<AssetRecord> {
        let mut state = self.state.write().map_err(poison_err)?;
        let record = state
            .assets_by_uri
            .get_mut(uri)
            .ok_or_else(|| Error::asset_not_found(uri))?;
        record.extra = extra;
        record.updated_at = now;
        Ok(record.clone())
    }

    async fn list_assets(&self, query: &AssetQuery) -> Result<Page<AssetRecord>> {
        let state = self.state.read().map_err(poison_err)?;

        let referenced: Option<BTreeSet<AssetId>> = query.filter.dag_ids.as_ref().map(|dag_ids| {
            let mut ids = BTreeSet::new();
            for (dag_id, asset_id) in &state.schedule_refs {
                if dag_ids.iter().any(|d| d == dag_id) {
                    ids.insert(*asset_id);
                }
            }
            for (dag_id, _, asset_id) in &state.outlet_refs {
                if dag_ids.iter().any(|d| d == dag_id) {
                    ids.insert(*asset_id);
                }
            }
            ids
        });

        let mut matching: Vec<AssetRecord> = state
            .assets_by_uri
            .values()
            .filter(|asset| {
                query
                    .filter
                    .uri_pattern
                    .as_ref()
                    .is_none_or(|pattern| asset.uri.contains(pattern.as_str()))
            })
            .filter(|asset| {
                referenced
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&asset.id))
            })
            .cloned()
            .collect();
        drop(state);

        matching.sort_by(|a, b| compare_assets(a, b, query.order_by));
        Ok(page_slice(matching, query.limit, query.offset))
    }

    async fn add_schedule_ref(&self, dag_id: &str, asset_uri: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let asset_id = state
            .assets_by_uri
            .get(asset_uri)
            .map(|asset| asset.id)
            .ok_or_else(|| Error::asset_not_found(asset_uri))?;
        state.schedule_refs.insert((dag_id.to_string(), asset_id));
        Ok(())
    }

    async fn add_outlet_ref(&self, dag_id: &str, task_id: &str, asset_uri: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let asset_id = state
            .assets_by_uri
            .get(asset_uri)
            .map(|asset| asset.id)
            .ok_or_else(|| Error::asset_not_found(asset_uri))?;
        state
            .outlet_refs
            .insert((dag_id.to_string(), task_id.to_string(), asset_id));
        Ok(())
    }

    async fn consumers_of(&self, asset_id: AssetId) -> Result<Vec<String>> {
        let result = {
            let state = self.state.read().map_err(poison_err)?;
            state
                .schedule_refs
                .iter()
                .filter(|(_, id)| *id == asset_id)
                .map(|(dag_id, _)| dag_id.clone())
                .collect()
        };
        Ok(result)
    }

    async fn required_assets_of(&self, dag_id: &str) -> Result<Vec<AssetId>> {
        let result = {
            let state = self.state.read().map_err(poison_err)?;
            state
                .schedule_refs
                .iter()
                .filter(|(dag, _)| dag == dag_id)
                .map(|(_, asset_id)| *asset_id)
                .collect()
        };
        Ok(result)
    }

    async fn refs_for_asset(
        &self,
        asset_id: AssetId,
    ) -> Result<(Vec<ScheduleAssetRef>, Vec<OutletAssetRef>)> {
        let state = self.state.read().map_err(poison_err)?;

        let schedule = state
            .schedule_refs
            .iter()
            .filter(|(_, id)| *id == asset_id)
            .map(|(dag_id, id)| ScheduleAssetRef {
                dag_id: dag_id.clone(),
                asset_id: *id,
            })
            .collect();

        let outlets = state
            .outlet_refs
            .iter()
            .filter(|(_, _, id)| *id == asset_id)
            .map(|(dag_id, task_id, id)| OutletAssetRef {
                dag_id: dag_id.clone(),
                task_id: task_id.clone(),
                asset_id: *id,
            })
            .collect();

        Ok((schedule, outlets))
    }

    async fn event(&self, event_id: EventId) -> Result<Option<AssetEventDetail>> {
        let result = {
            let state = self.state.read().map_err(poison_err)?;
            state
                .events
                .get(&event_id)
                .map(|event| state.event_detail(event))
        };
        Ok(result)
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Page<AssetEventDetail>> {
        let state = self.state.read().map_err(poison_err)?;

        let filter = &query.filter;
        let mut matching: Vec<&AssetEvent> = state
            .events
            .values()
            .filter(|event| filter.asset_id.is_none_or(|id| event.asset_id == id))
            .filter(|event| {
                filter
                    .source_dag_id
                    .as_ref()
                    .is_none_or(|dag| event.source.dag_id.as_deref() == Some(dag.as_str()))
            })
            .filter(|event| {
                filter
                    .source_task_id
                    .as_ref()
                    .is_none_or(|task| event.source.task_id.as_deref() == Some(task.as_str()))
            })
            .filter(|event| {
                filter
                    .source_run_id
                    .as_ref()
                    .is_none_or(|run| event.source.run_id.as_deref() == Some(run.as_str()))
            })
            .filter(|event| {
                filter
                    .source_map_index
                    .is_none_or(|index| event.source.map_index == index)
            })
            .collect();

        matching.sort_by(|a, b| compare_events(a, b, query.order_by));
        let details: Vec<AssetEventDetail> = matching
            .into_iter()
            .map(|event| state.event_detail(event))
            .collect();
        drop(state);

        Ok(page_slice(details, query.limit, query.offset))
    }

    async fn enqueue_marker(&self, marker: QueuedMarker) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;
        let key = (marker.target_dag_id.clone(), marker.asset_id);
        if state.markers.contains_key(&key) {
            return Ok(false);
        }
        state.markers.insert(key, marker);
        Ok(true)
    }

    async fn markers_for(&self, dag_id: &str) -> Result<Vec<QueuedMarker>> {
        self.list_markers(Some(dag_id), None).await
    }

    async fn list_markers(
        &self,
        dag_id: Option<&str>,
        asset_id: Option<AssetId>,
    ) -> Result<Vec<QueuedMarker>> {
        let result = {
            let state = self.state.read().map_err(poison_err)?;
            state
                .markers
                .iter()
                .filter(|((dag, _), _)| dag_id.is_none_or(|d| d == dag))
                .filter(|((_, asset), _)| asset_id.is_none_or(|a| a == *asset))
                .map(|(_, marker)| marker.clone())
                .collect()
        };
        Ok(result)
    }

    async fn clear_markers(
        &self,
        dag_id: &str,
        asset_ids: &[AssetId],
    ) -> Result<MarkerClearOutcome> {
        let mut state = self.state.write().map_err(poison_err)?;

        for asset_id in asset_ids {
            if !state
                .markers
                .contains_key(&(dag_id.to_string(), *asset_id))
            {
                return Ok(MarkerClearOutcome::Missing {
                    asset_id: *asset_id,
                });
            }
        }

        for asset_id in asset_ids {
            state.markers.remove(&(dag_id.to_string(), *asset_id));
        }
        Ok(MarkerClearOutcome::Cleared)
    }

    async fn delete_marker(&self, dag_id: &str, asset_id: AssetId) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;
        Ok(state
            .markers
            .remove(&(dag_id.to_string(), asset_id))
            .is_some())
    }

    async fn delete_markers_for_dag(&self, dag_id: &str) -> Result<u64> {
        let mut state = self.state.write().map_err(poison_err)?;
        let before = state.markers.len();
        state.markers.retain(|(dag, _), _| dag != dag_id);
        Ok((before - state.markers.len()) as u64)
    }

    async fn run(&self, run_id: RunId) -> Result<Option<TriggeredRun>> {
        let result = {
            let state = self.state.read().map_err(poison_err)?;
            state.runs.get(&run_id).cloned()
        };
        Ok(result)
    }

    async fn runs_for_dag(&self, dag_id: &str) -> Result<Vec<TriggeredRun>> {
        let result = {
            let state = self.state.read().map_err(poison_err)?;
            state
                .runs
                .values()
                .filter(|run| run.dag_id == dag_id)
                .cloned()
                .collect()
        };
        Ok(result)
    }

    async fn commit_event(&self, commit: EventCommit) -> Result<CommitReceipt> {
        let mut state = self.state.write().map_err(poison_err)?;

        // Validate before mutating anything: a failed commit must leave the
        // state exactly as it was.
        if !state.uris_by_id.contains_key(&commit.event.asset_id) {
            return Err(Error::asset_not_found(commit.event.asset_uri));
        }
        if state.events.contains_key(&commit.event.id) {
            return Err(Error::storage(format!(
                "event {} already exists",
                commit.event.id
            )));
        }

        let event = commit.event;
        let event_id = event.id;
        let asset_id = event.asset_id;
        let timestamp = event.timestamp;
        state.events.insert(event_id, event);

        let mut markers_created = 0_u64;
        let mut created_runs = Vec::new();
        let mut skipped_dags = Vec::new();
        for attempt in commit.attempts {
            let dag_id = attempt.run.dag_id.clone();

            let key = (dag_id.clone(), asset_id);
            if !state.markers.contains_key(&key) {
                state.markers.insert(
                    key,
                    QueuedMarker {
                        target_dag_id: dag_id.clone(),
                        asset_id,
                        created_at: timestamp,
                        source_event_id: event_id,
                    },
                );
                markers_created += 1;
            }

            // Evaluate coverage under the same isolation as the clear.
            // The pre-commit observation is advisory: a set completed by a
            // concurrent commit still triggers here, and an observed-ready
            // set consumed by a concurrent commit steps aside.
            let covered = attempt
                .required
                .iter()
                .all(|asset| state.markers.contains_key(&(dag_id.clone(), *asset)));
            if !covered {
                if attempt.observed_ready {
                    skipped_dags.push(dag_id);
                }
                continue;
            }

            let mut source_events = BTreeSet::new();
            for asset in &attempt.required {
                if let Some(marker) = state.markers.remove(&(dag_id.clone(), *asset)) {
                    source_events.insert(marker.source_event_id);
                }
            }

            let run = attempt.run;
            for source_event in source_events {
                state.event_run_links.insert((source_event, run.id));
            }
            state.runs.insert(run.id, run.clone());
            created_runs.push(run);
        }

        Ok(CommitReceipt {
            event_id,
            markers_created,
            created_runs,
            skipped_dags,
        })
    }
}
