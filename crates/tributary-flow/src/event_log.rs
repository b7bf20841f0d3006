//! The append-only event log and its `record_event` entry point.

use std::sync::Arc;

use chrono::Utc;

use crate::asset::ExtraMap;
use crate::error::{Error, Result};
use crate::event::{AssetEvent, AssetEventDetail, EventSource};
use crate::metrics::time_record_event;
use crate::query::{EventQuery, Page};
use crate::scheduler::RunScheduler;
use crate::store::TriggerStore;

/// Append-only record of asset-update events.
///
/// [`record_event`](EventLog::record_event) is the sole event-creation
/// entry point and the sole trigger for the downstream pipeline: resolving
/// consumers, queueing fulfillment markers, and creating runs all happen
/// inside the same atomic storage unit as the event append, so a failure
/// anywhere leaves no trace and the producer can safely retry.
#[derive(Clone)]
pub struct EventLog {
    store: Arc<dyn TriggerStore>,
    scheduler: RunScheduler,
}

impl EventLog {
    /// Creates an event log over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn TriggerStore>) -> Self {
        let scheduler = RunScheduler::new(store.clone());
        Self { store, scheduler }
    }

    /// Records an asset-update event and evaluates its trigger effects.
    ///
    /// Returns the appended event together with any runs it caused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetNotFound`] if the URI is unregistered, or a
    /// storage error if the atomic unit could not be applied; in both cases
    /// nothing was persisted.
    #[tracing::instrument(skip(self, source, extra))]
    pub async fn record_event(
        &self,
        asset_uri: &str,
        source: EventSource,
        extra: ExtraMap,
    ) -> Result<AssetEventDetail> {
        let _timer = time_record_event();

        let asset = self
            .store
            .asset_by_uri(asset_uri)
            .await?
            .ok_or_else(|| Error::asset_not_found(asset_uri))?;

        let event = AssetEvent::record(&asset, source, extra, Utc::now());
        let receipt = self.scheduler.process(event).await?;

        self.store
            .event(receipt.event_id)
            .await?
            .ok_or_else(|| Error::storage("recorded event is missing from the store"))
    }

    /// Lists events matching the query. Pure read.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn list(&self, query: &EventQuery) -> Result<Page<AssetEventDetail>> {
        self.store.list_events(query).await
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetSpec;
    use crate::event::{EXTERNAL_ORIGIN_EXTRA_KEY, UNMAPPED_INDEX};
    use crate::store::memory::InMemoryStore;

    #[tokio::test]
    async fn record_event_round_trip() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_asset(&AssetSpec::new("s3://bucket/key"), Utc::now())
            .await?;
        let log = EventLog::new(store);

        let mut extra = ExtraMap::new();
        extra.insert("foo".into(), serde_json::Value::String("bar".into()));

        let detail = log
            .record_event("s3://bucket/key", EventSource::external(), extra)
            .await?;

        assert_eq!(detail.event.asset_uri, "s3://bucket/key");
        assert_eq!(detail.event.source.map_index, UNMAPPED_INDEX);
        assert_eq!(detail.event.extra["foo"], "bar");
        assert_eq!(detail.event.extra[EXTERNAL_ORIGIN_EXTRA_KEY], true);
        assert!(detail.created_runs.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn record_event_for_unregistered_uri_persists_nothing() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        let log = EventLog::new(store.clone());

        let result = log
            .record_event("s3://unknown", EventSource::external(), ExtraMap::new())
            .await;

        assert!(matches!(result, Err(Error::AssetNotFound { .. })));
        assert_eq!(store.event_count()?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn task_provenance_is_stored_verbatim() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_asset(&AssetSpec::new("s3://bucket/key"), Utc::now())
            .await?;
        let log = EventLog::new(store);

        let detail = log
            .record_event(
                "s3://bucket/key",
                EventSource::mapped_task("producer", "emit", "run-1", 2),
                ExtraMap::new(),
            )
            .await?;

        assert_eq!(detail.event.source.dag_id.as_deref(), Some("producer"));
        assert_eq!(detail.event.source.map_index, 2);
        assert!(!detail.event.extra.contains_key(EXTERNAL_ORIGIN_EXTRA_KEY));
        Ok(())
    }
}
