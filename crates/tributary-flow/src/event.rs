//! Asset-update events.
//!
//! An event is an immutable fact: an asset was updated, with producer
//! provenance. Events are append-only; the only thing that grows after
//! creation is the event-to-run join relation maintained by the scheduler,
//! which is surfaced on reads as [`AssetEventDetail`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tributary_core::{AssetId, EventId};

use crate::asset::{AssetRecord, ExtraMap};
use crate::run::RunSummary;

/// Metadata key stamped into `extra` for events recorded without producer
/// provenance (i.e. posted through the external API rather than emitted by
/// a workflow task).
pub const EXTERNAL_ORIGIN_EXTRA_KEY: &str = "from_api";

/// Map index value for events produced by non-mapped tasks.
pub const UNMAPPED_INDEX: i64 = -1;

/// Producer provenance carried by an asset event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    /// Producing workflow, if the event came from a task.
    pub dag_id: Option<String>,
    /// Producing task within that workflow.
    pub task_id: Option<String>,
    /// Run of the producing workflow.
    pub run_id: Option<String>,
    /// Map index of the producing task instance; [`UNMAPPED_INDEX`] for
    /// non-mapped tasks.
    #[serde(default = "default_map_index")]
    pub map_index: i64,
}

fn default_map_index() -> i64 {
    UNMAPPED_INDEX
}

impl Default for EventSource {
    fn default() -> Self {
        Self::external()
    }
}

impl EventSource {
    /// Provenance for an externally posted event (no producing task).
    #[must_use]
    pub const fn external() -> Self {
        Self {
            dag_id: None,
            task_id: None,
            run_id: None,
            map_index: UNMAPPED_INDEX,
        }
    }

    /// Provenance for an event emitted by a non-mapped task.
    #[must_use]
    pub fn task(
        dag_id: impl Into<String>,
        task_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            dag_id: Some(dag_id.into()),
            task_id: Some(task_id.into()),
            run_id: Some(run_id.into()),
            map_index: UNMAPPED_INDEX,
        }
    }

    /// Provenance for an event emitted by a mapped task instance.
    #[must_use]
    pub fn mapped_task(
        dag_id: impl Into<String>,
        task_id: impl Into<String>,
        run_id: impl Into<String>,
        map_index: i64,
    ) -> Self {
        Self {
            map_index,
            ..Self::task(dag_id, task_id, run_id)
        }
    }

    /// Returns true when the event has no producing-task provenance.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        self.dag_id.is_none()
    }
}

/// An immutable asset-update event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEvent {
    /// Unique event identifier; sorts in creation order.
    pub id: EventId,
    /// The updated asset.
    pub asset_id: AssetId,
    /// The updated asset's URI, denormalized for reads.
    pub asset_uri: String,
    /// Producer provenance.
    pub source: EventSource,
    /// Free-form metadata. Stored verbatim; sensitive keys are masked only
    /// at the external read boundary.
    pub extra: ExtraMap,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
}

impl AssetEvent {
    /// Builds the event for a freshly observed asset update.
    ///
    /// Events without producing-task provenance get the
    /// [`EXTERNAL_ORIGIN_EXTRA_KEY`] marker stamped into their metadata.
    #[must_use]
    pub fn record(
        asset: &AssetRecord,
        source: EventSource,
        mut extra: ExtraMap,
        now: DateTime<Utc>,
    ) -> Self {
        if source.is_external() {
            extra.insert(
                EXTERNAL_ORIGIN_EXTRA_KEY.to_string(),
                serde_json::Value::Bool(true),
            );
        }

        Self {
            id: EventId::generate(),
            asset_id: asset.id,
            asset_uri: asset.uri.clone(),
            source,
            extra,
            timestamp: now,
        }
    }
}

/// An event joined with the runs it caused.
///
/// The run linkage lives in a separate join relation written only by the
/// scheduler; this read model assembles it without mutating the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEventDetail {
    /// The immutable event record.
    pub event: AssetEvent,
    /// Runs this event helped trigger, in creation order.
    pub created_runs: Vec<RunSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetSpec, DEFAULT_ASSET_GROUP};

    fn test_asset() -> AssetRecord {
        let spec = AssetSpec::new("s3://bucket/key");
        let now = Utc::now();
        AssetRecord {
            id: AssetId::generate(),
            uri: spec.uri.clone(),
            name: spec.resolved_name().to_string(),
            group: DEFAULT_ASSET_GROUP.into(),
            extra: ExtraMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn map_index_defaults_to_unmapped() {
        assert_eq!(EventSource::external().map_index, UNMAPPED_INDEX);
        assert_eq!(EventSource::task("dag", "task", "run").map_index, -1);

        let source: EventSource = serde_json::from_str(
            r#"{"dag_id": "dag", "task_id": "task", "run_id": "run"}"#,
        )
        .unwrap();
        assert_eq!(source.map_index, UNMAPPED_INDEX);
    }

    #[test]
    fn external_event_gets_origin_marker() {
        let asset = test_asset();
        let mut extra = ExtraMap::new();
        extra.insert("foo".into(), serde_json::Value::String("bar".into()));

        let event = AssetEvent::record(&asset, EventSource::external(), extra, Utc::now());

        assert_eq!(event.asset_uri, "s3://bucket/key");
        assert_eq!(event.extra["foo"], "bar");
        assert_eq!(event.extra[EXTERNAL_ORIGIN_EXTRA_KEY], true);
    }

    #[test]
    fn task_event_is_not_marked_external() {
        let asset = test_asset();
        let event = AssetEvent::record(
            &asset,
            EventSource::task("producer", "emit", "run-1"),
            ExtraMap::new(),
            Utc::now(),
        );

        assert!(!event.source.is_external());
        assert!(!event.extra.contains_key(EXTERNAL_ORIGIN_EXTRA_KEY));
    }

    #[test]
    fn event_serde_round_trip() {
        let asset = test_asset();
        let event = AssetEvent::record(
            &asset,
            EventSource::mapped_task("producer", "emit", "run-1", 3),
            ExtraMap::new(),
            Utc::now(),
        );

        let json = serde_json::to_string(&event).unwrap();
        let parsed: AssetEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.source.map_index, 3);
    }
}
