//! # tributary-flow
//!
//! The asset-event trigger engine: tracks named data artifacts ("assets"),
//! records when they are updated, and decides when those updates should
//! trigger runs of the workflows that consume them.
//!
//! ## Core Concepts
//!
//! - **Asset**: a named, externally addressed data artifact, identified by
//!   a globally unique URI
//! - **Asset event**: an immutable record that an asset was updated, with
//!   producer provenance
//! - **Fulfillment marker**: a durable flag meaning "this asset has fired
//!   for this workflow since its last trigger"
//! - **Trigger**: the creation of a new workflow run once every asset the
//!   workflow requires has fired (conjunctive dependencies)
//!
//! ## Guarantees
//!
//! - **Exactly-once triggering**: concurrent evaluations of the same
//!   satisfied dependency set create exactly one run; the atomic marker
//!   clear is the barrier, and the loser steps aside without side effects
//! - **No lost or phantom triggers**: an event, its markers, and any runs
//!   it causes commit as one atomic storage unit; a failure rolls the
//!   whole unit back and the producer may retry safely
//! - **Append-only events**: recorded events are never mutated; only the
//!   event-to-run join relation grows
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tributary_flow::asset::{AssetSpec, ExtraMap};
//! use tributary_flow::error::Result;
//! use tributary_flow::event::EventSource;
//! use tributary_flow::service::TriggerService;
//! use tributary_flow::store::{memory::InMemoryStore, TriggerStore};
//!
//! # async fn demo() -> Result<()> {
//! let service = TriggerService::new(Arc::new(InMemoryStore::new()));
//!
//! // Register two assets and a workflow that requires both.
//! service.register_asset(&AssetSpec::new("s3://bucket/raw")).await?;
//! service.register_asset(&AssetSpec::new("s3://bucket/reference")).await?;
//! service.store().add_schedule_ref("daily_join", "s3://bucket/raw").await?;
//! service.store().add_schedule_ref("daily_join", "s3://bucket/reference").await?;
//!
//! // The first update queues a marker; the second completes the set and
//! // triggers exactly one run.
//! service.record_event("s3://bucket/raw", EventSource::external(), ExtraMap::new()).await?;
//! let detail = service
//!     .record_event("s3://bucket/reference", EventSource::external(), ExtraMap::new())
//!     .await?;
//! assert_eq!(detail.created_runs.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod asset;
pub mod config;
pub mod error;
pub mod event;
pub mod event_log;
pub mod graph;
pub mod metrics;
pub mod query;
pub mod queue;
pub mod redaction;
pub mod registry;
pub mod run;
pub mod scheduler;
pub mod service;
pub mod store;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::asset::{AssetDetail, AssetRecord, AssetSpec, ExtraMap};
    pub use crate::config::EngineConfig;
    pub use crate::error::{Error, Result};
    pub use crate::event::{AssetEvent, AssetEventDetail, EventSource};
    pub use crate::event_log::EventLog;
    pub use crate::graph::DependencyGraph;
    pub use crate::query::{AssetFilter, EventFilter, OrderBy, Page, PageRequest};
    pub use crate::queue::{QueuedMarker, TriggerQueue};
    pub use crate::registry::AssetRegistry;
    pub use crate::run::{RunKind, RunState, TriggeredRun};
    pub use crate::scheduler::RunScheduler;
    pub use crate::service::{QueuedMarkerView, TriggerService};
    pub use crate::store::{memory::InMemoryStore, TriggerStore};
}
