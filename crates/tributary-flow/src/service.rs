//! The external-facing service facade.
//!
//! [`TriggerService`] composes the components into the surface the API
//! layer consumes: event recording, asset and event reads, and the
//! administrative queued-marker operations. Page limits are resolved
//! against [`EngineConfig`] here, and sensitive event metadata is masked
//! here — at the external read boundary, never in storage.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tributary_core::EventId;

use crate::asset::{AssetDetail, AssetRecord, AssetSpec, ExtraMap};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::event::{AssetEventDetail, EventSource};
use crate::event_log::EventLog;
use crate::query::{
    AssetFilter, AssetQuery, EventFilter, EventQuery, OrderBy, Page, PageRequest, ASSET_SORT_KEYS,
    EVENT_SORT_KEYS,
};
use crate::queue::TriggerQueue;
use crate::redaction::mask_extra;
use crate::registry::AssetRegistry;
use crate::store::TriggerStore;

/// A queued marker joined with its asset's URI, for admin surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMarkerView {
    /// The workflow waiting on the asset.
    pub dag_id: String,
    /// The asset's URI.
    pub asset_uri: String,
    /// When the marker was created.
    pub created_at: DateTime<Utc>,
    /// The event that created the marker.
    pub source_event_id: EventId,
}

/// Facade over the trigger engine for the API layer.
#[derive(Clone)]
pub struct TriggerService {
    store: Arc<dyn TriggerStore>,
    config: EngineConfig,
    registry: AssetRegistry,
    log: EventLog,
    queue: TriggerQueue,
}

impl TriggerService {
    /// Creates a service with the default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn TriggerStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Creates a service with an explicit configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn TriggerStore>, config: EngineConfig) -> Self {
        Self {
            registry: AssetRegistry::new(store.clone()),
            log: EventLog::new(store.clone()),
            queue: TriggerQueue::new(store.clone()),
            store,
            config,
        }
    }

    /// The asset registry component.
    #[must_use]
    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// The trigger queue component.
    #[must_use]
    pub fn queue(&self) -> &TriggerQueue {
        &self.queue
    }

    /// The underlying store, for collaborators that manage dependency
    /// edges (workflow-definition loading).
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TriggerStore> {
        &self.store
    }

    // --- Assets ---

    /// Registers an asset, or refreshes its metadata if the URI exists.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty URI.
    pub async fn register_asset(&self, spec: &AssetSpec) -> Result<AssetRecord> {
        self.registry.register(spec).await
    }

    /// Gets an asset with its dependency references.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetNotFound`] for an unregistered URI.
    pub async fn get_asset(&self, uri: &str) -> Result<AssetDetail> {
        self.registry.get(uri).await
    }

    /// Lists assets with validated ordering and clamped pagination.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOrdering`] for an unknown `order_by`
    /// attribute.
    pub async fn list_assets(
        &self,
        filter: AssetFilter,
        order_by: &str,
        page: PageRequest,
    ) -> Result<Page<AssetRecord>> {
        let query = AssetQuery {
            filter,
            order_by: OrderBy::parse(order_by, ASSET_SORT_KEYS)?,
            limit: self.config.effective_limit(page.limit),
            offset: page.offset,
        };
        self.registry.list(&query).await
    }

    // --- Events ---

    /// Records an asset-update event; the trigger pipeline runs inside the
    /// same atomic unit. The returned metadata is masked per configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetNotFound`] for an unregistered URI; on any
    /// error nothing was persisted and the producer may retry safely.
    pub async fn record_event(
        &self,
        asset_uri: &str,
        source: EventSource,
        extra: ExtraMap,
    ) -> Result<AssetEventDetail> {
        let detail = self.log.record_event(asset_uri, source, extra).await?;
        Ok(self.masked(detail))
    }

    /// Lists events with validated ordering and clamped pagination.
    /// Metadata is masked per configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOrdering`] for an unknown `order_by`
    /// attribute.
    pub async fn list_events(
        &self,
        filter: EventFilter,
        order_by: &str,
        page: PageRequest,
    ) -> Result<Page<AssetEventDetail>> {
        let query = EventQuery {
            filter,
            order_by: OrderBy::parse(order_by, EVENT_SORT_KEYS)?,
            limit: self.config.effective_limit(page.limit),
            offset: page.offset,
        };
        let page = self.log.list(&query).await?;
        Ok(page.map(|detail| self.masked(detail)))
    }

    // --- Queued markers (administrative) ---

    /// Gets one queued marker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetNotFound`] for an unregistered URI and
    /// [`Error::MarkerNotFound`] when no marker exists for the pair.
    pub async fn queued_marker(&self, dag_id: &str, asset_uri: &str) -> Result<QueuedMarkerView> {
        let asset = self.resolve_asset(asset_uri).await?;
        let markers = self.queue.list(Some(dag_id), Some(asset.id)).await?;
        markers
            .into_iter()
            .next()
            .map(|marker| QueuedMarkerView {
                dag_id: marker.target_dag_id,
                asset_uri: asset.uri.clone(),
                created_at: marker.created_at,
                source_event_id: marker.source_event_id,
            })
            .ok_or_else(|| Error::MarkerNotFound {
                dag_id: dag_id.to_string(),
                asset_uri: asset_uri.to_string(),
            })
    }

    /// Lists queued markers, optionally filtered by workflow and/or asset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetNotFound`] if an asset filter names an
    /// unregistered URI.
    pub async fn list_queued_markers(
        &self,
        dag_id: Option<&str>,
        asset_uri: Option<&str>,
    ) -> Result<Vec<QueuedMarkerView>> {
        let asset_id = match asset_uri {
            Some(uri) => Some(self.resolve_asset(uri).await?.id),
            None => None,
        };

        let markers = self.queue.list(dag_id, asset_id).await?;
        let mut views = Vec::with_capacity(markers.len());
        for marker in markers {
            let uri = self
                .store
                .asset_by_id(marker.asset_id)
                .await?
                .map(|asset| asset.uri)
                .ok_or_else(|| Error::storage("queued marker references a missing asset"))?;
            views.push(QueuedMarkerView {
                dag_id: marker.target_dag_id,
                asset_uri: uri,
                created_at: marker.created_at,
                source_event_id: marker.source_event_id,
            });
        }
        Ok(views)
    }

    /// Deletes one queued marker, bypassing the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetNotFound`] for an unregistered URI and
    /// [`Error::MarkerNotFound`] when no marker exists for the pair.
    pub async fn delete_queued_marker(&self, dag_id: &str, asset_uri: &str) -> Result<()> {
        let asset = self.resolve_asset(asset_uri).await?;
        if self.queue.delete(dag_id, asset.id).await? {
            Ok(())
        } else {
            Err(Error::MarkerNotFound {
                dag_id: dag_id.to_string(),
                asset_uri: asset_uri.to_string(),
            })
        }
    }

    /// Deletes all of a workflow's queued markers, bypassing the scheduler.
    /// Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn delete_queued_markers_for_dag(&self, dag_id: &str) -> Result<u64> {
        self.queue.delete_all_for_dag(dag_id).await
    }

    async fn resolve_asset(&self, uri: &str) -> Result<AssetRecord> {
        self.store
            .asset_by_uri(uri)
            .await?
            .ok_or_else(|| Error::asset_not_found(uri))
    }

    fn masked(&self, mut detail: AssetEventDetail) -> AssetEventDetail {
        if self.config.mask_sensitive_extra {
            detail.event.extra = mask_extra(&detail.event.extra);
        }
        detail
    }
}

impl std::fmt::Debug for TriggerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
