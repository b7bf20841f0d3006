//! The canonical asset registry.

use std::sync::Arc;

use chrono::Utc;

use crate::asset::{AssetDetail, AssetRecord, AssetSpec, ExtraMap};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::query::{AssetQuery, Page};
use crate::store::TriggerStore;

/// Canonical store of asset identities and metadata.
///
/// The URI is the identity: registration is idempotent per URI, and a
/// re-registration refreshes mutable metadata without minting a new id.
#[derive(Clone)]
pub struct AssetRegistry {
    store: Arc<dyn TriggerStore>,
    graph: DependencyGraph,
}

impl AssetRegistry {
    /// Creates a registry over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn TriggerStore>) -> Self {
        Self {
            graph: DependencyGraph::new(store.clone()),
            store,
        }
    }

    /// Registers an asset, or refreshes its metadata if the URI exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI is empty or the store write fails.
    #[tracing::instrument(skip(self, spec), fields(uri = %spec.uri))]
    pub async fn register(&self, spec: &AssetSpec) -> Result<AssetRecord> {
        if spec.uri.trim().is_empty() {
            return Err(Error::validation("asset URI must not be empty"));
        }
        self.store.upsert_asset(spec, Utc::now()).await
    }

    /// Gets an asset with its dependency-graph references.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetNotFound`] for an unregistered URI.
    pub async fn get(&self, uri: &str) -> Result<AssetDetail> {
        let asset = self
            .store
            .asset_by_uri(uri)
            .await?
            .ok_or_else(|| Error::asset_not_found(uri))?;

        let (schedule, producing_tasks) = self.graph.references_for(asset.id).await?;
        let mut consuming_dags: Vec<String> =
            schedule.into_iter().map(|r| r.dag_id).collect();
        consuming_dags.sort_unstable();
        consuming_dags.dedup();

        Ok(AssetDetail {
            asset,
            consuming_dags,
            producing_tasks,
        })
    }

    /// Replaces an asset's metadata map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetNotFound`] for an unregistered URI.
    pub async fn update_extra(&self, uri: &str, extra: ExtraMap) -> Result<AssetRecord> {
        self.store.update_asset_extra(uri, extra, Utc::now()).await
    }

    /// Lists assets matching the query. Pure read.
    ///
    /// Ordering has already been validated when the [`AssetQuery`] was
    /// built; unknown attributes never reach the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn list(&self, query: &AssetQuery) -> Result<Page<AssetRecord>> {
        self.store.list_assets(query).await
    }
}

impl std::fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn registry() -> (AssetRegistry, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (AssetRegistry::new(store.clone()), store)
    }

    #[tokio::test]
    async fn register_is_idempotent_per_uri() -> Result<()> {
        let (registry, _) = registry();

        let first = registry.register(&AssetSpec::new("s3://bucket/key")).await?;
        let second = registry
            .register(&AssetSpec::new("s3://bucket/key").with_name("renamed"))
            .await?;

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.name, "renamed");
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_empty_uri() {
        let (registry, _) = registry();
        let result = registry.register(&AssetSpec::new("  ")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn get_returns_references() -> Result<()> {
        let (registry, store) = registry();
        registry.register(&AssetSpec::new("s3://bucket/key")).await?;
        store.add_schedule_ref("consumer", "s3://bucket/key").await?;
        store
            .add_outlet_ref("producer", "emit", "s3://bucket/key")
            .await?;

        let detail = registry.get("s3://bucket/key").await?;
        assert_eq!(detail.consuming_dags, vec!["consumer"]);
        assert_eq!(detail.producing_tasks.len(), 1);
        assert_eq!(detail.producing_tasks[0].dag_id, "producer");
        Ok(())
    }

    #[tokio::test]
    async fn get_unknown_uri_is_not_found() {
        let (registry, _) = registry();
        let result = registry.get("s3://bucket/key").await;
        match result {
            Err(Error::AssetNotFound { uri }) => assert_eq!(uri, "s3://bucket/key"),
            other => panic!("expected AssetNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_extra_replaces_map() -> Result<()> {
        let (registry, _) = registry();
        registry.register(&AssetSpec::new("s3://bucket/key")).await?;

        let mut extra = ExtraMap::new();
        extra.insert("owner".into(), serde_json::Value::String("data-eng".into()));
        let updated = registry.update_extra("s3://bucket/key", extra).await?;
        assert_eq!(updated.extra["owner"], "data-eng");
        Ok(())
    }
}
