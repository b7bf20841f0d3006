//! The asset dependency graph.
//!
//! Two many-to-many edge tables connect workflows to assets:
//!
//! - **Schedule references** `(dag_id, asset_id)`: the workflow consumes the
//!   asset and requires it (conjunctively with its other schedule
//!   references) before it triggers.
//! - **Outlet references** `(dag_id, task_id, asset_id)`: the task is
//!   declared to update the asset; provenance and reporting only, never
//!   part of trigger evaluation.
//!
//! This component is read-only. Edges are written by workflow-definition
//! loading, which talks to the store directly and is external to this core.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tributary_core::AssetId;

use crate::error::Result;
use crate::store::TriggerStore;

/// A consuming-workflow edge: the workflow requires this asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleAssetRef {
    /// The consuming workflow.
    pub dag_id: String,
    /// The required asset.
    pub asset_id: AssetId,
}

/// A producing-task edge: the task is declared to update this asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletAssetRef {
    /// The producing workflow.
    pub dag_id: String,
    /// The producing task within that workflow.
    pub task_id: String,
    /// The updated asset.
    pub asset_id: AssetId,
}

/// Read-side view over the dependency edge tables.
#[derive(Clone)]
pub struct DependencyGraph {
    store: Arc<dyn TriggerStore>,
}

impl DependencyGraph {
    /// Creates a graph view over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn TriggerStore>) -> Self {
        Self { store }
    }

    /// Workflows with a schedule reference to the asset, sorted by dag id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn consumers_of(&self, asset_id: AssetId) -> Result<Vec<String>> {
        self.store.consumers_of(asset_id).await
    }

    /// The full set of assets the workflow requires before it triggers.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn required_assets_of(&self, dag_id: &str) -> Result<Vec<AssetId>> {
        self.store.required_assets_of(dag_id).await
    }

    /// Both edge kinds referencing the asset, for reporting surfaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn references_for(
        &self,
        asset_id: AssetId,
    ) -> Result<(Vec<ScheduleAssetRef>, Vec<OutletAssetRef>)> {
        self.store.refs_for_asset(asset_id).await
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph").finish_non_exhaustive()
    }
}
