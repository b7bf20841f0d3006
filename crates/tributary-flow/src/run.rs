//! Triggered workflow runs.
//!
//! The engine creates runs of kind [`RunKind::AssetTriggered`] only; the
//! other kinds exist because the run table is shared with the external
//! scheduler loop, which owns run execution and state advancement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tributary_core::RunId;

/// How a run came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunKind {
    /// Created by the trigger engine from satisfied asset dependencies.
    AssetTriggered,
    /// User-initiated.
    Manual,
    /// Cron/schedule-based.
    Scheduled,
    /// Historical data backfill.
    Backfill,
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssetTriggered => write!(f, "ASSET_TRIGGERED"),
            Self::Manual => write!(f, "MANUAL"),
            Self::Scheduled => write!(f, "SCHEDULED"),
            Self::Backfill => write!(f, "BACKFILL"),
        }
    }
}

/// Run lifecycle states.
///
/// The engine creates runs as `Queued`; everything after that belongs to
/// the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Created, waiting for the executor to pick it up.
    Queued,
    /// Actively executing.
    Running,
    /// Completed successfully.
    Succeeded,
    /// Completed with failures.
    Failed,
}

impl RunState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::Queued
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "QUEUED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A workflow run created by the trigger engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredRun {
    /// Unique run identifier.
    pub id: RunId,
    /// The workflow this run executes.
    pub dag_id: String,
    /// What created the run.
    pub kind: RunKind,
    /// Current lifecycle state.
    pub state: RunState,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// When execution started, once it has.
    pub started_at: Option<DateTime<Utc>>,
    /// When execution finished, once it has.
    pub ended_at: Option<DateTime<Utc>>,
}

impl TriggeredRun {
    /// Creates a queued run attributed to satisfied asset dependencies.
    #[must_use]
    pub fn asset_triggered(dag_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: RunId::generate(),
            dag_id: dag_id.into(),
            kind: RunKind::AssetTriggered,
            state: RunState::default(),
            created_at: now,
            started_at: None,
            ended_at: None,
        }
    }

    /// Projects the run into the read-model summary embedded in event reads.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            dag_id: self.dag_id.clone(),
            run_id: self.id,
            state: self.state,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Read-model projection of a run, embedded in event details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// The workflow the run executes.
    pub dag_id: String,
    /// The run identifier.
    pub run_id: RunId,
    /// Lifecycle state at read time.
    pub state: RunState,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// When execution started, once it has.
    pub started_at: Option<DateTime<Utc>>,
    /// When execution finished, once it has.
    pub ended_at: Option<DateTime<Utc>>,
}
