//! Asset records and registration specs.
//!
//! An asset is a named, externally addressed data artifact. Its URI is the
//! public identity and is immutable once registered; name, group, and the
//! free-form `extra` map are mutable metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tributary_core::AssetId;

use crate::graph::OutletAssetRef;

/// Free-form metadata map carried by assets and events.
pub type ExtraMap = serde_json::Map<String, serde_json::Value>;

/// Group label applied when a registration does not name one.
pub const DEFAULT_ASSET_GROUP: &str = "asset";

/// A registered asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Stable internal identifier.
    pub id: AssetId,
    /// Globally unique URI; immutable once created.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Group label.
    pub group: String,
    /// Free-form metadata.
    pub extra: ExtraMap,
    /// When the asset was first registered.
    pub created_at: DateTime<Utc>,
    /// When the asset's metadata last changed.
    pub updated_at: DateTime<Utc>,
}

/// Input for registering (or idempotently re-registering) an asset.
///
/// Omitted fields take defaults: the name falls back to the URI and the
/// group to [`DEFAULT_ASSET_GROUP`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Globally unique URI.
    pub uri: String,
    /// Display name; defaults to the URI.
    pub name: Option<String>,
    /// Group label; defaults to [`DEFAULT_ASSET_GROUP`].
    pub group: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub extra: ExtraMap,
}

impl AssetSpec {
    /// Creates a spec for the given URI with default metadata.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the group label.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets the metadata map.
    #[must_use]
    pub fn with_extra(mut self, extra: ExtraMap) -> Self {
        self.extra = extra;
        self
    }

    /// Returns the display name, falling back to the URI.
    #[must_use]
    pub fn resolved_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uri)
    }

    /// Returns the group label, falling back to [`DEFAULT_ASSET_GROUP`].
    #[must_use]
    pub fn resolved_group(&self) -> &str {
        self.group.as_deref().unwrap_or(DEFAULT_ASSET_GROUP)
    }
}

/// An asset together with its dependency-graph references.
///
/// `consuming_dags` lists the workflows with a schedule reference to the
/// asset; `producing_tasks` lists the task outlet references that update it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDetail {
    /// The asset record.
    pub asset: AssetRecord,
    /// Workflows that consume this asset conjunctively.
    pub consuming_dags: Vec<String>,
    /// Tasks declared to update this asset.
    pub producing_tasks: Vec<OutletAssetRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_defaults_fall_back_to_uri_and_group() {
        let spec = AssetSpec::new("s3://bucket/key");
        assert_eq!(spec.resolved_name(), "s3://bucket/key");
        assert_eq!(spec.resolved_group(), DEFAULT_ASSET_GROUP);
    }

    #[test]
    fn spec_builders_override_defaults() {
        let spec = AssetSpec::new("s3://bucket/key")
            .with_name("daily-export")
            .with_group("exports");
        assert_eq!(spec.resolved_name(), "daily-export");
        assert_eq!(spec.resolved_group(), "exports");
    }

    #[test]
    fn record_serde_round_trip() {
        let mut extra = ExtraMap::new();
        extra.insert("foo".into(), serde_json::Value::String("bar".into()));
        let record = AssetRecord {
            id: AssetId::generate(),
            uri: "s3://bucket/key".into(),
            name: "asset-name".into(),
            group: DEFAULT_ASSET_GROUP.into(),
            extra,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: AssetRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
