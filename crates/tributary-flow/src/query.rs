//! List queries: filters, ordering validation, and pagination.
//!
//! Ordering is validated against a per-surface whitelist before any store
//! access; unknown attributes are rejected with
//! [`Error::InvalidOrdering`](crate::error::Error::InvalidOrdering) rather
//! than silently falling back to a default.

use tributary_core::AssetId;

use crate::error::{Error, Result};

/// Attributes assets may be ordered by.
pub const ASSET_SORT_KEYS: &[&str] = &["id", "uri", "name", "group", "created_at", "updated_at"];

/// Attributes events may be ordered by.
pub const EVENT_SORT_KEYS: &[&str] = &[
    "id",
    "timestamp",
    "asset_id",
    "source_dag_id",
    "source_task_id",
    "source_run_id",
    "source_map_index",
];

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// A validated ordering clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    /// The whitelisted attribute to sort by.
    pub field: &'static str,
    /// Sort direction.
    pub direction: SortDirection,
}

impl OrderBy {
    /// Parses a raw `order_by` value against a whitelist.
    ///
    /// A `-` prefix requests descending order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOrdering`] when the attribute is not in the
    /// whitelist.
    pub fn parse(raw: &str, allowed: &'static [&'static str]) -> Result<Self> {
        let (direction, attribute) = match raw.strip_prefix('-') {
            Some(rest) => (SortDirection::Descending, rest),
            None => (SortDirection::Ascending, raw),
        };

        allowed
            .iter()
            .find(|key| **key == attribute)
            .map(|key| Self {
                field: key,
                direction,
            })
            .ok_or_else(|| Error::InvalidOrdering {
                attribute: attribute.to_string(),
            })
    }

    /// Default ordering: ascending by `id`.
    #[must_use]
    pub const fn by_id() -> Self {
        Self {
            field: "id",
            direction: SortDirection::Ascending,
        }
    }
}

impl Default for OrderBy {
    fn default() -> Self {
        Self::by_id()
    }
}

/// A requested page slice.
///
/// The limit is optional; the service resolves it against
/// [`EngineConfig`](crate::config::EngineConfig) bounds before queries
/// reach the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Requested page size; engine default when absent.
    pub limit: Option<u32>,
    /// Rows to skip before the page starts.
    pub offset: u32,
}

impl PageRequest {
    /// A request for the first page at the engine's default size.
    #[must_use]
    pub const fn first() -> Self {
        Self {
            limit: None,
            offset: 0,
        }
    }

    /// A request for an explicit slice.
    #[must_use]
    pub const fn slice(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }
}

/// One page of results plus the total count independent of the slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// The page slice, in query order.
    pub items: Vec<T>,
    /// Total matching rows, ignoring limit/offset.
    pub total_entries: u64,
}

impl<T> Page<T> {
    /// Maps the page items, keeping the total count.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_entries: self.total_entries,
        }
    }
}

/// Filters for asset listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    /// Substring match on the asset URI; empty matches everything.
    pub uri_pattern: Option<String>,
    /// Restrict to assets referenced by any of these workflows, through
    /// either schedule (consuming) or outlet (producing) references.
    pub dag_ids: Option<Vec<String>>,
}

/// A fully resolved asset list query, ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetQuery {
    /// Row filters.
    pub filter: AssetFilter,
    /// Validated ordering.
    pub order_by: OrderBy,
    /// Effective page size.
    pub limit: u32,
    /// Rows to skip.
    pub offset: u32,
}

/// Filters for event listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Restrict to one asset.
    pub asset_id: Option<AssetId>,
    /// Restrict by producing workflow.
    pub source_dag_id: Option<String>,
    /// Restrict by producing task.
    pub source_task_id: Option<String>,
    /// Restrict by producing run.
    pub source_run_id: Option<String>,
    /// Restrict by map index of the producing task instance.
    pub source_map_index: Option<i64>,
}

/// A fully resolved event list query, ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Row filters.
    pub filter: EventFilter,
    /// Validated ordering.
    pub order_by: OrderBy,
    /// Effective page size.
    pub limit: u32,
    /// Rows to skip.
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_whitelisted_attribute() -> Result<()> {
        let order = OrderBy::parse("uri", ASSET_SORT_KEYS)?;
        assert_eq!(order.field, "uri");
        assert_eq!(order.direction, SortDirection::Ascending);
        Ok(())
    }

    #[test]
    fn parse_accepts_descending_prefix() -> Result<()> {
        let order = OrderBy::parse("-timestamp", EVENT_SORT_KEYS)?;
        assert_eq!(order.field, "timestamp");
        assert_eq!(order.direction, SortDirection::Descending);
        Ok(())
    }

    #[test]
    fn parse_rejects_unknown_attribute() {
        let result = OrderBy::parse("fake", ASSET_SORT_KEYS);
        match result {
            Err(Error::InvalidOrdering { attribute }) => assert_eq!(attribute, "fake"),
            other => panic!("expected InvalidOrdering, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_unknown_attribute_with_prefix() {
        let result = OrderBy::parse("-fake", EVENT_SORT_KEYS);
        assert!(matches!(result, Err(Error::InvalidOrdering { .. })));
    }

    #[test]
    fn page_map_keeps_total() {
        let page = Page {
            items: vec![1, 2, 3],
            total_entries: 10,
        };
        let mapped = page.map(|n| n * 2);
        assert_eq!(mapped.items, vec![2, 4, 6]);
        assert_eq!(mapped.total_entries, 10);
    }
}
