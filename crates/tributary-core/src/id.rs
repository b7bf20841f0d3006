//! Strongly-typed identifiers for tributary entities.
//!
//! All identifiers are:
//! - **Strongly typed**: Prevents mixing up different ID types at compile time
//! - **Lexicographically sortable**: ULIDs encode creation time and sort naturally
//! - **Globally unique**: No coordination required for generation
//!
//! Workflow and task identifiers are deliberately *not* defined here: those
//! names are owned by the workflow-definition layer and arrive as plain
//! strings.
//!
//! # Example
//!
//! ```rust
//! use tributary_core::id::{AssetId, EventId};
//!
//! let asset = AssetId::generate();
//! let event = EventId::generate();
//!
//! // IDs are different types - this won't compile:
//! // let wrong: AssetId = event;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

macro_rules! ulid_id {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a new unique identifier.
            ///
            /// Uses ULID generation which is:
            /// - Lexicographically sortable by creation time
            /// - Globally unique without coordination
            /// - URL-safe and case-insensitive
            #[must_use]
            pub fn generate() -> Self {
                Self(Ulid::new())
            }

            /// Creates an identifier from a raw ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the creation timestamp encoded in the ID.
            #[must_use]
            pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                #[allow(clippy::cast_possible_wrap)]
                let ms = self.0.timestamp_ms() as i64;
                chrono::DateTime::from_timestamp_millis(ms).unwrap_or_else(chrono::Utc::now)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Ulid::from_string(s)
                    .map(Self)
                    .map_err(|e| Error::InvalidId {
                        message: format!(concat!("invalid ", $label, " ID '{}': {}"), s, e),
                    })
            }
        }
    };
}

ulid_id!(
    /// A unique identifier for a tracked asset.
    ///
    /// Assets are named, externally addressed data artifacts. The asset's
    /// URI is its public identity; this ID is the stable internal key that
    /// events, dependency edges, and fulfillment markers reference.
    AssetId,
    "asset"
);

ulid_id!(
    /// A unique identifier for an asset-update event.
    ///
    /// Events are append-only facts; their IDs sort in creation order.
    EventId,
    "event"
);

ulid_id!(
    /// A unique identifier for a workflow run.
    ///
    /// Runs created by the trigger engine are always asset-triggered; the
    /// same ID space is shared with runs created by other trigger sources.
    RunId,
    "run"
);
