//! sigwatch object model
//!
//! Data shapes shared by the shadow store and the authoritative snapshot.
//!
//! # Core Concepts
//!
//! - [`ObjectPath`], [`InterfaceName`], [`PropertyName`]: tree addressing
//! - [`PropertyValue`]: structurally compared property datum
//! - [`Snapshot`]: immutable full-state tree from the authoritative query
//! - [`ShadowStore`]: mirror rebuilt incrementally from notifications
//! - [`PendingEvent`] / [`PendingQueues`]: notifications held until the mirror is seeded
//! - [`DivergenceReport`]: ordered [`Finding`]s from one comparison
//!
//! # Example
//!
//! ```rust
//! use sigwatch_model::{Interfaces, ObjectPath, ShadowStore, Snapshot};
//!
//! let snapshot = Snapshot::default();
//! let mut store = ShadowStore::from_snapshot(snapshot);
//! store.insert_object(ObjectPath::new("/o/1"), Interfaces::new());
//! assert!(store.is_empty());
//! ```

#![warn(unreachable_pub)]

mod finding;
mod path;
mod pending;
mod shadow;
mod tree;
mod value;

pub use finding::{DivergenceReport, Finding, FindingKind};
pub use path::{InterfaceName, ObjectPath, PathError, PropertyName};
pub use pending::{EventKind, PendingEvent, PendingQueues};
pub use shadow::{PropertyKey, Removal, ShadowError, ShadowStore};
pub use tree::{
    is_well_formed, property_count, prune_interfaces, Interfaces, ObjectTree,
    Properties, Snapshot,
};
pub use value::PropertyValue;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
