//! Object trees and snapshots
//!
//! An [`ObjectTree`] maps object path → interface → property → value. A
//! [`Snapshot`] is an immutable tree produced in one piece by the
//! authoritative full-state query.

use crate::path::{InterfaceName, ObjectPath, PropertyName};
use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Properties of one interface
pub type Properties = BTreeMap<PropertyName, PropertyValue>;

/// Interfaces of one object
pub type Interfaces = BTreeMap<InterfaceName, Properties>;

/// Full object graph
pub type ObjectTree = BTreeMap<ObjectPath, Interfaces>;

/// Drop interfaces that carry no properties, returning their names
pub fn prune_interfaces(interfaces: &mut Interfaces) -> BTreeSet<InterfaceName> {
    let mut pruned = BTreeSet::new();
    interfaces.retain(|name, props| {
        if props.is_empty() {
            pruned.insert(name.clone());
            false
        } else {
            true
        }
    });
    pruned
}

/// Check that no object is empty and no interface is empty
#[must_use]
pub fn is_well_formed(tree: &ObjectTree) -> bool {
    tree.values()
        .all(|ifaces| !ifaces.is_empty() && ifaces.values().all(|props| !props.is_empty()))
}

/// Count every property in a tree
#[must_use]
pub fn property_count(tree: &ObjectTree) -> usize {
    tree.values()
        .flat_map(BTreeMap::values)
        .map(BTreeMap::len)
        .sum()
}

/// Point-in-time state returned by the full-state query
///
/// Immutable once built and kept exactly as received: interfaces without
/// properties are part of the ground truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ObjectTree", into = "ObjectTree")]
pub struct Snapshot {
    objects: ObjectTree,
}

impl Snapshot {
    /// Build a snapshot from a raw tree
    #[must_use]
    pub fn new(objects: ObjectTree) -> Self {
        Self { objects }
    }

    /// Borrow the object tree
    #[inline]
    #[must_use]
    pub fn objects(&self) -> &ObjectTree {
        &self.objects
    }

    /// Look up one object
    #[inline]
    #[must_use]
    pub fn get(&self, path: &ObjectPath) -> Option<&Interfaces> {
        self.objects.get(path)
    }

    /// Number of objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the snapshot holds no objects
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Take the underlying tree
    #[inline]
    #[must_use]
    pub fn into_tree(self) -> ObjectTree {
        self.objects
    }
}

impl From<ObjectTree> for Snapshot {
    fn from(objects: ObjectTree) -> Self {
        Self::new(objects)
    }
}

impl From<Snapshot> for ObjectTree {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.objects
    }
}
