//! Shadow store: the mirror rebuilt from notifications
//!
//! Same shape as a [`Snapshot`], but mutated one notification at a time.
//! The three mutators keep one invariant at all times: no object without
//! interfaces and no interface without properties is ever stored in the
//! tree. Interfaces announced without properties are remembered by name
//! only, so they can still be removed and matched against a snapshot.

use crate::path::{InterfaceName, ObjectPath, PropertyName};
use crate::tree::{prune_interfaces, Interfaces, ObjectTree, Properties, Snapshot};
use std::collections::{BTreeMap, BTreeSet};

/// Fully qualified property key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey {
    /// Object carrying the property
    pub path: ObjectPath,
    /// Interface carrying the property
    pub interface: InterfaceName,
    /// Property name
    pub property: PropertyName,
}

/// What a removal actually did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Interfaces that were present and got removed
    pub removed: Vec<InterfaceName>,
    /// Interfaces named in the request that the object did not carry
    pub unknown: Vec<InterfaceName>,
    /// Whether the object itself was deleted because it ran out of interfaces
    pub object_deleted: bool,
}

/// Errors from shadow store mutation
///
/// These are precondition violations by the producer: the mirror was asked
/// to change something it never learned about.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShadowError {
    /// Object path not present
    #[error("unknown object {0}")]
    UnknownObject(ObjectPath),

    /// Interface not present on a known object
    #[error("unknown interface {interface} on object {path}")]
    UnknownInterface {
        /// Object that was found
        path: ObjectPath,
        /// Interface that was not
        interface: InterfaceName,
    },
}

/// Mirror of the remote object graph built from notifications
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowStore {
    objects: ObjectTree,
    bare: BTreeMap<ObjectPath, BTreeSet<InterfaceName>>,
    invalidated: BTreeSet<PropertyKey>,
}

impl ShadowStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self::from_tree(snapshot.into_tree())
    }

    /// Seed the store from a raw tree, as if every object had been added
    #[must_use]
    pub fn from_tree(tree: ObjectTree) -> Self {
        let mut store = Self::new();
        for (path, interfaces) in tree {
            store.insert_object(path, interfaces);
        }
        store
    }

    /// Insert or overwrite an object with the given interfaces
    ///
    /// Interfaces without properties are kept by name only. If no interface
    /// has properties the object has no tree entry. Invalidated keys of the
    /// old entry are forgotten. Returns the previous tree entry, if any.
    pub fn insert_object(
        &mut self,
        path: ObjectPath,
        mut interfaces: Interfaces,
    ) -> Option<Interfaces> {
        self.forget_invalidated(&path, None);

        let bare = prune_interfaces(&mut interfaces);
        if bare.is_empty() {
            self.bare.remove(&path);
        } else {
            self.bare.insert(path.clone(), bare);
        }

        if interfaces.is_empty() {
            return self.objects.remove(&path);
        }
        self.objects.insert(path, interfaces)
    }

    /// Remove the named interfaces from an object
    ///
    /// Deletes the object when no interface remains.
    ///
    /// # Errors
    /// Returns [`ShadowError::UnknownObject`] if the object is not present.
    /// Unknown interface names on a known object are reported in
    /// [`Removal::unknown`] rather than as an error.
    pub fn remove_interfaces(
        &mut self,
        path: &ObjectPath,
        names: &[InterfaceName],
    ) -> Result<Removal, ShadowError> {
        if !self.contains(path) {
            return Err(ShadowError::UnknownObject(path.clone()));
        }

        let mut removal = Removal::default();
        for name in names {
            let had_properties = self
                .objects
                .get_mut(path)
                .is_some_and(|entry| entry.remove(name).is_some());
            let was_bare = self.bare.get_mut(path).is_some_and(|set| set.remove(name));

            if had_properties || was_bare {
                self.forget_invalidated(path, Some(name));
                removal.removed.push(name.clone());
            } else {
                removal.unknown.push(name.clone());
            }
        }

        if self.objects.get(path).is_some_and(BTreeMap::is_empty) {
            self.objects.remove(path);
        }
        if self.bare.get(path).is_some_and(BTreeSet::is_empty) {
            self.bare.remove(path);
        }
        removal.object_deleted = !self.contains(path);
        Ok(removal)
    }

    /// Merge changed properties into an existing interface
    ///
    /// `invalidated` names are remembered for diagnostics only; they never
    /// delete anything. A property that shows up again in `changed` stops
    /// being tracked as invalidated. An interface known by name only gets
    /// its first properties here. Returns the number of properties written.
    ///
    /// # Errors
    /// Returns an error if the object or the interface is unknown.
    pub fn merge_properties(
        &mut self,
        path: &ObjectPath,
        interface: &InterfaceName,
        changed: Properties,
        invalidated: &[PropertyName],
    ) -> Result<usize, ShadowError> {
        if !self.contains(path) {
            return Err(ShadowError::UnknownObject(path.clone()));
        }
        let has_properties = self
            .objects
            .get(path)
            .is_some_and(|entry| entry.contains_key(interface));
        if !has_properties && !self.is_bare(path, interface) {
            return Err(ShadowError::UnknownInterface {
                path: path.clone(),
                interface: interface.clone(),
            });
        }

        for property in invalidated {
            self.invalidated.insert(PropertyKey {
                path: path.clone(),
                interface: interface.clone(),
                property: property.clone(),
            });
        }

        let written = changed.len();
        if written == 0 {
            return Ok(0);
        }

        if !has_properties {
            if let Some(set) = self.bare.get_mut(path) {
                set.remove(interface);
                if set.is_empty() {
                    self.bare.remove(path);
                }
            }
        }

        let props = self
            .objects
            .entry(path.clone())
            .or_default()
            .entry(interface.clone())
            .or_default();
        for (property, value) in changed {
            self.invalidated.remove(&PropertyKey {
                path: path.clone(),
                interface: interface.clone(),
                property: property.clone(),
            });
            props.insert(property, value);
        }
        Ok(written)
    }

    /// Drop invalidated keys under `path`, or under one interface of it
    fn forget_invalidated(&mut self, path: &ObjectPath, interface: Option<&InterfaceName>) {
        self.invalidated.retain(|key| {
            key.path != *path || interface.is_some_and(|name| key.interface != *name)
        });
    }

    fn is_bare(&self, path: &ObjectPath, interface: &InterfaceName) -> bool {
        self.bare
            .get(path)
            .is_some_and(|set| set.contains(interface))
    }

    /// Borrow the tree of interfaces that carry properties
    #[inline]
    #[must_use]
    pub fn objects(&self) -> &ObjectTree {
        &self.objects
    }

    /// Interfaces announced without properties, per object
    #[inline]
    #[must_use]
    pub fn bare_interfaces(&self) -> &BTreeMap<ObjectPath, BTreeSet<InterfaceName>> {
        &self.bare
    }

    /// Look up the interfaces of one object that carry properties
    #[inline]
    #[must_use]
    pub fn get(&self, path: &ObjectPath) -> Option<&Interfaces> {
        self.objects.get(path)
    }

    /// Every object path present, in order
    #[must_use]
    pub fn paths(&self) -> BTreeSet<&ObjectPath> {
        self.objects.keys().chain(self.bare.keys()).collect()
    }

    /// Every interface name of one object, with or without properties
    #[must_use]
    pub fn interface_names(&self, path: &ObjectPath) -> BTreeSet<&InterfaceName> {
        let with_properties = self.objects.get(path).into_iter().flat_map(|entry| entry.keys());
        let bare = self.bare.get(path).into_iter().flatten();
        with_properties.chain(bare).collect()
    }

    /// Whether an object is present
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &ObjectPath) -> bool {
        self.objects.contains_key(path) || self.bare.contains_key(path)
    }

    /// Number of objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths().len()
    }

    /// Whether the store holds no objects
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.bare.is_empty()
    }

    /// Properties reported invalidated and not re-sent since
    #[inline]
    #[must_use]
    pub fn invalidated(&self) -> &BTreeSet<PropertyKey> {
        &self.invalidated
    }

    /// Full tree, with property-less interfaces as empty entries
    #[must_use]
    pub fn copy_tree(&self) -> ObjectTree {
        let mut tree = self.objects.clone();
        for (path, names) in &self.bare {
            let entry = tree.entry(path.clone()).or_default();
            for name in names {
                entry.entry(name.clone()).or_default();
            }
        }
        tree
    }
}
