//! Notification listener
//!
//! Owns the [`ShadowStore`] and the pending queues. Every notification
//! marks the stream active; before the store is live it is queued, after
//! that it is applied. Applying an event first drains whatever is still
//! queued for its kind, so per-kind order is always arrival order.

use crate::scheduler::Activity;
use sigwatch_model::{
    EventKind, InterfaceName, Interfaces, ObjectPath, PendingEvent, PendingQueues, Properties,
    PropertyName, ShadowError, ShadowStore, Snapshot,
};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Counters kept by the listener
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Add events applied
    pub added: u64,
    /// Remove events that deleted at least one interface
    pub removed: u64,
    /// Update events merged into a known interface
    pub updated: u64,
    /// Events queued before the store went live
    pub buffered: u64,
    /// Precondition violations (unknown object or interface)
    pub anomalies: u64,
    /// Updates ignored because they were outside the root path
    pub ignored: u64,
}

impl ListenerStats {
    fn record_applied(&mut self, kind: EventKind) {
        match kind {
            EventKind::Add => self.added += 1,
            EventKind::Remove => self.removed += 1,
            EventKind::Update => self.updated += 1,
        }
    }
}

/// Receives the three notification kinds and maintains the shadow store
#[derive(Debug)]
pub struct Listener {
    store: ShadowStore,
    pending: PendingQueues,
    live: bool,
    activity: Activity,
    stats: ListenerStats,
    root: ObjectPath,
}

impl Listener {
    /// Create a listener in buffering mode
    ///
    /// Property updates for objects outside `root` are ignored.
    #[must_use]
    pub fn new(root: ObjectPath, now: Instant) -> Self {
        Self {
            store: ShadowStore::new(),
            pending: PendingQueues::new(),
            live: false,
            activity: Activity::new(now),
            stats: ListenerStats::default(),
            root,
        }
    }

    /// `InterfacesAdded`: overwrite `path` with `interfaces`
    pub fn on_added(&mut self, path: ObjectPath, interfaces: Interfaces, now: Instant) {
        self.handle(PendingEvent::Add { path, interfaces }, now);
    }

    /// `InterfacesRemoved`: drop the named interfaces from `path`
    pub fn on_removed(&mut self, path: ObjectPath, interfaces: Vec<InterfaceName>, now: Instant) {
        self.handle(PendingEvent::Remove { path, interfaces }, now);
    }

    /// `PropertiesChanged`: merge `changed` into `path`/`interface`
    pub fn on_properties_changed(
        &mut self,
        path: ObjectPath,
        interface: InterfaceName,
        changed: Properties,
        invalidated: Vec<PropertyName>,
        now: Instant,
    ) {
        self.handle(
            PendingEvent::Update {
                path,
                interface,
                changed,
                invalidated,
            },
            now,
        );
    }

    /// Route an event to the matching entry point
    pub fn dispatch(&mut self, event: PendingEvent, now: Instant) {
        self.handle(event, now);
    }

    fn handle(&mut self, event: PendingEvent, now: Instant) {
        if event.kind() == EventKind::Update && !event.path().is_under(&self.root) {
            trace!(path = %event.path(), "Ignoring property change outside root path");
            self.stats.ignored += 1;
            return;
        }

        self.activity.touch(now);

        if !self.live {
            trace!(kind = %event.kind(), path = %event.path(), "Buffering event until shadow store is live");
            self.stats.buffered += 1;
            self.pending.push(event);
            return;
        }

        for queued in self.pending.drain(event.kind()) {
            self.apply(queued);
        }
        self.apply(event);
    }

    /// Seed the store and switch to live mode
    ///
    /// Queued events are applied kind by kind (adds, then removes, then
    /// updates), each kind in arrival order. Returns the number drained.
    pub(crate) fn install(&mut self, snapshot: Snapshot) -> usize {
        self.store = ShadowStore::from_snapshot(snapshot);
        self.live = true;

        let queued = self.pending.drain_all();
        let drained = queued.len();
        for event in queued {
            self.apply(event);
        }
        drained
    }

    fn apply(&mut self, event: PendingEvent) {
        let kind = event.kind();
        let applied = match event {
            PendingEvent::Add { path, interfaces } => {
                debug!(path = %path, interfaces = interfaces.len(), "Object add");
                self.store.insert_object(path, interfaces);
                true
            }
            PendingEvent::Remove { path, interfaces } => {
                match self.store.remove_interfaces(&path, &interfaces) {
                    Ok(removal) => {
                        for interface in &removal.removed {
                            debug!(path = %path, interface = %interface, "Object interface deleted");
                        }
                        for interface in &removal.unknown {
                            warn!(path = %path, interface = %interface, "Got a remove for an interface the shadow store does not have");
                            self.stats.anomalies += 1;
                        }
                        if removal.object_deleted {
                            debug!(path = %path, "Object del");
                        }
                        !removal.removed.is_empty()
                    }
                    Err(e) => {
                        self.anomaly("remove", &e);
                        false
                    }
                }
            }
            PendingEvent::Update {
                path,
                interface,
                changed,
                invalidated,
            } => {
                for (property, value) in &changed {
                    trace!("{path}[{interface}][{property}] = {value}");
                }
                match self
                    .store
                    .merge_properties(&path, &interface, changed, &invalidated)
                {
                    Ok(_) => true,
                    Err(e) => {
                        self.anomaly("property update", &e);
                        false
                    }
                }
            }
        };
        if applied {
            self.stats.record_applied(kind);
        }
    }

    fn anomaly(&mut self, what: &str, error: &ShadowError) {
        warn!(error = %error, "Got a {what} for something the shadow store does not have");
        self.stats.anomalies += 1;
    }

    /// Whether the store has been seeded
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Read-only view of the shadow store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &ShadowStore {
        &self.store
    }

    /// Events still queued
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &PendingQueues {
        &self.pending
    }

    /// Traffic bookkeeping
    #[inline]
    #[must_use]
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    #[inline]
    pub(crate) fn activity_mut(&mut self) -> &mut Activity {
        &mut self.activity
    }

    /// Counters
    #[inline]
    #[must_use]
    pub fn stats(&self) -> ListenerStats {
        self.stats
    }
}
