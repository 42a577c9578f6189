//! Notifications and the queues that hold them before the store is live

use crate::path::{InterfaceName, ObjectPath, PropertyName};
use crate::tree::{Interfaces, Properties};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};

/// One change notification from the producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingEvent {
    /// Object gained interfaces (overwrites the whole object)
    Add {
        /// Object path
        path: ObjectPath,
        /// Full interface payload
        interfaces: Interfaces,
    },
    /// Object lost interfaces
    Remove {
        /// Object path
        path: ObjectPath,
        /// Interfaces removed
        interfaces: Vec<InterfaceName>,
    },
    /// Properties of one interface changed
    Update {
        /// Object path
        path: ObjectPath,
        /// Interface whose properties changed
        interface: InterfaceName,
        /// New values
        changed: Properties,
        /// Names whose values were invalidated without being sent
        #[serde(default)]
        invalidated: Vec<PropertyName>,
    },
}

impl PendingEvent {
    /// Event kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Add { .. } => EventKind::Add,
            Self::Remove { .. } => EventKind::Remove,
            Self::Update { .. } => EventKind::Update,
        }
    }

    /// Object the event refers to
    #[inline]
    #[must_use]
    pub fn path(&self) -> &ObjectPath {
        match self {
            Self::Add { path, .. } | Self::Remove { path, .. } | Self::Update { path, .. } => path,
        }
    }
}

/// The three notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Interfaces added
    Add,
    /// Interfaces removed
    Remove,
    /// Properties changed
    Update,
}

impl EventKind {
    /// All kinds, in drain order
    pub const ALL: [EventKind; 3] = [EventKind::Add, EventKind::Remove, EventKind::Update];
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Update => "update",
        })
    }
}

/// Per-kind FIFO queues of events received before the store went live
///
/// Order is preserved within a kind only. Draining everything yields all
/// adds, then all removes, then all updates, regardless of how they were
/// interleaved on arrival.
#[derive(Debug, Clone, Default)]
pub struct PendingQueues {
    added: VecDeque<PendingEvent>,
    removed: VecDeque<PendingEvent>,
    updated: VecDeque<PendingEvent>,
}

impl PendingQueues {
    /// Create empty queues
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the queue of its kind
    pub fn push(&mut self, event: PendingEvent) {
        self.queue_mut(event.kind()).push_back(event);
    }

    /// Take every queued event of one kind, oldest first
    pub fn drain(&mut self, kind: EventKind) -> Vec<PendingEvent> {
        self.queue_mut(kind).drain(..).collect()
    }

    /// Take everything: adds, then removes, then updates
    pub fn drain_all(&mut self) -> Vec<PendingEvent> {
        EventKind::ALL
            .into_iter()
            .flat_map(|kind| self.drain(kind))
            .collect()
    }

    /// Number of queued events of one kind
    #[inline]
    #[must_use]
    pub fn len_of(&self, kind: EventKind) -> usize {
        self.queue(kind).len()
    }

    /// Total number of queued events
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.updated.len()
    }

    /// Whether all queues are empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn queue(&self, kind: EventKind) -> &VecDeque<PendingEvent> {
        match kind {
            EventKind::Add => &self.added,
            EventKind::Remove => &self.removed,
            EventKind::Update => &self.updated,
        }
    }

    fn queue_mut(&mut self, kind: EventKind) -> &mut VecDeque<PendingEvent> {
        match kind {
            EventKind::Add => &mut self.added,
            EventKind::Remove => &mut self.removed,
            EventKind::Update => &mut self.updated,
        }
    }
}
