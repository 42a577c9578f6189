//! Seams to the outside world
//!
//! The engine never speaks a wire protocol itself. It consumes:
//! - a [`SnapshotSource`] for the authoritative full-state query,
//! - a stream of [`PendingEvent`]s pushed through a [`NotificationSender`],
//! - a [`ProducerHandle`] used to stop the producer once divergence is confirmed.

use crate::error::{SourceError, TerminateError};
use sigwatch_model::{
    InterfaceName, Interfaces, ObjectPath, PendingEvent, Properties, PropertyName, Snapshot,
};
use tokio::sync::mpsc;

/// Authoritative full-state query
///
/// Implementations must return a state that reflects a single consistent
/// instant of the producer.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the complete current state
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError>;
}

/// Terminate handle for the producer under test, supplied by the harness
pub trait ProducerHandle: Send + Sync {
    /// Forcefully stop the producer
    ///
    /// Must succeed silently when the producer has already exited.
    fn terminate(&self) -> Result<(), TerminateError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Handle used when there is no producer to stop
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProducer;

impl ProducerHandle for NoProducer {
    fn terminate(&self) -> Result<(), TerminateError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "no producer".to_string()
    }
}

/// Receiving half of the notification channel, consumed by the engine
pub type NotificationReceiver = mpsc::UnboundedReceiver<PendingEvent>;

/// Create a notification channel
///
/// Subscribe to the producer's signals and start forwarding into the sender
/// before handing the receiver to the engine, so nothing emitted before the
/// bootstrap fetch is lost.
#[must_use]
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NotificationSender { tx }, rx)
}

/// Producer-facing side of the notification channel
///
/// One method per subscribed signal. Delivery is fire-and-forget: each
/// returns `false` once the engine has stopped listening.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<PendingEvent>,
}

impl NotificationSender {
    /// Forward an `InterfacesAdded` signal
    pub fn interfaces_added(&self, path: ObjectPath, interfaces: Interfaces) -> bool {
        self.send(PendingEvent::Add { path, interfaces })
    }

    /// Forward an `InterfacesRemoved` signal
    pub fn interfaces_removed(&self, path: ObjectPath, interfaces: Vec<InterfaceName>) -> bool {
        self.send(PendingEvent::Remove { path, interfaces })
    }

    /// Forward a `PropertiesChanged` signal
    pub fn properties_changed(
        &self,
        path: ObjectPath,
        interface: InterfaceName,
        changed: Properties,
        invalidated: Vec<PropertyName>,
    ) -> bool {
        self.send(PendingEvent::Update {
            path,
            interface,
            changed,
            invalidated,
        })
    }

    /// Forward an already-built event
    pub fn send(&self, event: PendingEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Whether the engine dropped its receiver
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_methods_build_matching_events() {
        let (sender, mut rx) = notification_channel();
        assert!(sender.interfaces_removed(ObjectPath::new("/o/1"), vec![InterfaceName::new("X")]));

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            PendingEvent::Remove {
                path: ObjectPath::new("/o/1"),
                interfaces: vec![InterfaceName::new("X")],
            }
        );
    }

    #[test]
    fn sender_reports_closed_channel() {
        let (sender, rx) = notification_channel();
        drop(rx);
        assert!(sender.is_closed());
        assert!(!sender.interfaces_added(ObjectPath::new("/o/1"), Interfaces::new()));
    }

    #[test]
    fn no_producer_terminates_silently() {
        assert!(NoProducer.terminate().is_ok());
    }
}
