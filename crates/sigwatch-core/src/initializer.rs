//! One-time bootstrap of the shadow store
//!
//! The fetch itself is driven by the engine loop so notifications keep
//! flowing into the pending queues while it is in flight. This type only
//! guards the lifecycle: one `begin`, one `complete`, never again.

use crate::error::EngineError;
use crate::listener::Listener;
use sigwatch_model::{property_count, Snapshot};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    Pending,
    Fetching,
    Live,
}

/// Bootstrap lifecycle guard
#[derive(Debug)]
pub struct Initializer {
    state: InitState,
}

impl Initializer {
    /// Nothing fetched yet
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: InitState::Pending,
        }
    }

    /// Mark the bootstrap fetch as started
    ///
    /// # Errors
    /// Returns [`EngineError::AlreadyInitialized`] on a second call.
    pub fn begin(&mut self) -> Result<(), EngineError> {
        if self.state != InitState::Pending {
            return Err(EngineError::AlreadyInitialized);
        }
        self.state = InitState::Fetching;
        Ok(())
    }

    /// Install the fetched snapshot and switch the listener to live mode
    ///
    /// Returns how many buffered events were drained.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFetching`] if [`Initializer::begin`] was not
    /// called and [`EngineError::AlreadyInitialized`] if the store is
    /// already live.
    pub fn complete(
        &mut self,
        listener: &mut Listener,
        snapshot: Snapshot,
    ) -> Result<usize, EngineError> {
        match self.state {
            InitState::Pending => return Err(EngineError::NotFetching),
            InitState::Live => return Err(EngineError::AlreadyInitialized),
            InitState::Fetching => {}
        }

        let objects = snapshot.len();
        let properties = property_count(snapshot.objects());
        let drained = listener.install(snapshot);
        self.state = InitState::Live;

        info!(objects, properties, drained, "Shadow store initialized");
        Ok(drained)
    }

    /// Whether a fetch has been started but not completed
    #[inline]
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.state == InitState::Fetching
    }

    /// Whether the store is live
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state == InitState::Live
    }
}

impl Default for Initializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigwatch_model::{InterfaceName, Interfaces, ObjectPath, Properties, PropertyValue};
    use tokio::time::Instant;

    fn listener() -> Listener {
        Listener::new(ObjectPath::root(), Instant::now())
    }

    #[tokio::test]
    async fn complete_requires_begin() {
        let mut init = Initializer::new();
        let mut listener = listener();
        assert!(matches!(
            init.complete(&mut listener, Snapshot::default()),
            Err(EngineError::NotFetching)
        ));
        assert!(!listener.is_live());
    }

    #[tokio::test]
    async fn runs_exactly_once() {
        let mut init = Initializer::new();
        let mut listener = listener();

        init.begin().unwrap();
        assert!(init.is_fetching());
        init.complete(&mut listener, Snapshot::default()).unwrap();
        assert!(init.is_live());
        assert!(listener.is_live());

        assert!(matches!(init.begin(), Err(EngineError::AlreadyInitialized)));
        assert!(matches!(
            init.complete(&mut listener, Snapshot::default()),
            Err(EngineError::AlreadyInitialized)
        ));
    }

    #[tokio::test]
    async fn events_during_fetch_are_drained_on_completion() {
        let mut init = Initializer::new();
        let mut listener = listener();
        init.begin().unwrap();

        for i in 0..3 {
            let interfaces = Interfaces::from([(
                InterfaceName::new("X"),
                Properties::from([("n".into(), PropertyValue::from(i))]),
            )]);
            listener.on_added(ObjectPath::new(format!("/o/{i}")), interfaces, Instant::now());
        }

        let drained = init.complete(&mut listener, Snapshot::default()).unwrap();
        assert_eq!(drained, 3);
        assert_eq!(listener.store().len(), 3);
    }
}
