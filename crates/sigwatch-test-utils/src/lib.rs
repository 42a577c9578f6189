//! Testing utilities for the sigwatch workspace
//!
//! Shared fixtures, scripted collaborators and tree builders.

#![allow(missing_docs)]

use parking_lot::Mutex;
use sigwatch_core::{ProducerHandle, SnapshotSource, SourceError, TerminateError};
use sigwatch_model::{
    InterfaceName, Interfaces, ObjectPath, ObjectTree, Properties, PropertyName, PropertyValue,
    Snapshot,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One interface with the given properties
pub fn interface(name: &str, props: &[(&str, PropertyValue)]) -> (InterfaceName, Properties) {
    let properties = props
        .iter()
        .map(|(prop, value)| (PropertyName::new(*prop), value.clone()))
        .collect();
    (InterfaceName::new(name), properties)
}

/// An object payload with a single interface
pub fn object(iface: &str, props: &[(&str, PropertyValue)]) -> Interfaces {
    Interfaces::from([interface(iface, props)])
}

/// A tree from `(path, interfaces)` pairs
pub fn tree<'a>(entries: impl IntoIterator<Item = (&'a str, Interfaces)>) -> ObjectTree {
    entries
        .into_iter()
        .map(|(path, interfaces)| (ObjectPath::new(path), interfaces))
        .collect()
}

/// Single-property changed map for update events
pub fn changed(prop: &str, value: impl Into<PropertyValue>) -> Properties {
    Properties::from([(PropertyName::new(prop), value.into())])
}

/// Snapshot source that replays a script of results
///
/// Each fetch pops the next entry; once the script is exhausted the last
/// answer is repeated. Cloning shares the script.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    inner: Arc<ScriptState>,
}

#[derive(Debug)]
struct ScriptState {
    script: Mutex<VecDeque<Result<Snapshot, SourceError>>>,
    last: Mutex<Result<Snapshot, SourceError>>,
    fetches: AtomicUsize,
    delay: Duration,
}

impl ScriptedSource {
    /// Always answer with `tree`
    pub fn fixed(tree: ObjectTree) -> Self {
        Self::scripted(vec![Ok(Snapshot::new(tree))])
    }

    /// Answer with each entry in turn
    pub fn scripted(script: Vec<Result<Snapshot, SourceError>>) -> Self {
        Self::delayed(script, Duration::ZERO)
    }

    /// Like [`ScriptedSource::scripted`], but every fetch takes `delay`
    pub fn delayed(script: Vec<Result<Snapshot, SourceError>>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(ScriptState {
                script: Mutex::new(script.into()),
                last: Mutex::new(Err(SourceError::Unavailable("empty script".into()))),
                fetches: AtomicUsize::new(0),
                delay,
            }),
        }
    }

    /// Append an answer
    pub fn push(&self, result: Result<Snapshot, SourceError>) {
        self.inner.script.lock().push_back(result);
    }

    /// Number of fetches served
    pub fn fetches(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
        if !self.inner.delay.is_zero() {
            tokio::time::sleep(self.inner.delay).await;
        }
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        let mut last = self.inner.last.lock();
        if let Some(next) = self.inner.script.lock().pop_front() {
            *last = next;
        }
        last.clone()
    }
}

/// Producer handle that only counts terminate calls
#[derive(Debug, Clone, Default)]
pub struct RecordingProducer {
    calls: Arc<AtomicUsize>,
}

impl RecordingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `terminate` was called
    pub fn terminations(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProducerHandle for RecordingProducer {
    fn terminate(&self) -> Result<(), TerminateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "recording producer".to_string()
    }
}
