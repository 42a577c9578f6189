//! Reconciliation engine
//!
//! A single task owns the shadow store and drives every component from one
//! `select!` loop: shutdown, escalation deadline, bootstrap completion,
//! notifications and the scheduler tick, in that priority order. Nothing
//! else touches the store, so no lock guards it.

use crate::config::WatchConfig;
use crate::differ;
use crate::dump::{render_dump, DumpInput};
use crate::error::EngineError;
use crate::escalation::{EscalationController, PassOutcome};
use crate::initializer::Initializer;
use crate::listener::{Listener, ListenerStats};
use crate::scheduler::QuiescenceGate;
use crate::source::{NotificationReceiver, ProducerHandle, SnapshotSource};
use crate::state_machine::{validate_transition, EnginePhase};
use sigwatch_model::{PendingEvent, ShadowStore, Snapshot};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOutcome {
    /// Shut down with no divergence ever observed
    Clean,
    /// Shut down while divergence had been observed
    Diverged {
        /// Cumulative findings
        errors: u64,
    },
    /// The producer was terminated after confirmed divergence
    Escalated {
        /// Cumulative findings
        errors: u64,
    },
}

impl EngineOutcome {
    /// Process exit status for this outcome
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::Diverged { .. } | Self::Escalated { .. } => 5,
        }
    }

    /// Cumulative findings at the end of the run
    #[must_use]
    pub fn errors(self) -> u64 {
        match self {
            Self::Clean => 0,
            Self::Diverged { errors } | Self::Escalated { errors } => errors,
        }
    }
}

/// All mutable engine state, owned by the loop
#[derive(Debug)]
struct EngineContext {
    listener: Listener,
    initializer: Initializer,
    gate: QuiescenceGate,
    escalation: EscalationController,
    phase: EnginePhase,
}

impl EngineContext {
    fn transition(&mut self, to: EnginePhase) -> Result<(), EngineError> {
        validate_transition(self.phase, to)?;
        debug!(from = ?self.phase, to = ?to, "Engine phase change");
        self.phase = to;
        Ok(())
    }

    /// Follow the listener's dirty flag while live and quiet
    fn sync_phase(&mut self) -> Result<(), EngineError> {
        if self.phase == EnginePhase::Idle && self.listener.activity().is_dirty() {
            self.transition(EnginePhase::Dirty)?;
        }
        Ok(())
    }

    fn on_event(&mut self, event: PendingEvent) -> Result<(), EngineError> {
        self.listener.dispatch(event, Instant::now());
        self.sync_phase()
    }

    fn complete_bootstrap(&mut self, snapshot: Snapshot) -> Result<(), EngineError> {
        self.initializer.complete(&mut self.listener, snapshot)?;
        if self.listener.activity().is_dirty() {
            self.transition(EnginePhase::Dirty)
        } else {
            self.transition(EnginePhase::Idle)
        }
    }
}

/// Event-sourced mirror verifier
///
/// # Example
///
/// ```rust,ignore
/// use sigwatch_core::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example(source: Arc<dyn SnapshotSource>) -> Result<(), EngineError> {
/// let (sender, notifications) = notification_channel();
/// // hand `sender` to whatever forwards the producer's signals
/// # drop(sender);
/// let mut engine = Engine::new(WatchConfig::default(), source, Box::new(NoProducer));
/// let outcome = engine.run(notifications, std::future::pending()).await?;
/// std::process::exit(outcome.exit_code());
/// # }
/// ```
pub struct Engine {
    config: WatchConfig,
    source: Arc<dyn SnapshotSource>,
    producer: Box<dyn ProducerHandle>,
    ctx: EngineContext,
}

impl Engine {
    /// Create an engine; nothing happens until [`Engine::run`]
    #[must_use]
    pub fn new(
        config: WatchConfig,
        source: Arc<dyn SnapshotSource>,
        producer: Box<dyn ProducerHandle>,
    ) -> Self {
        let ctx = EngineContext {
            listener: Listener::new(config.root_path.clone(), Instant::now()),
            initializer: Initializer::new(),
            gate: QuiescenceGate::new(config.quiescence_window()),
            escalation: EscalationController::new(config.escalation_grace()),
            phase: EnginePhase::Bootstrapping,
        };
        Self {
            config,
            source,
            producer,
            ctx,
        }
    }

    /// Run until shutdown or escalation
    ///
    /// The receiver must already be connected to the producer's signals; the
    /// bootstrap fetch starts on the first loop iteration and anything that
    /// arrives meanwhile is buffered. A closed notification stream does not
    /// end the run.
    ///
    /// # Errors
    /// Returns [`EngineError::Bootstrap`] if the initial snapshot cannot be
    /// fetched. Divergence is reported through [`EngineOutcome`], never as
    /// an error.
    pub async fn run<F>(
        &mut self,
        mut notifications: NotificationReceiver,
        shutdown: F,
    ) -> Result<EngineOutcome, EngineError>
    where
        F: Future<Output = ()>,
    {
        info!(
            service = %self.config.service,
            root = %self.config.root_path,
            producer = %self.producer.describe(),
            "Starting signal verification"
        );

        self.ctx.initializer.begin()?;
        let source = Arc::clone(&self.source);
        let bootstrap = async move { source.fetch_snapshot().await };
        tokio::pin!(bootstrap);
        tokio::pin!(shutdown);

        let mut ticker = time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stream_open = true;

        loop {
            let deadline = self.ctx.escalation.deadline();

            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Shutdown requested");
                    return Ok(self.shutdown().await);
                }

                () = sleep_until_armed(deadline) => {
                    return Ok(self.escalate().await);
                }

                fetched = &mut bootstrap, if self.ctx.initializer.is_fetching() => {
                    let snapshot = fetched.map_err(EngineError::Bootstrap)?;
                    self.ctx.complete_bootstrap(snapshot)?;
                }

                event = notifications.recv(), if stream_open => match event {
                    Some(event) => self.ctx.on_event(event)?,
                    None => {
                        warn!("Notification stream closed; no further events will be mirrored");
                        stream_open = false;
                    }
                },

                _ = ticker.tick() => self.on_tick().await?,
            }
        }
    }

    async fn on_tick(&mut self) -> Result<(), EngineError> {
        if self.ctx.escalation.is_armed() {
            return Ok(());
        }

        let live = self.ctx.listener.is_live();
        if !self
            .ctx
            .gate
            .poll(Instant::now(), live, self.ctx.listener.activity_mut())
        {
            return Ok(());
        }

        self.ctx.transition(EnginePhase::Comparing)?;
        let outcome = self.compare_once().await;
        let armed = self.ctx.escalation.record(&outcome, Instant::now());

        if armed.is_some() {
            self.ctx.transition(EnginePhase::Escalating)?;
        } else {
            self.ctx.transition(EnginePhase::Idle)?;
            if matches!(outcome, PassOutcome::Failed { .. }) {
                // Retry once the stream has been quiet for another window
                self.ctx.listener.activity_mut().touch(Instant::now());
            }
            self.ctx.sync_phase()?;
        }
        Ok(())
    }

    /// One comparison pass against a freshly fetched snapshot
    async fn compare_once(&self) -> PassOutcome {
        info!("Validating objects entry");
        let started = Instant::now();
        let shadow = self.ctx.listener.store().clone();

        match self.source.fetch_snapshot().await {
            Ok(snapshot) => {
                PassOutcome::from_report(differ::compare(&snapshot, &shadow), started.elapsed())
            }
            Err(error) => PassOutcome::Failed {
                error,
                duration: started.elapsed(),
            },
        }
    }

    async fn escalate(&mut self) -> EngineOutcome {
        let errors = self.ctx.escalation.errors();
        error!(
            producer = %self.producer.describe(),
            errors,
            "Validating objects exiting on error, terminating producer"
        );

        if let Err(e) = self.producer.terminate() {
            error!(error = %e, "Failed to terminate producer");
        }
        if self.ctx.transition(EnginePhase::Escalated).is_err() {
            warn!(phase = ?self.ctx.phase, "Escalation fired outside the escalating phase");
        }

        self.dump().await;
        EngineOutcome::Escalated { errors }
    }

    async fn shutdown(&mut self) -> EngineOutcome {
        self.dump().await;
        match self.ctx.escalation.errors() {
            0 => EngineOutcome::Clean,
            errors => EngineOutcome::Diverged { errors },
        }
    }

    async fn dump(&self) {
        let fetched = self.source.fetch_snapshot().await;
        if let Err(e) = &fetched {
            error!(error = %e, "Could not fetch snapshot for dump");
        }

        let store = self.ctx.listener.store();
        let shadow = store.copy_tree();
        let text = render_dump(&DumpInput {
            shadow: &shadow,
            snapshot: fetched.as_ref(),
            invalidated: store.invalidated(),
            stats: self.ctx.listener.stats(),
            errors: self.ctx.escalation.errors(),
        });
        for line in text.lines() {
            info!("{line}");
        }
    }

    /// Current lifecycle phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> EnginePhase {
        self.ctx.phase
    }

    /// Read-only view of the mirror
    #[inline]
    #[must_use]
    pub fn shadow(&self) -> &ShadowStore {
        self.ctx.listener.store()
    }

    /// Listener counters
    #[inline]
    #[must_use]
    pub fn stats(&self) -> ListenerStats {
        self.ctx.listener.stats()
    }

    /// Cumulative divergence count
    #[inline]
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.ctx.escalation.errors()
    }

    /// Passes run so far, including failed ones
    #[inline]
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.ctx.escalation.passes()
    }

    /// Passes that failed to fetch a snapshot
    #[inline]
    #[must_use]
    pub fn failed_passes(&self) -> u64 {
        self.ctx.escalation.failed_passes()
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("producer", &self.producer.describe())
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

async fn sleep_until_armed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(EngineOutcome::Clean.exit_code(), 0);
        assert_eq!(EngineOutcome::Diverged { errors: 2 }.exit_code(), 5);
        assert_eq!(EngineOutcome::Escalated { errors: 1 }.exit_code(), 5);
        assert_eq!(EngineOutcome::Escalated { errors: 1 }.errors(), 1);
    }
}
