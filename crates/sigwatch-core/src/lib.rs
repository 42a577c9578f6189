//! sigwatch core: reconciliation engine
//!
//! Verifies that a mirror built purely from change notifications stays
//! consistent with the producer's authoritative full-state query:
//! - Buffers notifications until the bootstrap snapshot is installed
//! - Applies add/remove/update events to the shadow store
//! - Compares against a fresh snapshot once the stream has gone quiet
//! - Escalates to terminating the producer when divergence is confirmed
//!
//! # Example
//!
//! ```rust,ignore
//! use sigwatch_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sim = Simulator::new(SimulatorConfig::default())?;
//! let (sender, notifications) = notification_channel();
//!
//! let mut engine = Engine::new(WatchConfig::default(), Arc::new(sim.service()), Box::new(NoProducer));
//! tokio::spawn(sim.run(sender));
//!
//! let outcome = engine.run(notifications, tokio::time::sleep(std::time::Duration::from_secs(60))).await?;
//! println!("exit status {}", outcome.exit_code());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod differ;
pub mod dump;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod initializer;
pub mod listener;
pub mod scheduler;
pub mod simulator;
pub mod source;
pub mod state_machine;

pub use config::{WatchConfig, DEFAULT_ROOT_PATH, DEFAULT_SERVICE};
pub use differ::compare;
pub use dump::{render_dump, render_tree, DumpInput};
pub use engine::{Engine, EngineOutcome};
pub use error::{ConfigError, EngineError, SourceError, StateMachineError, TerminateError};
pub use escalation::{EscalationController, PassOutcome};
pub use initializer::Initializer;
pub use listener::{Listener, ListenerStats};
pub use scheduler::{Activity, QuiescenceGate};
pub use simulator::{SimulatedService, SimulationReport, Simulator, SimulatorConfig};
pub use source::{
    notification_channel, NoProducer, NotificationReceiver, NotificationSender, ProducerHandle,
    SnapshotSource,
};
pub use state_machine::{allowed_transitions, validate_transition, EnginePhase};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the engine
    pub use crate::{
        notification_channel, Engine, EngineError, EngineOutcome, NoProducer, NotificationSender,
        ProducerHandle, SimulatedService, Simulator, SimulatorConfig, SnapshotSource, SourceError,
        WatchConfig,
    };
    pub use sigwatch_model::{
        DivergenceReport, Finding, InterfaceName, Interfaces, ObjectPath, ObjectTree, Properties,
        PropertyName, PropertyValue, Snapshot,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
