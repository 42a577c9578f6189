//! Error types for sigwatch core
//!
//! Divergence is never an error: findings travel in a
//! [`DivergenceReport`](sigwatch_model::DivergenceReport). The types here
//! cover infrastructure and programming failures:
//! - Snapshot fetch failures
//! - Producer termination failures
//! - Engine lifecycle violations
//! - Configuration problems

use crate::state_machine::EnginePhase;

/// Engine-level failure
///
/// Only [`EngineError::Bootstrap`] is expected in practice; the rest signal
/// misuse of the engine API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The one-time bootstrap fetch failed; there is nothing to mirror
    #[error("bootstrap snapshot fetch failed: {0}")]
    Bootstrap(#[source] SourceError),

    /// The shadow store was already seeded
    #[error("shadow store already initialized")]
    AlreadyInitialized,

    /// Bootstrap completion without a fetch in flight
    #[error("bootstrap completed before it was started")]
    NotFetching,

    /// Illegal phase change
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),
}

/// Failure of the authoritative full-state query
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The service could not be reached
    #[error("snapshot source unavailable: {0}")]
    Unavailable(String),

    /// The query was made but did not produce a usable snapshot
    #[error("snapshot fetch failed: {0}")]
    Fetch(String),
}

/// Failure to terminate the producer under test
///
/// An already-exited producer is not an error; implementations report
/// success in that case.
#[derive(Debug, thiserror::Error)]
pub enum TerminateError {
    /// Locating the producer failed
    #[error("could not locate producer: {0}")]
    Lookup(#[from] std::io::Error),

    /// Delivering the termination request failed
    #[error("failed to terminate producer {target}: {reason}")]
    Signal {
        /// Human-readable target (pid or process name)
        target: String,
        /// Underlying reason
        reason: String,
    },
}

/// Illegal engine phase transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Transition not in the allowed table
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Phase before
        from: EnginePhase,
        /// Requested phase
        to: EnginePhase,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML did not parse
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but are unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl EngineError {
    /// Whether this error came from the monitored service rather than from
    /// misuse of the engine
    #[inline]
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Bootstrap(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_error_keeps_source() {
        let err = EngineError::Bootstrap(SourceError::Unavailable("bus down".into()));
        assert!(err.is_infrastructure());
        assert_eq!(
            err.to_string(),
            "bootstrap snapshot fetch failed: snapshot source unavailable: bus down"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn lifecycle_errors_are_not_infrastructure() {
        assert!(!EngineError::AlreadyInitialized.is_infrastructure());
    }
}
