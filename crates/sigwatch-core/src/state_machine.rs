use crate::error::StateMachineError;

/// Lifecycle phase of the reconciliation engine
///
/// `Idle` and `Dirty` are the live phases: quiet since the last pass, or
/// with unreconciled traffic. `Comparing` is entered from `Dirty` once the
/// quiescence window has passed. `Escalated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnginePhase {
    /// Waiting for the bootstrap snapshot; events are buffered
    Bootstrapping,
    /// Live, nothing to reconcile
    Idle,
    /// Live, events applied since the last pass
    Dirty,
    /// Comparison pass in progress
    Comparing,
    /// Divergence confirmed; termination is armed
    Escalating,
    /// Termination fired
    Escalated,
}

impl EnginePhase {
    /// Whether the shadow store has been seeded
    #[inline]
    #[must_use]
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Bootstrapping)
    }

    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Escalated)
    }
}

/// Validates a phase transition.
///
/// Illegal transitions panic with the `strict-debug` feature and return an
/// error otherwise.
pub fn validate_transition(from: EnginePhase, to: EnginePhase) -> Result<(), StateMachineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal engine transition attempted: {:?} -> {:?}", from, to);

        #[cfg(not(feature = "strict-debug"))]
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: EnginePhase) -> Vec<EnginePhase> {
    use EnginePhase::*;
    match from {
        Bootstrapping => vec![Idle, Dirty],
        Idle => vec![Dirty],
        Dirty => vec![Comparing],
        Comparing => vec![Idle, Escalating],
        Escalating => vec![Escalated],
        Escalated => vec![],
    }
}

fn allowed(from: EnginePhase, to: EnginePhase) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bootstrap_transitions() {
        assert!(validate_transition(EnginePhase::Bootstrapping, EnginePhase::Idle).is_ok());
        assert!(validate_transition(EnginePhase::Bootstrapping, EnginePhase::Dirty).is_ok());

        // Cannot compare before the store is live
        assert!(validate_transition(EnginePhase::Bootstrapping, EnginePhase::Comparing).is_err());
    }

    #[test]
    fn test_comparing_only_from_dirty() {
        assert!(validate_transition(EnginePhase::Dirty, EnginePhase::Comparing).is_ok());
        assert!(validate_transition(EnginePhase::Idle, EnginePhase::Comparing).is_err());
    }

    #[test]
    fn test_escalated_is_absorbing() {
        assert!(EnginePhase::Escalated.is_terminal());
        assert!(allowed_transitions(EnginePhase::Escalated).is_empty());
    }

    fn any_phase() -> impl Strategy<Value = EnginePhase> {
        prop_oneof![
            Just(EnginePhase::Bootstrapping),
            Just(EnginePhase::Idle),
            Just(EnginePhase::Dirty),
            Just(EnginePhase::Comparing),
            Just(EnginePhase::Escalating),
            Just(EnginePhase::Escalated),
        ]
    }

    proptest! {
        #[test]
        fn prop_validation_matches_table(from in any_phase(), to in any_phase()) {
            let res = validate_transition(from, to);
            let allowed = allowed_transitions(from);

            if res.is_ok() {
                prop_assert!(allowed.contains(&to));
            } else {
                prop_assert!(!allowed.contains(&to));
            }
        }

        #[test]
        fn prop_nothing_returns_to_bootstrapping(from in any_phase()) {
            prop_assert!(validate_transition(from, EnginePhase::Bootstrapping).is_err());
        }
    }
}
