//! Explicit status state machines for persisted entities.
//!
//! Every persisted status column maps onto an enum implementing [`StateMachine`].
//! The enum declares its transition table; stores only ever write a status through a
//! [`StatusGuard`], which rejects transitions the table does not allow and carries the
//! expected prior status for optimistic (compare-and-set) updates.

use crate::error::{DomainError, DomainResult};

/// A persisted status with a declared transition table.
pub trait StateMachine:
    Copy + Eq + core::fmt::Debug + core::fmt::Display + Send + Sync + 'static
{
    /// Entity name used in error messages (e.g. "rfq").
    const ENTITY: &'static str;

    /// Every state, in declaration order.
    const STATES: &'static [Self];

    /// Canonical persisted representation (e.g. "PENDING").
    fn as_str(self) -> &'static str;

    /// Whether `self -> next` is a legal transition.
    fn can_transition_to(self, next: Self) -> bool;

    /// A state with no outgoing transitions.
    fn is_terminal(self) -> bool {
        !Self::STATES.iter().any(|next| self.can_transition_to(*next))
    }

    /// Validate a transition, returning the new state.
    fn transition(self, next: Self) -> DomainResult<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::illegal_transition(Self::ENTITY, self, next))
        }
    }

    /// Parse the persisted representation (case-insensitive).
    fn parse(raw: &str) -> DomainResult<Self> {
        let raw = raw.trim();
        Self::STATES
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| {
                DomainError::validation(format!("unknown {} status '{raw}'", Self::ENTITY))
            })
    }
}

/// Optimistic status expectation for a single write.
///
/// A write guarded by `StatusGuard { from, to }` is valid only while the row is still
/// observed in `from`. Stores treat a mismatch as a no-op, not as an overwrite.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatusGuard<S: StateMachine> {
    from: S,
    to: S,
}

impl<S: StateMachine> StatusGuard<S> {
    /// Build a guard, rejecting transitions outside the entity's table.
    pub fn new(from: S, to: S) -> DomainResult<Self> {
        from.transition(to)?;
        Ok(Self { from, to })
    }

    pub fn from(&self) -> S {
        self.from
    }

    pub fn to(&self) -> S {
        self.to
    }

    /// Whether the observed status still matches the expectation.
    pub fn matches(&self, actual: S) -> bool {
        actual == self.from
    }

    pub fn check(&self, actual: S) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "{} status moved (expected: {}, actual: {actual})",
                S::ENTITY,
                self.from
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Light {
        Red,
        Green,
        Off,
    }

    impl core::fmt::Display for Light {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl StateMachine for Light {
        const ENTITY: &'static str = "light";
        const STATES: &'static [Self] = &[Light::Red, Light::Green, Light::Off];

        fn as_str(self) -> &'static str {
            match self {
                Light::Red => "RED",
                Light::Green => "GREEN",
                Light::Off => "OFF",
            }
        }

        fn can_transition_to(self, next: Self) -> bool {
            matches!(
                (self, next),
                (Light::Red, Light::Green) | (Light::Green, Light::Red) | (_, Light::Off)
            ) && self != Light::Off
        }
    }

    #[test]
    fn transition_follows_table() {
        assert_eq!(Light::Red.transition(Light::Green), Ok(Light::Green));
        let err = Light::Off.transition(Light::Red).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { entity: "light", .. }));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        assert!(Light::Off.is_terminal());
        assert!(!Light::Red.is_terminal());
    }

    #[test]
    fn parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!(Light::parse(" green "), Ok(Light::Green));
        assert!(matches!(Light::parse("blue"), Err(DomainError::Validation(_))));
    }

    #[test]
    fn guard_rejects_illegal_edges_and_detects_moved_rows() {
        assert!(StatusGuard::new(Light::Off, Light::Green).is_err());

        let guard = StatusGuard::new(Light::Red, Light::Green).unwrap();
        assert!(guard.matches(Light::Red));
        assert!(matches!(guard.check(Light::Green), Err(DomainError::Conflict(_))));
    }
}
