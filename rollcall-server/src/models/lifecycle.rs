//! Closed status enums with explicit transition tables
//!
//! Each lifecycle (class, enrollment, lecture, dispute) lists its allowed next
//! states in one place. Services call [`Lifecycle::transition`] instead of
//! comparing status strings at call sites.

use std::fmt::Debug;
use thiserror::Error;

/// Attempted transition not present in the table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{entity} cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

/// A status with a fixed set of values and allowed transitions
pub trait Lifecycle: Copy + Eq + Debug + Sized + 'static {
    /// Entity name for error messages
    const ENTITY: &'static str;

    /// Every value, in declaration order
    const ALL: &'static [Self];

    /// Allowed next states from `self`
    fn allowed_next(self) -> &'static [Self];

    /// Stored / wire representation
    fn as_str(self) -> &'static str;

    fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Validate a transition, returning the new state
    fn transition(self, next: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                entity: Self::ENTITY,
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }

    fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Parse the stored representation
    fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

/// Parse a stored lifecycle value, treating unknown text as corruption
pub fn parse_stored<L: Lifecycle>(s: &str) -> rollcall_common::Result<L> {
    L::parse(s).ok_or_else(|| {
        rollcall_common::Error::Internal(format!("Unknown {} status '{}'", L::ENTITY, s))
    })
}
