use std::fmt;

use contracts::Money;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Proposed price is negative or otherwise unusable.
    InvalidPrice(Money),
    /// Single-item games have nowhere to push the compensating delta.
    NoRedistributionTarget,
    ItemNotFound(u64),
    ParticipantNotFound(u64),
    /// The game's TTL lapsed; callers must surface this as "gone", not
    /// a generic not-found.
    GameExpired,
    /// Operation conflicts with recorded state (e.g. resetting a game as a
    /// non-creator, or re-assigning a creator).
    GameStateConflict(String),
    /// Post-write consistency check failed; the mutation was rolled back.
    BudgetInvariantViolation { expected: Money, actual: Money },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPrice(price) => write!(f, "invalid price: {price}"),
            Self::NoRedistributionTarget => {
                write!(f, "redistribution needs at least one other item")
            }
            Self::ItemNotFound(id) => write!(f, "item {id} not found"),
            Self::ParticipantNotFound(id) => write!(f, "participant {id} not found"),
            Self::GameExpired => write!(f, "game has expired"),
            Self::GameStateConflict(message) => write!(f, "game state conflict: {message}"),
            Self::BudgetInvariantViolation { expected, actual } => write!(
                f,
                "budget invariant violated: item prices sum to {actual}, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for EngineError {}
