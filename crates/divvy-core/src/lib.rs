//! Price-redistribution and consensus-resolution engine.
//!
//! A game holds items whose prices must always sum to the game's total.
//! Moving one price redistributes the difference across the other items,
//! the bid ledger tracks each participant's ceiling claim per item, and the
//! resolution detector decides when the state is a stable one-to-one
//! assignment of items to participants.

pub mod error;
pub mod game;
pub mod ledger;
pub mod lifecycle;
pub mod redistribute;
pub mod resolution;

pub use error::EngineError;
pub use game::{ConfirmOutcome, GameState, ProposalOutcome};
pub use ledger::BidLedger;
pub use redistribute::redistribute;
pub use resolution::is_resolved;
