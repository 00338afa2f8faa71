//! v1 cross-boundary contracts for the pricing engine, API, and persistence.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod money;

pub use money::Money;

pub const SCHEMA_VERSION_V1: &str = "1.0";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Active,
    Resolved,
    Expired,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Resolved => write!(f, "resolved"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// A group re-pricing session. Item prices always sum to `total_price`
/// (within `Money::EPSILON`) outside of setup and mid-transaction windows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Game {
    pub schema_version: String,
    pub id: u64,
    /// Opaque share token; the join link carries this instead of the row id.
    pub unique_id: String,
    pub title: String,
    pub total_price: Money,
    pub status: GameStatus,
    pub created_at_ms: i64,
    pub last_active_ms: i64,
    pub expires_at_ms: i64,
    pub resolved_at_ms: Option<i64>,
    pub creator_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: u64,
    pub game_id: u64,
    pub title: String,
    pub image_ref: Option<String>,
    pub current_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: u64,
    pub game_id: u64,
    pub name: String,
    pub email: Option<String>,
}

/// A participant's ceiling commitment on one item: "willing to take this item
/// at up to `price`". One current bid per (item, participant); a newer bid
/// from the same pair supersedes in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bid {
    pub id: u64,
    pub game_id: u64,
    pub item_id: u64,
    pub participant_id: u64,
    pub price: Money,
    pub updated_at_ms: i64,
    /// Set when the item's live price rose above `price` through someone
    /// else's redistribution; cleared by explicit confirmation.
    pub needs_confirmation: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameEventType {
    GameCreated,
    ItemAdded,
    ParticipantJoined,
    PriceRedistributed,
    BidPlaced,
    BidNeedsConfirmation,
    BidConfirmed,
    GameResolved,
    GameReset,
    GameExpired,
}

/// Append-only per-game log entry; the UI polls these for toasts and the
/// persistence layer stores them by delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEvent {
    pub schema_version: String,
    pub game_id: u64,
    pub seq: u64,
    pub at_ms: i64,
    pub event_type: GameEventType,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    GameNotFound,
    ItemNotFound,
    ParticipantNotFound,
    InvalidPrice,
    NoRedistributionTarget,
    GameExpired,
    GameStateConflict,
    BudgetInvariantViolation,
    InvalidRequest,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.error_code, self.message)
    }
}
