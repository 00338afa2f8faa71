//! Expiry policy constants and deadline arithmetic.
//!
//! Active games live 48 hours past their last activity; resolved games keep a
//! short 12 hour grace window so participants can read the outcome. The sweep
//! hard-deletes anything past its deadline regardless of status.

use contracts::{Game, GameStatus};

pub const ACTIVE_TTL_MS: i64 = 48 * 60 * 60 * 1000;
pub const RESOLVED_TTL_MS: i64 = 12 * 60 * 60 * 1000;

pub fn deadline_for(status: GameStatus, reference_ms: i64) -> i64 {
    match status {
        GameStatus::Active => reference_ms + ACTIVE_TTL_MS,
        GameStatus::Resolved => reference_ms + RESOLVED_TTL_MS,
        GameStatus::Expired => reference_ms,
    }
}

pub fn is_past_deadline(game: &Game, now_ms: i64) -> bool {
    now_ms >= game.expires_at_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_deadline_is_shorter_than_active() {
        let resolved = deadline_for(GameStatus::Resolved, 1000);
        let active = deadline_for(GameStatus::Active, 1000);
        assert!(resolved < active);
        assert_eq!(active - 1000, ACTIVE_TTL_MS);
        assert_eq!(resolved - 1000, RESOLVED_TTL_MS);
    }
}
