//! In-process API facade over the per-game pricing engines, with SQLite
//! persistence and the HTTP server on top.

mod persistence;
mod server;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use contracts::{GameEvent, GameStatus, Item, Money, Participant};
use divvy_core::{ConfirmOutcome, EngineError, GameState, ProposalOutcome};
use persistence::SqliteGameStore;
pub use persistence::{GameRecord, PersistenceError};
pub use server::{serve, ServerError};

#[derive(Debug)]
pub enum GameApiError {
    GameNotFound(String),
    Engine(EngineError),
    Persistence(PersistenceError),
}

impl fmt::Display for GameApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GameNotFound(key) => write!(f, "no game matches '{key}'"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for GameApiError {}

impl From<EngineError> for GameApiError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<PersistenceError> for GameApiError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

#[derive(Debug)]
struct PersistenceState {
    store: SqliteGameStore,
    /// Per game: how many entries of the live event log are already on disk.
    persisted_events: BTreeMap<u64, usize>,
}

#[derive(Debug)]
pub struct EngineApi {
    games: BTreeMap<u64, GameState>,
    unique_index: BTreeMap<String, u64>,
    next_game_id: u64,
    persistence: Option<PersistenceState>,
    last_persistence_error: Option<String>,
}

impl Default for EngineApi {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineApi {
    pub fn new() -> Self {
        Self {
            games: BTreeMap::new(),
            unique_index: BTreeMap::new(),
            next_game_id: 1,
            persistence: None,
            last_persistence_error: None,
        }
    }

    pub fn attach_sqlite_store(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let store = SqliteGameStore::open(path)?;
        self.persistence = Some(PersistenceState {
            store,
            persisted_events: BTreeMap::new(),
        });
        Ok(())
    }

    /// Load every persisted game back into the registry. Restored games carry
    /// an empty in-memory event log; their sequence counters continue where
    /// the persisted log left off.
    pub fn restore_from_store(&mut self) -> Result<usize, PersistenceError> {
        let Some(persistence) = self.persistence.as_ref() else {
            return Err(PersistenceError::NotAttached);
        };

        let records = persistence.store.load_games()?;
        let count = records.len();
        for record in records {
            let game_id = record.game.id;
            let unique_id = record.game.unique_id.clone();
            let state = GameState::from_parts(
                record.game,
                record.items,
                record.participants,
                record.bids,
                record.next_event_seq,
            );
            self.next_game_id = self.next_game_id.max(game_id + 1);
            self.unique_index.insert(unique_id, game_id);
            self.games.insert(game_id, state);
        }
        Ok(count)
    }

    pub fn create_game(
        &mut self,
        title: String,
        total_price: Money,
        now_ms: i64,
    ) -> Result<u64, GameApiError> {
        if total_price.is_negative() {
            return Err(EngineError::InvalidPrice(total_price).into());
        }

        let game_id = self.next_game_id;
        self.next_game_id += 1;
        let unique_id = unique_token(game_id, now_ms);

        let state = GameState::new(game_id, unique_id.clone(), title, total_price, now_ms);
        self.unique_index.insert(unique_id, game_id);
        self.games.insert(game_id, state);
        self.flush_game(game_id);
        Ok(game_id)
    }

    pub fn games(&self) -> impl Iterator<Item = &GameState> {
        self.games.values()
    }

    /// Flip every past-deadline game to `Expired` without deleting it.
    /// Summary listings run this first so stale games never read as live.
    pub fn expire_due(&mut self, now_ms: i64) {
        let flipped: Vec<u64> = self
            .games
            .iter_mut()
            .filter_map(|(game_id, state)| {
                let already = state.game().status == GameStatus::Expired;
                if state.expire_if_due(now_ms) && !already {
                    Some(*game_id)
                } else {
                    None
                }
            })
            .collect();
        for game_id in flipped {
            self.flush_game(game_id);
        }
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    /// Read path: refuse expired games, keep live ones alive.
    pub fn view_game(&mut self, key: &str, now_ms: i64) -> Result<&GameState, GameApiError> {
        let game_id = self.require_live(key, now_ms)?;
        if let Some(state) = self.games.get_mut(&game_id) {
            state.touch(now_ms);
        }
        self.flush_game(game_id);
        self.games
            .get(&game_id)
            .ok_or_else(|| GameApiError::GameNotFound(key.to_string()))
    }

    pub fn add_item(
        &mut self,
        key: &str,
        title: String,
        image_ref: Option<String>,
        initial_price: Money,
        now_ms: i64,
    ) -> Result<Item, GameApiError> {
        let game_id = self.require_live(key, now_ms)?;
        let item = self
            .game_mut(game_id, key)?
            .add_item(title, image_ref, initial_price, now_ms)?
            .clone();
        self.flush_game(game_id);
        Ok(item)
    }

    pub fn join_game(
        &mut self,
        key: &str,
        name: String,
        email: Option<String>,
        as_creator: bool,
        now_ms: i64,
    ) -> Result<Participant, GameApiError> {
        let game_id = self.require_live(key, now_ms)?;
        let state = self.game_mut(game_id, key)?;
        let participant = state.add_participant(name, email, now_ms)?.clone();
        if as_creator {
            state.assign_creator(participant.id)?;
        }
        self.flush_game(game_id);
        Ok(participant)
    }

    pub fn propose_price(
        &mut self,
        key: &str,
        item_id: u64,
        participant_id: u64,
        new_price: Money,
        now_ms: i64,
    ) -> Result<ProposalOutcome, GameApiError> {
        let game_id = self.require_live(key, now_ms)?;
        let outcome = self
            .game_mut(game_id, key)?
            .propose_price(item_id, participant_id, new_price, now_ms)?;
        self.flush_game(game_id);
        Ok(outcome)
    }

    pub fn confirm_bid(
        &mut self,
        key: &str,
        item_id: u64,
        participant_id: u64,
        now_ms: i64,
    ) -> Result<ConfirmOutcome, GameApiError> {
        let game_id = self.require_live(key, now_ms)?;
        let outcome = self
            .game_mut(game_id, key)?
            .confirm_bid(item_id, participant_id, now_ms)?;
        self.flush_game(game_id);
        Ok(outcome)
    }

    /// Re-open a settled game with an even split. When the game has a
    /// recorded creator only that participant may reset it.
    pub fn reset_game(
        &mut self,
        key: &str,
        participant_id: Option<u64>,
        now_ms: i64,
    ) -> Result<(), GameApiError> {
        let game_id = self.require_live(key, now_ms)?;
        let state = self.game_mut(game_id, key)?;
        if let Some(creator) = state.game().creator_id {
            if participant_id != Some(creator) {
                return Err(EngineError::GameStateConflict(
                    "only the game creator can reset".to_string(),
                )
                .into());
            }
        }
        state.reset(now_ms)?;
        self.flush_game(game_id);
        Ok(())
    }

    /// Full event history: the persisted log when a store is attached,
    /// otherwise the in-memory log.
    pub fn events_for(&mut self, key: &str, now_ms: i64) -> Result<Vec<GameEvent>, GameApiError> {
        let game_id = self.require_live(key, now_ms)?;
        self.flush_game(game_id);
        if let Some(persistence) = self.persistence.as_ref() {
            return Ok(persistence.store.load_events(game_id)?);
        }
        let state = self
            .games
            .get(&game_id)
            .ok_or_else(|| GameApiError::GameNotFound(key.to_string()))?;
        Ok(state.events().to_vec())
    }

    /// Expire past-deadline games and drop them from memory and disk.
    /// Returns how many were removed.
    pub fn sweep_expired(&mut self, now_ms: i64) -> usize {
        let expired: Vec<u64> = self
            .games
            .iter_mut()
            .filter_map(|(id, state)| state.expire_if_due(now_ms).then_some(*id))
            .collect();

        for game_id in &expired {
            if let Some(state) = self.games.remove(game_id) {
                self.unique_index.remove(&state.game().unique_id);
            }
            if let Some(persistence) = self.persistence.as_mut() {
                persistence.persisted_events.remove(game_id);
                if let Err(err) = persistence.store.delete_game(*game_id) {
                    self.last_persistence_error = Some(err.to_string());
                }
            }
        }

        expired.len()
    }

    fn resolve_key(&self, key: &str) -> Option<u64> {
        if let Ok(id) = key.parse::<u64>() {
            if self.games.contains_key(&id) {
                return Some(id);
            }
        }
        self.unique_index.get(key).copied()
    }

    /// Resolve a game by numeric id or share token, expiring it first if its
    /// deadline has passed. Expired games stay in the registry until the
    /// sweep removes them; every access meanwhile reports the expiry.
    fn require_live(&mut self, key: &str, now_ms: i64) -> Result<u64, GameApiError> {
        let game_id = self
            .resolve_key(key)
            .ok_or_else(|| GameApiError::GameNotFound(key.to_string()))?;
        let expired = self
            .games
            .get_mut(&game_id)
            .map(|state| state.expire_if_due(now_ms))
            .unwrap_or(true);
        if expired {
            self.flush_game(game_id);
            return Err(EngineError::GameExpired.into());
        }
        Ok(game_id)
    }

    fn game_mut(&mut self, game_id: u64, key: &str) -> Result<&mut GameState, GameApiError> {
        self.games
            .get_mut(&game_id)
            .ok_or_else(|| GameApiError::GameNotFound(key.to_string()))
    }

    fn flush_game(&mut self, game_id: u64) {
        let Some(persistence) = self.persistence.as_mut() else {
            return;
        };
        let Some(state) = self.games.get(&game_id) else {
            return;
        };

        let persisted = persistence.persisted_events.entry(game_id).or_insert(0);
        let cut = (*persisted).min(state.events().len());
        match persistence.store.persist_game(state, &state.events()[cut..]) {
            Ok(()) => {
                *persisted = state.events().len();
                self.last_persistence_error = None;
            }
            Err(err) => {
                self.last_persistence_error = Some(err.to_string());
            }
        }
    }
}

/// Shareable token for a game, derived from its id and creation time with a
/// splitmix-style finalizer. Stable, cheap, and unguessable enough for links.
fn unique_token(game_id: u64, now_ms: i64) -> String {
    let mut x = game_id
        .wrapping_mul(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(now_ms as u64);
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    format!("g{x:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use divvy_core::lifecycle::ACTIVE_TTL_MS;

    const T0: i64 = 1_700_000_000_000;

    fn temp_db_path(name: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();

        std::env::temp_dir().join(format!("divvy_{name}_{nanos}.sqlite"))
    }

    fn seeded_game(api: &mut EngineApi) -> String {
        let game_id = api
            .create_game("flat split".to_string(), Money::from_major(100), T0)
            .unwrap();
        let key = game_id.to_string();
        api.add_item(&key, "couch".to_string(), None, Money::from_major(40), T0)
            .unwrap();
        api.add_item(&key, "table".to_string(), None, Money::from_major(60), T0)
            .unwrap();
        api.join_game(&key, "ana".to_string(), None, true, T0).unwrap();
        api.join_game(&key, "ben".to_string(), None, false, T0).unwrap();
        key
    }

    #[test]
    fn games_resolve_by_id_and_by_token() {
        let mut api = EngineApi::new();
        let key = seeded_game(&mut api);
        let token = api.view_game(&key, T0 + 1).unwrap().game().unique_id.clone();

        let by_token = api.view_game(&token, T0 + 2).unwrap();
        assert_eq!(by_token.game().id.to_string(), key);
    }

    #[test]
    fn unknown_keys_are_not_found() {
        let mut api = EngineApi::new();
        seeded_game(&mut api);
        assert!(matches!(
            api.view_game("999", T0),
            Err(GameApiError::GameNotFound(_))
        ));
        assert!(matches!(
            api.view_game("gdeadbeef", T0),
            Err(GameApiError::GameNotFound(_))
        ));
    }

    #[test]
    fn expired_games_report_gone_until_swept() {
        let mut api = EngineApi::new();
        let key = seeded_game(&mut api);

        let later = T0 + ACTIVE_TTL_MS + 1;
        assert!(matches!(
            api.view_game(&key, later),
            Err(GameApiError::Engine(EngineError::GameExpired))
        ));

        assert_eq!(api.sweep_expired(later), 1);
        assert!(matches!(
            api.view_game(&key, later),
            Err(GameApiError::GameNotFound(_))
        ));
    }

    #[test]
    fn listings_mark_overdue_games_expired() {
        let mut api = EngineApi::new();
        seeded_game(&mut api);

        api.expire_due(T0 + ACTIVE_TTL_MS + 1);
        let statuses: Vec<GameStatus> = api.games().map(|state| state.game().status).collect();
        assert_eq!(statuses, vec![GameStatus::Expired]);

        // Already-expired games are not flipped (or flushed) twice.
        api.expire_due(T0 + ACTIVE_TTL_MS + 2);
        assert_eq!(api.games().count(), 1);
    }

    #[test]
    fn reset_is_creator_only_when_a_creator_is_recorded() {
        let mut api = EngineApi::new();
        let key = seeded_game(&mut api);

        let err = api.reset_game(&key, Some(2), T0 + 1).unwrap_err();
        assert!(matches!(
            err,
            GameApiError::Engine(EngineError::GameStateConflict(_))
        ));
        api.reset_game(&key, Some(1), T0 + 2).unwrap();
    }

    #[test]
    fn persists_and_restores_games_across_restart() {
        let db_path = temp_db_path("restore");

        let (key, token) = {
            let mut api = EngineApi::new();
            api.attach_sqlite_store(&db_path).unwrap();
            let key = seeded_game(&mut api);
            api.propose_price(&key, 1, 1, Money::from_major(50), T0 + 1)
                .unwrap();
            assert!(api.last_persistence_error().is_none());
            let token = api.view_game(&key, T0 + 2).unwrap().game().unique_id.clone();
            (key, token)
        };

        let mut api = EngineApi::new();
        api.attach_sqlite_store(&db_path).unwrap();
        assert_eq!(api.restore_from_store().unwrap(), 1);

        let state = api.view_game(&token, T0 + 3).unwrap();
        assert_eq!(state.game().id.to_string(), key);
        assert_eq!(
            state.item(1).map(|item| item.current_price),
            Some(Money::from_major(50))
        );
        assert_eq!(state.bids().count(), 1);

        // New games continue after the restored id.
        let next = api
            .create_game("second".to_string(), Money::from_major(10), T0 + 4)
            .unwrap();
        assert_eq!(next, 2);

        let events = api.events_for(&key, T0 + 5).unwrap();
        assert!(!events.is_empty());
        assert!(events.windows(2).all(|pair| pair[0].seq < pair[1].seq));

        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("sqlite-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("sqlite-shm"));
    }

    #[test]
    fn sweep_deletes_persisted_rows() {
        let db_path = temp_db_path("sweep");

        let mut api = EngineApi::new();
        api.attach_sqlite_store(&db_path).unwrap();
        seeded_game(&mut api);

        assert_eq!(api.sweep_expired(T0 + ACTIVE_TTL_MS + 1), 1);

        let mut fresh = EngineApi::new();
        fresh.attach_sqlite_store(&db_path).unwrap();
        assert_eq!(fresh.restore_from_store().unwrap(), 0);

        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("sqlite-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("sqlite-shm"));
    }

    #[test]
    fn tokens_are_distinct_across_games() {
        let mut api = EngineApi::new();
        let a = api
            .create_game("a".to_string(), Money::from_major(10), T0)
            .unwrap();
        let b = api
            .create_game("b".to_string(), Money::from_major(10), T0)
            .unwrap();
        let token_a = api.view_game(&a.to_string(), T0).unwrap().game().unique_id.clone();
        let token_b = api.view_game(&b.to_string(), T0).unwrap().game().unique_id.clone();
        assert_ne!(token_a, token_b);
    }
}
