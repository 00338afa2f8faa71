use std::fmt;
use std::path::Path;

use contracts::{Bid, Game, GameEvent, Item, Money, Participant};
use divvy_core::GameState;
use rusqlite::{params, Connection};

/// One fully persisted game, as loaded at startup.
#[derive(Debug)]
pub struct GameRecord {
    pub game: Game,
    pub items: Vec<Item>,
    pub participants: Vec<Participant>,
    pub bids: Vec<Bid>,
    pub next_event_seq: u64,
}

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    NotAttached,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::NotAttached => write!(f, "sqlite store is not attached"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

#[derive(Debug)]
pub struct SqliteGameStore {
    conn: Connection,
}

impl SqliteGameStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    /// Write one game's full current state plus the not-yet-persisted tail of
    /// its event log, in a single transaction. Items, participants, and bids
    /// are replaced wholesale; events only ever append.
    pub fn persist_game(
        &mut self,
        state: &GameState,
        new_events: &[GameEvent],
    ) -> Result<(), PersistenceError> {
        let game = state.game();
        let game_json = serde_json::to_string(game)?;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO games (
                game_id,
                unique_id,
                schema_version,
                status,
                total_cents,
                next_event_seq,
                game_json,
                updated_at_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(game_id) DO UPDATE SET
                unique_id = excluded.unique_id,
                schema_version = excluded.schema_version,
                status = excluded.status,
                total_cents = excluded.total_cents,
                next_event_seq = excluded.next_event_seq,
                game_json = excluded.game_json,
                updated_at_ms = excluded.updated_at_ms",
            params![
                as_i64(game.id),
                game.unique_id.as_str(),
                game.schema_version.as_str(),
                game.status.to_string(),
                game.total_price.cents(),
                as_i64(state.next_event_seq()),
                game_json,
                game.last_active_ms,
            ],
        )?;

        tx.execute("DELETE FROM items WHERE game_id = ?1", params![as_i64(game.id)])?;
        for item in state.items() {
            tx.execute(
                "INSERT INTO items (game_id, item_id, title, image_ref, price_cents)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    as_i64(item.game_id),
                    as_i64(item.id),
                    item.title.as_str(),
                    item.image_ref.as_deref(),
                    item.current_price.cents(),
                ],
            )?;
        }

        tx.execute(
            "DELETE FROM participants WHERE game_id = ?1",
            params![as_i64(game.id)],
        )?;
        for participant in state.participants() {
            tx.execute(
                "INSERT INTO participants (game_id, participant_id, name, email)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    as_i64(participant.game_id),
                    as_i64(participant.id),
                    participant.name.as_str(),
                    participant.email.as_deref(),
                ],
            )?;
        }

        tx.execute("DELETE FROM bids WHERE game_id = ?1", params![as_i64(game.id)])?;
        for bid in state.bids() {
            tx.execute(
                "INSERT INTO bids (
                    game_id,
                    bid_id,
                    item_id,
                    participant_id,
                    price_cents,
                    updated_at_ms,
                    needs_confirmation
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    as_i64(bid.game_id),
                    as_i64(bid.id),
                    as_i64(bid.item_id),
                    as_i64(bid.participant_id),
                    bid.price.cents(),
                    bid.updated_at_ms,
                    if bid.needs_confirmation { 1_i64 } else { 0_i64 },
                ],
            )?;
        }

        for event in new_events {
            let payload_json = serde_json::to_string(event)?;
            tx.execute(
                "INSERT OR IGNORE INTO game_events (game_id, seq, at_ms, event_type, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    as_i64(event.game_id),
                    as_i64(event.seq),
                    event.at_ms,
                    serde_json::to_string(&event.event_type)?,
                    payload_json,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn load_games(&self) -> Result<Vec<GameRecord>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT game_id, game_json, next_event_seq FROM games ORDER BY game_id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (game_id, game_json, next_event_seq) = row?;
            let game = serde_json::from_str::<Game>(&game_json)?;
            records.push(GameRecord {
                game,
                items: self.load_items(game_id)?,
                participants: self.load_participants(game_id)?,
                bids: self.load_bids(game_id)?,
                next_event_seq: next_event_seq.max(1) as u64,
            });
        }

        Ok(records)
    }

    pub fn load_events(&self, game_id: u64) -> Result<Vec<GameEvent>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT payload_json FROM game_events WHERE game_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![as_i64(game_id)], |row| row.get::<_, String>(0))?;

        let mut events = Vec::new();
        for row in rows {
            events.push(serde_json::from_str::<GameEvent>(&row?)?);
        }
        Ok(events)
    }

    /// Drop a game and all of its rows. Used by the expiry sweep.
    pub fn delete_game(&mut self, game_id: u64) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        for table in ["game_events", "bids", "participants", "items", "games"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE game_id = ?1"),
                params![as_i64(game_id)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_items(&self, game_id: i64) -> Result<Vec<Item>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, title, image_ref, price_cents
             FROM items WHERE game_id = ?1 ORDER BY item_id ASC",
        )?;
        let rows = stmt.query_map(params![game_id], |row| {
            Ok(Item {
                id: row.get::<_, i64>(0)? as u64,
                game_id: game_id as u64,
                title: row.get(1)?,
                image_ref: row.get(2)?,
                current_price: Money::from_cents(row.get(3)?),
            })
        })?;
        collect_rows(rows)
    }

    fn load_participants(&self, game_id: i64) -> Result<Vec<Participant>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT participant_id, name, email
             FROM participants WHERE game_id = ?1 ORDER BY participant_id ASC",
        )?;
        let rows = stmt.query_map(params![game_id], |row| {
            Ok(Participant {
                id: row.get::<_, i64>(0)? as u64,
                game_id: game_id as u64,
                name: row.get(1)?,
                email: row.get(2)?,
            })
        })?;
        collect_rows(rows)
    }

    fn load_bids(&self, game_id: i64) -> Result<Vec<Bid>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT bid_id, item_id, participant_id, price_cents, updated_at_ms, needs_confirmation
             FROM bids WHERE game_id = ?1 ORDER BY item_id ASC, participant_id ASC",
        )?;
        let rows = stmt.query_map(params![game_id], |row| {
            Ok(Bid {
                id: row.get::<_, i64>(0)? as u64,
                game_id: game_id as u64,
                item_id: row.get::<_, i64>(1)? as u64,
                participant_id: row.get::<_, i64>(2)? as u64,
                price: Money::from_cents(row.get(3)?),
                updated_at_ms: row.get(4)?,
                needs_confirmation: row.get::<_, i64>(5)? != 0,
            })
        })?;
        collect_rows(rows)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS games (
                game_id INTEGER PRIMARY KEY,
                unique_id TEXT NOT NULL UNIQUE,
                schema_version TEXT NOT NULL,
                status TEXT NOT NULL,
                total_cents INTEGER NOT NULL,
                next_event_seq INTEGER NOT NULL,
                game_json TEXT NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS items (
                game_id INTEGER NOT NULL,
                item_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                image_ref TEXT,
                price_cents INTEGER NOT NULL,
                PRIMARY KEY (game_id, item_id)
            );

            CREATE TABLE IF NOT EXISTS participants (
                game_id INTEGER NOT NULL,
                participant_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                email TEXT,
                PRIMARY KEY (game_id, participant_id)
            );

            CREATE TABLE IF NOT EXISTS bids (
                game_id INTEGER NOT NULL,
                bid_id INTEGER NOT NULL,
                item_id INTEGER NOT NULL,
                participant_id INTEGER NOT NULL,
                price_cents INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL,
                needs_confirmation INTEGER NOT NULL,
                PRIMARY KEY (game_id, item_id, participant_id)
            );

            CREATE TABLE IF NOT EXISTS game_events (
                game_id INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                at_ms INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                PRIMARY KEY (game_id, seq)
            );

            CREATE INDEX IF NOT EXISTS idx_games_unique_id ON games(unique_id);
            CREATE INDEX IF NOT EXISTS idx_games_status ON games(status);
            CREATE INDEX IF NOT EXISTS idx_game_events_game_seq ON game_events(game_id, seq);
            CREATE INDEX IF NOT EXISTS idx_bids_game_item ON bids(game_id, item_id);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at)
             VALUES(1, 'initial_v1', 'ms-0')",
            [],
        )?;

        Ok(())
    }
}

fn as_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn collect_rows<T>(
    rows: impl Iterator<Item = Result<T, rusqlite::Error>>,
) -> Result<Vec<T>, PersistenceError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
