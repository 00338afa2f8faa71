//! Per-game mutable state: items, participants, bid ledger, event log.
//!
//! Every mutation validates before touching state and re-evaluates the
//! resolution predicate afterwards, so the exposed state is either the old
//! state or the complete new one.

use std::collections::BTreeMap;

use contracts::{
    Bid, Game, GameEvent, GameEventType, GameStatus, Item, Money, Participant, SCHEMA_VERSION_V1,
};
use serde_json::{json, Value};

use crate::error::EngineError;
use crate::ledger::BidLedger;
use crate::lifecycle::{deadline_for, is_past_deadline, ACTIVE_TTL_MS};
use crate::redistribute::redistribute;
use crate::resolution::is_resolved;

#[derive(Debug, Clone)]
pub struct GameState {
    game: Game,
    items: BTreeMap<u64, Item>,
    participants: BTreeMap<u64, Participant>,
    ledger: BidLedger,
    event_log: Vec<GameEvent>,
    next_item_id: u64,
    next_participant_id: u64,
    next_event_seq: u64,
}

/// Result of one atomic price proposal: the full price map, the proposer's
/// fresh bid, the (item, participant) pairs pushed into needs-confirmation,
/// and whether the game resolved as a consequence.
#[derive(Debug, Clone)]
pub struct ProposalOutcome {
    pub prices: BTreeMap<u64, Money>,
    pub bid: Bid,
    pub stale_bids: Vec<(u64, u64)>,
    pub resolved: bool,
}

#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub bid: Bid,
    pub resolved: bool,
}

impl GameState {
    pub fn new(
        id: u64,
        unique_id: String,
        title: String,
        total_price: Money,
        now_ms: i64,
    ) -> Self {
        let game = Game {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            id,
            unique_id,
            title,
            total_price,
            status: GameStatus::Active,
            created_at_ms: now_ms,
            last_active_ms: now_ms,
            expires_at_ms: now_ms + ACTIVE_TTL_MS,
            resolved_at_ms: None,
            creator_id: None,
        };

        let mut state = Self {
            game,
            items: BTreeMap::new(),
            participants: BTreeMap::new(),
            ledger: BidLedger::new(),
            event_log: Vec::new(),
            next_item_id: 1,
            next_participant_id: 1,
            next_event_seq: 1,
        };
        state.push_event(now_ms, GameEventType::GameCreated, None);
        state
    }

    /// Rebuild state from persisted rows. The event log restarts empty;
    /// `next_event_seq` keeps the persisted sequence monotonic.
    pub fn from_parts(
        game: Game,
        items: Vec<Item>,
        participants: Vec<Participant>,
        bids: Vec<Bid>,
        next_event_seq: u64,
    ) -> Self {
        let next_item_id = items.iter().map(|item| item.id).max().unwrap_or(0) + 1;
        let next_participant_id = participants.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        Self {
            game,
            items: items.into_iter().map(|item| (item.id, item)).collect(),
            participants: participants.into_iter().map(|p| (p.id, p)).collect(),
            ledger: BidLedger::from_bids(bids),
            event_log: Vec::new(),
            next_item_id,
            next_participant_id,
            next_event_seq: next_event_seq.max(1),
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn item(&self, item_id: u64) -> Option<&Item> {
        self.items.get(&item_id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn bids(&self) -> impl Iterator<Item = &Bid> {
        self.ledger.bids()
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.event_log
    }

    pub fn next_event_seq(&self) -> u64 {
        self.next_event_seq
    }

    /// Recompute the stability predicate against live state.
    pub fn is_resolved_now(&self) -> bool {
        is_resolved(&self.game, &self.items, &self.participants, &self.ledger)
    }

    /// Flip to Expired when the deadline has passed. Returns true when the
    /// game is expired (now or previously).
    pub fn expire_if_due(&mut self, now_ms: i64) -> bool {
        if self.game.status != GameStatus::Expired && is_past_deadline(&self.game, now_ms) {
            self.game.status = GameStatus::Expired;
            self.push_event(now_ms, GameEventType::GameExpired, None);
        }
        self.game.status == GameStatus::Expired
    }

    /// Reads of an Active game keep it alive; Resolved and Expired deadlines
    /// are not extended.
    pub fn touch(&mut self, now_ms: i64) {
        if self.game.status == GameStatus::Active {
            self.game.last_active_ms = now_ms;
            self.game.expires_at_ms = deadline_for(GameStatus::Active, now_ms);
        }
    }

    pub fn add_item(
        &mut self,
        title: String,
        image_ref: Option<String>,
        initial_price: Money,
        now_ms: i64,
    ) -> Result<&Item, EngineError> {
        self.ensure_not_expired()?;
        if initial_price.is_negative() {
            return Err(EngineError::InvalidPrice(initial_price));
        }

        let id = self.next_item_id;
        self.next_item_id += 1;
        self.items.insert(
            id,
            Item {
                id,
                game_id: self.game.id,
                title,
                image_ref,
                current_price: initial_price,
            },
        );
        self.touch(now_ms);
        self.push_event(
            now_ms,
            GameEventType::ItemAdded,
            Some(json!({ "item_id": id })),
        );
        Ok(&self.items[&id])
    }

    pub fn add_participant(
        &mut self,
        name: String,
        email: Option<String>,
        now_ms: i64,
    ) -> Result<&Participant, EngineError> {
        self.ensure_not_expired()?;

        let id = self.next_participant_id;
        self.next_participant_id += 1;
        self.participants.insert(
            id,
            Participant {
                id,
                game_id: self.game.id,
                name,
                email,
            },
        );
        self.touch(now_ms);
        self.push_event(
            now_ms,
            GameEventType::ParticipantJoined,
            Some(json!({ "participant_id": id })),
        );
        Ok(&self.participants[&id])
    }

    /// Record the game's creator once; the first participant of a freshly
    /// created game takes this role.
    pub fn assign_creator(&mut self, participant_id: u64) -> Result<(), EngineError> {
        if !self.participants.contains_key(&participant_id) {
            return Err(EngineError::ParticipantNotFound(participant_id));
        }
        match self.game.creator_id {
            None => {
                self.game.creator_id = Some(participant_id);
                Ok(())
            }
            Some(existing) if existing == participant_id => Ok(()),
            Some(_) => Err(EngineError::GameStateConflict(
                "game already has a creator".to_string(),
            )),
        }
    }

    /// The single transactional command: redistribute prices, record the
    /// proposer's bid, flag outbid claims on price-increased items, verify
    /// the budget invariant, then re-evaluate resolution. On invariant
    /// failure the whole mutation is rolled back.
    pub fn propose_price(
        &mut self,
        item_id: u64,
        participant_id: u64,
        new_price: Money,
        now_ms: i64,
    ) -> Result<ProposalOutcome, EngineError> {
        self.ensure_not_expired()?;
        if !self.participants.contains_key(&participant_id) {
            return Err(EngineError::ParticipantNotFound(participant_id));
        }

        let prices = redistribute(&self.items, item_id, new_price)?;

        let rollback_items = self.items.clone();
        let rollback_ledger = self.ledger.clone();

        let mut increased: Vec<(u64, Money)> = Vec::new();
        for (id, price) in &prices {
            if let Some(item) = self.items.get_mut(id) {
                if *id != item_id && *price > item.current_price {
                    increased.push((*id, *price));
                }
                item.current_price = *price;
            }
        }

        let bid = self
            .ledger
            .upsert(self.game.id, item_id, participant_id, new_price, false, now_ms)
            .clone();

        let mut stale_bids = Vec::new();
        for (other_id, other_price) in increased {
            for flipped in self
                .ledger
                .mark_stale_after_increase(other_id, participant_id, other_price)
            {
                stale_bids.push((other_id, flipped));
            }
        }

        if let Err(err) = self.verify_budget() {
            self.items = rollback_items;
            self.ledger = rollback_ledger;
            return Err(err);
        }

        self.touch(now_ms);
        self.push_event(
            now_ms,
            GameEventType::PriceRedistributed,
            Some(json!({
                "item_id": item_id,
                "participant_id": participant_id,
                "new_price": new_price.to_string(),
            })),
        );
        self.push_event(
            now_ms,
            GameEventType::BidPlaced,
            Some(json!({
                "item_id": item_id,
                "participant_id": participant_id,
                "price": new_price.to_string(),
            })),
        );
        for (stale_item, stale_participant) in &stale_bids {
            self.push_event(
                now_ms,
                GameEventType::BidNeedsConfirmation,
                Some(json!({
                    "item_id": stale_item,
                    "participant_id": stale_participant,
                })),
            );
        }

        let resolved = self.refresh_resolution(now_ms);

        Ok(ProposalOutcome {
            prices,
            bid,
            stale_bids,
            resolved,
        })
    }

    /// Re-affirm a claim at the item's current price, clearing the
    /// confirmation flag. Creates the bid when absent. Idempotent: an
    /// already-confirmed bid at the same price is returned unchanged.
    pub fn confirm_bid(
        &mut self,
        item_id: u64,
        participant_id: u64,
        now_ms: i64,
    ) -> Result<ConfirmOutcome, EngineError> {
        self.ensure_not_expired()?;
        if !self.participants.contains_key(&participant_id) {
            return Err(EngineError::ParticipantNotFound(participant_id));
        }
        let current_price = self
            .items
            .get(&item_id)
            .map(|item| item.current_price)
            .ok_or(EngineError::ItemNotFound(item_id))?;

        if let Some(existing) = self.ledger.get(item_id, participant_id) {
            if !existing.needs_confirmation && existing.price == current_price {
                return Ok(ConfirmOutcome {
                    bid: existing.clone(),
                    resolved: self.is_resolved_now(),
                });
            }
        }

        let bid = self
            .ledger
            .upsert(
                self.game.id,
                item_id,
                participant_id,
                current_price,
                false,
                now_ms,
            )
            .clone();

        self.touch(now_ms);
        self.push_event(
            now_ms,
            GameEventType::BidConfirmed,
            Some(json!({
                "item_id": item_id,
                "participant_id": participant_id,
                "price": current_price.to_string(),
            })),
        );

        let resolved = self.refresh_resolution(now_ms);
        Ok(ConfirmOutcome { bid, resolved })
    }

    /// Equal-split all item prices and wipe the ledger. The only path from
    /// Resolved back to Active; items and participants survive.
    pub fn reset(&mut self, now_ms: i64) -> Result<(), EngineError> {
        if self.game.status == GameStatus::Expired {
            return Err(EngineError::GameExpired);
        }

        let shares = self.game.total_price.split_even(self.items.len());
        for (item, share) in self.items.values_mut().zip(shares) {
            item.current_price = share;
        }
        self.ledger.clear();

        self.game.status = GameStatus::Active;
        self.game.resolved_at_ms = None;
        self.game.last_active_ms = now_ms;
        self.game.expires_at_ms = deadline_for(GameStatus::Active, now_ms);
        self.push_event(now_ms, GameEventType::GameReset, None);
        Ok(())
    }

    /// Mutations stay open while Resolved: resolution is a live predicate and
    /// repricing may continue until expiry. Only Expired is terminal.
    fn ensure_not_expired(&self) -> Result<(), EngineError> {
        if self.game.status == GameStatus::Expired {
            return Err(EngineError::GameExpired);
        }
        Ok(())
    }

    fn verify_budget(&self) -> Result<(), EngineError> {
        let actual: Money = self.items.values().map(|item| item.current_price).sum();
        if actual.approx_eq(self.game.total_price) {
            Ok(())
        } else {
            Err(EngineError::BudgetInvariantViolation {
                expected: self.game.total_price,
                actual,
            })
        }
    }

    /// One-time Active → Resolved transition when the predicate holds;
    /// re-detecting resolution on an already-resolved game is a no-op.
    fn refresh_resolution(&mut self, now_ms: i64) -> bool {
        let resolved = self.is_resolved_now();
        if resolved && self.game.status == GameStatus::Active {
            self.game.status = GameStatus::Resolved;
            self.game.resolved_at_ms = Some(now_ms);
            self.game.expires_at_ms = deadline_for(GameStatus::Resolved, now_ms);
            self.push_event(now_ms, GameEventType::GameResolved, None);
        }
        resolved
    }

    fn push_event(&mut self, now_ms: i64, event_type: GameEventType, details: Option<Value>) {
        let seq = self.next_event_seq;
        self.next_event_seq += 1;
        self.event_log.push(GameEvent {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            game_id: self.game.id,
            seq,
            at_ms: now_ms,
            event_type,
            details,
        });
    }
}

#[cfg(test)]
mod tests;
