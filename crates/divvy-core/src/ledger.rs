//! Bid ledger: one current bid per (item, participant) pair.

use std::collections::BTreeMap;

use contracts::{Bid, Money};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidLedger {
    bids: BTreeMap<(u64, u64), Bid>,
    next_bid_id: u64,
}

impl BidLedger {
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            next_bid_id: 1,
        }
    }

    /// Rebuild a ledger from persisted rows.
    pub fn from_bids(bids: Vec<Bid>) -> Self {
        let next_bid_id = bids.iter().map(|bid| bid.id).max().unwrap_or(0) + 1;
        Self {
            bids: bids
                .into_iter()
                .map(|bid| ((bid.item_id, bid.participant_id), bid))
                .collect(),
            next_bid_id,
        }
    }

    /// Record a bid, superseding any prior bid from the same pair in place.
    pub fn upsert(
        &mut self,
        game_id: u64,
        item_id: u64,
        participant_id: u64,
        price: Money,
        needs_confirmation: bool,
        now_ms: i64,
    ) -> &Bid {
        let key = (item_id, participant_id);
        match self.bids.get_mut(&key) {
            Some(existing) => {
                existing.price = price;
                existing.needs_confirmation = needs_confirmation;
                existing.updated_at_ms = now_ms;
            }
            None => {
                let bid = Bid {
                    id: self.next_bid_id,
                    game_id,
                    item_id,
                    participant_id,
                    price,
                    updated_at_ms: now_ms,
                    needs_confirmation,
                };
                self.next_bid_id += 1;
                self.bids.insert(key, bid);
            }
        }
        &self.bids[&key]
    }

    pub fn get(&self, item_id: u64, participant_id: u64) -> Option<&Bid> {
        self.bids.get(&(item_id, participant_id))
    }

    pub fn bids(&self) -> impl Iterator<Item = &Bid> {
        self.bids.values()
    }

    pub fn bids_for_item(&self, item_id: u64) -> impl Iterator<Item = &Bid> {
        self.bids
            .range((item_id, 0)..=(item_id, u64::MAX))
            .map(|(_, bid)| bid)
    }

    pub fn any_needs_confirmation(&self) -> bool {
        self.bids.values().any(|bid| bid.needs_confirmation)
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    pub fn clear(&mut self) {
        self.bids.clear();
    }

    /// Flag every bid on `item_id` whose ceiling is now below the item's new
    /// price, except the initiator's. Returns the participant ids flipped.
    ///
    /// The initiator's own bid is excluded: their proposal is by definition
    /// fresh and self-confirmed.
    pub fn mark_stale_after_increase(
        &mut self,
        item_id: u64,
        initiator_id: u64,
        new_item_price: Money,
    ) -> Vec<u64> {
        let mut flipped = Vec::new();
        for ((_, participant_id), bid) in self.bids.range_mut((item_id, 0)..=(item_id, u64::MAX)) {
            if *participant_id == initiator_id || bid.needs_confirmation {
                continue;
            }
            if new_item_price > bid.price {
                bid.needs_confirmation = true;
                flipped.push(*participant_id);
            }
        }
        flipped
    }
}
