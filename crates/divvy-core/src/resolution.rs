//! Resolution detector: the single authoritative stability predicate.

use std::collections::BTreeMap;

use contracts::{Bid, Game, Item, Money, Participant};

use crate::ledger::BidLedger;

/// A bid is a live claim on an item while it is confirmed and its ceiling
/// still covers the item's current price. A price *below* the ceiling keeps
/// the claim valid; only a rise above it invalidates (via the confirmation
/// flag set during redistribution).
pub fn valid_interest(bid: &Bid, item: &Item) -> bool {
    !bid.needs_confirmation && bid.price >= item.current_price
}

/// True when the current state is a stable, unanimous, one-to-one assignment:
///
/// 1. participant count equals item count;
/// 2. item prices sum to the game total (within `Money::EPSILON`);
/// 3. every item has exactly one valid interest;
/// 4. no bid awaits confirmation;
/// 5. every participant holds exactly one valid interest.
pub fn is_resolved(
    game: &Game,
    items: &BTreeMap<u64, Item>,
    participants: &BTreeMap<u64, Participant>,
    ledger: &BidLedger,
) -> bool {
    if items.is_empty() || participants.len() != items.len() {
        return false;
    }

    let total: Money = items.values().map(|item| item.current_price).sum();
    if !total.approx_eq(game.total_price) {
        return false;
    }

    if ledger.any_needs_confirmation() {
        return false;
    }

    let mut claims_by_participant: BTreeMap<u64, usize> = BTreeMap::new();
    for item in items.values() {
        let mut claimant = None;
        for bid in ledger.bids_for_item(item.id) {
            if !valid_interest(bid, item) {
                continue;
            }
            if claimant.is_some() {
                // Contested item.
                return false;
            }
            claimant = Some(bid.participant_id);
        }
        let Some(participant_id) = claimant else {
            // Unclaimed item.
            return false;
        };
        *claims_by_participant.entry(participant_id).or_insert(0) += 1;
    }

    participants
        .keys()
        .all(|id| claims_by_participant.get(id) == Some(&1))
}
