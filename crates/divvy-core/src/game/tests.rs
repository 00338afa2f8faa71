use super::*;
use crate::lifecycle::{ACTIVE_TTL_MS, RESOLVED_TTL_MS};

const T0: i64 = 1_700_000_000_000;

fn two_item_game() -> GameState {
    let mut state = GameState::new(
        1,
        "tok-1".to_string(),
        "flat split".to_string(),
        Money::from_major(100),
        T0,
    );
    state
        .add_item("couch".to_string(), None, Money::from_major(40), T0)
        .unwrap();
    state
        .add_item("table".to_string(), None, Money::from_major(60), T0)
        .unwrap();
    state
        .add_participant("ana".to_string(), None, T0)
        .unwrap();
    state
        .add_participant("ben".to_string(), None, T0)
        .unwrap();
    state
}

fn total(state: &GameState) -> Money {
    state.items().map(|item| item.current_price).sum()
}

#[test]
fn claims_at_current_prices_resolve_the_game() {
    let mut state = two_item_game();

    let first = state
        .propose_price(1, 1, Money::from_major(40), T0 + 1)
        .unwrap();
    assert!(!first.resolved);

    let second = state
        .propose_price(2, 2, Money::from_major(60), T0 + 2)
        .unwrap();
    assert!(second.resolved);
    assert_eq!(state.game().status, GameStatus::Resolved);
    assert_eq!(state.game().resolved_at_ms, Some(T0 + 2));
    assert_eq!(state.game().expires_at_ms, T0 + 2 + RESOLVED_TTL_MS);
}

#[test]
fn proposal_redistributes_and_conserves_the_budget() {
    let mut state = two_item_game();

    let outcome = state
        .propose_price(1, 1, Money::from_major(50), T0 + 1)
        .unwrap();
    assert_eq!(outcome.prices[&1], Money::from_major(50));
    assert_eq!(outcome.prices[&2], Money::from_major(50));
    assert_eq!(total(&state), Money::from_major(100));
}

#[test]
fn lowering_a_price_flags_outbid_claims_on_raised_items() {
    let mut state = two_item_game();
    state.propose_price(2, 2, Money::from_major(60), T0 + 1).unwrap();

    // ana drops the couch to 20; the table rises to 80, above ben's 60.
    let outcome = state
        .propose_price(1, 1, Money::from_major(20), T0 + 2)
        .unwrap();
    assert_eq!(outcome.stale_bids, vec![(2, 2)]);
    let ben_bid = state.ledger.get(2, 2).unwrap();
    assert!(ben_bid.needs_confirmation);
    assert!(!outcome.resolved);
}

#[test]
fn raising_a_claimed_item_keeps_resolution_while_ceilings_cover() {
    let mut state = two_item_game();
    state.propose_price(1, 1, Money::from_major(40), T0 + 1).unwrap();
    state.propose_price(2, 2, Money::from_major(60), T0 + 2).unwrap();
    assert_eq!(state.game().status, GameStatus::Resolved);

    // ana raises the couch to 50; the table drops to 50, still under ben's
    // ceiling of 60.
    let outcome = state
        .propose_price(1, 1, Money::from_major(50), T0 + 3)
        .unwrap();
    assert!(outcome.stale_bids.is_empty());
    assert!(outcome.resolved);
    assert_eq!(state.game().status, GameStatus::Resolved);

    // Raising further to 65 drops the table to 35; a price *decrease* never
    // invalidates a held claim.
    let outcome = state
        .propose_price(1, 1, Money::from_major(65), T0 + 4)
        .unwrap();
    assert!(outcome.stale_bids.is_empty());
    assert!(outcome.resolved);
}

#[test]
fn breaking_the_predicate_leaves_status_resolved_until_reset() {
    let mut state = two_item_game();
    state.propose_price(1, 1, Money::from_major(40), T0 + 1).unwrap();
    state.propose_price(2, 2, Money::from_major(60), T0 + 2).unwrap();
    assert_eq!(state.game().status, GameStatus::Resolved);

    // ana drops the couch; the table climbs past ben's ceiling. The live
    // predicate turns false but the status transition only reverses by reset.
    let outcome = state
        .propose_price(1, 1, Money::from_major(20), T0 + 3)
        .unwrap();
    assert!(!outcome.resolved);
    assert!(!state.is_resolved_now());
    assert_eq!(state.game().status, GameStatus::Resolved);

    state.reset(T0 + 4).unwrap();
    assert_eq!(state.game().status, GameStatus::Active);
}

#[test]
fn initiator_claims_are_never_flagged() {
    let mut state = two_item_game();

    state.propose_price(2, 1, Money::from_major(60), T0 + 1).unwrap();
    // ana lowers the couch herself; the table rises but her own claim on it
    // must stay fresh.
    let outcome = state
        .propose_price(1, 1, Money::from_major(20), T0 + 2)
        .unwrap();
    assert!(outcome.stale_bids.is_empty());
    assert!(!state.ledger.get(2, 1).unwrap().needs_confirmation);
}

#[test]
fn confirming_a_flagged_claim_restores_resolution() {
    let mut state = two_item_game();

    state.propose_price(2, 2, Money::from_major(60), T0 + 1).unwrap();
    state.propose_price(1, 1, Money::from_major(20), T0 + 2).unwrap();
    assert!(state.ledger.get(2, 2).unwrap().needs_confirmation);

    let outcome = state.confirm_bid(2, 2, T0 + 3).unwrap();
    assert!(!outcome.bid.needs_confirmation);
    assert_eq!(outcome.bid.price, Money::from_major(80));
    assert!(outcome.resolved);
    assert_eq!(state.game().status, GameStatus::Resolved);
}

#[test]
fn confirm_is_idempotent() {
    let mut state = two_item_game();
    state.propose_price(1, 1, Money::from_major(40), T0 + 1).unwrap();

    let first = state.confirm_bid(1, 1, T0 + 2).unwrap();
    let events_before = state.events().len();
    let second = state.confirm_bid(1, 1, T0 + 3).unwrap();
    assert_eq!(first.bid.price, second.bid.price);
    assert_eq!(state.events().len(), events_before);
}

#[test]
fn confirm_creates_a_claim_when_none_exists() {
    let mut state = two_item_game();
    let outcome = state.confirm_bid(1, 2, T0 + 1).unwrap();
    assert_eq!(outcome.bid.price, Money::from_major(40));
    assert!(!outcome.bid.needs_confirmation);
}

#[test]
fn ceiling_above_current_price_still_resolves() {
    let mut state = two_item_game();

    // ben bids the table up to 60, then ana takes the couch at 40; ben's
    // recorded ceiling of 60 covers the table's price so the game settles.
    state.propose_price(2, 2, Money::from_major(60), T0 + 1).unwrap();
    let outcome = state
        .propose_price(1, 1, Money::from_major(40), T0 + 2)
        .unwrap();
    assert!(outcome.resolved);
}

#[test]
fn reset_splits_evenly_and_clears_claims() {
    let mut state = two_item_game();
    state.propose_price(1, 1, Money::from_major(40), T0 + 1).unwrap();
    state.propose_price(2, 2, Money::from_major(60), T0 + 2).unwrap();
    assert_eq!(state.game().status, GameStatus::Resolved);

    state.reset(T0 + 3).unwrap();
    assert_eq!(state.game().status, GameStatus::Active);
    assert_eq!(state.game().resolved_at_ms, None);
    for item in state.items() {
        assert_eq!(item.current_price, Money::from_major(50));
    }
    assert!(state.ledger.is_empty());
    assert_eq!(state.game().expires_at_ms, T0 + 3 + ACTIVE_TTL_MS);
}

#[test]
fn expired_games_reject_every_mutation() {
    let mut state = two_item_game();
    assert!(state.expire_if_due(T0 + ACTIVE_TTL_MS));

    assert!(matches!(
        state.propose_price(1, 1, Money::from_major(50), T0 + ACTIVE_TTL_MS + 1),
        Err(EngineError::GameExpired)
    ));
    assert!(matches!(
        state.confirm_bid(1, 1, T0 + ACTIVE_TTL_MS + 1),
        Err(EngineError::GameExpired)
    ));
    assert!(matches!(
        state.reset(T0 + ACTIVE_TTL_MS + 1),
        Err(EngineError::GameExpired)
    ));
    assert!(matches!(
        state.add_item("lamp".to_string(), None, Money::ZERO, T0 + ACTIVE_TTL_MS + 1),
        Err(EngineError::GameExpired)
    ));
}

#[test]
fn touch_extends_only_active_deadlines() {
    let mut state = two_item_game();
    state.touch(T0 + 10);
    assert_eq!(state.game().expires_at_ms, T0 + 10 + ACTIVE_TTL_MS);

    state.propose_price(1, 1, Money::from_major(40), T0 + 11).unwrap();
    state.propose_price(2, 2, Money::from_major(60), T0 + 12).unwrap();
    let resolved_deadline = state.game().expires_at_ms;
    state.touch(T0 + 1000);
    assert_eq!(state.game().expires_at_ms, resolved_deadline);
}

#[test]
fn single_item_proposals_are_rejected() {
    let mut state = GameState::new(
        2,
        "tok-2".to_string(),
        "solo".to_string(),
        Money::from_major(30),
        T0,
    );
    state
        .add_item("rug".to_string(), None, Money::from_major(30), T0)
        .unwrap();
    state
        .add_participant("ana".to_string(), None, T0)
        .unwrap();

    assert!(matches!(
        state.propose_price(1, 1, Money::from_major(10), T0 + 1),
        Err(EngineError::NoRedistributionTarget)
    ));
    // Rejected proposals leave prices untouched.
    assert_eq!(total(&state), Money::from_major(30));
}

#[test]
fn creator_is_assigned_once() {
    let mut state = two_item_game();
    state.assign_creator(1).unwrap();
    assert_eq!(state.game().creator_id, Some(1));
    state.assign_creator(1).unwrap();
    assert!(matches!(
        state.assign_creator(2),
        Err(EngineError::GameStateConflict(_))
    ));
    assert!(matches!(
        state.assign_creator(99),
        Err(EngineError::ParticipantNotFound(99))
    ));
}

#[test]
fn event_log_orders_by_sequence() {
    let mut state = two_item_game();
    state.propose_price(1, 1, Money::from_major(50), T0 + 1).unwrap();

    let seqs: Vec<u64> = state.events().iter().map(|event| event.seq).collect();
    let mut sorted = seqs.clone();
    sorted.sort_unstable();
    assert_eq!(seqs, sorted);
    assert_eq!(state.events()[0].event_type, GameEventType::GameCreated);
    assert!(state
        .events()
        .iter()
        .any(|event| event.event_type == GameEventType::PriceRedistributed));
}

#[test]
fn restore_continues_id_sequences() {
    let original = two_item_game();
    let restored = GameState::from_parts(
        original.game().clone(),
        original.items().cloned().collect(),
        original.participants().cloned().collect(),
        original.bids().cloned().collect(),
        original.next_event_seq(),
    );

    assert_eq!(restored.next_item_id, 3);
    assert_eq!(restored.next_participant_id, 3);
    assert!(restored.events().is_empty());
    assert_eq!(restored.next_event_seq(), original.next_event_seq());
}
