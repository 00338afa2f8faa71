//! Pure redistribution calculator.
//!
//! Moving one item's price compensates all other items by an even share of
//! the difference, keeping the sum of the output equal to the sum of the
//! input to the cent. The split is even rather than proportional on purpose.

use std::collections::BTreeMap;

use contracts::{Item, Money};

use crate::error::EngineError;

/// Compute the full post-move price map for `items` when `changed_item_id`
/// is re-priced to `new_price`.
///
/// The changed item receives exactly `new_price`; every other item is reduced
/// by `diff / |others|`, with the leftover cents taken from the lowest-id
/// other items so no cent is created or destroyed. Other items may go
/// negative transiently; only the proposed price itself is bounded at zero.
pub fn redistribute(
    items: &BTreeMap<u64, Item>,
    changed_item_id: u64,
    new_price: Money,
) -> Result<BTreeMap<u64, Money>, EngineError> {
    if new_price.is_negative() {
        return Err(EngineError::InvalidPrice(new_price));
    }
    let changed = items
        .get(&changed_item_id)
        .ok_or(EngineError::ItemNotFound(changed_item_id))?;

    let other_count = items.len() - 1;
    if other_count == 0 {
        return Err(EngineError::NoRedistributionTarget);
    }

    let diff = new_price - changed.current_price;
    let reductions = diff.split_even(other_count);

    let mut prices = BTreeMap::new();
    prices.insert(changed_item_id, new_price);
    let others = items.values().filter(|item| item.id != changed_item_id);
    for (item, reduction) in others.zip(reductions) {
        prices.insert(item.id, item.current_price - reduction);
    }

    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, cents: i64) -> Item {
        Item {
            id,
            game_id: 1,
            title: format!("item {id}"),
            image_ref: None,
            current_price: Money::from_cents(cents),
        }
    }

    fn items(prices: &[i64]) -> BTreeMap<u64, Item> {
        prices
            .iter()
            .enumerate()
            .map(|(index, cents)| (index as u64 + 1, item(index as u64 + 1, *cents)))
            .collect()
    }

    #[test]
    fn raises_one_item_and_lowers_the_rest_evenly() {
        let items = items(&[4000, 6000]);
        let prices = redistribute(&items, 1, Money::from_cents(5000)).expect("redistribute");
        assert_eq!(prices[&1], Money::from_cents(5000));
        assert_eq!(prices[&2], Money::from_cents(5000));
    }

    #[test]
    fn lowering_a_price_raises_the_others() {
        let items = items(&[3000, 3000, 4000]);
        let prices = redistribute(&items, 3, Money::from_cents(2000)).expect("redistribute");
        assert_eq!(prices[&3], Money::from_cents(2000));
        assert_eq!(prices[&1], Money::from_cents(4000));
        assert_eq!(prices[&2], Money::from_cents(4000));
    }

    #[test]
    fn leftover_cents_land_on_the_lowest_ids() {
        // diff of 100 cents over 3 others: 34 + 33 + 33.
        let items = items(&[1000, 1000, 1000, 1000]);
        let prices = redistribute(&items, 4, Money::from_cents(1100)).expect("redistribute");
        assert_eq!(prices[&1], Money::from_cents(966));
        assert_eq!(prices[&2], Money::from_cents(967));
        assert_eq!(prices[&3], Money::from_cents(967));
        let sum: Money = prices.values().copied().sum();
        assert_eq!(sum, Money::from_cents(4000));
    }

    #[test]
    fn conserves_the_total_exactly() {
        let items = items(&[1234, 567, 8901, 23]);
        let before: Money = items.values().map(|item| item.current_price).sum();
        let prices = redistribute(&items, 2, Money::from_cents(4999)).expect("redistribute");
        let after: Money = prices.values().copied().sum();
        assert_eq!(before, after);
    }

    #[test]
    fn rejects_negative_prices() {
        let items = items(&[4000, 6000]);
        let err = redistribute(&items, 1, Money::from_cents(-1)).unwrap_err();
        assert_eq!(err, EngineError::InvalidPrice(Money::from_cents(-1)));
    }

    #[test]
    fn rejects_unknown_items() {
        let items = items(&[4000, 6000]);
        let err = redistribute(&items, 9, Money::from_cents(100)).unwrap_err();
        assert_eq!(err, EngineError::ItemNotFound(9));
    }

    #[test]
    fn single_item_game_has_no_redistribution_target() {
        let items = items(&[10_000]);
        let err = redistribute(&items, 1, Money::from_cents(5000)).unwrap_err();
        assert_eq!(err, EngineError::NoRedistributionTarget);
    }

    #[test]
    fn other_items_may_go_negative() {
        let items = items(&[100, 50]);
        let prices = redistribute(&items, 1, Money::from_cents(200)).expect("redistribute");
        assert_eq!(prices[&2], Money::from_cents(-50));
    }
}
