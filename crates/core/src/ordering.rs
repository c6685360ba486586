//! Dense 1-based ordering for drag-and-drop lists.
//!
//! Every move rewrites the whole sequence to `1..=N`. Lists are small (tens to
//! low hundreds of entries), so full renumbering keeps the invariant trivial
//! to check at the cost of a few extra writes.

use crate::model::OrderedRecord;

/// Result of a drag-and-drop move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome<T> {
    /// Cancelled drop, same slot, or an index outside the list.
    Unchanged,
    /// The new sequence, renumbered `1..=N`.
    Moved(Vec<T>),
}

impl<T> ReorderOutcome<T> {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, ReorderOutcome::Unchanged)
    }
}

/// Moves the element at `source` to `destination`, shifting the elements in
/// between by one slot, and renumbers every element to match its position.
///
/// `destination` is `None` when a drag ends outside any drop target.
#[must_use]
pub fn relocate<T: OrderedRecord>(
    items: &[T],
    source: usize,
    destination: Option<usize>,
) -> ReorderOutcome<T> {
    let Some(destination) = destination else {
        return ReorderOutcome::Unchanged;
    };
    if source == destination || source >= items.len() || destination >= items.len() {
        return ReorderOutcome::Unchanged;
    }

    let mut moved = items.to_vec();
    let item = moved.remove(source);
    moved.insert(destination, item);
    renumber(&mut moved);
    ReorderOutcome::Moved(moved)
}

/// Rewrites orders to `1..=N` by position. Returns true if any order changed.
pub fn renumber<T: OrderedRecord>(items: &mut [T]) -> bool {
    let mut changed = false;
    for (order, item) in (1u32..).zip(items.iter_mut()) {
        if item.order() != order {
            item.set_order(order);
            changed = true;
        }
    }
    changed
}

/// True if orders, read in sequence, are exactly `1..=N`.
#[must_use]
pub fn is_dense<T: OrderedRecord>(items: &[T]) -> bool {
    (1u32..).zip(items).all(|(expected, item)| item.order() == expected)
}

/// Stable sort by `order`; ties keep their fetched position.
pub fn sort_by_order<T: OrderedRecord>(items: &mut [T]) {
    items.sort_by_key(T::order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CardDraft, CardId, CardScope, DeckId, Flashcard, RecordKey, UserId};

    fn card(id: &str, order: u32) -> Flashcard {
        Flashcard::provisional(
            CardId::new(id),
            order,
            &CardDraft::new(format!("Q {id}"), format!("A {id}")),
            &CardScope::new(DeckId::new("d"), UserId::new("u")),
        )
    }

    fn deck_of(ids: &[&str]) -> Vec<Flashcard> {
        (1u32..).zip(ids).map(|(order, id)| card(id, order)).collect()
    }

    fn ids(items: &[Flashcard]) -> Vec<&str> {
        items.iter().map(|c| c.id.as_str()).collect()
    }

    fn orders(items: &[Flashcard]) -> Vec<u32> {
        items.iter().map(|c| c.order).collect()
    }

    fn expect_moved(outcome: ReorderOutcome<Flashcard>) -> Vec<Flashcard> {
        match outcome {
            ReorderOutcome::Moved(items) => items,
            ReorderOutcome::Unchanged => panic!("expected a move"),
        }
    }

    #[test]
    fn moving_first_to_last_shifts_others_up() {
        let items = deck_of(&["A", "B", "C"]);
        let moved = expect_moved(relocate(&items, 0, Some(2)));

        assert_eq!(ids(&moved), ["B", "C", "A"]);
        assert_eq!(orders(&moved), [1, 2, 3]);
    }

    #[test]
    fn moving_last_to_first_shifts_others_down() {
        let items = deck_of(&["A", "B", "C", "D"]);
        let moved = expect_moved(relocate(&items, 3, Some(1)));

        assert_eq!(ids(&moved), ["A", "D", "B", "C"]);
        assert_eq!(orders(&moved), [1, 2, 3, 4]);
    }

    #[test]
    fn every_valid_move_yields_dense_permutation() {
        let items = deck_of(&["A", "B", "C", "D", "E"]);
        for source in 0..items.len() {
            for destination in 0..items.len() {
                if source == destination {
                    continue;
                }
                let moved = expect_moved(relocate(&items, source, Some(destination)));
                assert!(is_dense(&moved));
                assert_eq!(moved.len(), items.len());
                assert_eq!(moved[destination].id, items[source].id);

                let mut before = ids(&items);
                let mut after = ids(&moved);
                before.sort_unstable();
                after.sort_unstable();
                assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn cancelled_drop_is_noop() {
        let items = deck_of(&["A", "B"]);
        assert!(relocate(&items, 0, None).is_unchanged());
    }

    #[test]
    fn same_slot_is_noop() {
        let items = deck_of(&["A", "B"]);
        assert!(relocate(&items, 1, Some(1)).is_unchanged());
    }

    #[test]
    fn out_of_range_indices_are_noop() {
        let items = deck_of(&["A", "B"]);
        assert!(relocate(&items, 2, Some(0)).is_unchanged());
        assert!(relocate(&items, 0, Some(5)).is_unchanged());
        assert!(relocate::<Flashcard>(&[], 0, Some(0)).is_unchanged());
    }

    #[test]
    fn renumber_closes_gaps() {
        let mut items = vec![card("A", 1), card("C", 3), card("D", 7)];
        assert!(renumber(&mut items));
        assert_eq!(orders(&items), [1, 2, 3]);
        assert!(!renumber(&mut items));
    }

    #[test]
    fn sort_by_order_is_stable() {
        let mut items = vec![card("C", 3), card("A", 1), card("B1", 2), card("B2", 2)];
        sort_by_order(&mut items);
        assert_eq!(ids(&items), ["A", "B1", "B2", "C"]);
        assert!(!is_dense(&items));
    }
}
