use std::collections::HashSet;

use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::VersionedState};

/// Appends reason cards, skipping any whose dedup key already appears in the
/// channel. A step that is retried (e.g. after a resumed checkpoint) replays
/// node output verbatim, so without this guard the same card would be
/// appended twice.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddReasonCards;
impl Reducer for AddReasonCards {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial) {
        if let Some(cards) = &update.reason_cards
            && !cards.is_empty()
        {
            let mut seen: HashSet<_> = state
                .reason_cards
                .snapshot()
                .iter()
                .map(|c| c.dedup_key())
                .collect();

            for card in cards {
                let key = card.dedup_key();
                if seen.insert(key) {
                    state.reason_cards.get_mut().push(card.clone());
                }
            }
        }
    }
}
