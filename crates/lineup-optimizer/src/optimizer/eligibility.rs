// Availability filtering and (player, slot) eligibility.

use std::collections::{BTreeMap, BTreeSet};

use crate::roster::{Availability, Player, RosterSlot};

/// Availability of `player` this week, after any scenario override.
pub fn effective_availability(
    player: &Player,
    overrides: &BTreeMap<String, Availability>,
) -> Availability {
    overrides
        .get(&player.id)
        .copied()
        .unwrap_or(player.availability)
}

/// Whether `player` may fill `slot` given their availability this week.
///
/// BYE, INJURED_OUT and SUSPENDED players are ineligible for every slot.
/// QUESTIONABLE players remain eligible; any discount is a weighting
/// concern, not an eligibility one.
pub fn eligible_with(player: &Player, availability: Availability, slot: &RosterSlot) -> bool {
    availability.can_play() && slot.accepts(player.position)
}

/// Eligibility using the player's own reported availability.
pub fn eligible(player: &Player, slot: &RosterSlot) -> bool {
    eligible_with(player, player.availability, slot)
}

/// Why a pool member did not make it into the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filtered {
    Excluded,
    Unavailable(Availability),
}

/// Split the pool into solve candidates and filtered players.
///
/// Candidates are returned as indexes into `pool`, sorted by player id so the
/// solver's index order matches identifier order.
pub fn filter_pool(
    pool: &[Player],
    excluded: &BTreeSet<String>,
    overrides: &BTreeMap<String, Availability>,
) -> (Vec<(usize, Availability)>, Vec<(usize, Filtered)>) {
    let mut order: Vec<usize> = (0..pool.len()).collect();
    order.sort_by(|&a, &b| pool[a].id.cmp(&pool[b].id));

    let mut candidates = Vec::new();
    let mut filtered = Vec::new();
    for idx in order {
        let player = &pool[idx];
        let availability = effective_availability(player, overrides);
        if excluded.contains(&player.id) {
            filtered.push((idx, Filtered::Excluded));
        } else if !availability.can_play() {
            filtered.push((idx, Filtered::Unavailable(availability)));
        } else {
            candidates.push((idx, availability));
        }
    }
    (candidates, filtered)
}

/// Boolean relation over (candidate player × slot), derived per solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityMatrix {
    num_slots: usize,
    cells: Vec<bool>,
}

impl EligibilityMatrix {
    pub fn build(players: &[(&Player, Availability)], slots: &[RosterSlot]) -> Self {
        let mut cells = Vec::with_capacity(players.len() * slots.len());
        for (player, availability) in players {
            for slot in slots {
                cells.push(eligible_with(player, *availability, slot));
            }
        }
        EligibilityMatrix {
            num_slots: slots.len(),
            cells,
        }
    }

    pub fn get(&self, player: usize, slot: usize) -> bool {
        self.cells[player * self.num_slots + slot]
    }

    /// Slots the player may fill.
    pub fn slots_for(&self, player: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_slots).filter(move |&s| self.get(player, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Position;

    fn flex() -> RosterSlot {
        RosterSlot::new(
            "FLEX",
            &[Position::RunningBack, Position::WideReceiver, Position::TightEnd],
            true,
        )
    }

    #[test]
    fn position_membership_decides_eligibility() {
        let qb = Player::new("qb", "QB", Position::Quarterback, "BUF");
        let te = Player::new("te", "TE", Position::TightEnd, "KC");
        assert!(!eligible(&qb, &flex()));
        assert!(eligible(&te, &flex()));
    }

    #[test]
    fn unavailable_players_are_never_eligible() {
        for status in [Availability::Bye, Availability::InjuredOut, Availability::Suspended] {
            let rb = Player::new("rb", "RB", Position::RunningBack, "SF").with_availability(status);
            assert!(!eligible(&rb, &flex()), "{status} should be ineligible");
        }
        let q = Player::new("rb", "RB", Position::RunningBack, "SF")
            .with_availability(Availability::InjuredQuestionable);
        assert!(eligible(&q, &flex()));
    }

    #[test]
    fn overrides_replace_reported_availability() {
        let rb = Player::new("rb", "RB", Position::RunningBack, "SF");
        let mut overrides = BTreeMap::new();
        overrides.insert("rb".to_string(), Availability::InjuredOut);
        assert_eq!(effective_availability(&rb, &overrides), Availability::InjuredOut);
        assert_eq!(effective_availability(&rb, &BTreeMap::new()), Availability::Available);
    }

    #[test]
    fn filter_pool_sorts_and_classifies() {
        let pool = vec![
            Player::new("z", "Z", Position::WideReceiver, "NYJ"),
            Player::new("b", "B", Position::WideReceiver, "NYJ").with_availability(Availability::Bye),
            Player::new("a", "A", Position::WideReceiver, "NYJ"),
            Player::new("c", "C", Position::WideReceiver, "NYJ"),
        ];
        let excluded: BTreeSet<String> = ["c".to_string()].into_iter().collect();
        let (candidates, filtered) = filter_pool(&pool, &excluded, &BTreeMap::new());

        let ids: Vec<&str> = candidates.iter().map(|(i, _)| pool[*i].id.as_str()).collect();
        assert_eq!(ids, vec!["a", "z"]);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.contains(&(1, Filtered::Unavailable(Availability::Bye))));
        assert!(filtered.contains(&(3, Filtered::Excluded)));
    }

    #[test]
    fn matrix_lookup() {
        let rb = Player::new("rb", "RB", Position::RunningBack, "SF");
        let qb = Player::new("qb", "QB", Position::Quarterback, "SF");
        let slots = vec![RosterSlot::new("QB", &[Position::Quarterback], true), flex()];
        let players = vec![(&rb, Availability::Available), (&qb, Availability::Available)];
        let matrix = EligibilityMatrix::build(&players, &slots);

        assert!(!matrix.get(0, 0));
        assert!(matrix.get(0, 1));
        assert!(matrix.get(1, 0));
        assert_eq!(matrix.slots_for(0).collect::<Vec<_>>(), vec![1]);
        assert_eq!(matrix.slots_for(1).collect::<Vec<_>>(), vec![0]);
    }
}
