// Explainability reporting for a solved lineup.
//
// Reconstructs, from a finished matching, why each slot holds who it holds
// (runner-up and margin), why required slots were left open, and why every
// pool member was or was not selected.

use serde::Serialize;

use crate::roster::{Availability, Player, Position, RosterTemplate};

use super::eligibility::{EligibilityMatrix, Filtered};
use super::matching::{AssignmentProblem, Matching};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One slot → player pairing of the chosen assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotAssignment {
    pub slot_id: String,
    pub player_id: Option<String>,
}

/// The best eligible player that was not chosen for a slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternative {
    pub player_id: String,
    pub name: String,
    pub score: f64,
    pub weight: f64,
}

/// Why a required slot was left open.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum UnfilledCause {
    /// Nobody in the available pool can play this slot.
    NoEligiblePlayers,
    /// Every eligible player is placed in another slot. `unavoidable` is true
    /// when no single reassignment into this slot would improve the lineup.
    ClaimedElsewhere {
        claimants: Vec<String>,
        unavoidable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotExplanation {
    pub slot_id: String,
    pub accepts: Vec<Position>,
    pub required: bool,
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    /// Raw projected fantasy points.
    pub score: Option<f64>,
    /// Points as weighted by the solver (after any questionable discount).
    pub weight: Option<f64>,
    pub questionable: bool,
    pub forced: bool,
    pub runner_up: Option<Alternative>,
    /// `weight - runner_up.weight`.
    pub margin: Option<f64>,
    pub unfilled: Option<UnfilledCause>,
}

/// Selection outcome for a single pool member.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SelectionStatus {
    Started {
        slot_id: String,
    },
    Benched {
        slot_id: String,
    },
    /// Removed by the scenario being evaluated.
    Excluded,
    Unavailable {
        availability: Availability,
    },
    /// The template has no slot for this position.
    NoEligibleSlot,
    /// Lost out to the weakest incumbent of a slot they could have filled.
    Outscored {
        slot_id: String,
        incumbent_id: String,
        incumbent_weight: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerExplanation {
    pub player_id: String,
    pub name: String,
    pub position: Position,
    pub score: Option<f64>,
    #[serde(flatten)]
    pub status: SelectionStatus,
}

/// The outcome of one optimization request. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub assignment: Vec<SlotAssignment>,
    /// Sum of starter (required slot) weights.
    pub total_score: f64,
    /// Sum of bench (optional slot) weights; not part of `total_score`.
    pub bench_score: f64,
    /// Whether every required slot is filled.
    pub feasible: bool,
    pub unfilled_required: Vec<String>,
    pub slots: Vec<SlotExplanation>,
    pub players: Vec<PlayerExplanation>,
}

impl OptimizationResult {
    /// Player id placed in `slot_id`, if any.
    pub fn player_in(&self, slot_id: &str) -> Option<&str> {
        self.assignment
            .iter()
            .find(|a| a.slot_id == slot_id)
            .and_then(|a| a.player_id.as_deref())
    }

    /// Slot holding `player_id`, if any.
    pub fn slot_of(&self, player_id: &str) -> Option<&str> {
        self.assignment
            .iter()
            .find(|a| a.player_id.as_deref() == Some(player_id))
            .map(|a| a.slot_id.as_str())
    }

    pub fn slot(&self, slot_id: &str) -> Option<&SlotExplanation> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }

    pub fn player(&self, player_id: &str) -> Option<&PlayerExplanation> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    /// Ids of players in required slots, in slot order.
    pub fn starters(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| s.required)
            .filter_map(|s| s.player_id.as_deref())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// A solve candidate: a pool member who can play this week, with scores.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub pool_index: usize,
    pub availability: Availability,
    pub score: f64,
    pub weight: f64,
}

pub(crate) struct Report<'a> {
    pub pool: &'a [Player],
    pub template: &'a RosterTemplate,
    pub candidates: &'a [Candidate],
    pub filtered: &'a [(usize, Filtered)],
    pub eligibility: &'a EligibilityMatrix,
    pub problem: &'a AssignmentProblem,
    pub matching: &'a Matching,
    /// Candidate indexes pinned by forced includes.
    pub forced: &'a [usize],
}

impl Report<'_> {
    pub fn build(&self) -> OptimizationResult {
        let slots = self.template.slots();
        let placed: Vec<Option<usize>> = (0..self.candidates.len())
            .map(|c| self.matching.slot_of(c))
            .collect();

        let mut total_score = 0.0;
        let mut bench_score = 0.0;
        let mut assignment = Vec::with_capacity(slots.len());
        let mut explanations = Vec::with_capacity(slots.len());
        let mut unfilled_required = Vec::new();

        for (s, slot) in slots.iter().enumerate() {
            let occupant = self.matching.slots[s];
            assignment.push(SlotAssignment {
                slot_id: slot.id.clone(),
                player_id: occupant.map(|c| self.player(c).id.clone()),
            });

            let mut explanation = SlotExplanation {
                slot_id: slot.id.clone(),
                accepts: slot.accepts.clone(),
                required: slot.required,
                player_id: None,
                player_name: None,
                score: None,
                weight: None,
                questionable: false,
                forced: false,
                runner_up: None,
                margin: None,
                unfilled: None,
            };

            match occupant {
                Some(c) => {
                    let cand = &self.candidates[c];
                    let player = self.player(c);
                    if slot.required {
                        total_score += cand.weight;
                    } else {
                        bench_score += cand.weight;
                    }
                    let runner_up = self.runner_up(s, &placed);
                    explanation.player_id = Some(player.id.clone());
                    explanation.player_name = Some(player.name.clone());
                    explanation.score = Some(cand.score);
                    explanation.weight = Some(cand.weight);
                    explanation.questionable = cand.availability.is_questionable();
                    explanation.forced = self.forced.contains(&c);
                    explanation.margin = runner_up.as_ref().map(|r| cand.weight - r.weight);
                    explanation.runner_up = runner_up;
                }
                None if slot.required => {
                    unfilled_required.push(slot.id.clone());
                    explanation.unfilled = Some(self.unfilled_cause(s, &placed));
                }
                None => {}
            }
            explanations.push(explanation);
        }

        OptimizationResult {
            assignment,
            total_score,
            bench_score,
            feasible: unfilled_required.is_empty(),
            unfilled_required,
            slots: explanations,
            players: self.player_explanations(&placed),
        }
    }

    fn player(&self, candidate: usize) -> &Player {
        &self.pool[self.candidates[candidate].pool_index]
    }

    /// Best eligible candidate not already claimed at this slot's level: for
    /// a starting slot anyone not starting (bench players included), for a
    /// bench slot anyone not placed at all. Ties go to the smaller id.
    fn runner_up(&self, slot: usize, placed: &[Option<usize>]) -> Option<Alternative> {
        let required = self.problem.is_required(slot);
        let mut best: Option<usize> = None;
        for c in 0..self.candidates.len() {
            if !self.eligibility.get(c, slot) {
                continue;
            }
            let taken = match placed[c] {
                Some(t) => !required || self.problem.is_required(t),
                None => false,
            };
            if taken {
                continue;
            }
            if best.map_or(true, |b| self.candidates[c].weight > self.candidates[b].weight) {
                best = Some(c);
            }
        }
        best.map(|c| {
            let player = self.player(c);
            Alternative {
                player_id: player.id.clone(),
                name: player.name.clone(),
                score: self.candidates[c].score,
                weight: self.candidates[c].weight,
            }
        })
    }

    /// Classify an open required slot, checking that no single move of an
    /// eligible player into it would improve the objective.
    fn unfilled_cause(&self, slot: usize, placed: &[Option<usize>]) -> UnfilledCause {
        let eligible: Vec<usize> = (0..self.candidates.len())
            .filter(|&c| self.eligibility.get(c, slot))
            .collect();
        if eligible.is_empty() {
            return UnfilledCause::NoEligiblePlayers;
        }

        let current = self.matching.objective;
        let mut unavoidable = true;
        for &c in &eligible {
            let mut moved = self.matching.slots.clone();
            if let Some(from) = placed[c] {
                if self.forced.contains(&c) {
                    continue;
                }
                moved[from] = None;
            }
            moved[slot] = Some(c);
            if self.problem.objective_of(&moved).is_some_and(|v| v > current) {
                unavoidable = false;
                break;
            }
        }

        UnfilledCause::ClaimedElsewhere {
            claimants: eligible.iter().map(|&c| self.player(c).id.clone()).collect(),
            unavoidable,
        }
    }

    fn player_explanations(&self, placed: &[Option<usize>]) -> Vec<PlayerExplanation> {
        let slots = self.template.slots();
        let mut out: Vec<PlayerExplanation> = Vec::with_capacity(self.pool.len());

        for (c, cand) in self.candidates.iter().enumerate() {
            let player = self.player(c);
            let status = match placed[c] {
                Some(s) if slots[s].required => SelectionStatus::Started {
                    slot_id: slots[s].id.clone(),
                },
                Some(s) => SelectionStatus::Benched {
                    slot_id: slots[s].id.clone(),
                },
                None => self.why_not(c),
            };
            out.push(PlayerExplanation {
                player_id: player.id.clone(),
                name: player.name.clone(),
                position: player.position,
                score: Some(cand.score),
                status,
            });
        }

        for &(idx, reason) in self.filtered {
            let player = &self.pool[idx];
            let status = match reason {
                Filtered::Excluded => SelectionStatus::Excluded,
                Filtered::Unavailable(availability) => SelectionStatus::Unavailable { availability },
            };
            out.push(PlayerExplanation {
                player_id: player.id.clone(),
                name: player.name.clone(),
                position: player.position,
                score: None,
                status,
            });
        }

        out.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        out
    }

    /// The occupied eligible slot whose incumbent is weakest, starting slots
    /// before bench slots.
    fn why_not(&self, candidate: usize) -> SelectionStatus {
        let mut weakest: Option<(bool, f64, usize, usize)> = None;
        for s in self.eligibility.slots_for(candidate) {
            let Some(incumbent) = self.matching.slots[s] else {
                continue;
            };
            let required = self.problem.is_required(s);
            let weight = self.candidates[incumbent].weight;
            let better = match weakest {
                None => true,
                Some((best_req, best_w, _, _)) => {
                    (required && !best_req) || (required == best_req && weight < best_w)
                }
            };
            if better {
                weakest = Some((required, weight, s, incumbent));
            }
        }

        match weakest {
            Some((_, weight, s, incumbent)) => SelectionStatus::Outscored {
                slot_id: self.template.slots()[s].id.clone(),
                incumbent_id: self.player(incumbent).id.clone(),
                incumbent_weight: weight,
            },
            None => SelectionStatus::NoEligibleSlot,
        }
    }
}
