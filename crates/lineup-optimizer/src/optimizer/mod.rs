// Lineup optimization pipeline.
//
// pool -> availability filter -> eligibility matrix -> weights ->
// exact assignment -> explanation. One call is one independent solve; all
// intermediate matrices are owned by that call.

pub mod control;
pub mod eligibility;
pub mod explain;
pub mod matching;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LineupError;
use crate::roster::{Availability, Player, RosterTemplate};
use crate::scoring::{ScoreCache, ScoringRule};

pub use control::{CancelToken, SolveControl};
pub use eligibility::{eligible, EligibilityMatrix};
pub use explain::{
    Alternative, OptimizationResult, PlayerExplanation, SelectionStatus, SlotAssignment,
    SlotExplanation, UnfilledCause,
};

use eligibility::{filter_pool, Filtered};
use explain::{Candidate, Report};
use matching::{to_milli, AssignmentProblem, Pin, MAX_POINTS};

// ---------------------------------------------------------------------------
// Policy and per-solve adjustments
// ---------------------------------------------------------------------------

/// Weighting policy applied when turning scores into solver weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolvePolicy {
    /// Fraction removed from a QUESTIONABLE player's score (0.0 = none).
    pub questionable_discount: f64,
}

impl Default for SolvePolicy {
    fn default() -> Self {
        SolvePolicy {
            questionable_discount: 0.0,
        }
    }
}

impl SolvePolicy {
    pub fn validate(&self) -> Result<(), LineupError> {
        let d = self.questionable_discount;
        if !d.is_finite() || !(0.0..=1.0).contains(&d) {
            return Err(LineupError::MalformedRequest(format!(
                "questionable_discount must be between 0.0 and 1.0 inclusive, got {d}"
            )));
        }
        Ok(())
    }

    fn weight(&self, score: f64, availability: Availability) -> f64 {
        if availability.is_questionable() {
            score * (1.0 - self.questionable_discount)
        } else {
            score
        }
    }
}

/// Scenario-level changes applied on top of the base pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Adjustments {
    pub excluded: BTreeSet<String>,
    /// Players to pin into starting slots, in pin order.
    pub forced: Vec<String>,
    pub availability: BTreeMap<String, Availability>,
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// A fully materialized optimization input: nothing here performs I/O.
#[derive(Debug, Clone, Copy)]
pub struct LineupOptimizer<'a> {
    pub pool: &'a [Player],
    pub template: &'a RosterTemplate,
    pub rule: &'a ScoringRule,
    pub policy: &'a SolvePolicy,
}

impl<'a> LineupOptimizer<'a> {
    pub fn new(
        pool: &'a [Player],
        template: &'a RosterTemplate,
        rule: &'a ScoringRule,
        policy: &'a SolvePolicy,
    ) -> Self {
        LineupOptimizer {
            pool,
            template,
            rule,
            policy,
        }
    }

    /// Request-level validation shared by every scenario of a session.
    pub fn validate(&self) -> Result<(), LineupError> {
        let mut seen = HashSet::new();
        for p in self.pool {
            if !seen.insert(p.id.as_str()) {
                return Err(LineupError::MalformedRequest(format!(
                    "duplicate player id `{}` in pool",
                    p.id
                )));
            }
        }
        self.policy.validate()?;
        self.rule.validate_against(self.pool)
    }

    /// Solve with no scenario adjustments, no deadline and a private cache.
    pub fn optimize(&self) -> Result<OptimizationResult, LineupError> {
        self.optimize_with(&Adjustments::default(), &ScoreCache::new(), &SolveControl::unbounded())
    }

    /// Solve one scenario of the request.
    pub fn optimize_with(
        &self,
        adjustments: &Adjustments,
        cache: &ScoreCache,
        control: &SolveControl,
    ) -> Result<OptimizationResult, LineupError> {
        self.validate()?;
        control.checkpoint()?;

        let slots = self.template.slots();
        let (eligible_players, filtered) =
            filter_pool(self.pool, &adjustments.excluded, &adjustments.availability);

        let fingerprint = self.rule.fingerprint();
        let candidates: Vec<Candidate> = eligible_players
            .iter()
            .map(|&(pool_index, availability)| {
                let score = cache.score(&self.pool[pool_index], self.rule, fingerprint);
                Candidate {
                    pool_index,
                    availability,
                    score,
                    weight: self.policy.weight(score, availability),
                }
            })
            .collect();

        if let Some(c) = candidates
            .iter()
            .find(|c| !c.weight.is_finite() || c.weight.abs() > MAX_POINTS)
        {
            return Err(LineupError::MalformedRequest(format!(
                "player '{}' projects {} points, outside the supported range of ±{MAX_POINTS}",
                self.pool[c.pool_index].id, c.score
            )));
        }

        let matrix_input: Vec<(&Player, Availability)> = candidates
            .iter()
            .map(|c| (&self.pool[c.pool_index], c.availability))
            .collect();
        let eligibility = EligibilityMatrix::build(&matrix_input, slots);

        let weights: Vec<Vec<Option<i64>>> = (0..slots.len())
            .map(|s| {
                candidates
                    .iter()
                    .enumerate()
                    .map(|(c, cand)| eligibility.get(c, s).then(|| to_milli(cand.weight)))
                    .collect()
            })
            .collect();
        let problem = AssignmentProblem::new(
            slots.iter().map(|s| s.id.clone()).collect(),
            slots.iter().map(|s| s.required).collect(),
            weights,
        );

        debug!(
            candidates = candidates.len(),
            filtered = filtered.len(),
            slots = slots.len(),
            forced = adjustments.forced.len(),
            "solving lineup"
        );

        let (pins, forced) =
            self.pin_forced(adjustments, &candidates, &filtered, &problem, control)?;

        let matching = problem.solve_canonical(&pins, control)?.ok_or_else(|| {
            LineupError::Internal("forced pins became contradictory".into())
        })?;

        let result = Report {
            pool: self.pool,
            template: self.template,
            candidates: &candidates,
            filtered: &filtered,
            eligibility: &eligibility,
            problem: &problem,
            matching: &matching,
            forced: &forced,
        }
        .build();

        debug!(
            total_score = result.total_score,
            feasible = result.feasible,
            "lineup solved"
        );
        Ok(result)
    }

    /// Pin each forced player into the starting slot that leaves the best
    /// residual lineup. Ties go to the smaller slot id.
    fn pin_forced(
        &self,
        adjustments: &Adjustments,
        candidates: &[Candidate],
        filtered: &[(usize, Filtered)],
        problem: &AssignmentProblem,
        control: &SolveControl,
    ) -> Result<(Vec<(usize, Pin)>, Vec<usize>), LineupError> {
        let slots = self.template.slots();
        let mut pins: Vec<(usize, Pin)> = Vec::new();
        let mut forced: Vec<usize> = Vec::new();

        for player_id in &adjustments.forced {
            let infeasible = |reason: String| LineupError::InfeasibleForcedAssignment {
                player_id: player_id.clone(),
                reason,
            };

            let Some(c) = candidates
                .iter()
                .position(|cand| self.pool[cand.pool_index].id == *player_id)
            else {
                let reason = filtered
                    .iter()
                    .find(|(idx, _)| self.pool[*idx].id == *player_id)
                    .map(|(_, why)| match why {
                        Filtered::Excluded => "player is excluded by the same scenario".to_string(),
                        Filtered::Unavailable(a) => format!("player is {a} this week"),
                    })
                    .unwrap_or_else(|| "player is not in the pool".to_string());
                return Err(infeasible(reason));
            };
            if forced.contains(&c) {
                continue;
            }

            let mut best: Option<(i128, usize)> = None;
            for s in 0..slots.len() {
                if !slots[s].required
                    || !problem.is_eligible(s, c)
                    || pins.iter().any(|(slot, _)| *slot == s)
                {
                    continue;
                }
                let mut trial = pins.clone();
                trial.push((s, Pin::Player(c)));
                if let Some(m) = problem.solve(&trial, control)? {
                    let better = match best {
                        None => true,
                        Some((obj, b)) => {
                            m.objective > obj || (m.objective == obj && slots[s].id < slots[b].id)
                        }
                    };
                    if better {
                        best = Some((m.objective, s));
                    }
                }
            }

            let Some((_, s)) = best else {
                let pos = self.pool[candidates[c].pool_index].position;
                return Err(infeasible(format!("no open starting slot accepts {pos}")));
            };
            debug!(player = %player_id, slot = %slots[s].id, "pinned forced player");
            pins.push((s, Pin::Player(c)));
            forced.push(c);
        }

        Ok((pins, forced))
    }
}

/// Convenience wrapper: optimal lineup for a pool with default policy.
pub fn optimize(
    pool: &[Player],
    template: &RosterTemplate,
    rule: &ScoringRule,
) -> Result<OptimizationResult, LineupError> {
    let policy = SolvePolicy::default();
    LineupOptimizer::new(pool, template, rule, &policy).optimize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{Position, RosterSlot};

    /// Scoring rule where each player's score is their "pts" stat.
    fn points_rule() -> ScoringRule {
        ScoringRule::new("points").with_multiplier("pts", 1.0)
    }

    fn player(id: &str, pos: Position, pts: f64) -> Player {
        Player::new(id, id, pos, "FA").with_stat("pts", pts)
    }

    fn flex_template() -> RosterTemplate {
        use Position::*;
        RosterTemplate::new(vec![
            RosterSlot::new("QB", &[Quarterback], true),
            RosterSlot::new("RB1", &[RunningBack], true),
            RosterSlot::new("RB2", &[RunningBack], true),
            RosterSlot::new("WR1", &[WideReceiver], true),
            RosterSlot::new("WR2", &[WideReceiver], true),
            RosterSlot::new("FLEX", &[RunningBack, WideReceiver, TightEnd], true),
        ])
        .unwrap()
    }

    fn flex_pool() -> Vec<Player> {
        use Position::*;
        vec![
            player("qb20", Quarterback, 20.0),
            player("rb15", RunningBack, 15.0),
            player("rb12", RunningBack, 12.0),
            player("rb08", RunningBack, 8.0),
            player("wr14", WideReceiver, 14.0),
            player("wr11", WideReceiver, 11.0),
            player("wr09", WideReceiver, 9.0),
            player("te10", TightEnd, 10.0),
        ]
    }

    #[test]
    fn flex_takes_best_leftover() {
        let result = optimize(&flex_pool(), &flex_template(), &points_rule()).unwrap();
        assert!(result.feasible);
        assert!((result.total_score - 82.0).abs() < 1e-9);
        assert_eq!(result.player_in("QB"), Some("qb20"));
        assert_eq!(result.player_in("FLEX"), Some("te10"));
        let flex = result.slot("FLEX").unwrap();
        assert_eq!(flex.runner_up.as_ref().unwrap().player_id, "wr09");
        assert!((flex.margin.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unavailable_players_are_filtered_and_reported() {
        let mut pool = flex_pool();
        pool[0].availability = Availability::Bye;
        let result = optimize(&pool, &flex_template(), &points_rule()).unwrap();
        assert!(!result.feasible);
        assert_eq!(result.unfilled_required, vec!["QB".to_string()]);
        assert_eq!(
            result.slot("QB").unwrap().unfilled,
            Some(UnfilledCause::NoEligiblePlayers)
        );
        assert_eq!(
            result.player("qb20").unwrap().status,
            SelectionStatus::Unavailable {
                availability: Availability::Bye
            }
        );
    }

    #[test]
    fn questionable_discount_lowers_weight_and_flags() {
        let mut pool = flex_pool();
        // te10 questionable at 50% discount drops to 5, below wr09 (9) and rb08 (8).
        pool[7].availability = Availability::InjuredQuestionable;
        let policy = SolvePolicy {
            questionable_discount: 0.5,
        };
        let template = flex_template();
        let rule = points_rule();
        let result = LineupOptimizer::new(&pool, &template, &rule, &policy)
            .optimize()
            .unwrap();
        assert_eq!(result.player_in("FLEX"), Some("wr09"));
        assert!((result.total_score - 81.0).abs() < 1e-9);

        // Without a discount the questionable TE still starts, flagged.
        let result = optimize(&pool, &template, &rule).unwrap();
        let flex = result.slot("FLEX").unwrap();
        assert_eq!(flex.player_id.as_deref(), Some("te10"));
        assert!(flex.questionable);
    }

    #[test]
    fn out_of_range_projection_is_rejected() {
        let pool = vec![
            player("a", Position::RunningBack, 1e300),
            player("b", Position::RunningBack, 5.0),
        ];
        let template =
            RosterTemplate::new(vec![RosterSlot::new("RB", &[Position::RunningBack], true)])
                .unwrap();
        let err = optimize(&pool, &template, &points_rule()).unwrap_err();
        assert_eq!(err.kind(), "malformed_request");
        assert_eq!(err.http_status(), 400);

        // Right at the bound still solves.
        let pool = vec![player("a", Position::RunningBack, MAX_POINTS)];
        let result = optimize(&pool, &template, &points_rule()).unwrap();
        assert_eq!(result.player_in("RB"), Some("a"));
    }

    #[test]
    fn forced_include_pins_best_slot() {
        let adjustments = Adjustments {
            forced: vec!["rb08".into()],
            ..Adjustments::default()
        };
        let pool = flex_pool();
        let template = flex_template();
        let rule = points_rule();
        let policy = SolvePolicy::default();
        let result = LineupOptimizer::new(&pool, &template, &rule, &policy)
            .optimize_with(&adjustments, &ScoreCache::new(), &SolveControl::unbounded())
            .unwrap();
        assert!((result.total_score - 80.0).abs() < 1e-9);
        assert!(result.slot_of("rb08").is_some());
        assert!(result.slot_of("te10").is_none());
        let pinned = result.slots.iter().find(|s| s.forced).unwrap();
        assert_eq!(pinned.player_id.as_deref(), Some("rb08"));
    }

    #[test]
    fn forcing_a_player_on_bye_is_infeasible() {
        let mut pool = flex_pool();
        pool[3].availability = Availability::Bye;
        let adjustments = Adjustments {
            forced: vec!["rb08".into()],
            ..Adjustments::default()
        };
        let template = flex_template();
        let rule = points_rule();
        let policy = SolvePolicy::default();
        let err = LineupOptimizer::new(&pool, &template, &rule, &policy)
            .optimize_with(&adjustments, &ScoreCache::new(), &SolveControl::unbounded())
            .unwrap_err();
        match err {
            LineupError::InfeasibleForcedAssignment { player_id, reason } => {
                assert_eq!(player_id, "rb08");
                assert!(reason.contains("BYE"));
            }
            other => panic!("expected InfeasibleForcedAssignment, got: {other}"),
        }
    }

    #[test]
    fn forcing_a_position_without_slots_is_infeasible() {
        let mut pool = flex_pool();
        pool.push(player("k01", Position::Kicker, 7.0));
        let adjustments = Adjustments {
            forced: vec!["k01".into()],
            ..Adjustments::default()
        };
        let template = flex_template();
        let rule = points_rule();
        let policy = SolvePolicy::default();
        let err = LineupOptimizer::new(&pool, &template, &rule, &policy)
            .optimize_with(&adjustments, &ScoreCache::new(), &SolveControl::unbounded())
            .unwrap_err();
        assert_eq!(err.kind(), "infeasible_forced_assignment");
    }

    #[test]
    fn excluded_players_are_reported() {
        let adjustments = Adjustments {
            excluded: ["te10".to_string()].into_iter().collect(),
            ..Adjustments::default()
        };
        let pool = flex_pool();
        let template = flex_template();
        let rule = points_rule();
        let policy = SolvePolicy::default();
        let result = LineupOptimizer::new(&pool, &template, &rule, &policy)
            .optimize_with(&adjustments, &ScoreCache::new(), &SolveControl::unbounded())
            .unwrap();
        assert_eq!(result.player_in("FLEX"), Some("wr09"));
        assert_eq!(result.player("te10").unwrap().status, SelectionStatus::Excluded);
    }

    #[test]
    fn bench_holds_leftovers_without_counting() {
        let mut slots = flex_template().slots().to_vec();
        slots.push(RosterSlot::new("BE1", &Position::ALL, false));
        slots.push(RosterSlot::new("BE2", &Position::ALL, false));
        let template = RosterTemplate::new(slots).unwrap();
        let result = optimize(&flex_pool(), &template, &points_rule()).unwrap();

        assert!((result.total_score - 82.0).abs() < 1e-9);
        // wr09 and rb08 are the leftovers.
        assert!((result.bench_score - 17.0).abs() < 1e-9);
        assert_eq!(
            result.player("rb08").unwrap().status,
            SelectionStatus::Benched {
                slot_id: result.slot_of("rb08").unwrap().to_string()
            }
        );
    }

    #[test]
    fn outscored_players_name_the_weakest_incumbent() {
        let result = optimize(&flex_pool(), &flex_template(), &points_rule()).unwrap();
        match &result.player("rb08").unwrap().status {
            SelectionStatus::Outscored { incumbent_id, .. } => assert_eq!(incumbent_id, "te10"),
            other => panic!("expected Outscored, got: {other:?}"),
        }
    }

    #[test]
    fn players_without_template_slot_have_no_eligible_slot() {
        let mut pool = flex_pool();
        pool.push(player("k01", Position::Kicker, 7.0));
        let result = optimize(&pool, &flex_template(), &points_rule()).unwrap();
        assert_eq!(result.player("k01").unwrap().status, SelectionStatus::NoEligibleSlot);
    }

    #[test]
    fn duplicate_player_ids_are_malformed() {
        let mut pool = flex_pool();
        pool.push(player("qb20", Position::Quarterback, 1.0));
        let err = optimize(&pool, &flex_template(), &points_rule()).unwrap_err();
        assert_eq!(err.kind(), "malformed_request");
    }

    #[test]
    fn invalid_rule_is_reported() {
        let rule = ScoringRule::new("typo").with_multiplier("points", 1.0);
        let err = optimize(&flex_pool(), &flex_template(), &rule).unwrap_err();
        assert_eq!(err.kind(), "invalid_scoring_rule");
    }

    #[test]
    fn claimed_elsewhere_is_unavoidable() {
        use Position::*;
        // Two required slots both want the only TE; one stays open.
        let template = RosterTemplate::new(vec![
            RosterSlot::new("TE", &[TightEnd], true),
            RosterSlot::new("FLEX", &[RunningBack, WideReceiver, TightEnd], true),
        ])
        .unwrap();
        let pool = vec![player("te1", TightEnd, 10.0)];
        let result = optimize(&pool, &template, &points_rule()).unwrap();
        assert!(!result.feasible);
        assert_eq!(result.unfilled_required.len(), 1);
        let open = result.slot(&result.unfilled_required[0]).unwrap();
        assert_eq!(
            open.unfilled,
            Some(UnfilledCause::ClaimedElsewhere {
                claimants: vec!["te1".into()],
                unavoidable: true,
            })
        );
    }

    #[test]
    fn policy_rejects_out_of_range_discount() {
        let policy = SolvePolicy {
            questionable_discount: 1.5,
        };
        assert!(policy.validate().is_err());
        assert!(SolvePolicy::default().validate().is_ok());
    }
}
