// Optimization session: the base request plus scenario variations, solved
// concurrently and ranked.
//
// Each scenario is an independent, fresh solve on a blocking worker. A
// semaphore bounds how many solves run at once. The session's cancel token
// reaches every in-flight solve through its SolveControl.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{ErrorReport, LineupError};
use crate::optimizer::{
    Adjustments, CancelToken, LineupOptimizer, OptimizationResult, SolveControl, SolvePolicy,
};
use crate::roster::{Availability, Player, RosterTemplate};
use crate::scoring::{ScoreCache, ScoringRule};

/// Label given to the unmodified base request in a session report.
pub const BASE_LABEL: &str = "base";

// ---------------------------------------------------------------------------
// Request and scenario types
// ---------------------------------------------------------------------------

/// Everything a solve needs, materialized up front.
#[derive(Debug, Clone)]
pub struct LineupRequest {
    pub pool: Vec<Player>,
    pub template: RosterTemplate,
    pub rule: ScoringRule,
    pub policy: SolvePolicy,
}

impl LineupRequest {
    pub fn new(pool: Vec<Player>, template: RosterTemplate, rule: ScoringRule) -> Self {
        LineupRequest {
            pool,
            template,
            rule,
            policy: SolvePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SolvePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn optimizer(&self) -> LineupOptimizer<'_> {
        LineupOptimizer::new(&self.pool, &self.template, &self.rule, &self.policy)
    }
}

/// One change a scenario applies to the base request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioDelta {
    #[serde(rename_all = "camelCase")]
    Exclude { player_id: String },
    #[serde(rename_all = "camelCase")]
    ForceInclude { player_id: String },
    #[serde(rename_all = "camelCase")]
    SetAvailability {
        player_id: String,
        availability: Availability,
    },
}

impl ScenarioDelta {
    pub fn player_id(&self) -> &str {
        match self {
            ScenarioDelta::Exclude { player_id }
            | ScenarioDelta::ForceInclude { player_id }
            | ScenarioDelta::SetAvailability { player_id, .. } => player_id,
        }
    }
}

/// A named hypothetical variation of the base request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub label: String,
    #[serde(default)]
    pub deltas: Vec<ScenarioDelta>,
    /// Per-scenario solve deadline, overriding the session default.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl Scenario {
    pub fn new(label: &str) -> Self {
        Scenario {
            label: label.to_string(),
            deltas: Vec::new(),
            deadline_ms: None,
        }
    }

    pub fn exclude(mut self, player_id: &str) -> Self {
        self.deltas.push(ScenarioDelta::Exclude {
            player_id: player_id.to_string(),
        });
        self
    }

    pub fn force(mut self, player_id: &str) -> Self {
        self.deltas.push(ScenarioDelta::ForceInclude {
            player_id: player_id.to_string(),
        });
        self
    }

    pub fn set_availability(mut self, player_id: &str, availability: Availability) -> Self {
        self.deltas.push(ScenarioDelta::SetAvailability {
            player_id: player_id.to_string(),
            availability,
        });
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    /// Resolve the deltas against the pool. Unknown players and a player
    /// both excluded and forced make the scenario invalid.
    pub fn adjustments(&self, pool: &[Player]) -> Result<Adjustments, LineupError> {
        let known: BTreeSet<&str> = pool.iter().map(|p| p.id.as_str()).collect();
        let invalid = |message: String| LineupError::InvalidScenario {
            scenario: self.label.clone(),
            message,
        };

        let mut adjustments = Adjustments::default();
        for delta in &self.deltas {
            let id = delta.player_id();
            if !known.contains(id) {
                return Err(invalid(format!("player `{id}` is not in the pool")));
            }
            match delta {
                ScenarioDelta::Exclude { player_id } => {
                    adjustments.excluded.insert(player_id.clone());
                }
                ScenarioDelta::ForceInclude { player_id } => {
                    if !adjustments.forced.contains(player_id) {
                        adjustments.forced.push(player_id.clone());
                    }
                }
                ScenarioDelta::SetAvailability {
                    player_id,
                    availability,
                } => {
                    adjustments
                        .availability
                        .insert(player_id.clone(), *availability);
                }
            }
        }

        if let Some(id) = adjustments
            .forced
            .iter()
            .find(|id| adjustments.excluded.contains(*id))
        {
            return Err(invalid(format!("player `{id}` is both excluded and forced")));
        }
        Ok(adjustments)
    }
}

// ---------------------------------------------------------------------------
// Session report
// ---------------------------------------------------------------------------

/// Result of one scenario: either a lineup or the error that prevented it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub label: String,
    /// 1-based rank among successful scenarios.
    pub rank: Option<usize>,
    pub result: Option<OptimizationResult>,
    pub error: Option<ErrorReport>,
}

impl ScenarioOutcome {
    pub fn total_score(&self) -> Option<f64> {
        self.result.as_ref().map(|r| r.total_score)
    }
}

/// All scenario outcomes: successes by total score descending, then
/// failures in submission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SessionReport {
    pub fn best(&self) -> Option<&ScenarioOutcome> {
        self.outcomes.first().filter(|o| o.result.is_some())
    }

    pub fn get(&self, label: &str) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.label == label)
    }

    fn ranked(entries: Vec<(String, Result<OptimizationResult, LineupError>)>) -> Self {
        let mut ok: Vec<(String, OptimizationResult)> = Vec::new();
        let mut failed: Vec<(String, LineupError)> = Vec::new();
        for (label, result) in entries {
            match result {
                Ok(r) => ok.push((label, r)),
                Err(e) => failed.push((label, e)),
            }
        }
        // Stable sort keeps submission order among equal totals.
        ok.sort_by(|(_, a), (_, b)| b.total_score.total_cmp(&a.total_score));

        let mut outcomes = Vec::with_capacity(ok.len() + failed.len());
        for (i, (label, result)) in ok.into_iter().enumerate() {
            outcomes.push(ScenarioOutcome {
                label,
                rank: Some(i + 1),
                result: Some(result),
                error: None,
            });
        }
        for (label, e) in failed {
            outcomes.push(ScenarioOutcome {
                label,
                rank: None,
                result: None,
                error: Some(ErrorReport::from(&e)),
            });
        }
        SessionReport { outcomes }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Maximum number of solves running at once.
    pub max_concurrency: usize,
    /// Default per-solve deadline; scenarios may override it.
    pub solve_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            max_concurrency: 4,
            solve_timeout: None,
        }
    }
}

/// Coordinates the solves of one optimization request.
///
/// Each call to [`Session::run`] gets its own score memo, shared by the base
/// solve and every scenario of that call only.
#[derive(Debug)]
pub struct Session {
    options: SessionOptions,
    cancel: CancelToken,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Session {
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Handle that cancels this session from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Solve the base request and every scenario, returning ranked outcomes.
    ///
    /// Fails as a whole only when the base request is malformed (including
    /// an unusable scoring rule) or the session is cancelled. Scenario
    /// failures are reported inside their outcome.
    pub async fn run(
        &self,
        request: Arc<LineupRequest>,
        scenarios: Vec<Scenario>,
    ) -> Result<SessionReport, LineupError> {
        self.run_with_cache(request, scenarios, Arc::new(ScoreCache::new()))
            .await
    }

    async fn run_with_cache(
        &self,
        request: Arc<LineupRequest>,
        scenarios: Vec<Scenario>,
        cache: Arc<ScoreCache>,
    ) -> Result<SessionReport, LineupError> {
        request.optimizer().validate()?;
        if self.cancel.is_cancelled() {
            return Err(LineupError::Cancelled);
        }

        let total = scenarios.len() + 1;
        info!(
            scenarios = scenarios.len(),
            players = request.pool.len(),
            slots = request.template.len(),
            "starting optimization session"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut labels = Vec::with_capacity(total);
        let mut tasks = JoinSet::new();

        let jobs = std::iter::once(None).chain(scenarios.into_iter().map(Some));
        for (index, scenario) in jobs.enumerate() {
            labels.push(
                scenario
                    .as_ref()
                    .map_or_else(|| BASE_LABEL.to_string(), |s| s.label.clone()),
            );
            let limit = scenario
                .as_ref()
                .and_then(|s| s.deadline_ms)
                .map(Duration::from_millis)
                .or(self.options.solve_timeout);

            let request = Arc::clone(&request);
            let cache = Arc::clone(&cache);
            let cancel = self.cancel.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, Err(LineupError::Cancelled));
                };
                let solved = tokio::task::spawn_blocking(move || {
                    // The deadline clock starts when the solve does, not when
                    // it was queued.
                    let control = SolveControl::new(cancel, limit);
                    solve_scenario(&request, scenario.as_ref(), &cache, &control)
                })
                .await;
                let result = solved.unwrap_or_else(|e| {
                    Err(LineupError::Internal(format!("solver task failed: {e}")))
                });
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<OptimizationResult, LineupError>>> =
            (0..total).map(|_| None).collect();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tasks.abort_all();
                    warn!("optimization session cancelled");
                    return Err(LineupError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((index, result))) => {
                        match &result {
                            Err(e) if e.is_scenario_local() => {
                                debug!(scenario = %labels[index], error = %e, "scenario failed");
                            }
                            Err(e) => warn!(scenario = %labels[index], error = %e, "scenario failed"),
                            Ok(_) => {}
                        }
                        results[index] = Some(result);
                    }
                    Some(Err(e)) => {
                        tasks.abort_all();
                        return Err(LineupError::Internal(format!("scenario task failed: {e}")));
                    }
                },
            }
        }

        let mut entries = Vec::with_capacity(total);
        for (label, result) in labels.into_iter().zip(results) {
            let result = result
                .unwrap_or_else(|| Err(LineupError::Internal("scenario produced no result".into())));
            if matches!(result, Err(LineupError::Cancelled)) {
                warn!("optimization session cancelled");
                return Err(LineupError::Cancelled);
            }
            entries.push((label, result));
        }

        let report = SessionReport::ranked(entries);
        let (hits, misses) = cache.stats();
        info!(
            best = report.best().map(|o| o.label.as_str()).unwrap_or("none"),
            failed = report.outcomes.iter().filter(|o| o.error.is_some()).count(),
            cache_hits = hits,
            cache_misses = misses,
            "optimization session complete"
        );
        Ok(report)
    }
}

fn solve_scenario(
    request: &LineupRequest,
    scenario: Option<&Scenario>,
    cache: &ScoreCache,
    control: &SolveControl,
) -> Result<OptimizationResult, LineupError> {
    let adjustments = match scenario {
        Some(s) => s.adjustments(&request.pool)?,
        None => Adjustments::default(),
    };
    let result = request.optimizer().optimize_with(&adjustments, cache, control)?;
    debug!(
        scenario = scenario.map_or(BASE_LABEL, |s| s.label.as_str()),
        total_score = result.total_score,
        "scenario solved"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{Position, RosterSlot};

    fn player(id: &str, pos: Position, pts: f64) -> Player {
        Player::new(id, id, pos, "FA").with_stat("pts", pts)
    }

    fn request() -> Arc<LineupRequest> {
        use Position::*;
        let template = RosterTemplate::new(vec![
            RosterSlot::new("QB", &[Quarterback], true),
            RosterSlot::new("RB", &[RunningBack], true),
            RosterSlot::new("FLEX", &[RunningBack, WideReceiver], true),
        ])
        .unwrap();
        let pool = vec![
            player("qb1", Quarterback, 20.0),
            player("qb2", Quarterback, 18.0),
            player("rb1", RunningBack, 15.0),
            player("rb2", RunningBack, 9.0),
            player("wr1", WideReceiver, 12.0),
        ];
        let rule = ScoringRule::new("points").with_multiplier("pts", 1.0);
        Arc::new(LineupRequest::new(pool, template, rule))
    }

    #[test]
    fn adjustments_collect_deltas() {
        let req = request();
        let scenario = Scenario::new("s")
            .exclude("rb1")
            .force("wr1")
            .force("wr1")
            .set_availability("qb1", Availability::InjuredOut);
        let adj = scenario.adjustments(&req.pool).unwrap();
        assert!(adj.excluded.contains("rb1"));
        assert_eq!(adj.forced, vec!["wr1".to_string()]);
        assert_eq!(adj.availability.get("qb1"), Some(&Availability::InjuredOut));
    }

    #[test]
    fn unknown_player_is_invalid_scenario() {
        let err = Scenario::new("ghost")
            .exclude("nobody")
            .adjustments(&request().pool)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_scenario");
    }

    #[test]
    fn exclude_and_force_conflict_is_invalid_scenario() {
        let err = Scenario::new("conflict")
            .exclude("rb1")
            .force("rb1")
            .adjustments(&request().pool)
            .unwrap_err();
        assert!(matches!(err, LineupError::InvalidScenario { .. }));
    }

    #[test]
    fn delta_json_shape() {
        let delta: ScenarioDelta =
            serde_json::from_str(r#"{"op":"set_availability","playerId":"p1","availability":"BYE"}"#)
                .unwrap();
        assert_eq!(
            delta,
            ScenarioDelta::SetAvailability {
                player_id: "p1".into(),
                availability: Availability::Bye
            }
        );
        let scenario: Scenario =
            serde_json::from_str(r#"{"label":"x","deltas":[{"op":"exclude","playerId":"p2"}]}"#)
                .unwrap();
        assert_eq!(scenario, Scenario::new("x").exclude("p2"));
    }

    #[tokio::test]
    async fn scenarios_are_ranked_by_total() {
        let session = Session::new(SessionOptions::default());
        let report = session
            .run(
                request(),
                vec![
                    Scenario::new("no-qb1").exclude("qb1"),
                    Scenario::new("same").exclude("rb2"),
                    Scenario::new("wr-out").set_availability("wr1", Availability::Bye),
                ],
            )
            .await
            .unwrap();

        let labels: Vec<&str> = report.outcomes.iter().map(|o| o.label.as_str()).collect();
        // base 47 and "same" 47 keep submission order; no-qb1 45; wr-out 44.
        assert_eq!(labels, vec!["base", "same", "no-qb1", "wr-out"]);
        assert_eq!(report.best().unwrap().total_score(), Some(47.0));
        assert_eq!(report.get("wr-out").unwrap().rank, Some(4));
    }

    #[tokio::test]
    async fn scenario_errors_stay_local() {
        let session = Session::new(SessionOptions::default());
        let report = session
            .run(
                request(),
                vec![
                    Scenario::new("bad").force("rb2").exclude("rb2"),
                    Scenario::new("forced-qb2").force("qb2"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        let bad = report.get("bad").unwrap();
        assert!(bad.result.is_none());
        assert_eq!(bad.error.as_ref().unwrap().status, 400);
        assert_eq!(report.outcomes.last().unwrap().label, "bad");

        let forced = report.get("forced-qb2").unwrap().result.as_ref().unwrap();
        assert_eq!(forced.player_in("QB"), Some("qb2"));
    }

    #[tokio::test]
    async fn zero_deadline_fails_only_that_scenario() {
        let session = Session::new(SessionOptions::default());
        let report = session
            .run(
                request(),
                vec![Scenario::new("rushed").with_deadline(Duration::ZERO)],
            )
            .await
            .unwrap();
        let rushed = report.get("rushed").unwrap();
        assert_eq!(rushed.error.as_ref().unwrap().kind, "deadline_exceeded");
        assert_eq!(rushed.error.as_ref().unwrap().status, 504);
        assert!(report.get(BASE_LABEL).unwrap().result.is_some());
    }

    #[tokio::test]
    async fn cancelled_session_returns_no_results() {
        let session = Session::new(SessionOptions::default());
        session.cancel();
        let err = session.run(request(), vec![]).await.unwrap_err();
        assert_eq!(err, LineupError::Cancelled);
    }

    #[tokio::test]
    async fn malformed_base_request_aborts_session() {
        let mut req = (*request()).clone();
        req.rule = ScoringRule::new("typo").with_multiplier("points", 1.0);
        let session = Session::new(SessionOptions::default());
        let err = session.run(Arc::new(req), vec![]).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_scoring_rule");
    }

    #[tokio::test]
    async fn score_memo_is_shared_across_scenarios() {
        let session = Session::new(SessionOptions {
            max_concurrency: 1,
            solve_timeout: None,
        });
        let cache = Arc::new(ScoreCache::new());
        session
            .run_with_cache(
                request(),
                vec![Scenario::new("a"), Scenario::new("b")],
                Arc::clone(&cache),
            )
            .await
            .unwrap();
        assert_eq!(cache.len(), 5);
        let (hits, misses) = cache.stats();
        assert_eq!(misses, 5);
        assert_eq!(hits, 10);
    }

    #[tokio::test]
    async fn reused_session_scores_fresh_projections() {
        let session = Session::new(SessionOptions::default());
        let template =
            RosterTemplate::new(vec![RosterSlot::new("RB", &[Position::RunningBack], true)])
                .unwrap();
        let rule = ScoringRule::new("points").with_multiplier("pts", 1.0);
        let week = |pts: f64| {
            Arc::new(LineupRequest::new(
                vec![player("a", Position::RunningBack, pts)],
                template.clone(),
                rule.clone(),
            ))
        };

        let first = session.run(week(10.0), vec![]).await.unwrap();
        let second = session.run(week(25.0), vec![]).await.unwrap();

        let total = |r: &SessionReport| r.best().and_then(|o| o.result.as_ref()).map(|r| r.total_score);
        assert_eq!(total(&first), Some(10.0));
        assert_eq!(total(&second), Some(25.0));
    }
}
