// API-facing lineup service.
//
// Materializes `{leagueId, teamId, week, scenarios[]}` through the store
// collaborators, runs a session and maps failures onto HTTP status codes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ErrorReport, LineupError};
use crate::optimizer::SolvePolicy;
use crate::session::{LineupRequest, Scenario, Session, SessionOptions, SessionReport};
use crate::store::{LeagueStore, ProjectionStore, StoreError};

/// Body of an optimize call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub league_id: String,
    pub team_id: String,
    pub week: u32,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

/// Status code plus JSON body, ready for whatever HTTP layer hosts this.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl From<StoreError> for LineupError {
    fn from(e: StoreError) -> Self {
        match e {
            // The caller named a league or team that does not exist.
            StoreError::NotFound { .. } => LineupError::MalformedRequest(e.to_string()),
            other => LineupError::Store(other.to_string()),
        }
    }
}

pub struct LineupService {
    projections: Arc<dyn ProjectionStore>,
    leagues: Arc<dyn LeagueStore>,
    policy: SolvePolicy,
    options: SessionOptions,
}

impl LineupService {
    pub fn new(
        projections: Arc<dyn ProjectionStore>,
        leagues: Arc<dyn LeagueStore>,
        policy: SolvePolicy,
        options: SessionOptions,
    ) -> Self {
        LineupService {
            projections,
            leagues,
            policy,
            options,
        }
    }

    /// Session configured with this service's limits. Callers that need to
    /// cancel a request create one and pass it to [`LineupService::optimize_in`].
    pub fn session(&self) -> Session {
        Session::new(self.options.clone())
    }

    pub async fn optimize(&self, request: OptimizeRequest) -> Result<SessionReport, LineupError> {
        self.optimize_in(&self.session(), request).await
    }

    pub async fn optimize_in(
        &self,
        session: &Session,
        request: OptimizeRequest,
    ) -> Result<SessionReport, LineupError> {
        let lineup = self.materialize(&request).await?;
        session.run(Arc::new(lineup), request.scenarios).await
    }

    /// Parse a JSON body, run it and render the response.
    pub async fn handle_json(&self, body: &[u8]) -> ApiResponse {
        let request: OptimizeRequest = match serde_json::from_slice(body) {
            Ok(r) => r,
            Err(e) => {
                return error_response(&LineupError::MalformedRequest(format!(
                    "invalid request body: {e}"
                )))
            }
        };

        match self.optimize(request).await {
            Ok(report) => match serde_json::to_value(&report) {
                Ok(body) => ApiResponse { status: 200, body },
                Err(e) => error_response(&LineupError::Internal(format!(
                    "failed to serialize report: {e}"
                ))),
            },
            Err(e) => error_response(&e),
        }
    }

    /// Fetch league settings, the team's roster and its weekly projections.
    async fn materialize(&self, request: &OptimizeRequest) -> Result<LineupRequest, LineupError> {
        let settings = self.leagues.league_settings(&request.league_id).await?;
        let roster = self
            .leagues
            .team_roster(&request.league_id, &request.team_id)
            .await?;
        let week_players = self.projections.players_for_week(request.week).await?;

        let mut pool = Vec::with_capacity(roster.len());
        for id in &roster {
            match week_players.iter().find(|p| &p.id == id) {
                Some(p) => pool.push(p.clone()),
                None => warn!(
                    "no week {} projection for rostered player '{}', leaving them out",
                    request.week, id
                ),
            }
        }

        info!(
            league = %request.league_id,
            team = %request.team_id,
            week = request.week,
            players = pool.len(),
            scenarios = request.scenarios.len(),
            "optimize request"
        );

        Ok(LineupRequest::new(pool, settings.template, settings.rule).with_policy(self.policy.clone()))
    }
}

fn error_response(e: &LineupError) -> ApiResponse {
    let report = ErrorReport::from(e);
    ApiResponse {
        status: report.status,
        body: serde_json::json!({ "error": report }),
    }
}
