// Error taxonomy for lineup optimization.
//
// A shortage of eligible players is not an error: it surfaces as
// `feasible = false` on the result. Everything here is a categorized failure
// of a single scenario or of a whole session.

use serde::Serialize;
use thiserror::Error;

use crate::roster::TemplateError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineupError {
    /// The scoring rule cannot produce meaningful points (configuration defect).
    #[error("invalid scoring rule `{rule}`: {message}")]
    InvalidScoringRule { rule: String, message: String },

    /// A forced include cannot be honored by any slot.
    #[error("cannot force player `{player_id}` into the lineup: {reason}")]
    InfeasibleForcedAssignment { player_id: String, reason: String },

    /// The solve ran past its caller-supplied deadline.
    #[error("solve exceeded its deadline of {limit_ms} ms")]
    DeadlineExceeded { limit_ms: u64 },

    /// The session was cancelled before the solve finished.
    #[error("optimization cancelled")]
    Cancelled,

    /// A scenario delta conflicts with itself or names an unknown player.
    #[error("invalid scenario `{scenario}`: {message}")]
    InvalidScenario { scenario: String, message: String },

    /// The base request is unusable (bad template, duplicate players, ...).
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A collaborator (projection or league store) failed.
    #[error("data store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LineupError {
    /// Short machine-readable category name.
    pub fn kind(&self) -> &'static str {
        match self {
            LineupError::InvalidScoringRule { .. } => "invalid_scoring_rule",
            LineupError::InfeasibleForcedAssignment { .. } => "infeasible_forced_assignment",
            LineupError::DeadlineExceeded { .. } => "deadline_exceeded",
            LineupError::Cancelled => "cancelled",
            LineupError::InvalidScenario { .. } => "invalid_scenario",
            LineupError::MalformedRequest(_) => "malformed_request",
            LineupError::Store(_) => "store",
            LineupError::Internal(_) => "internal",
        }
    }

    /// HTTP status the API layer should answer with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            LineupError::InvalidScoringRule { .. }
            | LineupError::InvalidScenario { .. }
            | LineupError::MalformedRequest(_) => 400,
            LineupError::InfeasibleForcedAssignment { .. } => 409,
            // Client closed request (nginx convention).
            LineupError::Cancelled => 499,
            LineupError::DeadlineExceeded { .. } => 504,
            LineupError::Store(_) | LineupError::Internal(_) => 500,
        }
    }

    /// Whether this error is confined to one scenario. Session-wide failures
    /// abort the whole run instead.
    pub fn is_scenario_local(&self) -> bool {
        matches!(
            self,
            LineupError::InfeasibleForcedAssignment { .. }
                | LineupError::DeadlineExceeded { .. }
                | LineupError::InvalidScenario { .. }
        )
    }
}

impl From<TemplateError> for LineupError {
    fn from(e: TemplateError) -> Self {
        LineupError::MalformedRequest(e.to_string())
    }
}

/// Serializable summary of a [`LineupError`] for API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub status: u16,
    pub message: String,
}

impl From<&LineupError> for ErrorReport {
    fn from(e: &LineupError) -> Self {
        ErrorReport {
            kind: e.kind(),
            status: e.http_status(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        let rule = LineupError::InvalidScoringRule {
            rule: "ppr".into(),
            message: "no stats".into(),
        };
        assert_eq!(rule.http_status(), 400);

        let forced = LineupError::InfeasibleForcedAssignment {
            player_id: "p1".into(),
            reason: "on bye".into(),
        };
        assert_eq!(forced.http_status(), 409);

        assert_eq!(LineupError::DeadlineExceeded { limit_ms: 5 }.http_status(), 504);
        assert_eq!(LineupError::Internal("boom".into()).http_status(), 500);
        assert_eq!(LineupError::Store("io".into()).http_status(), 500);
    }

    #[test]
    fn scenario_local_errors() {
        assert!(LineupError::DeadlineExceeded { limit_ms: 1 }.is_scenario_local());
        assert!(!LineupError::Cancelled.is_scenario_local());
        assert!(!LineupError::MalformedRequest("x".into()).is_scenario_local());
    }

    #[test]
    fn template_errors_become_malformed_requests() {
        let err: LineupError = TemplateError::DuplicateSlotId("RB1".into()).into();
        assert_eq!(err.kind(), "malformed_request");
        assert!(err.to_string().contains("RB1"));
    }

    #[test]
    fn error_report_carries_status_and_message() {
        let report = ErrorReport::from(&LineupError::DeadlineExceeded { limit_ms: 250 });
        assert_eq!(report.kind, "deadline_exceeded");
        assert_eq!(report.status, 504);
        assert_eq!(report.message, "solve exceeded its deadline of 250 ms");
    }
}
