// Collaborator interfaces: where players, templates and rules come from.
//
// The optimizer never performs I/O itself. These traits are the narrow seams
// through which the lineup service materializes a request.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::projections::{self, ProjectionError, ProjectionRow};
use crate::roster::{Player, RosterTemplate};
use crate::scoring::ScoringRule;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Roster template and scoring rule of one league.
#[derive(Debug, Clone, PartialEq)]
pub struct LeagueSettings {
    pub league_id: String,
    pub name: String,
    pub template: RosterTemplate,
    pub rule: ScoringRule,
}

/// Source of weekly player projections.
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    async fn players_for_week(&self, week: u32) -> Result<Vec<Player>, StoreError>;
}

/// Source of league configuration and fantasy team rosters.
#[async_trait]
pub trait LeagueStore: Send + Sync {
    async fn league_settings(&self, league_id: &str) -> Result<LeagueSettings, StoreError>;

    /// Player ids owned by a fantasy team.
    async fn team_roster(&self, league_id: &str, team_id: &str) -> Result<Vec<String>, StoreError>;
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Serves the single league described by the loaded config, with projections
/// and team ownership read from the projections CSV on each call.
#[derive(Debug, Clone)]
pub struct FileStore {
    settings: LeagueSettings,
    projections_path: PathBuf,
}

impl FileStore {
    pub fn new(settings: LeagueSettings, projections_path: PathBuf) -> Self {
        FileStore {
            settings,
            projections_path,
        }
    }

    /// Build from config, resolving the projections path against `base_dir`.
    pub fn from_config(config: &Config, base_dir: &std::path::Path) -> Result<Self, StoreError> {
        let settings = config
            .league_settings()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(FileStore::new(
            settings,
            base_dir.join(&config.data_paths.projections),
        ))
    }

    async fn rows(&self) -> Result<Vec<ProjectionRow>, StoreError> {
        let data = tokio::fs::read(&self.projections_path)
            .await
            .map_err(|e| ProjectionError::Io {
                path: self.projections_path.display().to_string(),
                source: e,
            })?;
        Ok(projections::parse_projections(
            &data,
            &self.projections_path.display().to_string(),
        )?)
    }

    fn check_league(&self, league_id: &str) -> Result<(), StoreError> {
        if league_id != self.settings.league_id {
            return Err(StoreError::NotFound {
                kind: "league",
                id: league_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectionStore for FileStore {
    async fn players_for_week(&self, week: u32) -> Result<Vec<Player>, StoreError> {
        let rows = self.rows().await?;
        Ok(projections::players_for_week(&rows, week))
    }
}

#[async_trait]
impl LeagueStore for FileStore {
    async fn league_settings(&self, league_id: &str) -> Result<LeagueSettings, StoreError> {
        self.check_league(league_id)?;
        Ok(self.settings.clone())
    }

    async fn team_roster(&self, league_id: &str, team_id: &str) -> Result<Vec<String>, StoreError> {
        self.check_league(league_id)?;
        let roster = projections::roster_for(&self.rows().await?, team_id);
        if roster.is_empty() {
            return Err(StoreError::NotFound {
                kind: "team",
                id: team_id.to_string(),
            });
        }
        Ok(roster)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Store populated up front; used by tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    weeks: HashMap<u32, Vec<Player>>,
    leagues: HashMap<String, LeagueSettings>,
    rosters: HashMap<(String, String), Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_week(mut self, week: u32, players: Vec<Player>) -> Self {
        self.weeks.insert(week, players);
        self
    }

    pub fn with_league(mut self, settings: LeagueSettings) -> Self {
        self.leagues.insert(settings.league_id.clone(), settings);
        self
    }

    pub fn with_roster(mut self, league_id: &str, team_id: &str, player_ids: &[&str]) -> Self {
        self.rosters.insert(
            (league_id.to_string(), team_id.to_string()),
            player_ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl ProjectionStore for MemoryStore {
    async fn players_for_week(&self, week: u32) -> Result<Vec<Player>, StoreError> {
        Ok(self.weeks.get(&week).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl LeagueStore for MemoryStore {
    async fn league_settings(&self, league_id: &str) -> Result<LeagueSettings, StoreError> {
        self.leagues
            .get(league_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "league",
                id: league_id.to_string(),
            })
    }

    async fn team_roster(&self, league_id: &str, team_id: &str) -> Result<Vec<String>, StoreError> {
        self.rosters
            .get(&(league_id.to_string(), team_id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "team",
                id: team_id.to_string(),
            })
    }
}
