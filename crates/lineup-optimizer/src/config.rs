// Configuration loading and parsing (league.toml, optimizer.toml).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::optimizer::SolvePolicy;
use crate::roster::{Position, RosterTemplate, SlotType};
use crate::scoring::ScoringRule;
use crate::session::SessionOptions;
use crate::store::LeagueSettings;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub scoring: ScoringRule,
    pub solver: SolvePolicy,
    pub session: SessionConfig,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
    scoring: ScoringRule,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub id: String,
    pub name: String,
    /// Slot type name -> number of instances, e.g. `RB = 2`.
    pub roster: HashMap<String, usize>,
    /// League-specific slot types beyond the built-in ones.
    #[serde(default)]
    pub slot_types: HashMap<String, SlotTypeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotTypeConfig {
    pub accepts: Vec<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

// ---------------------------------------------------------------------------
// optimizer.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for optimizer.toml.
#[derive(Debug, Clone, Deserialize)]
struct OptimizerFile {
    #[serde(default)]
    solver: SolvePolicy,
    session: SessionConfig,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub max_concurrency: usize,
    /// Per-solve deadline in milliseconds; omitted means no deadline.
    #[serde(default)]
    pub solve_timeout_ms: Option<u64>,
}

impl SessionConfig {
    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            max_concurrency: self.max_concurrency,
            solve_timeout: self.solve_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub projections: String,
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

impl LeagueConfig {
    /// Resolve `[league.slot_types]` entries into slot types.
    pub fn custom_slot_types(&self) -> Result<HashMap<String, SlotType>, ConfigError> {
        let mut types = HashMap::new();
        for (name, cfg) in &self.slot_types {
            let mut accepts = Vec::with_capacity(cfg.accepts.len());
            for raw in &cfg.accepts {
                let pos = Position::from_str_pos(raw).ok_or_else(|| ConfigError::ValidationError {
                    field: format!("league.slot_types.{name}.accepts"),
                    message: format!("unknown position `{raw}`"),
                })?;
                if !accepts.contains(&pos) {
                    accepts.push(pos);
                }
            }
            types.insert(
                name.clone(),
                SlotType {
                    name: name.clone(),
                    accepts,
                    required: cfg.required,
                },
            );
        }
        Ok(types)
    }

    /// Build the roster template from the slot counts.
    pub fn template(&self) -> Result<RosterTemplate, ConfigError> {
        let custom = self.custom_slot_types()?;
        RosterTemplate::from_counts(&self.roster, &custom).map_err(|e| {
            ConfigError::ValidationError {
                field: "league.roster".into(),
                message: e.to_string(),
            }
        })
    }
}

impl Config {
    pub fn league_settings(&self) -> Result<LeagueSettings, ConfigError> {
        Ok(LeagueSettings {
            league_id: self.league.id.clone(),
            name: self.league.name.clone(),
            template: self.league.template()?,
            rule: self.scoring.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/optimizer.toml`, relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    // --- optimizer.toml (required) ---
    let optimizer_path = config_dir.join("optimizer.toml");
    let optimizer_text = read_file(&optimizer_path)?;
    let optimizer_file: OptimizerFile =
        toml::from_str(&optimizer_text).map_err(|e| ConfigError::ParseError {
            path: optimizer_path.clone(),
            source: e,
        })?;

    let config = Config {
        league: league_file.league,
        scoring: league_file.scoring,
        solver: optimizer_file.solver,
        session: optimizer_file.session,
        data_paths: optimizer_file.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        // create_new never clobbers a user's edited config.
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.id.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "league.id".into(),
            message: "must not be empty".into(),
        });
    }

    // Builds the template, which rejects unknown slot types and empty rosters.
    config.league.template()?;

    config
        .scoring
        .validate()
        .map_err(|e| ConfigError::ValidationError {
            field: "scoring".into(),
            message: e.to_string(),
        })?;

    let discount = config.solver.questionable_discount;
    if !(0.0..=1.0).contains(&discount) {
        return Err(ConfigError::ValidationError {
            field: "solver.questionable_discount".into(),
            message: format!("must be between 0.0 and 1.0 inclusive, got {discount}"),
        });
    }

    if config.session.max_concurrency == 0 {
        return Err(ConfigError::ValidationError {
            field: "session.max_concurrency".into(),
            message: "must be > 0".into(),
        });
    }

    if config.data_paths.projections.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "data_paths.projections".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
