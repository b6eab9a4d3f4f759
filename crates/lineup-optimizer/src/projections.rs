// Weekly projection loading from CSV.
//
// One row per (player, week). Fixed columns identify the player; every other
// column is a projected stat, keyed by its lowercased header:
//
//   id,name,position,team,week,status,owner,pass_yds,pass_td,...
//
// `status` and `owner` are optional. Empty stat cells mean "not projected".

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::roster::{Availability, Player, Position};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A player's projection for one week, plus the fantasy team that owns them.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionRow {
    pub player: Player,
    pub week: u32,
    pub owner: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

const REQUIRED_COLUMNS: [&str; 4] = ["id", "name", "position", "week"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn normalize_header(h: &str) -> String {
    match h.trim().to_lowercase().as_str() {
        "player_id" => "id".to_string(),
        "pos" => "position".to_string(),
        "availability" => "status".to_string(),
        other => other.to_string(),
    }
}

/// Convert one raw CSV record into a projection row, or explain why it was
/// skipped.
fn parse_row(mut raw: HashMap<String, String>) -> Result<ProjectionRow, String> {
    let mut take = |col: &str| raw.remove(col).map(|v| v.trim().to_string()).unwrap_or_default();

    let id = take("id");
    let name = take("name");
    if id.is_empty() {
        return Err(format!("row for '{name}' has no id"));
    }
    let position = take("position");
    let position = Position::from_str_pos(&position)
        .ok_or_else(|| format!("'{name}' ({id}): unknown position '{position}'"))?;
    let week = take("week");
    let week: u32 = week
        .parse()
        .map_err(|_| format!("'{name}' ({id}): invalid week '{week}'"))?;
    let status = take("status");
    let availability = Availability::from_str_status(&status)
        .ok_or_else(|| format!("'{name}' ({id}): unknown status '{status}'"))?;
    let team = take("team");
    let owner = Some(take("owner")).filter(|o| !o.is_empty());

    let mut projection = BTreeMap::new();
    for (stat, value) in raw {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let v: f64 = value
            .parse()
            .map_err(|_| format!("'{name}' ({id}): non-numeric {stat} value '{value}'"))?;
        if !v.is_finite() {
            return Err(format!("'{name}' ({id}): non-finite {stat} value"));
        }
        projection.insert(stat, v);
    }

    let mut player = Player::new(&id, &name, position, &team).with_availability(availability);
    player.projection = projection;
    Ok(ProjectionRow {
        player,
        week,
        owner,
    })
}

fn load_rows_from_reader<R: Read>(rdr: R, source: &str) -> Result<Vec<ProjectionRow>, ProjectionError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let csv_err = |e: csv::Error| ProjectionError::Csv {
        path: source.to_string(),
        source: e,
    };

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(normalize_header)
        .collect();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    for col in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == col) {
            return Err(ProjectionError::Validation(format!(
                "{source} is missing required column `{col}`"
            )));
        }
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed projection row: {}", e);
                continue;
            }
        };
        let raw: HashMap<String, String> = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        match parse_row(raw) {
            Ok(row) => rows.push(row),
            Err(reason) => warn!("skipping projection row {}", reason),
        }
    }
    Ok(rows)
}

/// Parse projection rows from CSV bytes. `source` names the data in errors.
pub fn parse_projections(data: &[u8], source: &str) -> Result<Vec<ProjectionRow>, ProjectionError> {
    load_rows_from_reader(data, source)
}

/// Load projection rows from a CSV file.
pub fn load_projections(path: &Path) -> Result<Vec<ProjectionRow>, ProjectionError> {
    let file = std::fs::File::open(path).map_err(|e| ProjectionError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_rows_from_reader(file, &path.display().to_string())
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Players projected for `week`, sorted by id. A player listed twice for the
/// same week keeps the later row.
pub fn players_for_week(rows: &[ProjectionRow], week: u32) -> Vec<Player> {
    let mut by_id: BTreeMap<&str, &Player> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.week == week) {
        if by_id.insert(&row.player.id, &row.player).is_some() {
            warn!(
                "duplicate week {} projection for '{}', using latest row",
                week, row.player.id
            );
        }
    }
    by_id.into_values().cloned().collect()
}

/// Ids of every player owned by `team_id` in any week, sorted.
pub fn roster_for(rows: &[ProjectionRow], team_id: &str) -> Vec<String> {
    rows.iter()
        .filter(|r| r.owner.as_deref() == Some(team_id))
        .map(|r| r.player.id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
