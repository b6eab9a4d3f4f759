// Player, position and availability types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Football positions a player can be listed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "QB")]
    Quarterback,
    #[serde(rename = "RB")]
    RunningBack,
    #[serde(rename = "WR")]
    WideReceiver,
    #[serde(rename = "TE")]
    TightEnd,
    #[serde(rename = "K")]
    Kicker,
    #[serde(rename = "DEF")]
    Defense,
}

impl Position {
    /// Every position, in display order.
    pub const ALL: [Position; 6] = [
        Position::Quarterback,
        Position::RunningBack,
        Position::WideReceiver,
        Position::TightEnd,
        Position::Kicker,
        Position::Defense,
    ];

    /// Parse a position string into a Position enum.
    ///
    /// Handles the common abbreviations used by projection feeds:
    /// - "D/ST", "DST", "D" -> Defense
    /// - "PK" -> Kicker
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "K" | "PK" => Some(Position::Kicker),
            "DEF" | "DST" | "D/ST" | "D" => Some(Position::Defense),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "DEF",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// Whether a player can take the field in the week being optimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Available,
    Bye,
    InjuredOut,
    InjuredQuestionable,
    Suspended,
}

impl Availability {
    /// Parse an availability string as reported by injury feeds.
    pub fn from_str_status(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "" | "AVAILABLE" | "ACTIVE" | "HEALTHY" => Some(Availability::Available),
            "BYE" => Some(Availability::Bye),
            "OUT" | "INJURED_OUT" | "IR" => Some(Availability::InjuredOut),
            "Q" | "QUESTIONABLE" | "INJURED_QUESTIONABLE" => {
                Some(Availability::InjuredQuestionable)
            }
            "SUSP" | "SUSPENDED" => Some(Availability::Suspended),
            _ => None,
        }
    }

    /// Players on bye, ruled out, or suspended cannot be started at all.
    pub fn can_play(&self) -> bool {
        matches!(
            self,
            Availability::Available | Availability::InjuredQuestionable
        )
    }

    pub fn is_questionable(&self) -> bool {
        *self == Availability::InjuredQuestionable
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Availability::Available => "AVAILABLE",
            Availability::Bye => "BYE",
            Availability::InjuredOut => "INJURED_OUT",
            Availability::InjuredQuestionable => "INJURED_QUESTIONABLE",
            Availability::Suspended => "SUSPENDED",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// A player with a weekly statistical projection.
///
/// Players are treated as immutable for the duration of an optimization run;
/// scenario overrides (availability swaps, exclusions) are applied on top of
/// the pool rather than by mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub position: Position,
    /// NFL team abbreviation (e.g. "KC").
    pub team: String,
    /// Projected stat line keyed by stat name (e.g. "rush_yds" -> 74.5).
    pub projection: BTreeMap<String, f64>,
    pub availability: Availability,
}

impl Player {
    pub fn new(id: &str, name: &str, position: Position, team: &str) -> Self {
        Player {
            id: id.to_string(),
            name: name.to_string(),
            position,
            team: team.to_string(),
            projection: BTreeMap::new(),
            availability: Availability::Available,
        }
    }

    /// Builder-style helper for attaching a projected stat.
    pub fn with_stat(mut self, stat: &str, value: f64) -> Self {
        self.projection.insert(stat.to_string(), value);
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    /// Projected value for a stat, if the projection carries it.
    pub fn stat(&self, name: &str) -> Option<f64> {
        self.projection.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_pos_standard_positions() {
        assert_eq!(Position::from_str_pos("QB"), Some(Position::Quarterback));
        assert_eq!(Position::from_str_pos("RB"), Some(Position::RunningBack));
        assert_eq!(Position::from_str_pos("WR"), Some(Position::WideReceiver));
        assert_eq!(Position::from_str_pos("TE"), Some(Position::TightEnd));
        assert_eq!(Position::from_str_pos("K"), Some(Position::Kicker));
        assert_eq!(Position::from_str_pos("DEF"), Some(Position::Defense));
    }

    #[test]
    fn from_str_pos_aliases_and_case() {
        assert_eq!(Position::from_str_pos("d/st"), Some(Position::Defense));
        assert_eq!(Position::from_str_pos("DST"), Some(Position::Defense));
        assert_eq!(Position::from_str_pos("pk"), Some(Position::Kicker));
        assert_eq!(Position::from_str_pos(" wr "), Some(Position::WideReceiver));
        assert_eq!(Position::from_str_pos("FLEX"), None);
        assert_eq!(Position::from_str_pos(""), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for pos in Position::ALL {
            assert_eq!(Position::from_str_pos(pos.display_str()), Some(pos));
        }
    }

    #[test]
    fn availability_parsing() {
        assert_eq!(Availability::from_str_status("active"), Some(Availability::Available));
        assert_eq!(Availability::from_str_status(""), Some(Availability::Available));
        assert_eq!(Availability::from_str_status("BYE"), Some(Availability::Bye));
        assert_eq!(Availability::from_str_status("IR"), Some(Availability::InjuredOut));
        assert_eq!(
            Availability::from_str_status("q"),
            Some(Availability::InjuredQuestionable)
        );
        assert_eq!(Availability::from_str_status("susp"), Some(Availability::Suspended));
        assert_eq!(Availability::from_str_status("doubtful"), None);
    }

    #[test]
    fn only_available_and_questionable_can_play() {
        assert!(Availability::Available.can_play());
        assert!(Availability::InjuredQuestionable.can_play());
        assert!(!Availability::Bye.can_play());
        assert!(!Availability::InjuredOut.can_play());
        assert!(!Availability::Suspended.can_play());
    }

    #[test]
    fn serde_uses_short_position_codes() {
        let json = serde_json::to_string(&Position::Defense).unwrap();
        assert_eq!(json, "\"DEF\"");
        let status = serde_json::to_string(&Availability::InjuredQuestionable).unwrap();
        assert_eq!(status, "\"INJURED_QUESTIONABLE\"");
    }

    #[test]
    fn player_builder_sets_stats() {
        let p = Player::new("p1", "Test Back", Position::RunningBack, "KC")
            .with_stat("rush_yds", 80.0)
            .with_availability(Availability::Bye);
        assert_eq!(p.stat("rush_yds"), Some(80.0));
        assert_eq!(p.stat("rec"), None);
        assert_eq!(p.availability, Availability::Bye);
    }
}
