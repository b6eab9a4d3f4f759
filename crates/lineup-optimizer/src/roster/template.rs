// Roster slots and league roster templates.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::player::Position;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("roster template has no slots")]
    Empty,

    #[error("duplicate slot id `{0}` in roster template")]
    DuplicateSlotId(String),

    #[error("slot `{0}` accepts no positions")]
    NoAcceptedPositions(String),

    #[error("unknown slot type `{0}`")]
    UnknownSlotType(String),

    #[error("slot type `{slot_type}` lists unknown position `{position}`")]
    UnknownPosition { slot_type: String, position: String },
}

// ---------------------------------------------------------------------------
// Slot types
// ---------------------------------------------------------------------------

/// A kind of roster slot (e.g. "RB", "FLEX", "BE"). A template contains one
/// or more instances of each type.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotType {
    pub name: String,
    pub accepts: Vec<Position>,
    pub required: bool,
}

impl SlotType {
    /// Look up one of the slot types every league understands.
    pub fn builtin(name: &str) -> Option<Self> {
        use Position::*;
        let (accepts, required): (Vec<Position>, bool) = match name.to_uppercase().as_str() {
            "QB" => (vec![Quarterback], true),
            "RB" => (vec![RunningBack], true),
            "WR" => (vec![WideReceiver], true),
            "TE" => (vec![TightEnd], true),
            "K" => (vec![Kicker], true),
            "DEF" | "DST" | "D/ST" => (vec![Defense], true),
            "FLEX" => (vec![RunningBack, WideReceiver, TightEnd], true),
            "WRTE" | "WR/TE" => (vec![WideReceiver, TightEnd], true),
            "SUPERFLEX" | "OP" => (vec![Quarterback, RunningBack, WideReceiver, TightEnd], true),
            "BE" | "BN" | "BENCH" => (Position::ALL.to_vec(), false),
            _ => return None,
        };
        Some(SlotType {
            name: name.to_uppercase(),
            accepts,
            required,
        })
    }

    /// Deterministic ordering index for template construction. Custom slot
    /// types land after the built-in starting slots and before the bench.
    fn sort_order(&self) -> u8 {
        match self.name.as_str() {
            "QB" => 0,
            "RB" => 1,
            "WR" => 2,
            "TE" => 3,
            "FLEX" => 4,
            "WRTE" | "WR/TE" => 5,
            "SUPERFLEX" | "OP" => 6,
            "K" => 7,
            "DEF" | "DST" | "D/ST" => 8,
            "BE" | "BN" | "BENCH" => 10,
            _ => 9,
        }
    }
}

// ---------------------------------------------------------------------------
// Slots and templates
// ---------------------------------------------------------------------------

/// A single slot instance in a roster template. Capacity is always one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSlot {
    pub id: String,
    pub accepts: Vec<Position>,
    /// Starting slots are required; bench slots are optional capacity.
    pub required: bool,
}

impl RosterSlot {
    pub fn new(id: &str, accepts: &[Position], required: bool) -> Self {
        RosterSlot {
            id: id.to_string(),
            accepts: accepts.to_vec(),
            required,
        }
    }

    /// Whether a player listed at `pos` may occupy this slot.
    pub fn accepts(&self, pos: Position) -> bool {
        self.accepts.contains(&pos)
    }

    /// Whether this slot accepts more than one position.
    pub fn is_flex(&self) -> bool {
        self.accepts.len() > 1
    }
}

/// The ordered slot structure of a league's lineup, starters plus bench.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RosterSlot>", into = "Vec<RosterSlot>")]
pub struct RosterTemplate {
    slots: Vec<RosterSlot>,
}

impl TryFrom<Vec<RosterSlot>> for RosterTemplate {
    type Error = TemplateError;

    fn try_from(slots: Vec<RosterSlot>) -> Result<Self, Self::Error> {
        RosterTemplate::new(slots)
    }
}

impl From<RosterTemplate> for Vec<RosterSlot> {
    fn from(template: RosterTemplate) -> Self {
        template.slots
    }
}

impl RosterTemplate {
    /// Build a template from explicit slots, rejecting duplicate ids and
    /// slots that accept nothing.
    pub fn new(slots: Vec<RosterSlot>) -> Result<Self, TemplateError> {
        if slots.is_empty() {
            return Err(TemplateError::Empty);
        }
        let mut seen = HashSet::new();
        for slot in &slots {
            if !seen.insert(slot.id.as_str()) {
                return Err(TemplateError::DuplicateSlotId(slot.id.clone()));
            }
            if slot.accepts.is_empty() {
                return Err(TemplateError::NoAcceptedPositions(slot.id.clone()));
            }
        }
        Ok(RosterTemplate { slots })
    }

    /// Create a template from a config mapping slot type names to counts.
    ///
    /// The roster config comes from league.toml `[league.roster]`, e.g.:
    /// `{"QB": 1, "RB": 2, "WR": 2, "TE": 1, "FLEX": 1, "K": 1, "DEF": 1, "BE": 6}`
    ///
    /// Types not known as built-ins are resolved through `custom`. Slots are
    /// created in deterministic order based on slot type, and instance ids are
    /// the type name (single instance) or the type name plus a 1-based index.
    pub fn from_counts(
        counts: &HashMap<String, usize>,
        custom: &HashMap<String, SlotType>,
    ) -> Result<Self, TemplateError> {
        let mut types: Vec<(SlotType, usize)> = Vec::new();
        for (name, &count) in counts {
            if count == 0 {
                continue;
            }
            let slot_type = custom
                .get(name)
                .cloned()
                .or_else(|| SlotType::builtin(name))
                .ok_or_else(|| TemplateError::UnknownSlotType(name.clone()))?;
            types.push((slot_type, count));
        }
        types.sort_by(|(a, _), (b, _)| {
            a.sort_order()
                .cmp(&b.sort_order())
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut slots = Vec::new();
        for (slot_type, count) in types {
            for i in 1..=count {
                let id = if count == 1 {
                    slot_type.name.clone()
                } else {
                    format!("{}{}", slot_type.name, i)
                };
                slots.push(RosterSlot {
                    id,
                    accepts: slot_type.accepts.clone(),
                    required: slot_type.required,
                });
            }
        }

        RosterTemplate::new(slots)
    }

    pub fn slots(&self) -> &[RosterSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&RosterSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    /// Number of starting (required) slots.
    pub fn required_count(&self) -> usize {
        self.slots.iter().filter(|s| s.required).count()
    }
}
