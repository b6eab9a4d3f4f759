// Players, positions, roster slots and templates.

pub mod player;
pub mod template;

pub use player::{Availability, Player, Position};
pub use template::{RosterSlot, RosterTemplate, SlotType, TemplateError};
