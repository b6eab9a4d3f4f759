// Library root: re-exports all modules so integration tests and external
// consumers can access the crate's public API.

pub mod config;
pub mod error;
pub mod optimizer;
pub mod projections;
pub mod roster;
pub mod scoring;
pub mod service;
pub mod session;
pub mod store;

pub use error::{ErrorReport, LineupError};
pub use optimizer::{optimize, LineupOptimizer, OptimizationResult, SolvePolicy};
pub use session::{Scenario, Session, SessionOptions, SessionReport};
