//! Scenario configuration
//!
//! Loading and validation of scenario files: the static puzzle content
//! (stages, prompts, hints, time limits, validators) the engine plays.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, LoadResult, LoadWarning, LoaderOptions, ScenarioLoader};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
