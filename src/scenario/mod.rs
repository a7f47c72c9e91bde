//! Scenario data model: seed templates and generated scenarios

pub mod generated;
pub mod template;

pub use generated::{GeneratedScenario, ScenarioValidationError};
pub use template::{ModelHints, ScenarioTemplate};
