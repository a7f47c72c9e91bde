use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::store::keys::is_safe_segment;

/// A scenario produced by the generator for one execution.
///
/// Persisted once under the execution's scenario key and never mutated. Fields
/// default to empty so a structurally incomplete document still deserializes and
/// can be rejected by [`GeneratedScenario::validate`] with a precise reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedScenario {
    #[serde(default)]
    pub scenario_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub body: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioValidationError {
    #[error("scenario is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("scenario id '{0}' is not a valid key segment")]
    InvalidIdentifier(String),

    #[error("scenario field '{field}' has the wrong type, expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
}

impl ScenarioValidationError {
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField(field) => field,
            Self::InvalidIdentifier(_) => "scenario_id",
            Self::WrongType { field, .. } => field,
        }
    }
}

impl GeneratedScenario {
    /// Build a scenario from the JSON object a model produced.
    ///
    /// Accepts both the canonical field names and the `scenario_name` / `purpose`
    /// names seed prompts commonly ask for. Unknown fields stay in `body`.
    pub fn from_model_object(mut object: Map<String, Value>, fallback_id: &str) -> Self {
        let take = |names: &[&str]| -> Option<String> {
            names.iter().find_map(|name| match object.get(*name) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
        };

        let scenario_id = take(&["scenario_id", "id"])
            .filter(|id| is_safe_segment(id))
            .unwrap_or_else(|| fallback_id.to_string());
        let name = take(&["name", "scenario_name", "title"]).unwrap_or_default();
        let category = take(&["category", "type", "fault_type"])
            .unwrap_or_else(|| "general".to_string());
        let description = take(&["description", "purpose"]).unwrap_or_default();

        for consumed in ["scenario_id", "id"] {
            object.remove(consumed);
        }

        Self {
            scenario_id,
            name,
            category,
            description,
            body: object,
        }
    }

    /// Structural well-formedness check performed before code generation
    pub fn validate(&self) -> Result<(), ScenarioValidationError> {
        if self.scenario_id.trim().is_empty() {
            return Err(ScenarioValidationError::MissingField("scenario_id"));
        }
        if !is_safe_segment(&self.scenario_id) {
            return Err(ScenarioValidationError::InvalidIdentifier(
                self.scenario_id.clone(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ScenarioValidationError::MissingField("name"));
        }
        if self.category.trim().is_empty() {
            return Err(ScenarioValidationError::MissingField("category"));
        }
        if self.description.trim().is_empty() {
            return Err(ScenarioValidationError::MissingField("description"));
        }
        if let Some(services) = self.body.get("target_services") {
            let all_strings = services
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false);
            if !all_strings {
                return Err(ScenarioValidationError::WrongType {
                    field: "target_services".to_string(),
                    expected: "an array of strings",
                });
            }
        }
        Ok(())
    }

    /// Explicitly declared target services, if any
    pub fn target_services(&self) -> Vec<&str> {
        self.body
            .get("target_services")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Name with spaces and dashes removed, usable as a TypeScript identifier prefix
    pub fn safe_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match cleaned.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => cleaned,
            Some(_) => format!("Scenario{}", cleaned),
            None => "ChaosTest".to_string(),
        }
    }
}
