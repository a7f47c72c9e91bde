use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::store::keys;

/// Seed document guiding scenario generation. Read-only at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTemplate {
    /// Identifier; falls back to the store key when absent
    #[serde(default)]
    pub name: Option<String>,
    pub template: ModelHints,
}

/// Structural hints handed to the generative model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHints {
    pub prompt: String,
    pub model_id: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Free-form extra hints, forwarded to the model request untouched
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f32 {
    0.7
}

impl ScenarioTemplate {
    /// Parse a template body fetched from the store
    pub fn from_slice(body: &[u8]) -> Result<Self, String> {
        let template: ScenarioTemplate =
            serde_json::from_slice(body).map_err(|e| format!("invalid template JSON: {}", e))?;
        template.check()?;
        Ok(template)
    }

    fn check(&self) -> Result<(), String> {
        if self.template.prompt.trim().is_empty() {
            return Err("template prompt is empty".to_string());
        }
        if self.template.model_id.trim().is_empty() {
            return Err("template model_id is empty".to_string());
        }
        if self.template.max_tokens == 0 {
            return Err("template max_tokens must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.template.temperature) {
            return Err(format!(
                "template temperature {} is outside 0.0..=1.0",
                self.template.temperature
            ));
        }
        Ok(())
    }

    /// Template identifier, falling back to the last segment of its key
    pub fn identifier<'a>(&'a self, key: &'a str) -> &'a str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| keys::file_name(key))
    }
}
