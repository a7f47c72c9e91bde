//! Scenario generator backed by a messages-style model endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::classify::classify_status;
use super::payload::{GenerateOutput, GenerateRequest};
use super::{CapabilityError, FailureClass, ScenarioGenerator};
use crate::scenario::{GeneratedScenario, ScenarioTemplate};
use crate::store::{ObjectStore, ScopedStore};

/// Model endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,

    /// Environment variable holding the API key; no key header is sent when unset
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Wrap model text that contains no JSON object into a minimal scenario
    /// instead of failing the step
    #[serde(default)]
    pub wrap_unparsed_output: bool,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            api_version: default_api_version(),
            request_timeout: default_request_timeout(),
            wrap_unparsed_output: false,
        }
    }
}

fn default_endpoint() -> Url {
    Url::parse("https://api.anthropic.com/v1/messages").expect("Invalid default endpoint")
}

fn default_api_key_env() -> String {
    "CHAOSFORGE_MODEL_API_KEY".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

#[derive(Debug, Serialize)]
struct ModelRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Generator that reads a template from the store and asks a model for a scenario
pub struct ModelScenarioGenerator {
    client: Client,
    store: ScopedStore,
    settings: GeneratorSettings,
    api_key: Option<String>,
}

impl ModelScenarioGenerator {
    pub fn new(store: ScopedStore, settings: GeneratorSettings) -> Result<Self, CapabilityError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| {
                CapabilityError::permanent(
                    "configuration",
                    format!("Failed to create HTTP client: {}", e),
                )
            })?;
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            client,
            store,
            settings,
            api_key,
        })
    }

    async fn load_template(&self, key: &str) -> Result<ScenarioTemplate, CapabilityError> {
        let object = self.store.get(key).await?.ok_or_else(|| {
            CapabilityError::permanent("template_not_found", format!("template {} not found", key))
        })?;
        ScenarioTemplate::from_slice(&object.body)
            .map_err(|e| CapabilityError::permanent("invalid_template", e))
    }

    fn build_prompt(template: &ScenarioTemplate) -> String {
        let hints = &template.template.extra;
        if hints.is_empty() {
            return template.template.prompt.clone();
        }
        let rendered = serde_json::to_string_pretty(hints).unwrap_or_default();
        format!("{}\n\nAdditional hints:\n{}", template.template.prompt, rendered)
    }

    async fn invoke_model(&self, template: &ScenarioTemplate) -> Result<String, CapabilityError> {
        let request = ModelRequest {
            model: &template.template.model_id,
            max_tokens: template.template.max_tokens,
            temperature: template.template.temperature,
            messages: vec![Message {
                role: "user",
                content: Self::build_prompt(template),
            }],
        };

        let mut builder = self
            .client
            .post(self.settings.endpoint.clone())
            .header("anthropic-version", &self.settings.api_version)
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }

        info!("Invoking model {}", template.template.model_id);
        let response = builder.send().await.map_err(|e| {
            let category = if e.is_timeout() { "timeout" } else { "transport" };
            CapabilityError::transient(category, format!("model request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (class, category) = classify_status(status.as_u16());
            let message = format!("model endpoint returned {}: {}", status, body.trim());
            return Err(match class {
                FailureClass::Transient => CapabilityError::transient(category, message),
                FailureClass::Permanent => CapabilityError::permanent(category, message),
            });
        }

        let parsed: ModelResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CapabilityError::transient("timeout", format!("reading model response: {}", e))
            } else {
                CapabilityError::permanent(
                    "malformed_response",
                    format!("failed to parse model response: {}", e),
                )
            }
        })?;

        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| {
                CapabilityError::permanent("malformed_response", "model response has no text block")
            })
    }

    fn scenario_from_text(
        &self,
        text: &str,
        fallback_id: &str,
    ) -> Result<GeneratedScenario, CapabilityError> {
        match extract_json_object(text) {
            Some(object) => Ok(GeneratedScenario::from_model_object(object, fallback_id)),
            None if self.settings.wrap_unparsed_output => {
                warn!("Model output contained no JSON object, wrapping raw text");
                Ok(wrap_raw_text(text, fallback_id))
            }
            None => Err(CapabilityError::permanent(
                "unparseable_output",
                "model output contains no JSON object",
            )),
        }
    }
}

#[async_trait]
impl ScenarioGenerator for ModelScenarioGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutput, CapabilityError> {
        debug!(
            "Generating scenario for {} from {}",
            request.execution_id, request.template_key
        );
        let template = self.load_template(&request.template_key).await?;
        let text = self.invoke_model(&template).await?;
        let fallback_id = new_scenario_id();
        let scenario = self.scenario_from_text(&text, &fallback_id)?;
        info!(
            "Generated scenario {} ({})",
            scenario.scenario_id, scenario.name
        );

        Ok(GenerateOutput {
            bucket: request.bucket,
            template_key: request.template_key,
            scenario,
            raw_text: text,
        })
    }
}

/// Fresh scenario identifier for outputs that do not carry a usable one
pub fn new_scenario_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("scn-{}", &id[..12])
}

/// Parse the text between the first `{` and the last `}` as a JSON object
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn wrap_raw_text(text: &str, scenario_id: &str) -> GeneratedScenario {
    let mut body = Map::new();
    body.insert("execution_steps".to_string(), Value::from(vec![text.to_string()]));
    body.insert("target_services".to_string(), Value::from(Vec::<String>::new()));
    GeneratedScenario {
        scenario_id: scenario_id.to_string(),
        name: "Generated scenario".to_string(),
        category: "general".to_string(),
        description: "Unstructured model output".to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object() {
        let text = "Here is the scenario:\n{\"name\": \"x\", \"nested\": {\"a\": 1}}\nDone.";
        let object = extract_json_object(text).unwrap();
        assert_eq!(object.get("name"), Some(&Value::from("x")));

        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_object("{not json}").is_none());
        assert!(extract_json_object("[1, 2]").is_none());
    }

    #[test]
    fn test_new_scenario_id_is_safe_segment() {
        let id = new_scenario_id();
        assert!(id.starts_with("scn-"));
        assert!(crate::store::keys::is_safe_segment(&id));
    }

    #[test]
    fn test_wrapped_output_is_valid() {
        let scenario = wrap_raw_text("kill the database", "scn-1");
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_settings_defaults() {
        let settings: GeneratorSettings = toml::from_str("").unwrap();
        assert_eq!(settings.request_timeout, Duration::from_secs(120));
        assert!(!settings.wrap_unparsed_output);
        assert_eq!(settings.endpoint.path(), "/v1/messages");
    }
}
