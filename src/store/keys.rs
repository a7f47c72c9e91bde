//! Object key layout
//!
//! Every key the system reads or writes is built here so the layout stays in one
//! place:
//!
//! ```text
//! templates/<template-name>
//! scenarios/<execution-id>/<scenario-id>.json
//! generated/<execution-id>/<scenario-id>/stack.ts
//! generated/<execution-id>/<scenario-id>/experiment-template.json
//! executions/<execution-id>.json
//! codegen-output/<artifact-name>
//! pipeline-runs/<run-id>.json
//! experiments/<experiment-id>.json
//! experiment-logs/<experiment-id>.jsonl
//! ```

use super::error::{StoreError, StoreResult};

pub const TEMPLATES_PREFIX: &str = "templates/";
pub const SCENARIOS_PREFIX: &str = "scenarios/";
pub const GENERATED_PREFIX: &str = "generated/";
pub const EXECUTIONS_PREFIX: &str = "executions/";
pub const CODEGEN_OUTPUT_PREFIX: &str = "codegen-output/";
pub const PIPELINE_RUNS_PREFIX: &str = "pipeline-runs/";
pub const EXPERIMENTS_PREFIX: &str = "experiments/";
pub const EXPERIMENT_LOGS_PREFIX: &str = "experiment-logs/";

pub const STACK_CODE_FILE: &str = "stack.ts";
pub const EXPERIMENT_TEMPLATE_FILE: &str = "experiment-template.json";

/// Reject keys that could escape a prefix or map to odd filesystem paths
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::invalid_key("key is empty"));
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(StoreError::invalid_key(format!(
            "key must not start or end with '/': {}",
            key
        )));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(StoreError::invalid_key(format!(
            "key contains a forbidden character: {}",
            key
        )));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StoreError::invalid_key(format!(
            "key contains an empty or relative segment: {}",
            key
        )));
    }
    Ok(())
}

/// Check that an identifier is usable as a single key segment
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.len() <= 128
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && segment != "."
        && segment != ".."
}

pub fn template_key(name: &str) -> String {
    format!("{}{}", TEMPLATES_PREFIX, name)
}

pub fn scenario_key(execution_id: &str, scenario_id: &str) -> String {
    format!("{}{}/{}.json", SCENARIOS_PREFIX, execution_id, scenario_id)
}

pub fn generated_prefix(execution_id: &str, scenario_id: &str) -> String {
    format!("{}{}/{}/", GENERATED_PREFIX, execution_id, scenario_id)
}

pub fn stack_code_key(execution_id: &str, scenario_id: &str) -> String {
    format!(
        "{}{}",
        generated_prefix(execution_id, scenario_id),
        STACK_CODE_FILE
    )
}

pub fn experiment_template_key(execution_id: &str, scenario_id: &str) -> String {
    format!(
        "{}{}",
        generated_prefix(execution_id, scenario_id),
        EXPERIMENT_TEMPLATE_FILE
    )
}

pub fn execution_key(execution_id: &str) -> String {
    format!("{}{}.json", EXECUTIONS_PREFIX, execution_id)
}

pub fn codegen_output_key(artifact_name: &str) -> String {
    format!("{}{}", CODEGEN_OUTPUT_PREFIX, artifact_name)
}

pub fn pipeline_run_key(run_id: &str) -> String {
    format!("{}{}.json", PIPELINE_RUNS_PREFIX, run_id)
}

pub fn experiment_key(experiment_id: &str) -> String {
    format!("{}{}.json", EXPERIMENTS_PREFIX, experiment_id)
}

pub fn experiment_logs_key(experiment_id: &str) -> String {
    format!("{}{}.jsonl", EXPERIMENT_LOGS_PREFIX, experiment_id)
}

/// Split a scenario key back into `(execution_id, scenario_id)`
pub fn parse_scenario_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix(SCENARIOS_PREFIX)?;
    let (execution_id, file) = rest.split_once('/')?;
    let scenario_id = file.strip_suffix(".json")?;
    if execution_id.is_empty() || scenario_id.is_empty() || scenario_id.contains('/') {
        return None;
    }
    Some((execution_id, scenario_id))
}

/// Last path segment of a key
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(template_key("scenario-template.json"), "templates/scenario-template.json");
        assert_eq!(scenario_key("exec-1", "scn-a"), "scenarios/exec-1/scn-a.json");
        assert_eq!(stack_code_key("exec-1", "scn-a"), "generated/exec-1/scn-a/stack.ts");
        assert_eq!(
            experiment_template_key("exec-1", "scn-a"),
            "generated/exec-1/scn-a/experiment-template.json"
        );
        assert_eq!(codegen_output_key("stack.ts"), "codegen-output/stack.ts");
    }

    #[test]
    fn test_parse_scenario_key() {
        assert_eq!(
            parse_scenario_key("scenarios/exec-1/scn-a.json"),
            Some(("exec-1", "scn-a"))
        );
        assert_eq!(parse_scenario_key("scenarios/scn-a.json"), None);
        assert_eq!(parse_scenario_key("generated/exec-1/scn-a.json"), None);
        assert_eq!(parse_scenario_key("scenarios/exec-1/nested/scn.json"), None);
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("templates/a.json").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/templates/a.json").is_err());
        assert!(validate_key("templates/../secrets").is_err());
        assert!(validate_key("templates//a").is_err());
        assert!(validate_key("templates/").is_err());
    }

    #[test]
    fn test_safe_segment() {
        assert!(is_safe_segment("scn-2024_01.v1"));
        assert!(!is_safe_segment("a/b"));
        assert!(!is_safe_segment(".."));
        assert!(!is_safe_segment(""));
        assert!(!is_safe_segment("has space"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("generated/e/s/stack.ts"), "stack.ts");
        assert_eq!(file_name("stack.ts"), "stack.ts");
    }
}
