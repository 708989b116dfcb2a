pub mod background;
pub mod summon;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

pub use background::{
    BackgroundCancelTool, BackgroundOutputTool, BackgroundStatusTool, BackgroundTaskTool,
};
pub use summon::SummonTool;

/// Trait for tools exposed to the orchestrating agent.
///
/// Tools report user-facing failures as `Ok` strings prefixed `[arise]`;
/// an `Err` means the tool itself is broken, not the request.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;
    /// `session_id` identifies the session the tool call came from.
    async fn execute(&self, params: serde_json::Value, session_id: &str) -> Result<String>;
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn list(&self) -> Vec<&dyn Tool> {
        self.tools.values().map(|t| t.as_ref()).collect()
    }

    /// Registration payloads in the shape the host expects for each tool.
    pub fn definitions(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters_schema(),
                })
            })
            .collect()
    }

    pub async fn execute(
        &self,
        name: &str,
        params: serde_json::Value,
        session_id: &str,
    ) -> Result<String> {
        match self.tools.get(name) {
            Some(tool) => {
                let errors = validate_params(&params, &tool.parameters_schema());
                if !errors.is_empty() {
                    return Ok(format!(
                        "Error: Invalid parameters for tool '{}': {}",
                        name,
                        errors.join("; ")
                    ));
                }
                tool.execute(params, session_id).await
            }
            None => anyhow::bail!("unknown tool: {name}"),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// String argument out of a params object, empty when absent.
pub(crate) fn str_arg<'a>(params: &'a serde_json::Value, name: &str) -> &'a str {
    params.get(name).and_then(|v| v.as_str()).unwrap_or_default()
}

/// Validate tool parameters against a JSON schema.
/// Returns a list of validation error strings (empty if valid).
fn validate_params(params: &serde_json::Value, schema: &serde_json::Value) -> Vec<String> {
    let mut errors = Vec::new();
    validate_value(params, schema, "", &mut errors);
    errors
}

fn validate_value(
    val: &serde_json::Value,
    schema: &serde_json::Value,
    path: &str,
    errors: &mut Vec<String>,
) {
    let display_path = if path.is_empty() { "root" } else { path };

    if let Some(expected_type) = schema.get("type").and_then(|t| t.as_str()) {
        let type_ok = match expected_type {
            "object" => val.is_object(),
            "string" => val.is_string(),
            "boolean" => val.is_boolean(),
            _ => true,
        };
        if !type_ok {
            errors.push(format!("{display_path}: expected type '{expected_type}'"));
            return;
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(|e| e.as_array()) {
        if !allowed.contains(val) {
            errors.push(format!("{display_path}: value not in allowed enum"));
        }
    }

    if let Some(obj) = val.as_object() {
        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for req in required {
                if let Some(field) = req.as_str() {
                    if !obj.contains_key(field) {
                        let field_path = if path.is_empty() {
                            field.to_string()
                        } else {
                            format!("{path}.{field}")
                        };
                        errors.push(format!("{field_path}: required field missing"));
                    }
                }
            }
        }
        if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
            for (key, prop_schema) in props {
                if let Some(prop_val) = obj.get(key) {
                    let prop_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    validate_value(prop_val, prop_schema, &prop_path, errors);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text argument back."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string"}
                },
                "required": ["text"]
            })
        }

        async fn execute(&self, params: serde_json::Value, session_id: &str) -> Result<String> {
            let text = params.get("text").and_then(|v| v.as_str()).unwrap_or("");
            Ok(format!("{session_id}: {text}"))
        }
    }

    #[test]
    fn test_valid_params() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "shadow": {"type": "string", "enum": ["beru", "tank"]},
                "prompt": {"type": "string"}
            },
            "required": ["shadow", "prompt"]
        });
        let params = serde_json::json!({"shadow": "beru", "prompt": "look around"});
        assert!(validate_params(&params, &schema).is_empty());
    }

    #[test]
    fn test_missing_required() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string"}
            },
            "required": ["prompt"]
        });
        let errors = validate_params(&serde_json::json!({}), &schema);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("required field missing"));
    }

    #[test]
    fn test_wrong_type() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "run_in_background": {"type": "boolean"}
            },
            "required": ["run_in_background"]
        });
        let errors = validate_params(&serde_json::json!({"run_in_background": "yes"}), &schema);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("expected type 'boolean'"));
    }

    #[test]
    fn test_enum_validation() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "shadow": {"type": "string", "enum": ["beru", "tank", "bellion"]}
            },
            "required": ["shadow"]
        });
        let errors = validate_params(&serde_json::json!({"shadow": "monarch"}), &schema);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("enum"));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string"}
            },
            "required": ["prompt"]
        });
        let params = serde_json::json!({"prompt": "x", "unused": 1});
        assert!(validate_params(&params, &schema).is_empty());
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let out = registry
            .execute("echo", serde_json::json!({"text": "hi"}), "ses_1")
            .await
            .unwrap();
        assert_eq!(out, "ses_1: hi");

        assert!(registry.get("echo").is_some());
        assert_eq!(registry.list().len(), 1);
    }

    #[tokio::test]
    async fn test_registry_rejects_invalid_params() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let out = registry
            .execute("echo", serde_json::json!({}), "ses_1")
            .await
            .unwrap();
        assert!(out.starts_with("Error: Invalid parameters for tool 'echo'"));
    }

    #[tokio::test]
    async fn test_registry_unknown_tool_is_an_error() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("nope", serde_json::json!({}), "ses_1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[test]
    fn test_definitions_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["name"], "echo");
        assert!(defs[0]["parameters"]["properties"]["text"].is_object());
    }
}
