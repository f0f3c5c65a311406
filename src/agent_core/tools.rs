//! Executable tools: a wire definition paired with a local callback.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::inference::types::ToolDefinition;

use super::errors::AgentError;

/// Local implementation of a tool. Takes the raw JSON argument string the
/// model produced and returns the result string sent back to it.
pub type ToolCallback = Arc<dyn Fn(&str) -> anyhow::Result<String> + Send + Sync>;

/// A function the model may call during a tool conversation.
#[derive(Clone)]
pub struct Tool {
    pub definition: ToolDefinition,
    callback: ToolCallback,
}

impl Tool {
    /// `parameters` is the JSON schema of the arguments object.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        callback: F,
    ) -> Self
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            definition: ToolDefinition::function(name, description, parameters),
            callback: Arc::new(callback),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.function.name
    }

    /// Run the callback with the model's argument string.
    pub fn call(&self, arguments: &str) -> Result<String, AgentError> {
        (self.callback)(arguments).map_err(|e| AgentError::ToolFailed {
            tool_name: self.name().to_string(),
            reason: format!("{e:#}"),
        })
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// First tool whose function name matches.
pub fn find_tool<'a>(tools: &'a [Tool], name: &str) -> Option<&'a Tool> {
    tools.iter().find(|tool| tool.name() == name)
}

/// Wire definitions for a tool set, in order.
pub fn definitions(tools: &[Tool]) -> Vec<ToolDefinition> {
    tools.iter().map(|tool| tool.definition.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(name: &str, prefix: &'static str) -> Tool {
        Tool::new(name, "echo", json!({"type": "object"}), move |args| {
            Ok(format!("{prefix}{args}"))
        })
    }

    #[test]
    fn test_find_tool_first_match() {
        let tools = vec![echo("a", "first:"), echo("b", ""), echo("a", "second:")];
        let found = find_tool(&tools, "a").unwrap();
        assert_eq!(found.call("x").unwrap(), "first:x");
        assert!(find_tool(&tools, "missing").is_none());
    }

    #[test]
    fn test_call_error_becomes_tool_failed() {
        let tool = Tool::new("boom", "fails", json!({}), |_| anyhow::bail!("no such city"));
        match tool.call("{}") {
            Err(AgentError::ToolFailed { tool_name, reason }) => {
                assert_eq!(tool_name, "boom");
                assert!(reason.contains("no such city"));
            }
            other => panic!("expected ToolFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_definitions_preserve_order() {
        let tools = vec![echo("a", ""), echo("b", "")];
        let names: Vec<String> = definitions(&tools)
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(format!("{:?}", tools[0]), "Tool { name: \"a\", .. }");
    }
}
