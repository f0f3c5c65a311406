//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors that can occur while running a tool conversation.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A local tool callback returned an error.
    #[error("tool '{tool_name}' failed: {reason}")]
    ToolFailed { tool_name: String, reason: String },

    /// A request to the API failed.
    #[error("inference error: {0}")]
    Inference(#[from] InferenceError),

    /// Serialization error.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The tool conversation failed; `source` is the step that broke it.
    #[error("tool conversation failed: {source}")]
    ConversationFailed { source: Box<AgentError> },
}

impl AgentError {
    /// The innermost error, unwrapping any `ConversationFailed` layers.
    pub fn root_cause(&self) -> &AgentError {
        match self {
            AgentError::ConversationFailed { source } => source.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::Serialization {
            reason: e.to_string(),
        }
    }
}
