//! Agent Core: tool calling on top of the inference client.
//!
//! Submodules:
//! - `tools`: executable tools (wire definition + local callback)
//! - `conversation`: the two-round tool conversation on [`GroqClient`](crate::inference::GroqClient)
//! - `errors`: Agent-level error types

pub mod conversation;
pub mod errors;
pub mod tools;

// Re-exports for convenience
pub use errors::AgentError;
pub use tools::{find_tool, Tool, ToolCallback};
