//! Client library for Groq's OpenAI-compatible API.
//!
//! - [`inference`]: request builders, the [`GroqClient`] transport, streaming,
//!   vision and audio helpers, configuration.
//! - [`agent_core`]: executable tools and the two-round tool conversation.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the application (see the `groq` binary).

pub mod agent_core;
pub mod inference;

pub use agent_core::{AgentError, Tool};
pub use inference::{ClientConfig, GroqClient, InferenceError};
