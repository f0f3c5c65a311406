//! Inference Client: OpenAI-compatible API client for Groq.
//!
//! This module handles all communication with the API endpoint:
//! - Chat completions, plain and streamed (SSE)
//! - Vision completions with URL or embedded base64 images
//! - Audio transcription and translation (multipart uploads)
//! - Model listing
//! - Client configuration from code, environment or YAML
//!
//! Request bodies are assembled by the pure builders in [`request`]; the
//! [`GroqClient`] sends them and applies one error contract to every response.

pub mod audio;
pub mod client;
pub mod config;
pub mod errors;
pub mod request;
pub mod streaming;
pub mod types;
pub mod vision;

// Re-exports for convenience
pub use audio::{AudioRequest, AudioTask, DEFAULT_AUDIO_MODEL};
pub use client::{decode_response, GroqClient};
pub use config::{load_client_config, ClientConfig};
pub use errors::InferenceError;
pub use request::{
    chat_request, simple_chat_request, tool_response_message, tools_request, vision_request,
    ImageSource, DEFAULT_TEMPERATURE,
};
pub use streaming::{parse_sse_stream, StreamAccumulator};
pub use types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ContentPart,
    ModelInfo, ModelList, ResponseFormat, Role, ToolCallResponse, ToolDefinition,
};
pub use vision::{encode_image_file, validate_image_url, VISION_MODELS};
