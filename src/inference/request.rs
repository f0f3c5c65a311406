//! Request builders.
//!
//! Pure functions that assemble chat completion bodies. Nothing here performs
//! I/O or fails; validation of vision inputs lives in [`super::vision`].

use super::types::{
    ChatCompletionRequest, ChatMessage, ContentPart, ToolDefinition,
};

/// Temperature used when the caller does not pick one.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Where the image of a vision request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A remote URL, sent verbatim.
    Url(String),
    /// Base64-encoded JPEG bytes, embedded as a `data:` URI.
    Base64(String),
}

impl ImageSource {
    /// The value of the `image_url.url` field for this source.
    pub fn to_url(&self) -> String {
        match self {
            ImageSource::Url(url) => url.clone(),
            ImageSource::Base64(encoded) => format!("data:image/jpeg;base64,{encoded}"),
        }
    }
}

/// A request with an optional system prompt followed by one user message.
pub fn simple_chat_request(
    model: &str,
    user_message: &str,
    system_message: Option<&str>,
    temperature: Option<f64>,
) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_message {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(user_message));

    chat_request(model, messages, temperature)
}

/// A request carrying an already-assembled conversation, in order.
pub fn chat_request(
    model: &str,
    messages: Vec<ChatMessage>,
    temperature: Option<f64>,
) -> ChatCompletionRequest {
    let mut request = ChatCompletionRequest::new(model, messages);
    request.temperature = Some(temperature.unwrap_or(DEFAULT_TEMPERATURE));
    request
}

/// A single user message with a text part and an image part.
///
/// The caller is responsible for checking the model and image first (see
/// [`super::vision::validate_vision_model`] and friends). Temperature is left
/// out of the body when `None`.
pub fn vision_request(
    image: &ImageSource,
    prompt: &str,
    model: &str,
    temperature: Option<f64>,
) -> ChatCompletionRequest {
    let message = ChatMessage::user_parts(vec![
        ContentPart::text(prompt),
        ContentPart::image_url(image.to_url()),
    ]);

    let mut request = ChatCompletionRequest::new(model, vec![message]);
    request.temperature = temperature;
    request
}

/// A chat request exposing `tools` to the model with automatic tool choice.
/// An empty tool set yields a plain chat request.
pub fn tools_request(
    model: &str,
    messages: Vec<ChatMessage>,
    tools: &[ToolDefinition],
    temperature: Option<f64>,
) -> ChatCompletionRequest {
    let mut request = chat_request(model, messages, temperature);
    if !tools.is_empty() {
        request.tools = Some(tools.to_vec());
        request.tool_choice = Some("auto".to_string());
    }
    request
}

/// The `tool` message that feeds a function result back to the model.
pub fn tool_response_message(
    tool_call_id: &str,
    function_name: &str,
    function_result: &str,
) -> ChatMessage {
    ChatMessage::tool(tool_call_id, function_name, function_result)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
