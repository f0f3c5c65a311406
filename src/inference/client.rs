//! Authenticated client for the Groq OpenAI-compatible API.
//!
//! Every call goes through the same decoding contract ([`decode_response`]):
//! an embedded `error` object or a non-2xx status becomes
//! [`InferenceError::Api`], anything else is handed back as parsed JSON.

use std::path::Path;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use futures::Stream;
use reqwest::{Client as HttpClient, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::audio::{AudioRequest, AudioTask};
use super::config::ClientConfig;
use super::errors::InferenceError;
use super::request::{vision_request, ImageSource};
use super::streaming::{parse_sse_stream, text_fragments, typed_chunks};
use super::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ModelInfo, ModelList,
};
use super::vision::{encode_image_file, validate_base64_size, validate_image_url, validate_vision_model};

/// Body excerpt length kept in error messages.
const BODY_EXCERPT_LEN: usize = 200;

// ─── Transport ───────────────────────────────────────────────────────────────

/// The pair of HTTP clients behind a [`GroqClient`].
#[derive(Clone)]
struct Transport {
    /// Non-streaming calls, bounded by the request timeout.
    http: HttpClient,
    /// Streaming calls, bounded by the (longer) stream timeout.
    http_stream: HttpClient,
}

impl Transport {
    fn build(config: &ClientConfig) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let http_stream = HttpClient::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.stream_timeout())
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build streaming HTTP client: {e}"),
            })?;

        Ok(Self { http, http_stream })
    }
}

// ─── GroqClient ──────────────────────────────────────────────────────────────

/// Client for the chat, audio and model endpoints.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. After
/// [`close`](Self::close) every call fails with [`InferenceError::ClientClosed`].
pub struct GroqClient {
    config: ClientConfig,
    transport: RwLock<Option<Transport>>,
}

impl GroqClient {
    /// Build a client. Does NOT check connectivity; that happens on the
    /// first request.
    pub fn new(config: ClientConfig) -> Result<Self, InferenceError> {
        let config = config.normalized()?;
        let transport = Transport::build(&config)?;

        tracing::debug!(base_url = %config.base_url, "created API client");

        Ok(Self {
            config,
            transport: RwLock::new(Some(transport)),
        })
    }

    /// Build a client from `GROQ_API_KEY` / `GROQ_BASE_URL`.
    pub fn from_env() -> Result<Self, InferenceError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Release the HTTP transport. Idempotent.
    pub fn close(&self) {
        let released = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            tracing::debug!(base_url = %self.config.base_url, "closed API client");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn transport(&self) -> Result<Transport, InferenceError> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(InferenceError::ClientClosed)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    // ─── Chat Completion ─────────────────────────────────────────────────

    /// `POST /chat/completions` with any serializable body.
    pub async fn create_chat_completion(
        &self,
        body: &impl Serialize,
    ) -> Result<Value, InferenceError> {
        let body = to_json_body(body)?;
        let transport = self.transport()?;
        let url = self.url("/chat/completions");
        log_chat_request(&url, &body);

        let response = transport
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, &url, self.config.request_timeout()))?;

        read_json(response).await
    }

    /// Typed variant of [`create_chat_completion`](Self::create_chat_completion).
    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, InferenceError> {
        let value = self.create_chat_completion(request).await?;
        from_json(value, "chat completion")
    }

    // ─── Chat Completion (streaming) ─────────────────────────────────────

    /// Streaming `POST /chat/completions`; `stream` is always sent as `true`.
    ///
    /// Error statuses are decoded before the stream is returned. Each item is
    /// one parsed `data:` fragment; `[DONE]` ends the stream.
    pub async fn create_chat_completion_stream(
        &self,
        body: &impl Serialize,
    ) -> Result<impl Stream<Item = Result<Value, InferenceError>>, InferenceError> {
        let mut body = to_json_body(body)?;
        if let Value::Object(map) = &mut body {
            map.insert("stream".to_string(), Value::Bool(true));
        }

        let transport = self.transport()?;
        let url = self.url("/chat/completions");
        log_chat_request(&url, &body);

        let response = transport
            .http_stream
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, &url, self.config.stream_timeout()))?;

        let status = response.status();
        if !status.is_success() {
            let text = read_text(response).await?;
            return Err(status_error(status.as_u16(), &text));
        }

        Ok(parse_sse_stream(response.bytes_stream()))
    }

    /// Streaming chat completion decoded into [`ChatCompletionChunk`]s.
    pub async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<impl Stream<Item = Result<ChatCompletionChunk, InferenceError>>, InferenceError>
    {
        Ok(typed_chunks(self.create_chat_completion_stream(request).await?))
    }

    /// Streaming chat completion reduced to its text fragments.
    pub async fn content_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<impl Stream<Item = Result<String, InferenceError>>, InferenceError> {
        Ok(text_fragments(self.chat_completion_stream(request).await?))
    }

    // ─── Vision ──────────────────────────────────────────────────────────

    /// Chat completion for a vision body.
    ///
    /// The model must be on the vision allow-list and every image part must
    /// carry a well-formed URL within the embedded size limit; otherwise this
    /// fails with [`InferenceError::Validation`] before any network call.
    pub async fn create_vision_completion(
        &self,
        body: &impl Serialize,
    ) -> Result<Value, InferenceError> {
        let body = to_json_body(body)?;
        self.validate_vision_body(&body)?;
        self.create_chat_completion(&body).await
    }

    /// Read a local image, embed it as base64 and run a vision completion.
    pub async fn vision_request_from_file(
        &self,
        path: &Path,
        prompt: &str,
        model: &str,
        temperature: Option<f64>,
    ) -> Result<Value, InferenceError> {
        validate_vision_model(model)?;
        let encoded = encode_image_file(path, self.config.max_image_size_mb).await?;
        let request = vision_request(&ImageSource::Base64(encoded), prompt, model, temperature);
        self.create_vision_completion(&request).await
    }

    fn validate_vision_body(&self, body: &Value) -> Result<(), InferenceError> {
        let model = body
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| InferenceError::validation("request body has no model"))?;
        validate_vision_model(model)?;

        let image_urls = body
            .get("messages")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|message| message.get("content").and_then(Value::as_array))
            .flatten()
            .filter_map(|part| part.pointer("/image_url/url").and_then(Value::as_str));

        for url in image_urls {
            validate_image_url(url)?;
            if let Some((_, encoded)) = url.strip_prefix("data:").and_then(|u| u.split_once(',')) {
                validate_base64_size(encoded, self.config.max_image_size_mb)?;
            }
        }
        Ok(())
    }

    // ─── Audio ───────────────────────────────────────────────────────────

    /// `POST /audio/transcriptions`.
    pub async fn create_transcription(&self, request: AudioRequest) -> Result<Value, InferenceError> {
        self.send_audio(AudioTask::Transcription, request).await
    }

    /// `POST /audio/translations`.
    pub async fn create_translation(&self, request: AudioRequest) -> Result<Value, InferenceError> {
        self.send_audio(AudioTask::Translation, request).await
    }

    async fn send_audio(
        &self,
        task: AudioTask,
        request: AudioRequest,
    ) -> Result<Value, InferenceError> {
        let transport = self.transport()?;
        let url = self.url(task.path());

        tracing::info!(
            url = %url,
            model = %request.model,
            file_name = %request.filename,
            file_bytes = request.file.len(),
            "audio request"
        );

        let form = request.into_form()?;
        let response = transport
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| send_error(e, &url, self.config.request_timeout()))?;

        let status = response.status().as_u16();
        let text = read_text(response).await?;

        // `response_format: text` answers with a bare string
        match decode_response(status, &text) {
            Err(InferenceError::InvalidResponse { .. }) => Ok(Value::String(text)),
            other => other,
        }
    }

    // ─── Models ──────────────────────────────────────────────────────────

    /// `GET /models`.
    pub async fn list_models(&self) -> Result<Value, InferenceError> {
        self.get_json(self.url("/models")).await
    }

    /// Typed variant of [`list_models`](Self::list_models).
    pub async fn models(&self) -> Result<ModelList, InferenceError> {
        from_json(self.list_models().await?, "model list")
    }

    /// `GET /models/{id}`.
    pub async fn retrieve_model(&self, id: &str) -> Result<ModelInfo, InferenceError> {
        if id.trim().is_empty() {
            return Err(InferenceError::validation("model id is empty"));
        }
        let value = self.get_json(self.model_url(id)?).await?;
        from_json(value, "model")
    }

    /// `{base}/models/{id}` with `id` percent-encoded as one path segment.
    fn model_url(&self, id: &str) -> Result<String, InferenceError> {
        let mut url = Url::parse(&self.url("/models")).map_err(|e| InferenceError::ConfigError {
            reason: format!("invalid base URL '{}': {e}", self.config.base_url),
        })?;
        url.path_segments_mut()
            .map_err(|_| InferenceError::ConfigError {
                reason: format!("base URL cannot carry a path: '{}'", self.config.base_url),
            })?
            .push(id);
        Ok(url.into())
    }

    async fn get_json(&self, url: String) -> Result<Value, InferenceError> {
        let transport = self.transport()?;
        tracing::info!(url = %url, "GET request");

        let response = transport
            .http
            .get(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| send_error(e, &url, self.config.request_timeout()))?;

        read_json(response).await
    }

    // ─── Health Check ────────────────────────────────────────────────────

    /// Whether `/models` answers with a 2xx status.
    ///
    /// Network failures report `false` rather than an error.
    pub async fn health_check(&self) -> Result<bool, InferenceError> {
        let transport = self.transport()?;
        let url = self.url("/models");

        match transport
            .http
            .get(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .timeout(self.config.connect_timeout())
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "health check failed");
                Ok(false)
            }
        }
    }
}

// ─── Response decoding ───────────────────────────────────────────────────────

/// Apply the error contract to a status code and raw body.
///
/// A top-level `error` object fails with its `message` whatever the status; a
/// non-2xx status without one fails with the raw body; a 2xx JSON body is
/// returned unchanged and a 2xx non-JSON body is [`InferenceError::InvalidResponse`].
pub fn decode_response(status: u16, body: &str) -> Result<Value, InferenceError> {
    let parsed = serde_json::from_str::<Value>(body).ok();

    if let Some(err) = parsed
        .as_ref()
        .and_then(|value| InferenceError::from_error_payload(status, value))
    {
        tracing::warn!(status, message = %api_message(&err), "API returned an error");
        return Err(err);
    }

    if !(200..300).contains(&status) {
        return Err(raw_status_error(status, body));
    }

    parsed.ok_or_else(|| InferenceError::InvalidResponse {
        reason: format!("response body is not JSON: {}", excerpt(body)),
    })
}

/// Error for a non-2xx response: the embedded `error` when the body has one,
/// otherwise the raw body.
fn status_error(status: u16, body: &str) -> InferenceError {
    match serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| InferenceError::from_error_payload(status, &value))
    {
        Some(err) => {
            tracing::warn!(status, message = %api_message(&err), "API returned an error");
            err
        }
        None => raw_status_error(status, body),
    }
}

fn raw_status_error(status: u16, body: &str) -> InferenceError {
    tracing::warn!(status, body = %excerpt(body), "API returned an error status");
    InferenceError::Api {
        status,
        message: body.to_string(),
        error_type: None,
        code: None,
    }
}

fn api_message(err: &InferenceError) -> &str {
    match err {
        InferenceError::Api { message, .. } => message,
        _ => "",
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

async fn read_text(response: reqwest::Response) -> Result<String, InferenceError> {
    response
        .text()
        .await
        .map_err(|e| InferenceError::InvalidResponse {
            reason: format!("failed to read response body: {e}"),
        })
}

async fn read_json(response: reqwest::Response) -> Result<Value, InferenceError> {
    let status = response.status().as_u16();
    let text = read_text(response).await?;
    decode_response(status, &text)
}

fn to_json_body(body: &impl Serialize) -> Result<Value, InferenceError> {
    let value = serde_json::to_value(body)
        .map_err(|e| InferenceError::validation(format!("request body is not serializable: {e}")))?;
    if !value.is_object() {
        return Err(InferenceError::validation("request body must be a JSON object"));
    }
    Ok(value)
}

fn from_json<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, InferenceError> {
    serde_json::from_value(value).map_err(|e| InferenceError::InvalidResponse {
        reason: format!("unexpected {what} shape: {e}"),
    })
}

fn send_error(e: reqwest::Error, url: &str, timeout: Duration) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Timeout {
            endpoint: url.to_string(),
            duration_secs: timeout.as_secs(),
        }
    } else {
        InferenceError::ConnectionFailed {
            endpoint: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Log the request metadata (not the full body, it can be huge).
fn log_chat_request(url: &str, body: &Value) {
    let model = body.get("model").and_then(Value::as_str).unwrap_or("");
    let message_count = body.get("messages").and_then(Value::as_array).map_or(0, Vec::len);
    let tool_count = body.get("tools").and_then(Value::as_array).map_or(0, Vec::len);
    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    tracing::info!(
        url = %url,
        model = %model,
        message_count,
        tool_count,
        stream,
        "chat completion request"
    );
}

// ─── Tests ───────────────────────────────────────────────────────────────────
