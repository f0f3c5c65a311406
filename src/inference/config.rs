//! Client configuration loading and validation.
//!
//! A config can be built in code, read from the environment, or loaded from a
//! YAML file with environment-variable interpolation. Whatever the source, it
//! goes through the same normalization and validation before a client uses it.

use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::errors::InferenceError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Public Groq endpoint speaking the OpenAI-compatible API.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Largest embedded (base64) image accepted by the API, in megabytes.
pub const DEFAULT_MAX_IMAGE_SIZE_MB: f64 = 4.0;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "GROQ_BASE_URL";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 300;

// ─── ClientConfig ────────────────────────────────────────────────────────────

/// Settings shared by every call a [`GroqClient`](super::GroqClient) makes.
///
/// The API key is held as a [`SecretString`] so it never shows up in `Debug`
/// output or logs.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api_key: SecretString,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound for base64-embedded images (decoded size, in MB).
    #[serde(default = "default_max_image_size_mb")]
    pub max_image_size_mb: f64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Total timeout for non-streaming calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Total timeout for streaming calls. Long generations keep the
    /// connection open well past the regular request timeout.
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_max_image_size_mb() -> f64 {
    DEFAULT_MAX_IMAGE_SIZE_MB
}
fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_stream_timeout_secs() -> u64 {
    DEFAULT_STREAM_TIMEOUT_SECS
}

impl ClientConfig {
    /// Create a config for the default endpoint with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: default_base_url(),
            max_image_size_mb: DEFAULT_MAX_IMAGE_SIZE_MB,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            stream_timeout_secs: DEFAULT_STREAM_TIMEOUT_SECS,
        }
    }

    /// Read the API key (and optional base URL) from the environment.
    pub fn from_env() -> Result<Self, InferenceError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| InferenceError::ConfigError {
            reason: format!("{API_KEY_ENV} is not set"),
        })?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url;
            }
        }

        config.normalized()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_image_size_mb(mut self, max_image_size_mb: f64) -> Self {
        self.max_image_size_mb = max_image_size_mb;
        self
    }

    /// Override connect, request and stream timeouts (seconds).
    pub fn with_timeouts(mut self, connect: u64, request: u64, stream: u64) -> Self {
        self.connect_timeout_secs = connect;
        self.request_timeout_secs = request;
        self.stream_timeout_secs = stream;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    /// Trim the base URL and check the config is usable.
    ///
    /// Called by the client constructor, so hand-built configs get the same
    /// treatment as loaded ones.
    pub fn normalized(mut self) -> Result<Self, InferenceError> {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), InferenceError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(InferenceError::ConfigError {
                reason: "API key is empty".into(),
            });
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(InferenceError::ConfigError {
                reason: format!("base URL must be http(s): '{}'", self.base_url),
            });
        }

        if self.max_image_size_mb.is_nan() || self.max_image_size_mb <= 0.0 {
            return Err(InferenceError::ConfigError {
                reason: format!(
                    "max_image_size_mb must be positive, got {}",
                    self.max_image_size_mb
                ),
            });
        }

        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Load and validate a YAML client configuration file.
///
/// Performs environment-variable interpolation on values matching
/// `${VAR_NAME}` or `${VAR_NAME:-default}` before parsing, so the key can stay
/// out of the file: `api_key: ${GROQ_API_KEY}`.
pub fn load_client_config(path: &Path) -> Result<ClientConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    let config: ClientConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
            reason: format!("failed to parse config: {e}"),
        })?;

    config.normalized()
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((var_name, default)) => {
            std::env::var(var_name).unwrap_or_else(|_| default.to_string())
        }
        None => std::env::var(expr).unwrap_or_default(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
