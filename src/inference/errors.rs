//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during inference operations.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The API answered with a non-2xx status or an embedded `error` object.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// Upstream `error.type`, when the body carried one.
        error_type: Option<String>,
        /// Upstream `error.code`, when the body carried one.
        code: Option<String>,
    },

    /// Input rejected before any network call.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// TCP/HTTP connection to the API endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The endpoint did not respond within the configured timeout.
    #[error("request to {endpoint} timed out after {duration_secs}s")]
    Timeout { endpoint: String, duration_secs: u64 },

    /// A 2xx response whose body could not be decoded.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// SSE stream read or chunk-level error.
    #[error("stream error: {reason}")]
    StreamError { reason: String },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    /// The client was closed and can no longer issue requests.
    #[error("client has been closed")]
    ClientClosed,
}

impl InferenceError {
    /// HTTP status associated with this error, if any.
    ///
    /// Validation failures report 400 so callers can treat them like a rejected
    /// request without a network round-trip.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            InferenceError::Api { status, .. } => Some(*status),
            InferenceError::Validation { .. } => Some(400),
            _ => None,
        }
    }

    /// Whether the server rejected the API key.
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, InferenceError::Api { status: 401, .. })
    }

    /// Whether the server rate limited the request.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, InferenceError::Api { status: 429, .. })
            || matches!(
                self,
                InferenceError::Api { code: Some(code), .. } if code == "rate_limit_exceeded"
            )
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        InferenceError::Validation {
            reason: reason.into(),
        }
    }

    /// The [`InferenceError::Api`] carried by a JSON payload's top-level
    /// `error` field, if it has one.
    ///
    /// An object yields its `message`, `type` and `code`; a bare string is
    /// taken as the message. `null` and other shapes are not errors.
    pub fn from_error_payload(status: u16, payload: &Value) -> Option<Self> {
        match payload.get("error")? {
            Value::Object(fields) => {
                let message = fields
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| Value::Object(fields.clone()).to_string());
                let error_type = fields.get("type").and_then(Value::as_str).map(str::to_string);
                let code = match fields.get("code") {
                    Some(Value::String(code)) => Some(code.clone()),
                    Some(Value::Null) | None => None,
                    Some(other) => Some(other.to_string()),
                };
                Some(InferenceError::Api {
                    status,
                    message,
                    error_type,
                    code,
                })
            }
            Value::String(message) => Some(InferenceError::Api {
                status,
                message: message.clone(),
                error_type: None,
                code: None,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: Option<&str>) -> InferenceError {
        InferenceError::Api {
            status,
            message: "boom".into(),
            error_type: None,
            code: code.map(str::to_string),
        }
    }

    #[test]
    fn test_status_code_api() {
        assert_eq!(api(503, None).status_code(), Some(503));
    }

    #[test]
    fn test_status_code_validation_is_400() {
        let err = InferenceError::validation("bad model");
        assert_eq!(err.status_code(), Some(400));
    }

    #[test]
    fn test_status_code_none_for_transport_errors() {
        let err = InferenceError::ConnectionFailed {
            endpoint: "https://example.invalid".into(),
            reason: "refused".into(),
        };
        assert!(err.status_code().is_none());
        assert!(InferenceError::ClientClosed.status_code().is_none());
    }

    #[test]
    fn test_is_authentication_error() {
        assert!(api(401, None).is_authentication_error());
        assert!(!api(403, None).is_authentication_error());
    }

    #[test]
    fn test_is_rate_limited_by_status_or_code() {
        assert!(api(429, None).is_rate_limited());
        assert!(api(400, Some("rate_limit_exceeded")).is_rate_limited());
        assert!(!api(400, Some("invalid_api_key")).is_rate_limited());
    }

    #[test]
    fn test_from_error_payload() {
        let payload = serde_json::json!({
            "error": {"message": "slow down", "type": "tokens", "code": 429}
        });
        match InferenceError::from_error_payload(200, &payload) {
            Some(InferenceError::Api {
                status,
                message,
                error_type,
                code,
            }) => {
                assert_eq!(status, 200);
                assert_eq!(message, "slow down");
                assert_eq!(error_type.as_deref(), Some("tokens"));
                assert_eq!(code.as_deref(), Some("429"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }

        let bare = serde_json::json!({"error": "boom"});
        assert!(InferenceError::from_error_payload(500, &bare).is_some());
        assert!(InferenceError::from_error_payload(200, &serde_json::json!({"error": null})).is_none());
        assert!(InferenceError::from_error_payload(200, &serde_json::json!({"choices": []})).is_none());
    }

    #[test]
    fn test_api_display_includes_message() {
        let msg = api(400, None).to_string();
        assert!(msg.contains("HTTP 400"));
        assert!(msg.contains("boom"));
    }
}
