//! Vision input validation.
//!
//! Everything here runs before a request is sent: an unsupported model, a
//! malformed image URL, an oversized embedded image or a missing file fails
//! fast with [`InferenceError::Validation`].

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::errors::InferenceError;

/// Models that accept image content parts.
pub const VISION_MODELS: &[&str] = &[
    "llama-3.2-11b-vision-preview",
    "llama-3.2-90b-vision-preview",
    "meta-llama/llama-4-scout-17b-16e-instruct",
    "meta-llama/llama-4-maverick-17b-128e-instruct",
];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub fn is_vision_model(model: &str) -> bool {
    VISION_MODELS.contains(&model)
}

/// Reject models outside the vision allow-list.
pub fn validate_vision_model(model: &str) -> Result<(), InferenceError> {
    if is_vision_model(model) {
        Ok(())
    } else {
        Err(InferenceError::validation(format!(
            "model '{model}' does not support vision (expected one of: {})",
            VISION_MODELS.join(", ")
        )))
    }
}

/// Accept non-empty `http(s)://` URLs and `data:image/` URIs.
pub fn validate_image_url(url: &str) -> Result<(), InferenceError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(InferenceError::validation("image URL is empty"));
    }

    let scheme_ok = ["http://", "https://", "data:image/"]
        .iter()
        .any(|prefix| url.starts_with(prefix));
    let has_body = if url.starts_with("data:") {
        url.split_once(',').is_some_and(|(_, payload)| !payload.trim().is_empty())
    } else {
        url.split_once("://").is_some_and(|(_, rest)| !rest.is_empty())
    };

    if scheme_ok && has_body {
        Ok(())
    } else {
        Err(InferenceError::validation(format!("malformed image URL: '{url}'")))
    }
}

/// Number of bytes a base64 string decodes to.
pub fn decoded_len(encoded: &str) -> usize {
    let encoded = encoded.trim_end();
    let padding = encoded
        .bytes()
        .rev()
        .take_while(|&b| b == b'=')
        .count()
        .min(2);
    (encoded.len() * 3 / 4).saturating_sub(padding)
}

/// Fail when the decoded size of `encoded` exceeds `max_size_mb`.
///
/// A payload exactly at the limit passes.
pub fn validate_base64_size(encoded: &str, max_size_mb: f64) -> Result<(), InferenceError> {
    let size = decoded_len(encoded) as f64;
    let limit = max_size_mb * BYTES_PER_MB;

    if size > limit {
        return Err(InferenceError::validation(format!(
            "embedded image is {:.2} MB, limit is {max_size_mb} MB",
            size / BYTES_PER_MB
        )));
    }
    Ok(())
}

/// Read a local image and return it base64-encoded, checked against the limit.
pub async fn encode_image_file(path: &Path, max_size_mb: f64) -> Result<String, InferenceError> {
    if !path.is_file() {
        return Err(InferenceError::validation(format!(
            "image file not found: {}",
            path.display()
        )));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| InferenceError::validation(format!("failed to read {}: {e}", path.display())))?;

    let encoded = STANDARD.encode(&bytes);
    validate_base64_size(&encoded, max_size_mb)?;

    tracing::debug!(
        path = %path.display(),
        raw_bytes = bytes.len(),
        encoded_len = encoded.len(),
        "encoded image file"
    );

    Ok(encoded)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_vision_allow_list() {
        assert!(validate_vision_model("llama-3.2-11b-vision-preview").is_ok());
        assert!(validate_vision_model("meta-llama/llama-4-scout-17b-16e-instruct").is_ok());

        let err = validate_vision_model("llama-3.3-70b-versatile").unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("llama-3.3-70b-versatile"));
    }

    #[test]
    fn test_validate_image_url() {
        assert!(validate_image_url("https://example.com/cat.jpg").is_ok());
        assert!(validate_image_url("http://localhost/img.png").is_ok());
        assert!(validate_image_url("data:image/png;base64,AAAA").is_ok());

        assert!(validate_image_url("").is_err());
        assert!(validate_image_url("   ").is_err());
        assert!(validate_image_url("https://").is_err());
        assert!(validate_image_url("ftp://example.com/cat.jpg").is_err());
        assert!(validate_image_url("cat.jpg").is_err());
    }

    #[test]
    fn test_validate_image_url_requires_data_payload() {
        assert!(validate_image_url("data:image/").is_err());
        assert!(validate_image_url("data:image/png;base64,").is_err());
        assert!(validate_image_url("data:image/png;base64,  ").is_err());
        assert!(validate_image_url("data:image/jpeg;base64,/9j/4AAQ").is_ok());
    }

    #[test]
    fn test_decoded_len_accounts_for_padding() {
        assert_eq!(decoded_len("AAAA"), 3);
        assert_eq!(decoded_len("AAA="), 2);
        assert_eq!(decoded_len("AA=="), 1);
        assert_eq!(decoded_len(""), 0);
        assert_eq!(decoded_len(&STANDARD.encode(vec![0u8; 1000])), 1000);
    }

    #[test]
    fn test_base64_size_at_limit_passes() {
        // 0.75 MB decodes from exactly 1 MiB of base64 text.
        let at_limit = "A".repeat(1024 * 1024);
        assert!(validate_base64_size(&at_limit, 0.75).is_ok());
    }

    #[test]
    fn test_base64_size_over_limit_fails() {
        let over = "A".repeat(1024 * 1024 + 4);
        let err = validate_base64_size(&over, 0.75).unwrap_err();
        assert!(matches!(err, InferenceError::Validation { .. }));
    }

    #[test]
    fn test_base64_size_default_limit() {
        let small = STANDARD.encode(vec![7u8; 2048]);
        assert!(validate_base64_size(&small, 4.0).is_ok());
    }

    #[tokio::test]
    async fn test_encode_image_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let encoded = encode_image_file(file.path(), 4.0).await.unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[tokio::test]
    async fn test_encode_image_file_too_large() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![0u8; 4096]).unwrap();

        let result = encode_image_file(file.path(), 0.001).await;
        assert!(matches!(result, Err(InferenceError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_encode_image_file_missing() {
        let result = encode_image_file(Path::new("/no/such/image.jpg"), 4.0).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
