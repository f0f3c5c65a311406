//! Audio transcription and translation requests.
//!
//! Both endpoints take the same multipart form; optional fields are only
//! added when set.

use std::path::Path;

use reqwest::multipart::{Form, Part};

use super::errors::InferenceError;

/// Default speech-to-text model.
pub const DEFAULT_AUDIO_MODEL: &str = "whisper-large-v3";

/// Which audio endpoint a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTask {
    /// Speech to text in the spoken language.
    Transcription,
    /// Speech to English text.
    Translation,
}

impl AudioTask {
    pub fn path(self) -> &'static str {
        match self {
            AudioTask::Transcription => "/audio/transcriptions",
            AudioTask::Translation => "/audio/translations",
        }
    }
}

/// An audio file plus the knobs accepted by the speech endpoints.
#[derive(Debug, Clone)]
pub struct AudioRequest {
    pub file: Vec<u8>,
    pub filename: String,
    pub model: String,
    pub prompt: Option<String>,
    /// `json`, `verbose_json` or `text`.
    pub response_format: Option<String>,
    /// ISO-639-1 code of the spoken language.
    pub language: Option<String>,
    pub temperature: Option<f64>,
}

impl AudioRequest {
    pub fn new(file: Vec<u8>, filename: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            file,
            filename: filename.into(),
            model: model.into(),
            prompt: None,
            response_format: None,
            language: None,
            temperature: None,
        }
    }

    /// Read the audio from disk; a missing file fails before any network call.
    pub async fn from_file(path: &Path, model: impl Into<String>) -> Result<Self, InferenceError> {
        if !path.is_file() {
            return Err(InferenceError::validation(format!(
                "audio file not found: {}",
                path.display()
            )));
        }

        let file = tokio::fs::read(path).await.map_err(|e| {
            InferenceError::validation(format!("failed to read {}: {e}", path.display()))
        })?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        Ok(Self::new(file, filename, model))
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Text fields of the form, in the order they are sent.
    pub(crate) fn text_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("model", self.model.clone())];
        if let Some(prompt) = &self.prompt {
            fields.push(("prompt", prompt.clone()));
        }
        if let Some(format) = &self.response_format {
            fields.push(("response_format", format.clone()));
        }
        if let Some(language) = &self.language {
            fields.push(("language", language.clone()));
        }
        if let Some(temperature) = self.temperature {
            fields.push(("temperature", temperature.to_string()));
        }
        fields
    }

    pub(crate) fn into_form(self) -> Result<Form, InferenceError> {
        let fields = self.text_fields();
        let mime = mime_for(&self.filename);

        let part = Part::bytes(self.file)
            .file_name(self.filename)
            .mime_str(mime)
            .map_err(|e| InferenceError::validation(format!("invalid content type: {e}")))?;

        Ok(fields
            .into_iter()
            .fold(Form::new().part("file", part), |form, (name, value)| form.text(name, value)))
    }
}

/// Content type from the file extension.
fn mime_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" | "mpeg" | "mpga" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "mp4" => "audio/mp4",
        "flac" => "audio/flac",
        "ogg" | "opus" => "audio/ogg",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_task_paths() {
        assert_eq!(AudioTask::Transcription.path(), "/audio/transcriptions");
        assert_eq!(AudioTask::Translation.path(), "/audio/translations");
    }

    #[test]
    fn test_only_model_when_no_options() {
        let req = AudioRequest::new(vec![1, 2, 3], "a.wav", DEFAULT_AUDIO_MODEL);
        assert_eq!(req.text_fields(), vec![("model", DEFAULT_AUDIO_MODEL.to_string())]);
    }

    #[test]
    fn test_optional_fields_included_when_set() {
        let req = AudioRequest::new(vec![], "a.mp3", "whisper-large-v3-turbo")
            .with_prompt("names: Ada, Grace")
            .with_response_format("verbose_json")
            .with_language("en")
            .with_temperature(0.0);
        let names: Vec<&str> = req.text_fields().iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec!["model", "prompt", "response_format", "language", "temperature"]
        );
        assert_eq!(req.text_fields()[4].1, "0");
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("talk.MP3"), "audio/mpeg");
        assert_eq!(mime_for("talk.flac"), "audio/flac");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_into_form_builds() {
        let req = AudioRequest::new(vec![0u8; 16], "clip.webm", DEFAULT_AUDIO_MODEL);
        assert!(req.into_form().is_ok());
    }

    #[tokio::test]
    async fn test_from_file_reads_name_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meeting.m4a");
        std::fs::File::create(&path).unwrap().write_all(b"RIFF").unwrap();

        let req = AudioRequest::from_file(&path, DEFAULT_AUDIO_MODEL).await.unwrap();
        assert_eq!(req.filename, "meeting.m4a");
        assert_eq!(req.file, b"RIFF");
    }

    #[tokio::test]
    async fn test_from_file_missing() {
        let result = AudioRequest::from_file(Path::new("/no/such/clip.wav"), DEFAULT_AUDIO_MODEL).await;
        assert!(matches!(result, Err(InferenceError::Validation { .. })));
    }
}
