use crate::config::Task;
use crate::error::{DubError, Result};
use crate::retry::{error_from_response, Backoff};
use crate::timeline::TranscriptSegment;
use crate::transcribe::{Transcriber, Transcript};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Upload limit of the audio endpoints (25 MB).
const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Client for the OpenAI audio translation and transcription endpoints.
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    task: Task,
    language: Option<String>,
    prompt: Option<String>,
    backoff: Backoff,
}

impl WhisperClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "whisper-1".to_string(),
            task: Task::default(),
            language: None,
            prompt: None,
            backoff: Backoff::default(),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Translate to English or transcribe in the spoken language.
    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    /// Set the source language (ISO 639-1 code). Only sent when transcribing.
    pub fn with_language(mut self, language: String) -> Self {
        self.language = Some(language);
        self
    }

    /// Course vocabulary (names, jargon) to bias recognition.
    pub fn with_prompt(mut self, prompt: String) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Point the client at another server (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.backoff = self.backoff.with_base_delay(delay);
        self
    }

    fn endpoint(&self) -> String {
        let path = match self.task {
            Task::Translate => "translations",
            Task::Transcribe => "transcriptions",
        };
        format!("{}/v1/audio/{}", self.base_url, path)
    }

    /// The form is consumed by the request, so every attempt builds a new one.
    async fn build_form(&self, audio_path: &Path) -> Result<Form> {
        let bytes = fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();
        let mime = match audio_path.extension().and_then(|e| e.to_str()) {
            Some("mp3") => "audio/mpeg",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            _ => "audio/wav",
        };

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name).mime_str(mime)?)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        if self.task == Task::Transcribe {
            form = form.text("timestamp_granularities[]", "segment");
            if let Some(language) = &self.language {
                form = form.text("language", language.clone());
            }
        }
        if let Some(prompt) = &self.prompt {
            form = form.text("prompt", prompt.clone());
        }

        Ok(form)
    }

    async fn request(&self, audio_path: &Path) -> Result<WhisperResponse> {
        let form = self.build_form(audio_path).await?;
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        debug!("Whisper API response status: {}", response.status());
        if !response.status().is_success() {
            return Err(error_from_response("Whisper", response).await);
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Convert the API response to a transcript. Segment text is kept verbatim,
    /// including the leading space Whisper puts before each segment.
    fn parse_response(&self, response: WhisperResponse) -> Transcript {
        let segments = match response.segments {
            Some(api_segments) => api_segments
                .into_iter()
                .map(|seg| TranscriptSegment::new(seg.start, seg.end, seg.text))
                .collect(),
            None if !response.text.trim().is_empty() => {
                vec![TranscriptSegment::new(
                    0.0,
                    response.duration.unwrap_or(0.0),
                    response.text,
                )]
            }
            None => Vec::new(),
        };

        Transcript {
            segments,
            language: response.language,
            duration: response.duration,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript> {
        debug!("Sending {} to Whisper ({})", audio.display(), self.task);

        let metadata = fs::metadata(audio).await.map_err(|_| {
            DubError::FileNotFound(audio.display().to_string())
        })?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(DubError::Transcription(format!(
                "{} is {} bytes, over the {} byte upload limit",
                audio.display(),
                metadata.len(),
                MAX_FILE_SIZE
            )));
        }

        let response = self
            .backoff
            .run("Whisper", move || self.request(audio))
            .await?;
        let transcript = self.parse_response(response);

        debug!(
            "Whisper returned {} segments for {}",
            transcript.segments.len(),
            audio.display()
        );

        Ok(transcript)
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<WhisperSegment>>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_per_task() {
        let client = WhisperClient::new("k".to_string()).with_base_url("http://host/");
        assert_eq!(client.endpoint(), "http://host/v1/audio/translations");

        let client = client.with_task(Task::Transcribe);
        assert_eq!(client.endpoint(), "http://host/v1/audio/transcriptions");
    }

    #[test]
    fn test_parse_response_keeps_text_verbatim() {
        let client = WhisperClient::new("sk-test".to_string());
        let response: WhisperResponse = serde_json::from_str(
            r#"{
                "text": " Hello world. How are you?",
                "language": "english",
                "duration": 4.0,
                "segments": [
                    {"id": 0, "start": 0.0, "end": 2.0, "text": " Hello world."},
                    {"id": 1, "start": 2.5, "end": 4.0, "text": " How are you?"}
                ]
            }"#,
        )
        .unwrap();

        let transcript = client.parse_response(response);
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].text, " Hello world.");
        assert_eq!(transcript.segments[1].start, 2.5);
        assert_eq!(transcript.language.as_deref(), Some("english"));
        assert_eq!(transcript.duration, Some(4.0));
    }

    #[test]
    fn test_parse_response_without_segments() {
        let client = WhisperClient::new("sk-test".to_string());
        let response = WhisperResponse {
            text: " Welcome to the course.".to_string(),
            segments: None,
            language: None,
            duration: Some(2.0),
        };

        let transcript = client.parse_response(response);
        assert_eq!(transcript.segments.len(), 1);
        assert_eq!(transcript.segments[0].end, 2.0);

        let empty = WhisperResponse {
            text: "  ".to_string(),
            segments: None,
            language: None,
            duration: Some(2.0),
        };
        assert!(client.parse_response(empty).segments.is_empty());
    }
}
