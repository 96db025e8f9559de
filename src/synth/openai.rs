use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::audio::AudioTrack;
use crate::error::{DubError, Result};
use crate::retry::{error_from_response, Backoff};

use super::SpeechSynthesizer;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// The `pcm` response format is headerless 24 kHz mono s16le.
const PCM_SAMPLE_RATE: u32 = 24_000;

/// OpenAI text-to-speech client.
pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    voice: String,
    backoff: Backoff,
}

impl OpenAiSynthesizer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            backoff: Backoff::default(),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_voice(mut self, voice: String) -> Self {
        self.voice = voice;
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

    async fn call_api(&self, text: &str) -> Result<Vec<u8>> {
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "pcm",
        };

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        debug!("Speech API response status: {}", response.status());
        if !response.status().is_success() {
            return Err(error_from_response("Speech", response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str, _use_accelerator: bool) -> Result<AudioTrack> {
        let bytes = self
            .backoff
            .run("Speech", move || self.call_api(text))
            .await?;
        if bytes.is_empty() {
            return Err(DubError::Synthesis("Speech API returned no audio".to_string()));
        }
        Ok(AudioTrack::from_pcm_bytes(&bytes, PCM_SAMPLE_RATE, 1))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}
