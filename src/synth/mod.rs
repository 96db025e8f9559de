//! Text-to-speech collaborators.

pub mod coqui;
pub mod openai;

pub use coqui::CoquiSynthesizer;
pub use openai::OpenAiSynthesizer;

use std::sync::Arc;

use async_trait::async_trait;

use crate::audio::AudioTrack;
use crate::config::{Config, SynthesizerKind};
use crate::error::{DubError, Result};

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` to speech. `use_accelerator` asks for GPU inference where the
    /// backend has it and is ignored otherwise.
    async fn synthesize(&self, text: &str, use_accelerator: bool) -> Result<AudioTrack>;

    fn name(&self) -> &'static str;
}

/// Build the synthesizer selected in the config.
pub fn create_synthesizer(config: &Config) -> Result<Arc<dyn SpeechSynthesizer>> {
    match config.synthesizer {
        SynthesizerKind::Coqui => Ok(Arc::new(CoquiSynthesizer::new(config.tts_model.clone()))),
        SynthesizerKind::OpenAi => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                DubError::Config("OPENAI_API_KEY is required for the openai synthesizer".to_string())
            })?;
            Ok(Arc::new(
                OpenAiSynthesizer::new(api_key).with_voice(config.tts_voice.clone()),
            ))
        }
    }
}
