use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use crate::audio::AudioTrack;
use crate::error::{DubError, Result};

use super::SpeechSynthesizer;

/// Local synthesis through the Coqui `tts` command line tool.
pub struct CoquiSynthesizer {
    model: String,
    program: PathBuf,
}

impl CoquiSynthesizer {
    pub fn new(model: String) -> Self {
        Self {
            model,
            program: PathBuf::from("tts"),
        }
    }

    /// Use a `tts` executable other than the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, text: &str, out_path: &Path, use_accelerator: bool) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--model_name")
            .arg(&self.model)
            .arg("--text")
            .arg(text)
            .arg("--out_path")
            .arg(out_path);
        if use_accelerator {
            command.args(["--use_cuda", "true"]);
        }
        command
    }
}

#[async_trait]
impl SpeechSynthesizer for CoquiSynthesizer {
    async fn synthesize(&self, text: &str, use_accelerator: bool) -> Result<AudioTrack> {
        let dir = TempDir::new()?;
        let out_path = dir.path().join("speech.wav");

        debug!(
            "Synthesizing {} chars with {} (accelerator: {})",
            text.len(),
            self.model,
            use_accelerator
        );

        let output = self
            .command(text, &out_path, use_accelerator)
            .output()
            .await
            .map_err(|e| {
                DubError::Synthesis(format!(
                    "Failed to run {}: {e}. Is Coqui TTS installed?",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Synthesis(format!(
                "tts exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        AudioTrack::read_wav(&out_path).map_err(|e| match e {
            DubError::FileNotFound(path) => {
                DubError::Synthesis(format!("tts produced no output at {path}"))
            }
            other => other,
        })
    }

    fn name(&self) -> &'static str {
        "coqui"
    }
}
