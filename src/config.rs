use crate::error::{DubError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which speech synthesis backend renders the translated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesizerKind {
    #[default]
    Coqui,
    OpenAi,
}

impl std::fmt::Display for SynthesizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesizerKind::Coqui => write!(f, "coqui"),
            SynthesizerKind::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for SynthesizerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coqui" => Ok(SynthesizerKind::Coqui),
            "openai" => Ok(SynthesizerKind::OpenAi),
            _ => Err(format!(
                "Unknown synthesizer: {}. Use 'coqui' or 'openai'",
                s
            )),
        }
    }
}

/// What the speech recognizer is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Recognize and translate to English in one pass.
    #[default]
    Translate,
    /// Recognize in the spoken language.
    Transcribe,
}

impl Task {
    /// Suffix used in cache keys, matching the language of the resulting text.
    pub fn cache_suffix(&self) -> &'static str {
        match self {
            Task::Translate => "en",
            Task::Transcribe => "original",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Translate => write!(f, "translate"),
            Task::Transcribe => write!(f, "transcribe"),
        }
    }
}

impl std::str::FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "translate" => Ok(Task::Translate),
            "transcribe" => Ok(Task::Transcribe),
            _ => Err(format!(
                "Unknown task: {}. Use 'translate' or 'transcribe'",
                s
            )),
        }
    }
}

/// Settings for turning transcript segments into speak/silence instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Upper bound on the length of a merged text segment in seconds.
    pub max_duration: Option<f64>,
    /// Transcript gaps up to this many seconds are treated as jitter.
    pub gap_tolerance: f64,
    /// Segment text that marks elided speech.
    pub elision_marker: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_duration: Some(30.0),
            gap_tolerance: 0.1,
            elision_marker: "...".to_string(),
        }
    }
}

/// Settings for amplitude-based silence detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceConfig {
    /// Minimum silence length in seconds.
    pub min_duration: f64,
    /// Frames quieter than this (dBFS) count as silent.
    pub threshold_dbfs: f64,
    /// Analysis frame length in milliseconds.
    pub frame_ms: u32,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            min_duration: 1.0,
            threshold_dbfs: -50.0,
            frame_ms: 10,
        }
    }
}

/// Settings for rendering the dubbed track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Deviation in seconds above which a drift warning is raised.
    pub drift_tolerance: f64,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            channels: 1,
            drift_tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub synthesizer: SynthesizerKind,
    pub tts_model: String,
    pub tts_voice: String,
    pub whisper_model: String,
    pub task: Task,
    pub data_dir: PathBuf,
    pub concurrency: usize,
    pub use_accelerator: bool,
    pub reconcile: ReconcileConfig,
    pub silence: SilenceConfig,
    pub stitch: StitchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            synthesizer: SynthesizerKind::default(),
            tts_model: "tts_models/en/ljspeech/tacotron2-DDC_ph".to_string(),
            tts_voice: "alloy".to_string(),
            whisper_model: "whisper-1".to_string(),
            task: Task::default(),
            data_dir: PathBuf::from("data"),
            concurrency: 1,
            use_accelerator: true,
            reconcile: ReconcileConfig::default(),
            silence: SilenceConfig::default(),
            stitch: StitchConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    DubError::Config(format!("{}: {e}", config_path.display()))
                })?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Ok(kind) = std::env::var("LECDUB_SYNTHESIZER") {
            if let Ok(k) = kind.parse() {
                self.synthesizer = k;
            }
        }
        if let Ok(concurrency) = std::env::var("LECDUB_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.concurrency = c;
            }
        }
        if let Ok(dir) = std::env::var("LECDUB_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(max) = std::env::var("LECDUB_MAX_DURATION") {
            match max.as_str() {
                "" | "none" => self.reconcile.max_duration = None,
                other => {
                    if let Ok(m) = other.parse() {
                        self.reconcile.max_duration = Some(m);
                    }
                }
            }
        }
    }

    /// Check settings before any lecture is touched. `needs_openai` is true when
    /// a remote collaborator (Whisper, or the OpenAI synthesizer) will be called.
    pub fn validate(&self, needs_openai: bool) -> Result<()> {
        let needs_key = needs_openai || self.synthesizer == SynthesizerKind::OpenAi;
        if needs_key && self.openai_api_key.is_none() {
            return Err(DubError::Config(
                "OPENAI_API_KEY not set. Export it with: export OPENAI_API_KEY=sk-...".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(DubError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if let Some(max) = self.reconcile.max_duration {
            if max <= 0.0 {
                return Err(DubError::Config(
                    "reconcile.max_duration must be positive".to_string(),
                ));
            }
        }

        if self.reconcile.gap_tolerance < 0.0 || self.stitch.drift_tolerance < 0.0 {
            return Err(DubError::Config(
                "Tolerances must not be negative".to_string(),
            ));
        }

        if self.silence.min_duration <= 0.0 || self.silence.frame_ms == 0 {
            return Err(DubError::Config(
                "silence.min_duration and silence.frame_ms must be positive".to_string(),
            ));
        }

        if self.stitch.sample_rate == 0 || self.stitch.channels == 0 {
            return Err(DubError::Config(
                "stitch.sample_rate and stitch.channels must be positive".to_string(),
            ));
        }

        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lecdub").join("config.toml"))
    }
}
