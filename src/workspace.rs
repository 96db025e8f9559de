//! On-disk layout for one batch of lectures.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cache::FsCache;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn original_video_dir(&self) -> PathBuf {
        self.root.join("original_video")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn video_without_audio_dir(&self) -> PathBuf {
        self.root.join("video_without_audio")
    }

    pub fn audio_translated_dir(&self) -> PathBuf {
        self.root.join("audio_translated")
    }

    pub fn audio_translated_speed_dir(&self) -> PathBuf {
        self.root.join("audio_translated_speed")
    }

    pub fn video_translated_dir(&self) -> PathBuf {
        self.root.join("video_translated")
    }

    pub fn subtitles_dir(&self) -> PathBuf {
        self.root.join("subtitles")
    }

    pub fn video_subtitled_dir(&self) -> PathBuf {
        self.root.join("video_subtitled")
    }

    /// Cached transcripts and timelines.
    pub fn variables_dir(&self) -> PathBuf {
        self.root.join("variables")
    }

    fn dirs(&self) -> [PathBuf; 9] {
        [
            self.original_video_dir(),
            self.audio_dir(),
            self.video_without_audio_dir(),
            self.audio_translated_dir(),
            self.audio_translated_speed_dir(),
            self.video_translated_dir(),
            self.subtitles_dir(),
            self.video_subtitled_dir(),
            self.variables_dir(),
        ]
    }

    /// Create every directory; safe to call repeatedly.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in self.dirs() {
            std::fs::create_dir_all(&dir)?;
            debug!("Ensured {}", dir.display());
        }
        Ok(())
    }

    pub fn cache(&self) -> FsCache {
        FsCache::new(self.variables_dir())
    }

    pub fn extracted_audio(&self, lecture: &str) -> PathBuf {
        self.audio_dir().join(format!("{lecture}.wav"))
    }

    pub fn silent_video(&self, lecture: &str) -> PathBuf {
        self.video_without_audio_dir().join(format!("{lecture}.mp4"))
    }

    pub fn rendered_audio(&self, lecture: &str) -> PathBuf {
        self.audio_translated_dir().join(format!("{lecture}.wav"))
    }

    pub fn conformed_audio(&self, lecture: &str) -> PathBuf {
        self.audio_translated_speed_dir().join(format!("{lecture}.wav"))
    }

    pub fn dubbed_video(&self, lecture: &str) -> PathBuf {
        self.video_translated_dir().join(format!("{lecture}.mp4"))
    }

    pub fn subtitled_video(&self, lecture: &str) -> PathBuf {
        self.video_subtitled_dir().join(format!("{lecture}.mp4"))
    }
}

/// Lecture id from a video path: the file stem.
pub fn lecture_id(video: &Path) -> String {
    video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "lecture".to_string())
}
