pub mod srt;
pub mod txt;
pub mod vtt;

use crate::error::Result;
use crate::timeline::TranscriptSegment;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl SubtitleEntry {
    /// Number transcript segments from 1, trimming text and escaping the cue arrow.
    pub fn from_segments(segments: &[TranscriptSegment]) -> Vec<SubtitleEntry> {
        segments
            .iter()
            .enumerate()
            .map(|(i, seg)| SubtitleEntry {
                index: i + 1,
                start: seg.start,
                end: seg.end,
                text: seg.text.trim().replace("-->", "->"),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Txt,
}

impl SubtitleFormat {
    pub const ALL: [SubtitleFormat; 3] = [SubtitleFormat::Srt, SubtitleFormat::Vtt, SubtitleFormat::Txt];
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", create_formatter(*self).extension())
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "srt" => Ok(SubtitleFormat::Srt),
            "vtt" => Ok(SubtitleFormat::Vtt),
            "txt" => Ok(SubtitleFormat::Txt),
            _ => Err(format!("Unknown subtitle format: {}. Use srt, vtt or txt", s)),
        }
    }
}

pub trait SubtitleFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String;
    fn extension(&self) -> &'static str;
}

pub fn create_formatter(format: SubtitleFormat) -> Box<dyn SubtitleFormatter> {
    match format {
        SubtitleFormat::Srt => Box::new(srt::SrtFormatter),
        SubtitleFormat::Vtt => Box::new(vtt::VttFormatter),
        SubtitleFormat::Txt => Box::new(txt::TxtFormatter),
    }
}

/// Write `<dir>/<stem>.<ext>` for each format, returning the paths in order.
pub fn write_subtitles(
    entries: &[SubtitleEntry],
    dir: &Path,
    stem: &str,
    formats: &[SubtitleFormat],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(formats.len());
    for &format in formats {
        let formatter = create_formatter(format);
        let path = dir.join(format!("{stem}.{}", formatter.extension()));
        std::fs::write(&path, formatter.format(entries))?;
        info!("Wrote {} subtitles to {}", format, path.display());
        paths.push(path);
    }
    Ok(paths)
}

/// Split seconds into (hours, minutes, seconds, millis), rounding to the millisecond.
pub(crate) fn clock_parts(secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let total_secs = total_ms / 1000;
    (
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        total_ms % 1000,
    )
}

/// `HH:MM:SS<sep>mmm`. SRT separates millis with a comma, WebVTT with a dot.
pub(crate) fn cue_time(secs: f64, sep: char) -> String {
    let (h, m, s, ms) = clock_parts(secs);
    format!("{h:02}:{m:02}:{s:02}{sep}{ms:03}")
}
