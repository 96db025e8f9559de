// Plain transcript, one cue per line
use super::{SubtitleEntry, SubtitleFormatter};

pub struct TxtFormatter;

impl SubtitleFormatter for TxtFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String {
        entries
            .iter()
            .map(|entry| format!("{}\n", entry.text))
            .collect()
    }

    fn extension(&self) -> &'static str {
        "txt"
    }
}
