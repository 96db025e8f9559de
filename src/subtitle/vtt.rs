use super::{cue_time, SubtitleEntry, SubtitleFormatter};

pub struct VttFormatter;

impl SubtitleFormatter for VttFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String {
        let mut output = String::from("WEBVTT\n\n");
        for entry in entries {
            output.push_str(&format!(
                "{} --> {}\n{}\n\n",
                cue_time(entry.start, '.'),
                cue_time(entry.end, '.'),
                entry.text
            ));
        }
        output
    }

    fn extension(&self) -> &'static str {
        "vtt"
    }
}
