use super::{cue_time, SubtitleEntry, SubtitleFormatter};

pub struct SrtFormatter;

impl SubtitleFormatter for SrtFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String {
        entries
            .iter()
            .map(|entry| {
                format!(
                    "{}\n{} --> {}\n{}\n",
                    entry.index,
                    cue_time(entry.start, ','),
                    cue_time(entry.end, ','),
                    entry.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn extension(&self) -> &'static str {
        "srt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_blocks() {
        let entries = vec![
            SubtitleEntry {
                index: 1,
                start: 0.0,
                end: 2.25,
                text: "Today we cover eigenvalues.".to_string(),
            },
            SubtitleEntry {
                index: 2,
                start: 3661.123,
                end: 3663.0,
                text: "Any questions?".to_string(),
            },
        ];

        assert_eq!(
            SrtFormatter.format(&entries),
            "1\n00:00:00,000 --> 00:00:02,250\nToday we cover eigenvalues.\n\n\
             2\n01:01:01,123 --> 01:01:03,000\nAny questions?\n"
        );
    }

    #[test]
    fn test_empty() {
        assert!(SrtFormatter.format(&[]).is_empty());
    }
}
