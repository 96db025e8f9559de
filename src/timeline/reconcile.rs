use tracing::{debug, info};

use crate::config::ReconcileConfig;
use crate::error::{DubError, Result};

use super::silence::{BoundaryPosition, SilenceIndex, TaggedSilence};
use super::validate::{validate_timeline, validate_transcript};
use super::{ReconciledSegment, TranscriptSegment};

/// How a transcript segment enters the timeline, decided from the segment and its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The text is only an elision marker; the whole span is silence.
    Elision,
    /// The transcript leaves a gap beyond tolerance; silence fills it and the text starts fresh.
    Gap,
    /// Contiguous within tolerance; the text may fold into the open text segment.
    Continue,
}

/// Whether text opens a new segment or extends the open one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Fresh,
    Fold,
}

/// Decide where text ending at `text_end` goes, given the last emitted entry.
///
/// Text folds only into a text entry, and only while the extended entry stays
/// within `max_duration`.
pub fn placement(
    last: Option<&ReconciledSegment>,
    text_end: f64,
    max_duration: Option<f64>,
) -> Placement {
    match last {
        Some(open) if open.is_text() => match max_duration {
            Some(max) if text_end - open.start > max => Placement::Fresh,
            _ => Placement::Fold,
        },
        _ => Placement::Fresh,
    }
}

/// Turns ordered transcript segments plus amplitude silence into a gapless
/// sequence of text and silence instructions.
#[derive(Debug, Clone, Default)]
pub struct SegmentReconciler {
    config: ReconcileConfig,
}

impl SegmentReconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn with_max_duration(mut self, max_duration: Option<f64>) -> Self {
        self.config.max_duration = max_duration;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    fn is_elision(&self, text: &str) -> bool {
        text.trim() == self.config.elision_marker
    }

    /// Apply the transition rules in order: elision, gap, continue.
    pub fn classify(
        &self,
        previous: Option<&TranscriptSegment>,
        segment: &TranscriptSegment,
    ) -> Transition {
        if self.is_elision(&segment.text) {
            return Transition::Elision;
        }
        match previous {
            Some(prev) if (segment.start - prev.end).abs() > self.config.gap_tolerance => {
                Transition::Gap
            }
            _ => Transition::Continue,
        }
    }

    /// Reconcile a whole lecture. The index is consumed: one index serves exactly one run.
    pub fn reconcile(
        &self,
        segments: &[TranscriptSegment],
        mut index: SilenceIndex,
    ) -> Result<Vec<ReconciledSegment>> {
        validate_transcript(segments)?;

        let Some(first) = segments.first() else {
            return Ok(Vec::new());
        };

        let mut timeline = Timeline::new(first.start);

        for (i, segment) in segments.iter().enumerate() {
            let window = index.take_window(segment.start, segment.end)?;
            let previous = i.checked_sub(1).map(|j| &segments[j]);

            match self.classify(previous, segment) {
                Transition::Elision => {
                    if !window.is_empty() {
                        debug!(
                            "Elided segment {} absorbs {} amplitude silences",
                            i,
                            window.len()
                        );
                    }
                    timeline.push_silence_until(segment.end);
                }
                Transition::Gap => {
                    timeline.push_silence_until(segment.start);
                    self.attach_text(&mut timeline, segment, &window);
                }
                Transition::Continue => {
                    self.attach_text(&mut timeline, segment, &window);
                }
            }
        }

        let entries = finalize(timeline.entries)?;

        let text_count = entries.iter().filter(|s| s.is_text()).count();
        info!(
            "Reconciled {} transcript segments into {} entries ({} text, {} silence); {} amplitude silences matched, {} skipped",
            segments.len(),
            entries.len(),
            text_count,
            entries.len() - text_count,
            index.matched(),
            index.discarded()
        );

        Ok(entries)
    }

    /// Emit the text of `segment`, surrounded by the amplitude silences matched for its window.
    fn attach_text(
        &self,
        timeline: &mut Timeline,
        segment: &TranscriptSegment,
        window: &[TaggedSilence],
    ) {
        let leading: f64 = window
            .iter()
            .filter(|t| t.position == BoundaryPosition::Start)
            .map(|t| t.interval.duration())
            .sum();
        let trailing: f64 = window
            .iter()
            .filter(|t| t.position == BoundaryPosition::End)
            .map(|t| t.interval.end.min(segment.end) - t.interval.start)
            .filter(|d| *d > 0.0)
            .sum();

        let mut attached_leading = 0.0;
        if leading > 0.0 {
            let cursor = timeline.cursor();
            if cursor + leading < segment.end {
                timeline.push_silence_until(cursor + leading);
                attached_leading = leading;
            } else {
                debug!(
                    "Leading silence of {:.2}s would swallow text ending at {:.2}s",
                    leading, segment.end
                );
            }
        }

        match placement(
            timeline.entries.last(),
            segment.end,
            self.config.max_duration,
        ) {
            Placement::Fresh => {
                let start = timeline.cursor();
                timeline
                    .entries
                    .push(ReconciledSegment::text(start, segment.end, segment.text.clone()));
            }
            Placement::Fold => {
                if let Some(open) = timeline.entries.last_mut() {
                    open.text.push_str(&segment.text);
                    open.end = segment.end;
                    open.refresh_duration();
                }
            }
        }

        if trailing > 0.0 && attached_leading + trailing <= segment.duration() {
            timeline.carve_trailing_silence(trailing);
        }
    }
}

/// Reconcile with default rules and the given duration cap.
pub fn reconcile(
    segments: &[TranscriptSegment],
    index: SilenceIndex,
    max_duration: Option<f64>,
) -> Result<Vec<ReconciledSegment>> {
    SegmentReconciler::default()
        .with_max_duration(max_duration)
        .reconcile(segments, index)
}

/// Entries under construction. Every new entry starts where the last one ended.
struct Timeline {
    origin: f64,
    entries: Vec<ReconciledSegment>,
}

impl Timeline {
    fn new(origin: f64) -> Self {
        Self {
            origin,
            entries: Vec::new(),
        }
    }

    fn cursor(&self) -> f64 {
        self.entries.last().map(|s| s.end).unwrap_or(self.origin)
    }

    fn push_silence_until(&mut self, end: f64) {
        let start = self.cursor();
        self.entries.push(ReconciledSegment::silence(start, end));
    }

    fn carve_trailing_silence(&mut self, amount: f64) {
        let Some(text) = self.entries.last_mut() else {
            return;
        };
        let end = text.end;
        let carved = end - amount;
        if carved <= text.start {
            return;
        }
        text.end = carved;
        text.refresh_duration();
        self.entries.push(ReconciledSegment::silence(carved, end));
    }
}

/// Merge every run of adjacent silence entries into one.
pub fn merge_adjacent_silence(entries: Vec<ReconciledSegment>) -> Vec<ReconciledSegment> {
    let mut merged: Vec<ReconciledSegment> = Vec::with_capacity(entries.len());
    for entry in entries {
        match merged.last_mut() {
            Some(last) if last.is_silence() && entry.is_silence() => {
                last.end = entry.end;
                last.refresh_duration();
            }
            _ => merged.push(entry),
        }
    }
    merged
}

/// Terminal pass: recompute durations, reject non-positive ones, merge adjacent
/// silence and check the result is a valid timeline.
pub fn finalize(entries: Vec<ReconciledSegment>) -> Result<Vec<ReconciledSegment>> {
    let mut checked = Vec::with_capacity(entries.len());
    for (i, mut entry) in entries.into_iter().enumerate() {
        entry.refresh_duration();
        if entry.duration <= 0.0 || entry.duration.is_nan() {
            return Err(DubError::Defect(format!(
                "entry {} ({:?} {:.3}s..{:.3}s) has non-positive duration {:.3}s",
                i, entry.kind, entry.start, entry.end, entry.duration
            )));
        }
        checked.push(entry);
    }

    let merged = merge_adjacent_silence(checked);
    if !merged.is_empty() {
        validate_timeline(&merged)?;
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{SegmentKind, SilenceInterval};

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(start, end, text)
    }

    fn silences(intervals: &[(f64, f64)]) -> SilenceIndex {
        SilenceIndex::new(
            intervals
                .iter()
                .map(|&(s, e)| SilenceInterval::new(s, e))
                .collect(),
        )
    }

    #[test]
    fn test_classify_rules_in_order() {
        let r = SegmentReconciler::default();
        let prev = seg(0.0, 2.0, "a");

        assert_eq!(r.classify(None, &seg(0.0, 1.0, " ...")), Transition::Elision);
        assert_eq!(r.classify(Some(&prev), &seg(5.0, 6.0, "...")), Transition::Elision);
        assert_eq!(r.classify(Some(&prev), &seg(2.3, 3.0, "b")), Transition::Gap);
        assert_eq!(r.classify(Some(&prev), &seg(2.05, 3.0, "b")), Transition::Continue);
        assert_eq!(r.classify(None, &seg(0.0, 1.0, "a")), Transition::Continue);
    }

    #[test]
    fn test_placement() {
        let open = ReconciledSegment::text(0.0, 10.0, "a");
        let pause = ReconciledSegment::silence(0.0, 1.0);

        assert_eq!(placement(None, 5.0, Some(30.0)), Placement::Fresh);
        assert_eq!(placement(Some(&pause), 5.0, Some(30.0)), Placement::Fresh);
        assert_eq!(placement(Some(&open), 30.0, Some(30.0)), Placement::Fold);
        assert_eq!(placement(Some(&open), 30.5, Some(30.0)), Placement::Fresh);
        assert_eq!(placement(Some(&open), 500.0, None), Placement::Fold);
    }

    #[test]
    fn test_contiguous_segments_fold() {
        let out = reconcile(
            &[seg(0.0, 2.0, "hi"), seg(2.0, 4.0, "there")],
            SilenceIndex::empty(),
            Some(30.0),
        )
        .unwrap();

        assert_eq!(out, vec![ReconciledSegment::text(0.0, 4.0, "hithere")]);
    }

    #[test]
    fn test_jitter_is_absorbed() {
        let out = reconcile(
            &[seg(0.0, 2.0, "a"), seg(2.05, 4.0, "b"), seg(5.0, 6.0, "c")],
            SilenceIndex::empty(),
            None,
        )
        .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], ReconciledSegment::text(0.0, 4.0, "ab"));
        assert_eq!(out[1], ReconciledSegment::silence(4.0, 5.0));
        assert_eq!(out[2], ReconciledSegment::text(5.0, 6.0, "c"));
    }

    #[test]
    fn test_elision_becomes_silence() {
        let out = reconcile(
            &[seg(0.0, 2.0, "a"), seg(2.0, 3.0, " ..."), seg(3.0, 4.0, "b")],
            silences(&[(2.1, 2.9)]),
            Some(30.0),
        )
        .unwrap();

        assert_eq!(
            out,
            vec![
                ReconciledSegment::text(0.0, 2.0, "a"),
                ReconciledSegment::silence(2.0, 3.0),
                ReconciledSegment::text(3.0, 4.0, "b"),
            ]
        );
    }

    #[test]
    fn test_leading_elision_starts_with_silence() {
        let out = reconcile(
            &[seg(0.0, 1.5, "..."), seg(3.0, 4.0, "b")],
            SilenceIndex::empty(),
            Some(30.0),
        )
        .unwrap();

        assert_eq!(out[0], ReconciledSegment::silence(0.0, 3.0));
        assert_eq!(out[1], ReconciledSegment::text(3.0, 4.0, "b"));
    }

    #[test]
    fn test_leading_amplitude_silence() {
        let out = reconcile(
            &[seg(0.0, 10.0, "a")],
            silences(&[(0.0, 1.5)]),
            Some(30.0),
        )
        .unwrap();

        assert_eq!(
            out,
            vec![
                ReconciledSegment::silence(0.0, 1.5),
                ReconciledSegment::text(1.5, 10.0, "a"),
            ]
        );
    }

    #[test]
    fn test_trailing_amplitude_silence_is_carved() {
        let out = reconcile(
            &[seg(0.0, 10.0, "a"), seg(10.0, 12.0, "b")],
            silences(&[(8.0, 10.0)]),
            Some(30.0),
        )
        .unwrap();

        assert_eq!(
            out,
            vec![
                ReconciledSegment::text(0.0, 8.0, "a"),
                ReconciledSegment::silence(8.0, 10.0),
                ReconciledSegment::text(10.0, 12.0, "b"),
            ]
        );
    }

    #[test]
    fn test_straddling_silence_is_clipped_to_window() {
        let out = reconcile(
            &[seg(0.0, 10.0, "a"), seg(12.0, 14.0, "b")],
            silences(&[(9.0, 12.0)]),
            Some(30.0),
        )
        .unwrap();

        assert_eq!(
            out,
            vec![
                ReconciledSegment::text(0.0, 9.0, "a"),
                ReconciledSegment::silence(9.0, 12.0),
                ReconciledSegment::text(12.0, 14.0, "b"),
            ]
        );
    }

    #[test]
    fn test_silence_never_swallows_text() {
        // Two overlapping leading silences add up to more than the segment.
        let out = reconcile(
            &[seg(0.0, 1.98, "a"), seg(2.0, 3.0, "b")],
            silences(&[(2.0, 2.8), (2.05, 2.85)]),
            Some(30.0),
        )
        .unwrap();

        assert_eq!(out, vec![ReconciledSegment::text(0.0, 3.0, "ab")]);
    }

    #[test]
    fn test_overlapping_transcript_is_defect() {
        let err = reconcile(
            &[seg(0.0, 5.0, "a"), seg(4.0, 6.0, "b")],
            SilenceIndex::empty(),
            Some(30.0),
        )
        .unwrap_err();
        assert!(err.is_defect());
    }

    #[test]
    fn test_empty_transcript() {
        let out = reconcile(&[], SilenceIndex::empty(), Some(30.0)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_merge_adjacent_silence() {
        let merged = merge_adjacent_silence(vec![
            ReconciledSegment::silence(0.0, 1.0),
            ReconciledSegment::silence(1.0, 2.0),
            ReconciledSegment::silence(2.0, 2.5),
            ReconciledSegment::text(2.5, 3.0, "x"),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], ReconciledSegment::silence(0.0, 2.5));
        assert_eq!(merged[1].kind, SegmentKind::Text);
    }

    #[test]
    fn test_finalize_rejects_non_positive() {
        let err = finalize(vec![
            ReconciledSegment::text(0.0, 1.0, "a"),
            ReconciledSegment::silence(1.0, 1.0),
        ])
        .unwrap_err();
        assert!(matches!(err, DubError::Defect(_)));
    }
}
