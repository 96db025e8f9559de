//! Reconciliation scenarios and timeline properties.

use lecdub::timeline::{
    check_drift, finalize, merge_adjacent_silence, validate_coverage, validate_timeline,
};
use lecdub::{
    reconcile, DubError, ReconciledSegment, SegmentReconciler, SilenceIndex, SilenceInterval,
    TimelineViolation, TranscriptSegment,
};

fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
    TranscriptSegment::new(start, end, text)
}

fn no_silence() -> SilenceIndex {
    SilenceIndex::empty()
}

fn silences(intervals: &[(f64, f64)]) -> SilenceIndex {
    SilenceIndex::new(
        intervals
            .iter()
            .map(|&(s, e)| SilenceInterval::new(s, e))
            .collect(),
    )
}

// ============================================================================
// Scenarios
// ============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn test_contiguous_segments_fold() {
        let transcript = vec![seg(0.0, 2.0, "hi"), seg(2.0, 4.0, "there")];
        let entries = reconcile(&transcript, no_silence(), Some(30.0)).unwrap();
        assert_eq!(entries, vec![ReconciledSegment::text(0.0, 4.0, "hithere")]);
    }

    #[test]
    fn test_transcript_gap_becomes_silence() {
        let transcript = vec![seg(0.0, 2.0, "hi"), seg(2.3, 4.0, "there")];
        let entries = reconcile(&transcript, no_silence(), Some(30.0)).unwrap();
        assert_eq!(
            entries,
            vec![
                ReconciledSegment::text(0.0, 2.0, "hi"),
                ReconciledSegment::silence(2.0, 2.3),
                ReconciledSegment::text(2.3, 4.0, "there"),
            ]
        );
    }

    #[test]
    fn test_long_segment_is_not_split() {
        let transcript = vec![
            seg(0.0, 5.0, "a"),
            seg(5.0, 40.0, "b"),
            seg(40.0, 42.0, "c"),
        ];
        let entries = reconcile(&transcript, no_silence(), Some(30.0)).unwrap();

        assert_eq!(
            entries,
            vec![
                ReconciledSegment::text(0.0, 5.0, "a"),
                ReconciledSegment::text(5.0, 40.0, "b"),
                ReconciledSegment::text(40.0, 42.0, "c"),
            ]
        );
        assert_eq!(entries[1].duration, 35.0);
    }

    #[test]
    fn test_fold_resumes_after_cap() {
        let transcript = vec![
            seg(0.0, 20.0, "a"),
            seg(20.0, 29.0, "b"),
            seg(29.0, 35.0, "c"),
            seg(35.0, 40.0, "d"),
        ];
        let entries = reconcile(&transcript, no_silence(), Some(30.0)).unwrap();
        assert_eq!(
            entries,
            vec![
                ReconciledSegment::text(0.0, 29.0, "ab"),
                ReconciledSegment::text(29.0, 40.0, "cd"),
            ]
        );
    }

    #[test]
    fn test_no_cap_folds_everything() {
        let transcript = vec![seg(0.0, 20.0, "a"), seg(20.0, 50.0, "b")];
        let entries = reconcile(&transcript, no_silence(), None).unwrap();
        assert_eq!(entries, vec![ReconciledSegment::text(0.0, 50.0, "ab")]);
    }

    #[test]
    fn test_adjacent_silence_merges() {
        let entries = finalize(vec![
            ReconciledSegment::silence(0.0, 1.0),
            ReconciledSegment::silence(1.0, 2.0),
            ReconciledSegment::text(2.0, 3.0, "x"),
        ])
        .unwrap();
        assert_eq!(
            entries,
            vec![
                ReconciledSegment::silence(0.0, 2.0),
                ReconciledSegment::text(2.0, 3.0, "x"),
            ]
        );
    }

    #[test]
    fn test_trailing_and_leading_silence_merge() {
        // "a" keeps a trailing pause, "b" opens with one; together they form one silence.
        let transcript = vec![seg(0.0, 4.0, "a"), seg(4.0625, 8.0, "b")];
        let index = silences(&[(3.5, 4.0), (4.125, 4.625)]);
        let entries = reconcile(&transcript, index, Some(30.0)).unwrap();
        assert_eq!(
            entries,
            vec![
                ReconciledSegment::text(0.0, 3.5, "a"),
                ReconciledSegment::silence(3.5, 4.5),
                ReconciledSegment::text(4.5, 8.0, "b"),
            ]
        );
    }

    #[test]
    fn test_elision_then_gap_merges() {
        let transcript = vec![seg(0.0, 1.0, " ..."), seg(1.5, 3.0, " Welcome")];
        let entries = reconcile(&transcript, no_silence(), Some(30.0)).unwrap();
        assert_eq!(
            entries,
            vec![
                ReconciledSegment::silence(0.0, 1.5),
                ReconciledSegment::text(1.5, 3.0, " Welcome"),
            ]
        );
    }

    #[test]
    fn test_elision_ignores_amplitude_data() {
        let transcript = vec![seg(0.0, 2.0, "one"), seg(2.0, 6.0, "..."), seg(6.0, 8.0, "two")];
        let entries = reconcile(&transcript, silences(&[(2.5, 3.0)]), Some(30.0)).unwrap();
        assert_eq!(
            entries,
            vec![
                ReconciledSegment::text(0.0, 2.0, "one"),
                ReconciledSegment::silence(2.0, 6.0),
                ReconciledSegment::text(6.0, 8.0, "two"),
            ]
        );
    }

    #[test]
    fn test_leading_amplitude_silence() {
        let transcript = vec![seg(0.0, 4.0, "hello")];
        let entries = reconcile(&transcript, silences(&[(0.0, 1.0)]), Some(30.0)).unwrap();
        assert_eq!(
            entries,
            vec![
                ReconciledSegment::silence(0.0, 1.0),
                ReconciledSegment::text(1.0, 4.0, "hello"),
            ]
        );
    }

    #[test]
    fn test_straddling_silence_is_carved_from_text_end() {
        let transcript = vec![seg(0.0, 4.0, "a"), seg(4.0, 8.0, "b")];
        let entries = reconcile(&transcript, silences(&[(3.0, 5.0)]), Some(30.0)).unwrap();
        assert_eq!(
            entries,
            vec![
                ReconciledSegment::text(0.0, 3.0, "a"),
                ReconciledSegment::silence(3.0, 4.0),
                ReconciledSegment::text(4.0, 8.0, "b"),
            ]
        );
    }

    #[test]
    fn test_empty_index_matches_transcript_only() {
        let transcript = vec![seg(0.0, 2.0, "a"), seg(2.05, 3.0, "b"), seg(3.5, 4.0, "c")];
        let with_empty = reconcile(&transcript, no_silence(), Some(30.0)).unwrap();
        let with_none = reconcile(&transcript, silences(&[]), Some(30.0)).unwrap();
        assert_eq!(with_empty, with_none);
        assert_eq!(
            with_empty,
            vec![
                ReconciledSegment::text(0.0, 3.0, "ab"),
                ReconciledSegment::silence(3.0, 3.5),
                ReconciledSegment::text(3.5, 4.0, "c"),
            ]
        );
    }
}

// ============================================================================
// Defects
// ============================================================================

mod defects {
    use super::*;

    #[test]
    fn test_overlapping_transcript_is_defect() {
        let transcript = vec![seg(0.0, 3.0, "a"), seg(2.0, 4.0, "b")];
        let err = reconcile(&transcript, no_silence(), Some(30.0)).unwrap_err();
        assert!(err.is_defect(), "got {err:?}");
    }

    #[test]
    fn test_inverted_segment_is_rejected() {
        let transcript = vec![seg(2.0, 1.0, "a")];
        let err = reconcile(&transcript, no_silence(), Some(30.0)).unwrap_err();
        assert!(matches!(
            err,
            DubError::Timeline(TimelineViolation::NonPositiveDuration { index: 0, .. })
        ));
    }

    #[test]
    fn test_negative_start_is_rejected() {
        let transcript = vec![seg(-1.0, 1.0, "a")];
        let err = reconcile(&transcript, no_silence(), Some(30.0)).unwrap_err();
        assert!(matches!(
            err,
            DubError::Timeline(TimelineViolation::InvalidSegment { index: 0, .. })
        ));
    }

    #[test]
    fn test_finalize_rejects_zero_duration() {
        let err = finalize(vec![
            ReconciledSegment::text(0.0, 1.0, "a"),
            ReconciledSegment::silence(1.0, 1.0),
        ])
        .unwrap_err();
        assert!(err.is_defect());
    }

    #[test]
    fn test_validator_reports_gap() {
        let entries = vec![
            ReconciledSegment::text(0.0, 1.0, "a"),
            ReconciledSegment::text(1.5, 2.0, "b"),
        ];
        assert!(matches!(
            validate_timeline(&entries),
            Err(DubError::Timeline(TimelineViolation::Gap { index: 1, .. }))
        ));
    }

    #[test]
    fn test_empty_transcript_is_empty_timeline() {
        let entries = reconcile(&[], no_silence(), Some(30.0)).unwrap();
        assert!(entries.is_empty());
    }
}

// ============================================================================
// Properties over generated lectures
// ============================================================================

mod properties {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    struct Lecture {
        transcript: Vec<TranscriptSegment>,
        silences: Vec<SilenceInterval>,
    }

    fn lecture(seed: u64) -> Lecture {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut transcript = Vec::new();
        let mut t = rng.gen_range(0.0..2.0);

        for i in 0..40 {
            let duration = rng.gen_range(0.5..12.0);
            let text = if rng.gen_bool(0.05) {
                " ...".to_string()
            } else {
                format!(" s{i}")
            };
            transcript.push(TranscriptSegment::new(t, t + duration, text));

            let roll: f64 = rng.gen();
            let gap = if roll < 0.5 {
                0.0
            } else if roll < 0.7 {
                rng.gen_range(0.0..0.09)
            } else {
                rng.gen_range(0.2..3.0)
            };
            t += duration + gap;
        }

        let end = t;
        let mut silences = Vec::new();
        let mut s = rng.gen_range(0.0..3.0);
        while s < end {
            let len = rng.gen_range(0.1..1.5);
            silences.push(SilenceInterval::new(s, (s + len).min(end)));
            s += len + rng.gen_range(0.5..6.0);
        }

        Lecture {
            transcript,
            silences,
        }
    }

    fn run(seed: u64, max: Option<f64>) -> (Lecture, Vec<ReconciledSegment>) {
        let lecture = lecture(seed);
        let entries = SegmentReconciler::default()
            .with_max_duration(max)
            .reconcile(&lecture.transcript, SilenceIndex::new(lecture.silences.clone()))
            .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
        (lecture, entries)
    }

    const SEEDS: std::ops::Range<u64> = 1..60;

    #[test]
    fn test_gapless_and_covering() {
        for seed in SEEDS {
            let (lecture, entries) = run(seed, Some(30.0));
            for pair in entries.windows(2) {
                assert_eq!(pair[0].end, pair[1].start, "seed {seed}");
            }
            assert_eq!(entries[0].start, lecture.transcript[0].start, "seed {seed}");
            assert_eq!(
                entries.last().map(|e| e.end),
                lecture.transcript.last().map(|s| s.end),
                "seed {seed}"
            );
            validate_coverage(&entries, &lecture.transcript).unwrap();
        }
    }

    #[test]
    fn test_no_adjacent_silence_and_positive_durations() {
        for seed in SEEDS {
            let (_, entries) = run(seed, Some(30.0));
            for pair in entries.windows(2) {
                assert!(
                    !(pair[0].is_silence() && pair[1].is_silence()),
                    "seed {seed}"
                );
            }
            for entry in &entries {
                assert!(entry.duration > 0.0, "seed {seed}: {entry:?}");
                assert_eq!(entry.duration, entry.end - entry.start);
            }
        }
    }

    #[test]
    fn test_merged_text_respects_cap() {
        for max in [5.0, 12.0, 30.0] {
            for seed in SEEDS {
                let (_, entries) = run(seed, Some(max));
                for entry in entries.iter().filter(|e| e.is_text()) {
                    let pieces = entry.text.split_whitespace().count();
                    if pieces > 1 {
                        assert!(
                            entry.duration <= max + 1e-9,
                            "seed {seed}, max {max}: {entry:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_text_is_preserved_in_order() {
        for seed in SEEDS {
            let (lecture, entries) = run(seed, Some(30.0));
            let expected: String = lecture
                .transcript
                .iter()
                .filter(|s| s.text.trim() != "...")
                .map(|s| s.text.as_str())
                .collect();
            let actual: String = entries.iter().map(|e| e.text.as_str()).collect();
            assert_eq!(actual, expected, "seed {seed}");
        }
    }

    #[test]
    fn test_finalization_is_idempotent() {
        for seed in SEEDS {
            let (_, entries) = run(seed, Some(30.0));
            let once = merge_adjacent_silence(entries.clone());
            let twice = merge_adjacent_silence(once.clone());
            assert_eq!(once, twice);
            assert_eq!(once, entries);
            assert_eq!(finalize(entries.clone()).unwrap(), entries);
        }
    }
}

#[test]
fn test_drift_threshold() {
    assert!(check_drift(0, 10.0, 10.05, 0.1).is_none());
    let drift = check_drift(3, 10.0, 10.25, 0.1).unwrap();
    assert_eq!(drift.index, 3);
    assert!((drift.delta() - 0.25).abs() < 1e-9);
}
