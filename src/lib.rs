pub mod audio;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
mod retry;
pub mod subtitle;
pub mod synth;
pub mod timeline;
pub mod transcribe;
pub mod workspace;

pub use audio::{AtempoStretcher, AudioStitcher, AudioTrack, LinearStretcher, RenderOutput, TimeStretcher};
pub use config::Config;
pub use error::{DubError, Result, TimelineViolation};
pub use pipeline::{
    caption_lecture, dub_lecture, print_summary, reconcile_file, LectureContext, LectureResult,
    LectureStats,
};
pub use timeline::{
    reconcile, ReconciledSegment, SegmentKind, SegmentReconciler, SilenceIndex, SilenceInterval,
    TranscriptSegment,
};
