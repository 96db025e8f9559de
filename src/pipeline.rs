use crate::audio::track::wav_duration;
use crate::audio::{
    burn_subtitles, check_ffmpeg, detect_silence, embed_subtitles, extract_audio,
    mux_audio_video, probe_duration, strip_audio, AtempoStretcher, AudioStitcher,
    TimeStretcher,
};
use crate::cache::{load_json, segments_key, store_json, transcript_key, CacheStore};
use crate::config::{Config, ReconcileConfig, SilenceConfig};
use crate::error::{DubError, Result};
use crate::subtitle::{write_subtitles, SubtitleEntry, SubtitleFormat};
use crate::synth::SpeechSynthesizer;
use crate::timeline::{
    validate_coverage, validate_timeline, Drift, ReconciledSegment, SegmentReconciler,
    SilenceIndex, TranscriptSegment,
};
use crate::transcribe::{repair_final_end, Transcriber, Transcript};
use crate::workspace::{lecture_id, Workspace};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Recognition runs on 16 kHz mono, which is also what silence detection scans.
const RECOGNITION_SAMPLE_RATE: u32 = 16_000;

/// Collaborators and settings shared by every lecture in a run.
pub struct LectureContext {
    pub config: Config,
    pub workspace: Workspace,
    pub cache: Arc<dyn CacheStore>,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub stretcher: Arc<dyn TimeStretcher>,
    /// Read cached transcripts and timelines. Results are written either way.
    pub read_cache: bool,
    pub show_progress: bool,
    /// ISO 639-2 tag for the embedded subtitle track.
    pub subtitle_language: String,
    /// Render captions into the picture instead of adding a selectable track.
    pub burn_subtitles: bool,
}

impl LectureContext {
    pub fn new(
        config: Config,
        workspace: Workspace,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let cache = Arc::new(workspace.cache());
        Self {
            config,
            workspace,
            cache,
            transcriber,
            synthesizer,
            stretcher: Arc::new(AtempoStretcher),
            read_cache: true,
            show_progress: true,
            subtitle_language: "eng".to_string(),
            burn_subtitles: false,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_stretcher(mut self, stretcher: Arc<dyn TimeStretcher>) -> Self {
        self.stretcher = stretcher;
        self
    }

    pub fn with_read_cache(mut self, read_cache: bool) -> Self {
        self.read_cache = read_cache;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_subtitle_language(mut self, language: String) -> Self {
        self.subtitle_language = language;
        self
    }

    pub fn with_burn_subtitles(mut self, burn: bool) -> Self {
        self.burn_subtitles = burn;
        self
    }
}

/// Statistics from dubbing one lecture.
#[derive(Debug, Clone, Default)]
pub struct LectureStats {
    pub audio_duration: f64,
    pub video_duration: f64,
    pub transcript_segments: usize,
    pub text_segments: usize,
    pub silence_segments: usize,
    pub drift_events: usize,
    pub max_drift: f64,
    pub rendered_duration: f64,
    pub transcript_cached: bool,
    pub timeline_cached: bool,
    pub extraction_time: Duration,
    pub transcription_time: Duration,
    pub reconcile_time: Duration,
    pub render_time: Duration,
    pub total_time: Duration,
}

#[derive(Debug)]
pub struct LectureResult {
    pub lecture: String,
    pub dubbed_video: PathBuf,
    pub subtitled_video: PathBuf,
    pub subtitles: Vec<PathBuf>,
    pub drifts: Vec<Drift>,
    pub stats: LectureStats,
}

#[derive(Debug)]
pub struct CaptionResult {
    pub lecture: String,
    pub subtitled_video: PathBuf,
    pub subtitles: Vec<PathBuf>,
    pub entries: usize,
    pub total_time: Duration,
}

fn spinner(show: bool, message: String) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn finish(pb: Option<ProgressBar>, message: String) {
    if let Some(pb) = pb {
        pb.finish_with_message(message);
    }
}

fn require_video(video: &Path) -> Result<()> {
    if !video.exists() {
        return Err(DubError::FileNotFound(video.display().to_string()));
    }
    check_ffmpeg()
}

/// Load the lecture's transcript from the cache or ask the recognizer, then
/// stretch the final segment to the end of the audio.
async fn transcript_for(
    lecture: &str,
    audio: &Path,
    audio_length: f64,
    ctx: &LectureContext,
) -> Result<(Vec<TranscriptSegment>, bool)> {
    let key = transcript_key(lecture, ctx.config.task);
    let cached: Option<Transcript> = if ctx.read_cache {
        load_json(ctx.cache.as_ref(), &key)?
    } else {
        None
    };

    let (mut segments, was_cached) = match cached {
        Some(transcript) => {
            info!("{}: using cached transcript '{}'", lecture, key);
            (transcript.segments, true)
        }
        None => {
            let transcript = ctx.transcriber.transcribe(audio).await?;
            store_json(ctx.cache.as_ref(), &key, &transcript)?;
            (transcript.segments, false)
        }
    };

    if segments.is_empty() {
        return Err(DubError::Transcription(format!(
            "{lecture}: recognizer returned no speech"
        )));
    }

    repair_final_end(&mut segments, audio_length);
    Ok((segments, was_cached))
}

/// A reconciled timeline stored with the settings it was built under.
#[derive(Debug, Serialize, Deserialize)]
struct CachedTimeline {
    reconcile: ReconcileConfig,
    silence: SilenceConfig,
    entries: Vec<ReconciledSegment>,
}

impl CachedTimeline {
    fn built_with(&self, config: &Config) -> bool {
        self.reconcile == config.reconcile && self.silence == config.silence
    }
}

fn timeline_for(
    lecture: &str,
    audio: &Path,
    segments: &[TranscriptSegment],
    ctx: &LectureContext,
) -> Result<(Vec<ReconciledSegment>, bool)> {
    let key = segments_key(lecture, ctx.config.task);
    if ctx.read_cache {
        match load_json::<CachedTimeline>(ctx.cache.as_ref(), &key)? {
            Some(cached) if cached.built_with(&ctx.config) => {
                info!("{}: using cached timeline '{}'", lecture, key);
                validate_timeline(&cached.entries)?;
                return Ok((cached.entries, true));
            }
            Some(_) => info!(
                "{}: cached timeline '{}' was built with other settings, rebuilding",
                lecture, key
            ),
            None => {}
        }
    }

    let silences = detect_silence(audio, &ctx.config.silence)?;
    debug!("{}: {} silence intervals detected", lecture, silences.len());

    let entries = SegmentReconciler::new(ctx.config.reconcile.clone())
        .reconcile(segments, SilenceIndex::new(silences))?;
    validate_coverage(&entries, segments)?;

    let cached = CachedTimeline {
        reconcile: ctx.config.reconcile.clone(),
        silence: ctx.config.silence.clone(),
        entries,
    };
    store_json(ctx.cache.as_ref(), &key, &cached)?;
    Ok((cached.entries, false))
}

/// Dub one lecture video.
///
/// Stages:
/// 1. Extract the audio and a silent copy of the video
/// 2. Transcribe (translate) and write subtitles
/// 3. Detect silence and reconcile the timeline
/// 4. Render speech, conform it to the video length, mux and embed subtitles
pub async fn dub_lecture(video: &Path, ctx: &LectureContext) -> Result<LectureResult> {
    let start_time = Instant::now();
    require_video(video)?;

    let lecture = lecture_id(video);
    let workspace = &ctx.workspace;
    workspace.create_dirs()?;
    let mut stats = LectureStats::default();

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 1: Audio Extraction
    // ═══════════════════════════════════════════════════════════════════════
    info!("{}: stage 1/4, extracting audio", lecture);
    let extraction_start = Instant::now();
    let pb = spinner(ctx.show_progress, format!("{lecture}: extracting audio..."));

    let audio_path = workspace.extracted_audio(&lecture);
    extract_audio(video, &audio_path, RECOGNITION_SAMPLE_RATE, 1)?;
    stats.audio_duration = wav_duration(&audio_path)?;
    stats.video_duration = probe_duration(video)?;

    let silent_video = workspace.silent_video(&lecture);
    strip_audio(video, &silent_video)?;

    stats.extraction_time = extraction_start.elapsed();
    finish(
        pb,
        format!("✓ {lecture}: audio extracted ({:.1}s)", stats.audio_duration),
    );

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 2: Transcription
    // ═══════════════════════════════════════════════════════════════════════
    info!(
        "{}: stage 2/4, {} with {}",
        lecture,
        ctx.config.task,
        ctx.transcriber.name()
    );
    let transcription_start = Instant::now();
    let pb = spinner(ctx.show_progress, format!("{lecture}: transcribing..."));

    let (segments, transcript_cached) =
        transcript_for(&lecture, &audio_path, stats.audio_duration, ctx).await?;
    stats.transcript_segments = segments.len();
    stats.transcript_cached = transcript_cached;

    let subtitles = write_subtitles(
        &SubtitleEntry::from_segments(&segments),
        &workspace.subtitles_dir(),
        &lecture,
        &SubtitleFormat::ALL,
    )?;

    stats.transcription_time = transcription_start.elapsed();
    finish(
        pb,
        format!("✓ {lecture}: {} transcript segments", segments.len()),
    );

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 3: Reconciliation
    // ═══════════════════════════════════════════════════════════════════════
    info!("{}: stage 3/4, reconciling timeline", lecture);
    let reconcile_start = Instant::now();

    let (entries, timeline_cached) = timeline_for(&lecture, &audio_path, &segments, ctx)?;
    stats.timeline_cached = timeline_cached;
    stats.text_segments = entries.iter().filter(|e| e.is_text()).count();
    stats.silence_segments = entries.len() - stats.text_segments;
    stats.reconcile_time = reconcile_start.elapsed();

    info!(
        "{}: {} text and {} silence segments",
        lecture, stats.text_segments, stats.silence_segments
    );

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 4: Rendering
    // ═══════════════════════════════════════════════════════════════════════
    info!(
        "{}: stage 4/4, rendering with {}",
        lecture,
        ctx.synthesizer.name()
    );
    let render_start = Instant::now();
    let pb = spinner(ctx.show_progress, format!("{lecture}: synthesizing speech..."));

    let stitcher = AudioStitcher::new(
        ctx.synthesizer.clone(),
        ctx.stretcher.clone(),
        ctx.config.stitch.clone(),
    )
    .with_partial_dir(workspace.audio_translated_dir());

    let rendered = stitcher
        .render(&lecture, &entries, ctx.config.use_accelerator)
        .await?;
    rendered.track.write_wav(&workspace.rendered_audio(&lecture))?;
    stats.drift_events = rendered.drifts.len();
    stats.max_drift = rendered.max_drift();

    let conformed = stitcher.conform(&rendered.track, stats.video_duration)?;
    let conformed_path = workspace.conformed_audio(&lecture);
    conformed.write_wav(&conformed_path)?;
    stats.rendered_duration = conformed.duration();

    let dubbed_video = workspace.dubbed_video(&lecture);
    mux_audio_video(&silent_video, &conformed_path, &dubbed_video)?;

    let subtitled_video = workspace.subtitled_video(&lecture);
    if ctx.burn_subtitles {
        burn_subtitles(&dubbed_video, &subtitles[0], &subtitled_video)?;
    } else {
        embed_subtitles(
            &dubbed_video,
            &subtitles[0],
            &ctx.subtitle_language,
            &subtitled_video,
        )?;
    }

    stats.render_time = render_start.elapsed();
    finish(
        pb,
        format!(
            "✓ {lecture}: dubbed ({:.1}s, {} drift warnings)",
            stats.rendered_duration, stats.drift_events
        ),
    );

    stats.total_time = start_time.elapsed();

    Ok(LectureResult {
        lecture,
        dubbed_video,
        subtitled_video,
        subtitles,
        drifts: rendered.drifts,
        stats,
    })
}

/// Subtitle a lecture in its original audio, without dubbing.
pub async fn caption_lecture(video: &Path, ctx: &LectureContext) -> Result<CaptionResult> {
    let start_time = Instant::now();
    require_video(video)?;

    let lecture = lecture_id(video);
    let workspace = &ctx.workspace;
    workspace.create_dirs()?;

    info!("{}: extracting audio", lecture);
    let audio_path = workspace.extracted_audio(&lecture);
    extract_audio(video, &audio_path, RECOGNITION_SAMPLE_RATE, 1)?;
    let audio_length = wav_duration(&audio_path)?;

    let pb = spinner(ctx.show_progress, format!("{lecture}: transcribing..."));
    let (segments, _) = transcript_for(&lecture, &audio_path, audio_length, ctx).await?;
    let entries = SubtitleEntry::from_segments(&segments);
    let subtitles = write_subtitles(
        &entries,
        &workspace.subtitles_dir(),
        &lecture,
        &SubtitleFormat::ALL,
    )?;
    finish(pb, format!("✓ {lecture}: {} captions", entries.len()));

    let subtitled_video = workspace.subtitled_video(&lecture);
    if ctx.burn_subtitles {
        burn_subtitles(video, &subtitles[0], &subtitled_video)?;
    } else {
        embed_subtitles(video, &subtitles[0], &ctx.subtitle_language, &subtitled_video)?;
    }

    Ok(CaptionResult {
        lecture,
        subtitled_video,
        subtitles,
        entries: entries.len(),
        total_time: start_time.elapsed(),
    })
}

/// Either a full cached transcript or a bare list of segments.
#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    Transcript(Transcript),
    Segments(Vec<TranscriptSegment>),
}

/// Reconcile a transcript JSON file offline, optionally against the audio it
/// came from. Without audio there is no amplitude silence and the final
/// segment is left as recorded.
pub fn reconcile_file(
    transcript_path: &Path,
    audio: Option<&Path>,
    config: &Config,
) -> Result<Vec<ReconciledSegment>> {
    if !transcript_path.exists() {
        return Err(DubError::FileNotFound(transcript_path.display().to_string()));
    }
    let contents = std::fs::read_to_string(transcript_path)?;
    let mut segments = match serde_json::from_str::<TranscriptFile>(&contents)? {
        TranscriptFile::Transcript(t) => t.segments,
        TranscriptFile::Segments(s) => s,
    };

    let silences = match audio {
        Some(audio) => {
            if !audio.exists() {
                return Err(DubError::FileNotFound(audio.display().to_string()));
            }
            repair_final_end(&mut segments, wav_duration(audio)?);
            detect_silence(audio, &config.silence)?
        }
        None => Vec::new(),
    };

    let entries = SegmentReconciler::new(config.reconcile.clone())
        .reconcile(&segments, SilenceIndex::new(silences))?;
    if !entries.is_empty() {
        validate_coverage(&entries, &segments)?;
    }
    Ok(entries)
}

/// Print a summary of one dubbed lecture.
pub fn print_summary(result: &LectureResult) {
    let stats = &result.stats;
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("  {}", result.lecture);
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Dubbed:     {}", result.dubbed_video.display());
    println!("  Subtitled:  {}", result.subtitled_video.display());
    println!(
        "  Segments:   {} transcript, {} text, {} silence",
        stats.transcript_segments, stats.text_segments, stats.silence_segments
    );
    println!(
        "  Duration:   {:.1}s audio, {:.1}s video, {:.1}s dubbed",
        stats.audio_duration, stats.video_duration, stats.rendered_duration
    );
    if stats.drift_events > 0 {
        println!(
            "  Drift:      {} warnings, max {:.3}s",
            stats.drift_events, stats.max_drift
        );
    }
    println!();
    println!("  Timing:");
    println!("    Extract:     {:.2}s", stats.extraction_time.as_secs_f64());
    println!(
        "    Transcribe:  {:.2}s{}",
        stats.transcription_time.as_secs_f64(),
        if stats.transcript_cached { " (cached)" } else { "" }
    );
    println!(
        "    Reconcile:   {:.2}s{}",
        stats.reconcile_time.as_secs_f64(),
        if stats.timeline_cached { " (cached)" } else { "" }
    );
    println!("    Render:      {:.2}s", stats.render_time.as_secs_f64());
    println!("    Total:       {:.2}s", stats.total_time.as_secs_f64());
    println!();
}
