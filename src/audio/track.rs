use std::io::{Read, Seek};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{FftFixedIn, Resampler};

use crate::error::{DubError, Result};

/// Interleaved 16-bit PCM held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl AudioTrack {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        debug_assert!(channels > 0 && sample_rate > 0);
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// `seconds` of digital silence.
    pub fn silent(seconds: f64, sample_rate: u32, channels: u16) -> Self {
        let frames = seconds_to_frames(seconds, sample_rate);
        Self::new(
            vec![0; frames * channels as usize],
            sample_rate,
            channels,
        )
    }

    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self::new(Vec::new(), sample_rate, channels)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Butt-join `other` onto the end of this track, converting its format first.
    pub fn append(&mut self, other: &AudioTrack) -> Result<()> {
        if other.sample_rate == self.sample_rate && other.channels == self.channels {
            self.samples.extend_from_slice(&other.samples);
        } else {
            let converted = other.convert(self.sample_rate, self.channels)?;
            self.samples.extend_from_slice(&converted.samples);
        }
        Ok(())
    }

    pub fn append_silence(&mut self, seconds: f64) {
        let frames = seconds_to_frames(seconds, self.sample_rate);
        self.samples
            .resize(self.samples.len() + frames * self.channels as usize, 0);
    }

    /// Trim or pad with silence to exactly `seconds`.
    pub fn set_duration(&mut self, seconds: f64) {
        let frames = seconds_to_frames(seconds, self.sample_rate);
        self.samples.resize(frames * self.channels as usize, 0);
    }

    /// Remix and resample to the given format.
    pub fn convert(&self, sample_rate: u32, channels: u16) -> Result<AudioTrack> {
        let remixed = self.remix(channels);
        if remixed.sample_rate == sample_rate {
            return Ok(remixed);
        }
        remixed.resample(sample_rate)
    }

    /// Band-limited rate conversion. Content above the target Nyquist
    /// frequency is filtered out rather than folded back.
    fn resample(&self, sample_rate: u32) -> Result<AudioTrack> {
        let channels = self.channels as usize;
        let frames = self.frames();
        if frames == 0 {
            return Ok(AudioTrack::empty(sample_rate, self.channels));
        }

        let planar: Vec<Vec<f32>> = (0..channels)
            .map(|c| {
                self.samples
                    .iter()
                    .skip(c)
                    .step_by(channels)
                    .map(|&s| s as f32 / 32768.0)
                    .collect()
            })
            .collect();

        let mut resampler = FftFixedIn::<f32>::new(
            self.sample_rate as usize,
            sample_rate as usize,
            RESAMPLE_CHUNK,
            2,
            channels,
        )
        .map_err(|e| DubError::Transcoding(format!("resampler setup failed: {e}")))?;

        let delay = resampler.output_delay();
        let target_frames =
            (frames as f64 * sample_rate as f64 / self.sample_rate as f64).round() as usize;
        let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(target_frames + delay); channels];

        let mut pos = 0;
        while pos + resampler.input_frames_next() <= frames {
            let next = pos + resampler.input_frames_next();
            let block: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..next]).collect();
            let resampled = resampler.process(&block, None).map_err(resample_error)?;
            extend_planar(&mut out, resampled);
            pos = next;
        }
        if pos < frames {
            let block: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..]).collect();
            let resampled = resampler
                .process_partial(Some(block.as_slice()), None)
                .map_err(resample_error)?;
            extend_planar(&mut out, resampled);
        }
        // Drain the filter until the delayed tail is out.
        while out[0].len() < delay + target_frames {
            let resampled = resampler
                .process_partial(None::<&[&[f32]]>, None)
                .map_err(resample_error)?;
            if resampled.first().map_or(true, |ch| ch.is_empty()) {
                break;
            }
            extend_planar(&mut out, resampled);
        }

        let mut samples = Vec::with_capacity(target_frames * channels);
        for i in delay..delay + target_frames {
            for ch in &out {
                let value = ch.get(i).copied().unwrap_or(0.0);
                samples.push((value * 32768.0).round().clamp(-32768.0, 32767.0) as i16);
            }
        }
        Ok(AudioTrack::new(samples, sample_rate, self.channels))
    }

    fn remix(&self, channels: u16) -> AudioTrack {
        if channels == self.channels {
            return self.clone();
        }
        let src = self.channels as usize;
        let dst = channels as usize;
        let mut samples = Vec::with_capacity(self.frames() * dst);
        for frame in self.samples.chunks_exact(src) {
            let mono = frame.iter().map(|&s| s as i32).sum::<i32>() / src as i32;
            if dst == 1 {
                samples.push(mono as i16);
            } else {
                for c in 0..dst {
                    let value = if src == 1 { frame[0] } else { frame[c.min(src - 1)] };
                    samples.push(value);
                }
            }
        }
        AudioTrack::new(samples, self.sample_rate, channels)
    }

    /// Linearly interpolate to exactly `target_frames` frames, keeping format.
    pub fn resample_to_frames(&self, target_frames: usize) -> AudioTrack {
        let channels = self.channels as usize;
        let source_frames = self.frames();
        if source_frames == 0 || target_frames == 0 {
            return AudioTrack::new(
                vec![0; target_frames * channels],
                self.sample_rate,
                self.channels,
            );
        }
        if source_frames == target_frames {
            return self.clone();
        }

        let step = if target_frames > 1 {
            (source_frames - 1) as f64 / (target_frames - 1) as f64
        } else {
            0.0
        };

        let mut samples = Vec::with_capacity(target_frames * channels);
        for i in 0..target_frames {
            let pos = i as f64 * step;
            let left = pos.floor() as usize;
            let right = (left + 1).min(source_frames - 1);
            let frac = pos - left as f64;
            for c in 0..channels {
                let a = self.samples[left * channels + c] as f64;
                let b = self.samples[right * channels + c] as f64;
                samples.push((a + (b - a) * frac).round() as i16);
            }
        }
        AudioTrack::new(samples, self.sample_rate, self.channels)
    }

    pub fn read_wav(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DubError::FileNotFound(path.display().to_string()));
        }
        let reader = WavReader::open(path)?;
        Self::from_reader(reader)
    }

    pub fn from_reader<R: Read>(reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .collect::<std::result::Result<_, _>>()?,
            (SampleFormat::Int, bits) => {
                let shift = bits as i32 - 16;
                reader
                    .into_samples::<i32>()
                    .map(|s| {
                        s.map(|v| {
                            if shift > 0 {
                                (v >> shift) as i16
                            } else {
                                (v << -shift) as i16
                            }
                        })
                    })
                    .collect::<std::result::Result<_, _>>()?
            }
            (SampleFormat::Float, _) => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<_, _>>()?,
        };
        Ok(Self::new(samples, spec.sample_rate, spec.channels))
    }

    /// Decode raw little-endian signed 16-bit PCM.
    pub fn from_pcm_bytes(bytes: &[u8], sample_rate: u32, channels: u16) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        Self::new(samples, sample_rate, channels)
    }

    fn spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    pub fn write_wav(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = WavWriter::create(path, self.spec())?;
        self.write_samples(&mut writer)?;
        writer.finalize()?;
        Ok(())
    }

    fn write_samples<W: std::io::Write + Seek>(&self, writer: &mut WavWriter<W>) -> Result<()> {
        let mut sample_writer = writer.get_i16_writer(self.samples.len() as u32);
        for &s in &self.samples {
            sample_writer.write_sample(s);
        }
        sample_writer.flush()?;
        Ok(())
    }
}

/// Input frames per resampler call.
const RESAMPLE_CHUNK: usize = 1024;

fn extend_planar(out: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (dst, src) in out.iter_mut().zip(block) {
        dst.extend(src);
    }
}

fn resample_error(e: rubato::ResampleError) -> DubError {
    DubError::Transcoding(format!("resampling failed: {e}"))
}

/// Length of a WAV file from its header, without reading the samples.
pub(crate) fn wav_duration(path: &Path) -> Result<f64> {
    if !path.exists() {
        return Err(DubError::FileNotFound(path.display().to_string()));
    }
    let reader = WavReader::open(path)?;
    Ok(reader.duration() as f64 / reader.spec().sample_rate as f64)
}

fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    if seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64).round() as usize
}
