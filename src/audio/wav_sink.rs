//! Offline output to a WAV file.

use super::{AudioSink, SinkSpec, BYTES_PER_SAMPLE};
use crate::error::SinkError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// An [`AudioSink`] writing 16-bit PCM to a WAV file.
///
/// By default writes never block, so the render loop runs as fast as the
/// synthesizer allows. With [`with_realtime_pacing`](Self::with_realtime_pacing)
/// each write sleeps until the wall clock catches up with the audio written,
/// so events submitted live land where they would on a device.
///
/// An optional frame limit bounds the file: once it is reached, `write`
/// fails with [`SinkError::Exhausted`], which the engine treats as end of
/// stream.
pub struct WavSink {
    path: PathBuf,
    max_frames: Option<u64>,
    realtime: bool,
    channels: u16,
    sample_rate: u32,
    frames_written: u64,
    started_at: Option<Instant>,
    writer: Option<WavWriter<BufWriter<File>>>,
}

impl WavSink {
    /// Creates a sink writing to `path` with no length limit.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_frames: None,
            realtime: false,
            channels: 0,
            sample_rate: 0,
            frames_written: 0,
            started_at: None,
            writer: None,
        }
    }

    /// Limits the file to `max_frames` frames.
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Paces writes to real time.
    pub fn with_realtime_pacing(mut self) -> Self {
        self.realtime = true;
        self
    }

    /// Sleeps until the wall clock reaches the end of the audio written.
    fn pace(&self) {
        let (Some(started_at), true) = (self.started_at, self.sample_rate > 0) else {
            return;
        };
        let target = Duration::from_secs_f64(self.frames_written as f64 / self.sample_rate as f64);
        if let Some(ahead) = target.checked_sub(started_at.elapsed()) {
            thread::sleep(ahead);
        }
    }

    /// Frames written since `open`.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl AudioSink for WavSink {
    fn open(&mut self, spec: &SinkSpec) -> Result<(), SinkError> {
        if spec.channels == 0 {
            return Err(SinkError::Open("zero channels".to_string()));
        }
        let wav_spec = WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(&self.path, wav_spec)
            .map_err(|e| SinkError::Open(format!("{}: {}", self.path.display(), e)))?;

        self.writer = Some(writer);
        self.channels = spec.channels;
        self.sample_rate = spec.sample_rate;
        self.frames_written = 0;
        info!(path = %self.path.display(), "WAV output opened");
        Ok(())
    }

    fn start(&mut self) -> Result<(), SinkError> {
        if self.writer.is_none() {
            return Err(SinkError::Start("output not open".to_string()));
        }
        if self.realtime {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize, SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        let channels = self.channels as usize;

        let mut frames = (samples.len() / channels) as u64;
        if let Some(max_frames) = self.max_frames {
            let remaining = max_frames.saturating_sub(self.frames_written);
            if remaining == 0 {
                return Err(SinkError::Exhausted);
            }
            frames = frames.min(remaining);
        }

        let count = frames as usize * channels;
        for &sample in &samples[..count] {
            writer
                .write_sample(sample)
                .map_err(|e| SinkError::Write(e.to_string()))?;
        }
        self.frames_written += frames;
        self.pace();

        Ok(count * BYTES_PER_SAMPLE)
    }

    fn release(&mut self) {
        self.started_at = None;
        if let Some(writer) = self.writer.take() {
            match writer.finalize() {
                Ok(()) => info!(frames = self.frames_written, "WAV output finalized"),
                Err(e) => error!("Failed to finalize WAV file: {}", e),
            }
        }
    }
}
