//! Audio output for the render thread.
//!
//! This module provides the [`AudioSink`] seam and two implementations:
//! - [`RodioSink`] streams to the default output device through rodio
//! - [`WavSink`] writes 16-bit PCM to a WAV file through hound

mod rodio_sink;
mod wav_sink;

pub use rodio_sink::RodioSink;
pub use wav_sink::WavSink;

use crate::error::SinkError;

/// Bytes per 16-bit PCM sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Stream parameters handed to [`AudioSink::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSpec {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Size in bytes of one rendered buffer.
    pub buffer_bytes: usize,
}

/// Operations the render engine needs from an audio output.
///
/// Like synthesis ports, sinks are created and used only on the render
/// thread.
pub trait AudioSink {
    /// Opens the output for the given stream parameters.
    fn open(&mut self, spec: &SinkSpec) -> Result<(), SinkError>;

    /// Starts playback.
    fn start(&mut self) -> Result<(), SinkError>;

    /// Writes interleaved samples, blocking until the output has room.
    ///
    /// Returns the number of bytes accepted.
    fn write(&mut self, samples: &[i16]) -> Result<usize, SinkError>;

    /// Releases the output. Must be idempotent.
    fn release(&mut self);
}
