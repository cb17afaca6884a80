//! The synthesizer seam.
//!
//! The render thread talks to the synthesizer only through
//! [`SynthesisPort`]. A port is created on the render thread at the start of
//! each cycle and dropped at the end, so implementations need not be `Send`.

mod rusty;

pub use rusty::RustySynthPort;

use crate::config::Config;
use crate::error::SynthError;
use crate::midi::ReverbPreset;

/// Operations the render engine needs from a synthesizer.
pub trait SynthesisPort {
    /// Brings the synthesizer up.
    ///
    /// Returns the length, in interleaved samples, of the buffer the engine
    /// must pass to [`render`](Self::render). Zero means the synthesizer is
    /// unusable.
    fn initialize(&mut self) -> Result<usize, SynthError>;

    /// Reports the configuration in effect after `initialize`.
    fn configure(&self) -> Config;

    /// Hands raw event bytes to the synthesizer.
    fn feed(&mut self, event: &[u8]) -> Result<(), SynthError>;

    /// Fills `buffer` with interleaved 16-bit PCM.
    ///
    /// Returns the number of frames written; zero signals end of stream.
    fn render(&mut self, buffer: &mut [i16]) -> Result<usize, SynthError>;

    /// Sets the master volume, 0-100.
    fn set_volume(&mut self, volume: u8) -> Result<(), SynthError>;

    fn set_reverb_preset(&mut self, preset: ReverbPreset) -> Result<(), SynthError>;

    /// Replaces the sound bank with the given raw bank bytes.
    fn load_sound_bank(&mut self, bank: &[u8]) -> Result<(), SynthError>;

    /// Releases every resource held by the synthesizer. Must be idempotent.
    fn release(&mut self);
}
