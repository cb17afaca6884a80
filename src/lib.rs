//! mididriver - A real-time MIDI driver.
//!
//! Producer threads submit raw MIDI events to a [`MidiDriver`]; a background
//! render thread feeds them to a synthesizer, renders PCM one buffer at a
//! time and writes it to an audio sink. Synthesizer and sink sit behind the
//! [`SynthesisPort`] and [`AudioSink`] traits, with rustysynth, rodio and
//! hound implementations included.

pub mod audio;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod mailbox;
pub mod midi;
pub mod synth;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use audio::{AudioSink, RodioSink, SinkSpec, WavSink};
pub use config::{Config, DriverSettings};
pub use driver::MidiDriver;
pub use engine::RenderState;
pub use error::{DriverError, SinkError, SynthError};
pub use mailbox::EventMailbox;
pub use midi::{Event, ReverbPreset};
pub use synth::{RustySynthPort, SynthesisPort};
