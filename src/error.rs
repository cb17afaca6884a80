//! Error types for the driver and its ports.

use thiserror::Error;

/// Errors reported by a [`SynthesisPort`](crate::synth::SynthesisPort).
#[derive(Debug, Error)]
pub enum SynthError {
    /// The port was used before `initialize` succeeded or after `release`.
    #[error("synthesizer is not initialized")]
    NotInitialized,
    /// The synthesizer could not be created.
    #[error("failed to create synthesizer: {0}")]
    Create(String),
    /// A sound bank could not be parsed or applied.
    #[error("failed to load sound bank: {0}")]
    SoundBank(String),
    /// The event contained no message the synthesizer understands.
    #[error("unusable event: {0}")]
    InvalidEvent(String),
    /// A parameter was outside the range the synthesizer accepts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors reported by an [`AudioSink`](crate::audio::AudioSink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output device or file could not be opened.
    #[error("failed to open audio output: {0}")]
    Open(String),
    /// The output could not be started.
    #[error("failed to start audio output: {0}")]
    Start(String),
    /// Writing a buffer failed.
    #[error("failed to write audio: {0}")]
    Write(String),
    /// The sink was written to before `open` or after `release`.
    #[error("audio output is closed")]
    Closed,
    /// The sink accepts no more audio.
    #[error("audio output is exhausted")]
    Exhausted,
}

/// Errors returned to callers of [`MidiDriver`](crate::MidiDriver).
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver is not streaming yet (or any more).
    #[error("driver is not ready")]
    NotReady,
    /// An argument was rejected before reaching the render thread.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The render thread could not bring up its ports.
    #[error("initialization failed: {0}")]
    Initialization(String),
    /// The render thread could not be spawned.
    #[error("failed to spawn render thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Convenience result type for driver calls.
pub type Result<T, E = DriverError> = std::result::Result<T, E>;
