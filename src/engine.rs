//! The render engine: one background thread per `start()` cycle.
//!
//! The thread owns the synthesizer port, the audio sink and the PCM buffer
//! for its whole life. Other threads reach it only through [`SharedState`]:
//! the mailbox, the stop flag, the state word and the config snapshot.
//!
//! ```text
//! Idle -> Initializing -> Streaming -> Stopping -> Stopped
//!              |
//!              +-> Failed
//! ```

use crate::audio::{AudioSink, SinkSpec, BYTES_PER_SAMPLE};
use crate::config::Config;
use crate::mailbox::{Control, EventMailbox, Message};
use crate::synth::SynthesisPort;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Name given to the render thread.
pub const RENDER_THREAD_NAME: &str = "midi-render";

/// Builds a fresh synthesizer port on the render thread.
pub type SynthFactory = Arc<dyn Fn() -> Box<dyn SynthesisPort> + Send + Sync>;

/// Builds a fresh audio sink on the render thread.
pub type SinkFactory = Arc<dyn Fn() -> Box<dyn AudioSink> + Send + Sync>;

/// Called once on the render thread when streaming begins.
pub type StartListener = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle of a render cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RenderState {
    /// Never started.
    Idle = 0,
    /// The render thread is bringing up its ports.
    Initializing = 1,
    /// Rendering and writing audio.
    Streaming = 2,
    /// Flushing the last buffer and releasing ports.
    Stopping = 3,
    /// Ports released; terminal.
    Stopped = 4,
    /// Initialization failed; terminal.
    Failed = 5,
}

impl RenderState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RenderState::Idle,
            1 => RenderState::Initializing,
            2 => RenderState::Streaming,
            3 => RenderState::Stopping,
            4 => RenderState::Stopped,
            _ => RenderState::Failed,
        }
    }

    /// True for `Initializing` and `Streaming`.
    pub fn is_running(self) -> bool {
        matches!(self, RenderState::Initializing | RenderState::Streaming)
    }

    /// True for `Stopped` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderState::Stopped | RenderState::Failed)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State shared between the controller and the render thread.
#[derive(Debug)]
pub(crate) struct SharedState {
    pub(crate) mailbox: EventMailbox,
    state: AtomicU8,
    stop_requested: AtomicBool,
    config: Mutex<Option<Config>>,
    failure: Mutex<Option<String>>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            mailbox: EventMailbox::new(),
            state: AtomicU8::new(RenderState::Idle as u8),
            stop_requested: AtomicBool::new(false),
            config: Mutex::new(None),
            failure: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> RenderState {
        RenderState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: RenderState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Resets per-cycle state and enters `Initializing`.
    pub(crate) fn begin_cycle(&self) {
        self.stop_requested.store(false, Ordering::Release);
        *lock(&self.config) = None;
        *lock(&self.failure) = None;
        self.set_state(RenderState::Initializing);
    }

    /// Asks the render loop to exit. Any thread may call this.
    pub(crate) fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        let _ = self.state.compare_exchange(
            RenderState::Streaming as u8,
            RenderState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub(crate) fn config(&self) -> Option<Config> {
        *lock(&self.config)
    }

    pub(crate) fn failure(&self) -> Option<String> {
        lock(&self.failure).clone()
    }

    /// Records a failure and enters `Failed`.
    pub(crate) fn fail(&self, reason: String) {
        *lock(&self.failure) = Some(reason);
        self.set_state(RenderState::Failed);
    }
}

/// Why the streaming loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Requested,
    EndOfStream,
    RenderFailed,
    WriteFailed,
}

/// Everything one render thread needs, moved onto it at spawn.
pub(crate) struct RenderEngine {
    shared: Arc<SharedState>,
    synth_factory: SynthFactory,
    sink_factory: SinkFactory,
    listener: Option<StartListener>,
}

impl RenderEngine {
    pub(crate) fn new(
        shared: Arc<SharedState>,
        synth_factory: SynthFactory,
        sink_factory: SinkFactory,
        listener: Option<StartListener>,
    ) -> Self {
        Self {
            shared,
            synth_factory,
            sink_factory,
            listener,
        }
    }

    /// Spawns the render thread.
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(RENDER_THREAD_NAME.into())
            .spawn(move || self.run())
    }

    fn run(self) {
        debug!("render thread started");
        let mut synth = (self.synth_factory)();

        let buffer_len = match synth.initialize() {
            Ok(0) => {
                return self.fail(
                    synth.as_mut(),
                    None,
                    "synthesizer reported a zero buffer size".to_string(),
                )
            }
            Ok(len) => len,
            Err(e) => return self.fail(synth.as_mut(), None, e.to_string()),
        };

        let config = synth.configure();
        if config.num_channels == 0 {
            return self.fail(
                synth.as_mut(),
                None,
                "synthesizer reported zero channels".to_string(),
            );
        }

        let spec = SinkSpec {
            sample_rate: config.sample_rate,
            channels: config.num_channels as u16,
            buffer_bytes: buffer_len * BYTES_PER_SAMPLE,
        };
        let mut sink = (self.sink_factory)();
        if let Err(e) = sink.open(&spec).and_then(|()| sink.start()) {
            return self.fail(synth.as_mut(), Some(sink.as_mut()), e.to_string());
        }

        // Sized once, never resized
        let mut buffer = vec![0i16; buffer_len];

        *lock(&self.shared.config) = Some(config);
        self.shared.set_state(RenderState::Streaming);
        info!(
            max_voices = config.max_voices,
            channels = config.num_channels,
            sample_rate = config.sample_rate,
            buffer_len,
            "streaming"
        );

        if let Some(listener) = &self.listener {
            listener();
        }

        let channels = config.num_channels as usize;
        let mut cycles: u64 = 0;
        let reason = loop {
            if self.shared.stop_requested() {
                break StopReason::Requested;
            }

            self.apply_pending(synth.as_mut());

            let frames = match synth.render(&mut buffer) {
                Ok(0) => break StopReason::EndOfStream,
                Ok(frames) => frames,
                Err(e) => {
                    warn!("Render failed: {}", e);
                    break StopReason::RenderFailed;
                }
            };

            let samples = (frames * channels).min(buffer.len());
            if let Err(e) = sink.write(&buffer[..samples]) {
                warn!("Audio write failed: {}", e);
                break StopReason::WriteFailed;
            }

            cycles += 1;
            trace!(cycles, frames, "render cycle");
        };

        self.shared.set_state(RenderState::Stopping);
        debug!(?reason, cycles, "stopping");

        // Drain, render and write once more so the tail is not dropped
        self.apply_pending(synth.as_mut());
        match synth.render(&mut buffer) {
            Ok(frames) if frames > 0 && reason != StopReason::WriteFailed => {
                let samples = (frames * channels).min(buffer.len());
                if let Err(e) = sink.write(&buffer[..samples]) {
                    warn!("Final audio write failed: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Final render failed: {}", e),
        }

        synth.release();
        sink.release();
        self.shared.set_state(RenderState::Stopped);
        info!(cycles, "render thread stopped");
    }

    /// Releases whatever was brought up and enters `Failed`.
    fn fail(
        &self,
        synth: &mut dyn SynthesisPort,
        sink: Option<&mut dyn AudioSink>,
        reason: String,
    ) {
        error!("Initialization failed: {}", reason);
        synth.release();
        if let Some(sink) = sink {
            sink.release();
        }
        self.shared.fail(reason);
    }

    /// Feeds everything in the mailbox to the synthesizer, in order.
    fn apply_pending(&self, synth: &mut dyn SynthesisPort) {
        for message in self.shared.mailbox.drain_all() {
            match message {
                Message::Midi(event) => {
                    if let Err(e) = synth.feed(event.as_bytes()) {
                        warn!("Dropped {:?}: {}", event, e);
                    }
                }
                Message::Control(control) => apply_control(synth, control),
            }
        }
    }
}

fn apply_control(synth: &mut dyn SynthesisPort, control: Control) {
    let result = match &control {
        Control::SetVolume(volume) => synth.set_volume(*volume),
        Control::SetReverb(preset) => synth.set_reverb_preset(*preset),
        Control::LoadSoundBank(bank) => synth.load_sound_bank(bank),
    };
    match result {
        Ok(()) => debug!(?control, "control applied"),
        Err(e) => warn!("Control {:?} failed: {}", control, e),
    }
}
