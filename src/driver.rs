//! The public driver: lifecycle, event submission and synthesizer controls.

use crate::audio::{AudioSink, RodioSink};
use crate::config::{Config, DriverSettings};
use crate::engine::{
    RenderEngine, RenderState, SharedState, SinkFactory, StartListener, SynthFactory,
};
use crate::error::{DriverError, Result};
use crate::mailbox::Control;
use crate::midi::{Event, ReverbPreset};
use crate::synth::{RustySynthPort, SynthesisPort};
use rustysynth::SoundFont;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tracing::{debug, error, info, trace};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A MIDI driver streaming synthesized audio from a background thread.
///
/// Producers on any thread submit events with [`submit_event`]; they are
/// queued and fed to the synthesizer in order by the render thread, which
/// [`start`] spawns and [`stop`] joins. Each `start()` builds fresh ports
/// from the factories given at construction.
///
/// All methods take `&self`, so a driver can be shared behind an [`Arc`].
///
/// [`submit_event`]: MidiDriver::submit_event
/// [`start`]: MidiDriver::start
/// [`stop`]: MidiDriver::stop
pub struct MidiDriver {
    shared: Arc<SharedState>,
    synth_factory: SynthFactory,
    sink_factory: SinkFactory,
    listener: Mutex<Option<StartListener>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MidiDriver {
    /// Creates a stopped driver.
    ///
    /// # Arguments
    ///
    /// * `synth_factory` - Builds the synthesizer port for each cycle
    /// * `sink_factory` - Builds the audio sink for each cycle
    ///
    /// Both factories run on the render thread.
    pub fn new<S, A>(synth_factory: S, sink_factory: A) -> Self
    where
        S: Fn() -> Box<dyn SynthesisPort> + Send + Sync + 'static,
        A: Fn() -> Box<dyn AudioSink> + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(SharedState::new()),
            synth_factory: Arc::new(synth_factory),
            sink_factory: Arc::new(sink_factory),
            listener: Mutex::new(None),
            thread: Mutex::new(None),
        }
    }

    /// Creates a driver synthesizing with rustysynth and playing through
    /// the default output device.
    pub fn with_sound_font(sound_font: Arc<SoundFont>, settings: DriverSettings) -> Self {
        let queue_depth = settings.queue_depth;
        Self::new(
            move || {
                Box::new(RustySynthPort::new(Arc::clone(&sound_font), settings.clone()))
                    as Box<dyn SynthesisPort>
            },
            move || Box::new(RodioSink::new(queue_depth)) as Box<dyn AudioSink>,
        )
    }

    /// Sets the listener called when streaming begins, builder style.
    pub fn with_start_listener<F>(self, listener: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_start_listener(listener);
        self
    }

    /// Sets the listener called when streaming begins.
    ///
    /// The listener runs on the render thread, once per successful
    /// `start()`, after the [`Config`] is captured and before the first
    /// buffer is rendered. It takes effect from the next `start()`. It must
    /// not call [`stop`](Self::stop), which would wait on its own thread.
    pub fn set_start_listener<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *lock(&self.listener) = Some(Arc::new(listener));
    }

    /// Removes the start listener.
    pub fn clear_start_listener(&self) {
        *lock(&self.listener) = None;
    }

    /// Starts the render thread.
    ///
    /// Does nothing if the driver is already initializing or streaming.
    /// Never waits for initialization; watch [`state`](Self::state) or the
    /// start listener for the outcome. A cycle that is still stopping on
    /// its own is joined first.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Spawn`] if the thread could not be created.
    pub fn start(&self) -> Result<()> {
        let mut thread = lock(&self.thread);

        let state = self.shared.state();
        if state.is_running() {
            debug!(?state, "start ignored, already running");
            return Ok(());
        }

        if let Some(handle) = thread.take() {
            join_render_thread(handle, &self.shared);
        }

        self.shared.begin_cycle();
        let engine = RenderEngine::new(
            Arc::clone(&self.shared),
            Arc::clone(&self.synth_factory),
            Arc::clone(&self.sink_factory),
            lock(&self.listener).clone(),
        );

        match engine.spawn() {
            Ok(handle) => {
                *thread = Some(handle);
                info!(pending = self.shared.mailbox.len(), "driver starting");
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn render thread: {}", e);
                self.shared.fail(e.to_string());
                Err(DriverError::Spawn(e))
            }
        }
    }

    /// Stops the render thread and waits for it to exit.
    ///
    /// When this returns, both ports have been released and no further
    /// audio will be written. Events submitted before the call are still
    /// fed during the final flush. Releasing the sink lets it play what is
    /// still queued, so with [`RodioSink`] this waits up to `queue_depth`
    /// buffer durations longer. There is no timeout: a synthesizer or sink
    /// call that never returns blocks this forever.
    pub fn stop(&self) {
        let mut thread = lock(&self.thread);
        self.shared.request_stop();
        if let Some(handle) = thread.take() {
            join_render_thread(handle, &self.shared);
            info!(state = ?self.shared.state(), "driver stopped");
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RenderState {
        self.shared.state()
    }

    /// True while audio is being streamed.
    pub fn is_streaming(&self) -> bool {
        self.state() == RenderState::Streaming
    }

    /// Queues an event for the synthesizer. Never blocks on the render
    /// thread; events queued while stopped are delivered on the next start.
    ///
    /// Empty events are discarded.
    pub fn submit_event(&self, event: impl Into<Event>) {
        let event = event.into();
        if event.is_empty() {
            trace!("discarding empty event");
            return;
        }
        self.shared.mailbox.submit(event);
    }

    /// Queues `len` bytes of `bytes` starting at `offset` as one event.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidArgument`] if the range is out of bounds.
    pub fn submit_event_range(&self, bytes: &[u8], offset: usize, len: usize) -> Result<()> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                DriverError::InvalidArgument(format!(
                    "range {}+{} out of bounds for {} bytes",
                    offset,
                    len,
                    bytes.len()
                ))
            })?;
        self.submit_event(&bytes[offset..end]);
        Ok(())
    }

    /// Discards everything queued and not yet fed. Returns the count dropped.
    pub fn clear_pending(&self) -> usize {
        self.shared.mailbox.clear()
    }

    /// Number of queued entries not yet fed.
    pub fn pending(&self) -> usize {
        self.shared.mailbox.len()
    }

    /// Returns the synthesizer configuration of the current cycle.
    ///
    /// # Errors
    ///
    /// - [`DriverError::NotReady`] before the start listener has fired
    /// - [`DriverError::Initialization`] if the current cycle failed
    pub fn query_config(&self) -> Result<Config> {
        if let Some(config) = self.shared.config() {
            return Ok(config);
        }
        match self.shared.failure() {
            Some(reason) if self.state() == RenderState::Failed => {
                Err(DriverError::Initialization(reason))
            }
            _ => Err(DriverError::NotReady),
        }
    }

    fn ensure_streaming(&self) -> Result<()> {
        if self.is_streaming() {
            Ok(())
        } else {
            Err(DriverError::NotReady)
        }
    }

    /// Sets the master volume (0-100). Values above 100 are rejected.
    ///
    /// The change is queued behind any pending events and applied on the
    /// render thread.
    ///
    /// # Errors
    ///
    /// - [`DriverError::InvalidArgument`] for volumes above 100
    /// - [`DriverError::NotReady`] when not streaming
    pub fn set_volume(&self, volume: u8) -> Result<()> {
        if volume > 100 {
            return Err(DriverError::InvalidArgument(format!(
                "volume {} exceeds 100",
                volume
            )));
        }
        self.ensure_streaming()?;
        self.shared.mailbox.submit_control(Control::SetVolume(volume));
        Ok(())
    }

    /// Selects a reverb preset, applied on the render thread.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::NotReady`] when not streaming.
    pub fn set_reverb(&self, preset: ReverbPreset) -> Result<()> {
        self.ensure_streaming()?;
        self.shared.mailbox.submit_control(Control::SetReverb(preset));
        Ok(())
    }

    /// Selects a reverb preset by integer code (-1 = off, 0-3 = presets).
    ///
    /// # Errors
    ///
    /// - [`DriverError::InvalidArgument`] for unknown codes
    /// - [`DriverError::NotReady`] when not streaming
    pub fn set_reverb_code(&self, code: i32) -> Result<()> {
        let preset = ReverbPreset::from_code(code).ok_or_else(|| {
            DriverError::InvalidArgument(format!("unknown reverb preset code {}", code))
        })?;
        self.set_reverb(preset)
    }

    /// Replaces the synthesizer's sound bank with raw bank bytes.
    ///
    /// The bytes are handed to the synthesizer uninterpreted on the render
    /// thread; a bank the synthesizer rejects is logged and ignored.
    ///
    /// # Errors
    ///
    /// - [`DriverError::InvalidArgument`] for an empty bank
    /// - [`DriverError::NotReady`] when not streaming
    pub fn load_sound_bank(&self, bank: impl Into<Arc<[u8]>>) -> Result<()> {
        let bank = bank.into();
        if bank.is_empty() {
            return Err(DriverError::InvalidArgument("empty sound bank".to_string()));
        }
        self.ensure_streaming()?;
        self.shared.mailbox.submit_control(Control::LoadSoundBank(bank));
        Ok(())
    }
}

impl Drop for MidiDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_render_thread(handle: JoinHandle<()>, shared: &SharedState) {
    if handle.join().is_err() {
        error!("Render thread panicked");
        shared.fail("render thread panicked".to_string());
    }
}
