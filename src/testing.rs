//! Journaling stub ports for exercising the render engine without a
//! synthesizer or an audio device.

use crate::audio::{AudioSink, SinkSpec};
use crate::config::Config;
use crate::engine::RENDER_THREAD_NAME;
use crate::error::{SinkError, SynthError};
use crate::midi::ReverbPreset;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::synth::SynthesisPort;

/// Configuration every stub synthesizer reports.
pub(crate) const STUB_CONFIG: Config = Config {
    max_voices: 16,
    num_channels: 2,
    sample_rate: 22050,
    buffer_frame_count: 4096,
};

/// One recorded port call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Initialize,
    Feed(Vec<u8>),
    Render,
    SetVolume(u8),
    SetReverb(ReverbPreset),
    /// Bank length in bytes.
    LoadBank(usize),
    SynthRelease,
    Open(SinkSpec),
    Start,
    /// Samples handed to the sink.
    Write(usize),
    SinkRelease,
    /// The start listener fired.
    Ready,
}

/// Ordered log of calls across both stub ports.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    calls: Mutex<Vec<Call>>,
    off_render_thread: AtomicBool,
}

impl Journal {
    pub(crate) fn record(&self, call: Call) {
        if thread::current().name() != Some(RENDER_THREAD_NAME) {
            self.off_render_thread.store(true, Ordering::SeqCst);
        }
        self.calls.lock().unwrap().push(call);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// True if any port call happened outside the render thread.
    pub(crate) fn touched_off_render_thread(&self) -> bool {
        self.off_render_thread.load(Ordering::SeqCst)
    }
}

/// Stub synthesizer. Clones share the journal and the frame script.
#[derive(Debug, Clone)]
pub(crate) struct StubSynth {
    journal: Arc<Journal>,
    buffer_len: usize,
    /// Frames returned by successive renders; a full buffer once empty.
    frames: Arc<Mutex<VecDeque<usize>>>,
}

impl StubSynth {
    pub(crate) fn new(journal: &Arc<Journal>) -> Self {
        Self {
            journal: Arc::clone(journal),
            buffer_len: (STUB_CONFIG.buffer_frame_count * STUB_CONFIG.num_channels) as usize,
            frames: Arc::default(),
        }
    }

    pub(crate) fn with_buffer_len(mut self, buffer_len: usize) -> Self {
        self.buffer_len = buffer_len;
        self
    }

    pub(crate) fn with_frames(self, frames: &[usize]) -> Self {
        self.frames.lock().unwrap().extend(frames.iter().copied());
        self
    }
}

impl SynthesisPort for StubSynth {
    fn initialize(&mut self) -> Result<usize, SynthError> {
        self.journal.record(Call::Initialize);
        Ok(self.buffer_len)
    }

    fn configure(&self) -> Config {
        STUB_CONFIG
    }

    fn feed(&mut self, event: &[u8]) -> Result<(), SynthError> {
        self.journal.record(Call::Feed(event.to_vec()));
        Ok(())
    }

    fn render(&mut self, buffer: &mut [i16]) -> Result<usize, SynthError> {
        self.journal.record(Call::Render);
        let capacity = buffer.len() / STUB_CONFIG.num_channels as usize;
        let frames = self
            .frames
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(capacity)
            .min(capacity);
        buffer.fill(1);
        Ok(frames)
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), SynthError> {
        self.journal.record(Call::SetVolume(volume));
        Ok(())
    }

    fn set_reverb_preset(&mut self, preset: ReverbPreset) -> Result<(), SynthError> {
        self.journal.record(Call::SetReverb(preset));
        Ok(())
    }

    fn load_sound_bank(&mut self, bank: &[u8]) -> Result<(), SynthError> {
        self.journal.record(Call::LoadBank(bank.len()));
        Ok(())
    }

    fn release(&mut self) {
        self.journal.record(Call::SynthRelease);
    }
}

/// Stub audio sink. Each write sleeps briefly to stand in for device
/// backpressure.
#[derive(Debug, Clone)]
pub(crate) struct StubSink {
    journal: Arc<Journal>,
    fail_open: bool,
    fail_write_at: Option<usize>,
    writes: usize,
}

impl StubSink {
    pub(crate) fn new(journal: &Arc<Journal>) -> Self {
        Self {
            journal: Arc::clone(journal),
            fail_open: false,
            fail_write_at: None,
            writes: 0,
        }
    }

    pub(crate) fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Fails the write with this zero-based index.
    pub(crate) fn failing_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }
}

impl AudioSink for StubSink {
    fn open(&mut self, spec: &SinkSpec) -> Result<(), SinkError> {
        self.journal.record(Call::Open(*spec));
        if self.fail_open {
            return Err(SinkError::Open("stub refused".to_string()));
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), SinkError> {
        self.journal.record(Call::Start);
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize, SinkError> {
        self.journal.record(Call::Write(samples.len()));
        let index = self.writes;
        self.writes += 1;
        if self.fail_write_at == Some(index) {
            return Err(SinkError::Write("stub refused".to_string()));
        }
        thread::sleep(Duration::from_millis(1));
        Ok(samples.len() * 2)
    }

    fn release(&mut self) {
        self.journal.record(Call::SinkRelease);
    }
}
