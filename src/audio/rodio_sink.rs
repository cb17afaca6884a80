//! Real-time output to the default device through rodio.

use super::{AudioSink, SinkSpec, BYTES_PER_SAMPLE};
use crate::error::SinkError;
use crossbeam_channel::{bounded, Receiver, Sender};
use rodio::buffer::SamplesBuffer;
use rodio::source::EmptyCallback;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, info};

/// An [`AudioSink`] playing through the system's default output device.
///
/// Each write appends one buffer to a rodio [`Sink`] followed by a callback
/// that fires once the buffer has been played. A bounded channel of
/// `queue_depth` credits makes `write` block while that many buffers are
/// still queued, which paces the render loop to real time.
pub struct RodioSink {
    queue_depth: usize,
    spec: Option<SinkSpec>,
    /// Audio output stream (must be kept alive while playing).
    stream: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    credits: Option<(Sender<()>, Receiver<()>)>,
}

impl RodioSink {
    /// Creates an unopened sink allowing `queue_depth` buffers in flight.
    pub fn new(queue_depth: usize) -> Self {
        Self {
            queue_depth: queue_depth.max(1),
            spec: None,
            stream: None,
            sink: None,
            credits: None,
        }
    }
}

impl AudioSink for RodioSink {
    fn open(&mut self, spec: &SinkSpec) -> Result<(), SinkError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| SinkError::Open(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| SinkError::Open(e.to_string()))?;

        // Hold playback until start()
        sink.pause();

        self.stream = Some((stream, handle));
        self.sink = Some(sink);
        self.credits = Some(bounded(self.queue_depth));
        self.spec = Some(*spec);

        info!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            buffer_bytes = spec.buffer_bytes,
            "audio output opened"
        );
        Ok(())
    }

    fn start(&mut self) -> Result<(), SinkError> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| SinkError::Start("output not open".to_string()))?;
        sink.play();
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize, SinkError> {
        let (Some(spec), Some(sink), Some((sender, receiver))) =
            (self.spec.as_ref(), self.sink.as_ref(), self.credits.as_ref())
        else {
            return Err(SinkError::Closed);
        };

        // Blocks while queue_depth buffers are still waiting to be played
        sender
            .send(())
            .map_err(|e| SinkError::Write(e.to_string()))?;

        sink.append(SamplesBuffer::new(
            spec.channels,
            spec.sample_rate,
            samples.to_vec(),
        ));

        let receiver = receiver.clone();
        sink.append(EmptyCallback::<i16>::new(Box::new(move || {
            let _ = receiver.try_recv();
        })));

        Ok(samples.len() * BYTES_PER_SAMPLE)
    }

    /// Blocks until every queued buffer has been played, then closes the
    /// device. With `queue_depth` buffers in flight this takes up to that
    /// many buffer durations.
    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            // A paused sink never drains
            if !sink.is_paused() {
                sink.sleep_until_end();
            }
            sink.stop();
            debug!("audio output released");
        }
        self.credits = None;
        self.stream = None;
        self.spec = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_unopened_sink_rejects_writes() {
        let mut sink = RodioSink::new(0);
        assert_eq!(sink.queue_depth, 1);
        assert!(matches!(sink.write(&[0, 0]), Err(SinkError::Closed)));
        assert!(sink.start().is_err());
        sink.release();
    }

    #[test]
    #[ignore] // Requires audio output device
    fn test_release_plays_queued_tail() {
        let spec = SinkSpec {
            sample_rate: 22050,
            channels: 2,
            buffer_bytes: 2205 * 2 * BYTES_PER_SAMPLE,
        };
        let mut sink = RodioSink::new(2);
        sink.open(&spec).unwrap();
        sink.start().unwrap();

        // 100 ms of audio still queued when release is called
        let started = Instant::now();
        sink.write(&vec![0i16; 2205 * 2]).unwrap();
        sink.release();
        assert!(started.elapsed() >= Duration::from_millis(90));
    }
}
