//! The mailbox between producer threads and the render thread.
//!
//! Producers append under a short mutex-guarded critical section; the render
//! thread swaps the whole pending sequence out once per cycle.

use crate::midi::{Event, ReverbPreset};
use std::sync::{Arc, Mutex, MutexGuard};

/// A synthesizer setting change applied on the render thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Master volume, 0-100.
    SetVolume(u8),
    SetReverb(ReverbPreset),
    /// Raw sound bank bytes.
    LoadSoundBank(Arc<[u8]>),
}

/// An entry in the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Event bytes to feed to the synthesizer.
    Midi(Event),
    Control(Control),
}

/// Ordered, unbounded staging area shared by all producers and one consumer.
#[derive(Debug, Default)]
pub struct EventMailbox {
    pending: Mutex<Vec<Message>>,
}

impl EventMailbox {
    /// Creates an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    // A producer that panicked mid-push cannot leave the Vec half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends an event to the tail. Callable from any thread at any time.
    pub fn submit(&self, event: Event) {
        self.lock().push(Message::Midi(event));
    }

    /// Appends a control request to the tail, ordered with events.
    pub fn submit_control(&self, control: Control) {
        self.lock().push(Message::Control(control));
    }

    /// Removes and returns everything pending, in submission order.
    pub fn drain_all(&self) -> Vec<Message> {
        std::mem::take(&mut *self.lock())
    }

    /// Drops everything pending. Returns how many entries were discarded.
    pub fn clear(&self) -> usize {
        let mut pending = self.lock();
        let count = pending.len();
        pending.clear();
        count
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_drain_is_fifo_and_empties() {
        let mailbox = EventMailbox::new();
        mailbox.submit(Event::note_on(0, 60, 100));
        mailbox.submit_control(Control::SetVolume(50));
        mailbox.submit(Event::note_off(0, 60));

        let drained = mailbox.drain_all();
        assert_eq!(
            drained,
            vec![
                Message::Midi(Event::note_on(0, 60, 100)),
                Message::Control(Control::SetVolume(50)),
                Message::Midi(Event::note_off(0, 60)),
            ]
        );
        assert!(mailbox.is_empty());
        assert!(mailbox.drain_all().is_empty());
    }

    #[test]
    fn test_clear() {
        let mailbox = EventMailbox::new();
        mailbox.submit(Event::note_on(0, 60, 100));
        mailbox.submit(Event::note_on(0, 64, 100));
        assert_eq!(mailbox.len(), 2);
        assert_eq!(mailbox.clear(), 2);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        const PRODUCERS: u8 = 4;
        const PER_PRODUCER: u8 = 100;

        let mailbox = Arc::new(EventMailbox::new());
        let mut drained = Vec::new();

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let mailbox = Arc::clone(&mailbox);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        mailbox.submit(Event::new([producer, i]));
                    }
                })
            })
            .collect();

        // Drain while producers are still running
        while drained.len() < (PRODUCERS as usize * PER_PRODUCER as usize) {
            drained.extend(mailbox.drain_all());
            thread::yield_now();
        }
        for handle in handles {
            handle.join().unwrap();
        }
        drained.extend(mailbox.drain_all());

        let events: Vec<Vec<u8>> = drained
            .into_iter()
            .map(|m| match m {
                Message::Midi(e) => e.as_bytes().to_vec(),
                Message::Control(_) => unreachable!(),
            })
            .collect();

        // No duplicates, nothing missing
        let unique: HashSet<_> = events.iter().cloned().collect();
        assert_eq!(unique.len(), events.len());
        assert_eq!(events.len(), PRODUCERS as usize * PER_PRODUCER as usize);

        // Each producer's events stay in submission order
        for producer in 0..PRODUCERS {
            let order: Vec<u8> = events
                .iter()
                .filter(|e| e[0] == producer)
                .map(|e| e[1])
                .collect();
            assert_eq!(order, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }
}
