//! Opaque event payloads handed to the synthesizer.

use std::fmt;

/// One or more raw protocol messages destined for the synthesizer.
///
/// The bytes are never interpreted by the driver itself. An `Event` is
/// created by a producer thread, moved into the mailbox, and consumed exactly
/// once by the render thread.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Event(Box<[u8]>);

impl Event {
    /// Creates an event from raw bytes.
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// Builds a note-on message.
    ///
    /// # Arguments
    ///
    /// * `channel` - MIDI channel (0-15)
    /// * `note` - MIDI note number (0-127)
    /// * `velocity` - Note velocity (0-127)
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new([0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F])
    }

    /// Builds a note-off message.
    pub fn note_off(channel: u8, note: u8) -> Self {
        Self::new([0x80 | (channel & 0x0F), note & 0x7F, 0])
    }

    /// Builds a program change message.
    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::new([0xC0 | (channel & 0x0F), program & 0x7F])
    }

    /// Builds a control change message.
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::new([0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F])
    }

    /// Returns the raw bytes of this event.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes in the event.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the event carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Event {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }
}

impl From<&[u8]> for Event {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }
}

impl<const N: usize> From<[u8; N]> for Event {
    fn from(bytes: [u8; N]) -> Self {
        Self(Box::new(bytes))
    }
}

impl AsRef<[u8]> for Event {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event(")?;
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        assert_eq!(Event::note_on(0, 60, 100).as_bytes(), &[0x90, 60, 100]);
        assert_eq!(Event::note_off(9, 36).as_bytes(), &[0x89, 36, 0]);
        assert_eq!(Event::program_change(1, 19).as_bytes(), &[0xC1, 19]);
        assert_eq!(Event::control_change(2, 7, 127).as_bytes(), &[0xB2, 7, 127]);
    }

    #[test]
    fn test_builders_mask_out_of_range() {
        // Channel and data bytes are masked to their valid widths
        assert_eq!(Event::note_on(17, 200, 255).as_bytes(), &[0x91, 72, 127]);
    }

    #[test]
    fn test_conversions() {
        let from_vec: Event = vec![0x90, 60, 64].into();
        let from_array: Event = [0x90, 60, 64].into();
        let from_slice: Event = (&[0x90u8, 60, 64][..]).into();
        assert_eq!(from_vec, from_array);
        assert_eq!(from_array, from_slice);
        assert_eq!(from_vec.len(), 3);
        assert!(!from_vec.is_empty());
    }

    #[test]
    fn test_debug_is_hex() {
        assert_eq!(format!("{:?}", Event::note_on(0, 60, 100)), "Event(90 3C 64)");
    }
}
