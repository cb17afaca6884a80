//! MIDI-facing types: events, message splitting, reverb presets and note names.
//!
//! The driver treats events as opaque bytes. The helpers here exist for
//! callers building events and for synthesizer adapters that dispatch one
//! message at a time.

mod event;
mod message;
mod reverb;

pub use event::Event;
pub use message::{split_messages, RawMessage};
pub use reverb::ReverbPreset;

/// Standard MIDI note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Number of MIDI channels.
pub const CHANNEL_COUNT: u8 = 16;

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Examples
///
/// ```
/// use mididriver::midi::note_to_name;
///
/// let name = note_to_name(60); // Middle C
/// assert_eq!(name, "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let note = note.min(127);
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Converts a note name like "C4" or "F#5" to a MIDI note number.
///
/// Returns `None` if the name is malformed or out of the MIDI range.
pub fn name_to_note(name: &str) -> Option<u8> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    // Find where the octave number starts
    let octave_start = name.find(|c: char| c.is_ascii_digit() || c == '-')?;

    let note_part = name[..octave_start].to_ascii_uppercase();
    let octave_part = &name[octave_start..];

    let note_index = NOTE_NAMES.iter().position(|&n| n == note_part)?;
    let octave: i16 = octave_part.parse().ok()?;

    // MIDI note = (octave + 1) * 12 + note_index
    let midi_note = octave
        .checked_add(1)?
        .checked_mul(12)?
        .checked_add(note_index as i16)?;
    if (0..=127).contains(&midi_note) {
        Some(midi_note as u8)
    } else {
        None
    }
}
