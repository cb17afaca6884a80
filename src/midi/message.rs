//! Splitting raw event bytes into individual protocol messages.
//!
//! An event may carry several messages back to back, and may use running
//! status (repeated data bytes after a single status byte). Adapters that
//! dispatch per message use [`split_messages`] to walk them.

/// A single message found in an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawMessage<'a> {
    /// A channel voice message.
    Channel {
        /// Status nibble (0x80, 0x90, ..., 0xE0).
        command: u8,
        /// Channel (0-15).
        channel: u8,
        data1: u8,
        data2: u8,
    },
    /// A system message (0xF0-0xFF), including sysex with its terminator.
    System(&'a [u8]),
}

/// Number of data bytes following a channel status byte.
fn channel_data_len(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 1,
        _ => 2,
    }
}

/// Number of data bytes following a system common status byte.
fn system_data_len(status: u8) -> usize {
    match status {
        0xF1 | 0xF3 => 1,
        0xF2 => 2,
        _ => 0,
    }
}

/// Splits raw bytes into messages.
///
/// Stray data bytes with no status in effect are skipped, as are truncated
/// trailing messages. Sysex runs until `0xF7` or the end of the input.
///
/// # Examples
///
/// ```
/// use mididriver::midi::{split_messages, RawMessage};
///
/// // Two note-ons, the second using running status
/// let messages = split_messages(&[0x90, 60, 100, 64, 100]);
/// assert_eq!(messages.len(), 2);
/// assert!(matches!(messages[1], RawMessage::Channel { data1: 64, .. }));
/// ```
pub fn split_messages(bytes: &[u8]) -> Vec<RawMessage<'_>> {
    let mut messages = Vec::new();
    let mut running_status: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];

        if byte >= 0xF8 {
            // Real-time messages may appear anywhere and do not affect running status
            messages.push(RawMessage::System(&bytes[i..i + 1]));
            i += 1;
            continue;
        }

        if byte == 0xF0 {
            let end = bytes[i..]
                .iter()
                .position(|&b| b == 0xF7)
                .map(|p| i + p + 1)
                .unwrap_or(bytes.len());
            messages.push(RawMessage::System(&bytes[i..end]));
            running_status = None;
            i = end;
            continue;
        }

        if byte >= 0xF1 {
            let end = i + 1 + system_data_len(byte);
            if end > bytes.len() {
                break;
            }
            messages.push(RawMessage::System(&bytes[i..end]));
            running_status = None;
            i = end;
            continue;
        }

        let (status, data_start) = if byte & 0x80 != 0 {
            running_status = Some(byte);
            (byte, i + 1)
        } else if let Some(status) = running_status {
            (status, i)
        } else {
            // Data byte with no status in effect
            i += 1;
            continue;
        };

        let data_len = channel_data_len(status);
        let end = data_start + data_len;
        if end > bytes.len() {
            break;
        }

        let data1 = bytes[data_start];
        let data2 = if data_len == 2 { bytes[data_start + 1] } else { 0 };
        messages.push(RawMessage::Channel {
            command: status & 0xF0,
            channel: status & 0x0F,
            data1,
            data2,
        });
        i = end;
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_note_on() {
        let messages = split_messages(&[0x93, 60, 100]);
        assert_eq!(
            messages,
            vec![RawMessage::Channel {
                command: 0x90,
                channel: 3,
                data1: 60,
                data2: 100
            }]
        );
    }

    #[test]
    fn test_multiple_messages() {
        // Program change (2 bytes) followed by a note-on (3 bytes)
        let messages = split_messages(&[0xC0, 19, 0x90, 60, 100]);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            RawMessage::Channel {
                command: 0xC0,
                channel: 0,
                data1: 19,
                data2: 0
            }
        );
    }

    #[test]
    fn test_running_status() {
        let messages = split_messages(&[0x90, 60, 100, 64, 100, 67, 100]);
        assert_eq!(messages.len(), 3);
        for message in messages {
            assert!(matches!(message, RawMessage::Channel { command: 0x90, .. }));
        }
    }

    #[test]
    fn test_sysex_and_realtime() {
        let bytes = [0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7, 0xF8, 0x80, 60, 0];
        let messages = split_messages(&bytes);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], RawMessage::System(&bytes[..6]));
        assert_eq!(messages[1], RawMessage::System(&[0xF8]));
        assert!(matches!(messages[2], RawMessage::Channel { command: 0x80, .. }));
    }

    #[test]
    fn test_sysex_clears_running_status() {
        let messages = split_messages(&[0x90, 60, 100, 0xF0, 0x01, 0xF7, 62, 100]);
        // The trailing data bytes have no status after the sysex
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_truncated_and_stray_bytes() {
        assert!(split_messages(&[60, 100]).is_empty());
        assert!(split_messages(&[0x90, 60]).is_empty());
        assert!(split_messages(&[]).is_empty());
    }
}
