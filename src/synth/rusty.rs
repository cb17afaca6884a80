//! SoundFont synthesis through rustysynth.

use super::SynthesisPort;
use crate::config::{Config, DriverSettings};
use crate::error::SynthError;
use crate::midi::{split_messages, RawMessage, ReverbPreset, CHANNEL_COUNT};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// rustysynth always renders stereo.
const CHANNELS: usize = 2;

/// Control change number for the reverb send level.
const CC_REVERB_SEND: i32 = 91;

/// Reverb send level applied to every channel for a preset.
fn reverb_send_level(preset: ReverbPreset) -> i32 {
    match preset {
        ReverbPreset::Off => 0,
        ReverbPreset::Room => 24,
        ReverbPreset::Chamber => 40,
        ReverbPreset::Hall => 64,
        ReverbPreset::LargeHall => 96,
    }
}

/// Maps a 0-100 volume onto rustysynth's master volume.
fn master_volume(volume: u8) -> f32 {
    volume.min(100) as f32 / 100.0
}

/// Converts a float sample to 16-bit PCM.
fn to_pcm(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// A [`SynthesisPort`] backed by a rustysynth [`Synthesizer`].
///
/// The SoundFont is shared; the synthesizer itself is built in
/// `initialize` and dropped in `release`.
pub struct RustySynthPort {
    sound_font: Arc<SoundFont>,
    settings: DriverSettings,
    synth: Option<Synthesizer>,
    /// Per-channel scratch buffers, one host buffer long.
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
    volume: u8,
    reverb: ReverbPreset,
}

impl RustySynthPort {
    /// Creates a port for an already loaded SoundFont.
    pub fn new(sound_font: Arc<SoundFont>, settings: DriverSettings) -> Self {
        let volume = settings.volume;
        let reverb = settings.reverb;
        Self {
            sound_font,
            settings,
            synth: None,
            left_buf: Vec::new(),
            right_buf: Vec::new(),
            volume,
            reverb,
        }
    }

    /// Loads a SoundFont file for sharing between ports.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or is not a valid SoundFont
    pub fn load_sound_font<P: AsRef<Path>>(path: P) -> Result<Arc<SoundFont>, SynthError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SynthError::SoundBank(format!("{}: {}", path.display(), e)))?;
        let mut reader = BufReader::new(file);
        let sound_font = SoundFont::new(&mut reader)
            .map_err(|e| SynthError::SoundBank(format!("{}: {:?}", path.display(), e)))?;
        Ok(Arc::new(sound_font))
    }

    fn build_synth(&self, sound_font: &Arc<SoundFont>) -> Result<Synthesizer, SynthError> {
        let mut settings = SynthesizerSettings::new(self.settings.sample_rate as i32);
        settings.block_size = self.settings.block_size;
        settings.maximum_polyphony = self.settings.max_voices;
        settings.enable_reverb_and_chorus = true;
        Synthesizer::new(sound_font, &settings).map_err(|e| SynthError::Create(format!("{:?}", e)))
    }

    fn synth_mut(&mut self) -> Result<&mut Synthesizer, SynthError> {
        self.synth.as_mut().ok_or(SynthError::NotInitialized)
    }

    /// Re-applies volume and reverb, e.g. after the synthesizer was rebuilt.
    fn apply_settings(&mut self) -> Result<(), SynthError> {
        let volume = self.volume;
        let reverb = self.reverb;
        self.set_volume(volume)?;
        self.set_reverb_preset(reverb)
    }
}

impl SynthesisPort for RustySynthPort {
    fn initialize(&mut self) -> Result<usize, SynthError> {
        let synth = self.build_synth(&self.sound_font)?;
        self.synth = Some(synth);

        let frames = self.settings.frames_per_render();
        self.left_buf = vec![0.0; frames];
        self.right_buf = vec![0.0; frames];
        self.apply_settings()?;

        debug!(
            frames,
            sample_rate = self.settings.sample_rate,
            "rustysynth initialized"
        );
        Ok(frames * CHANNELS)
    }

    fn configure(&self) -> Config {
        Config {
            max_voices: self.settings.max_voices as u32,
            num_channels: CHANNELS as u32,
            sample_rate: self.settings.sample_rate,
            buffer_frame_count: self.settings.block_size as u32,
        }
    }

    fn feed(&mut self, event: &[u8]) -> Result<(), SynthError> {
        let synth = self.synth_mut()?;
        let mut applied = 0;

        for message in split_messages(event) {
            match message {
                RawMessage::Channel {
                    command,
                    channel,
                    data1,
                    data2,
                } => {
                    synth.process_midi_message(
                        channel as i32,
                        command as i32,
                        data1 as i32,
                        data2 as i32,
                    );
                    applied += 1;
                }
                RawMessage::System(bytes) => {
                    trace!(len = bytes.len(), "ignoring system message");
                }
            }
        }

        if applied == 0 {
            return Err(SynthError::InvalidEvent(format!(
                "no channel message in {} bytes",
                event.len()
            )));
        }
        Ok(())
    }

    fn render(&mut self, buffer: &mut [i16]) -> Result<usize, SynthError> {
        let frames = (buffer.len() / CHANNELS).min(self.left_buf.len());
        let synth = self.synth.as_mut().ok_or(SynthError::NotInitialized)?;

        synth.render(&mut self.left_buf[..frames], &mut self.right_buf[..frames]);

        // Interleave stereo samples: L, R, L, R, ...
        for (i, frame) in buffer.chunks_exact_mut(CHANNELS).take(frames).enumerate() {
            frame[0] = to_pcm(self.left_buf[i]);
            frame[1] = to_pcm(self.right_buf[i]);
        }

        Ok(frames)
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), SynthError> {
        if volume > 100 {
            return Err(SynthError::InvalidArgument(format!(
                "volume {} exceeds 100",
                volume
            )));
        }
        self.synth_mut()?.set_master_volume(master_volume(volume));
        self.volume = volume;
        Ok(())
    }

    fn set_reverb_preset(&mut self, preset: ReverbPreset) -> Result<(), SynthError> {
        let level = reverb_send_level(preset);
        let synth = self.synth_mut()?;
        for channel in 0..CHANNEL_COUNT {
            synth.process_midi_message(channel as i32, 0xB0, CC_REVERB_SEND, level);
        }
        self.reverb = preset;
        Ok(())
    }

    fn load_sound_bank(&mut self, bank: &[u8]) -> Result<(), SynthError> {
        if self.synth.is_none() {
            return Err(SynthError::NotInitialized);
        }

        let mut reader = Cursor::new(bank);
        let sound_font = Arc::new(
            SoundFont::new(&mut reader).map_err(|e| SynthError::SoundBank(format!("{:?}", e)))?,
        );

        // Voices do not survive a bank swap; the synthesizer is rebuilt
        let synth = self.build_synth(&sound_font)?;
        self.sound_font = sound_font;
        self.synth = Some(synth);
        self.apply_settings()?;

        debug!(bytes = bank.len(), "sound bank replaced");
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut synth) = self.synth.take() {
            synth.note_off_all(true);
        }
        self.left_buf = Vec::new();
        self.right_buf = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_reverb_levels_increase_with_room_size() {
        let off = reverb_send_level(ReverbPreset::Off);
        let room = reverb_send_level(ReverbPreset::Room);
        let chamber = reverb_send_level(ReverbPreset::Chamber);
        let hall = reverb_send_level(ReverbPreset::Hall);
        let large_hall = reverb_send_level(ReverbPreset::LargeHall);
        assert_eq!(off, 0);
        assert!(off < room && room < chamber && chamber < hall && hall < large_hall);
        assert!(large_hall <= 127);
    }

    #[test]
    fn test_master_volume_mapping() {
        assert_eq!(master_volume(0), 0.0);
        assert_eq!(master_volume(50), 0.5);
        assert_eq!(master_volume(100), 1.0);
    }

    #[test]
    fn test_to_pcm_clamps() {
        assert_eq!(to_pcm(0.0), 0);
        assert_eq!(to_pcm(1.0), 32767);
        assert_eq!(to_pcm(2.0), 32767);
        assert_eq!(to_pcm(-2.0), -32768);
    }

    #[test]
    #[ignore] // Requires SoundFont file
    fn test_render_with_soundfont() {
        let sound_font =
            RustySynthPort::load_sound_font(PathBuf::from("assets/TimGM6mb.sf2")).unwrap();
        let settings = DriverSettings::default();
        let mut port = RustySynthPort::new(sound_font, settings.clone());

        let len = port.initialize().unwrap();
        assert_eq!(len, settings.frames_per_render() * 2);
        assert_eq!(port.configure().num_channels, 2);

        port.feed(&[0x90, 60, 100]).unwrap();
        assert!(port.feed(&[0xF8]).is_err());

        let mut buffer = vec![0i16; len];
        assert_eq!(port.render(&mut buffer).unwrap(), settings.frames_per_render());
        assert!(buffer.iter().any(|&s| s != 0));

        assert!(port.set_volume(101).is_err());
        port.set_volume(40).unwrap();
        port.set_reverb_preset(ReverbPreset::Off).unwrap();

        port.release();
        assert!(matches!(
            port.render(&mut buffer),
            Err(SynthError::NotInitialized)
        ));
    }
}
