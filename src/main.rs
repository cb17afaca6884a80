//! mididriver - plays notes through the MIDI driver.
//!
//! Loads a SoundFont, starts the driver, plays the given notes as a chord
//! and then an arpeggio, and stops. Audio goes to the default output device,
//! or to a WAV file with `--wav`.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --soundfont piano.sf2 C4 E4 G4
//! cargo run -- -sf piano.sf2 --wav out.wav --reverb hall
//! RUST_LOG=mididriver=debug cargo run -- -sf piano.sf2
//! ```

use anyhow::{bail, Context, Result};
use crossbeam_channel::bounded;
use mididriver::midi::{name_to_note, note_to_name};
use mididriver::{
    AudioSink, DriverSettings, Event, MidiDriver, ReverbPreset, RustySynthPort, SynthesisPort,
    WavSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Notes played when none are given.
const DEFAULT_NOTES: [&str; 3] = ["C4", "E4", "G4"];

/// Velocity for every note played.
const VELOCITY: u8 = 100;

/// How long to wait for the driver to start streaming.
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line options for the application.
struct CliOptions {
    /// SoundFont used for synthesis.
    soundfont: PathBuf,
    /// Write audio to this WAV file instead of the output device.
    wav: Option<PathBuf>,
    /// JSON settings file.
    config: Option<PathBuf>,
    /// Total playing time in seconds.
    seconds: f32,
    volume: Option<u8>,
    reverb: Option<ReverbPreset>,
    /// MIDI note numbers to play.
    notes: Vec<u8>,
}

fn print_help(program: &str) {
    eprintln!("mididriver - Play notes through a SoundFont synthesizer");
    eprintln!();
    eprintln!("Usage: {} --soundfont PATH [OPTIONS] [NOTES...]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -sf, --soundfont PATH  SoundFont file (.sf2) to synthesize with");
    eprintln!("  -w, --wav PATH         Write to a WAV file instead of the audio device");
    eprintln!("  -c, --config PATH      JSON driver settings");
    eprintln!("  -s, --seconds N        Playing time in seconds (default 3)");
    eprintln!("  -v, --volume N         Master volume 0-100");
    eprintln!("  -r, --reverb NAME      off, large_hall, hall, chamber or room");
    eprintln!("  -h, --help             Print this help message");
    eprintln!();
    eprintln!("Notes are names like C4 or F#5 (default: C4 E4 G4).");
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let program = args.first().map(String::as_str).unwrap_or("mididriver");

        let mut soundfont: Option<PathBuf> = None;
        let mut wav = None;
        let mut config = None;
        let mut seconds: f32 = 3.0;
        let mut volume = None;
        let mut reverb = None;
        let mut notes = Vec::new();

        let mut i = 1;
        while i < args.len() {
            let arg = args[i].as_str();
            let mut value = || -> Result<String> {
                i += 1;
                args.get(i)
                    .cloned()
                    .with_context(|| format!("{} requires an argument", arg))
            };

            match arg {
                "--soundfont" | "-sf" => soundfont = Some(PathBuf::from(value()?)),
                "--wav" | "-w" => wav = Some(PathBuf::from(value()?)),
                "--config" | "-c" => config = Some(PathBuf::from(value()?)),
                "--seconds" | "-s" => {
                    seconds = value()?.parse().context("--seconds expects a number")?;
                }
                "--volume" | "-v" => {
                    let v: u8 = value()?.parse().context("--volume expects 0-100")?;
                    if v > 100 {
                        bail!("--volume expects 0-100, got {}", v);
                    }
                    volume = Some(v);
                }
                "--reverb" | "-r" => {
                    reverb = Some(value()?.parse::<ReverbPreset>().map_err(anyhow::Error::msg)?);
                }
                "--help" | "-h" => {
                    print_help(program);
                    std::process::exit(0);
                }
                other if other.ends_with(".sf2") && soundfont.is_none() => {
                    soundfont = Some(PathBuf::from(other));
                }
                other => match name_to_note(other) {
                    Some(note) => notes.push(note),
                    None => {
                        eprintln!("Unknown option or note: {}", other);
                        eprintln!("Use --help for usage information");
                        std::process::exit(1);
                    }
                },
            }
            i += 1;
        }

        let Some(soundfont) = soundfont else {
            print_help(program);
            bail!("a SoundFont is required");
        };

        if notes.is_empty() {
            notes = DEFAULT_NOTES.iter().filter_map(|n| name_to_note(n)).collect();
        }

        Ok(Self {
            soundfont,
            wav,
            config,
            seconds: seconds.max(0.5),
            volume,
            reverb,
            notes,
        })
    }
}

/// Builds the driver for the chosen output.
fn build_driver(cli: &CliOptions, settings: DriverSettings) -> Result<MidiDriver> {
    let sound_font = RustySynthPort::load_sound_font(&cli.soundfont)
        .with_context(|| format!("Failed to load SoundFont: {}", cli.soundfont.display()))?;

    let driver = match &cli.wav {
        None => MidiDriver::with_sound_font(sound_font, settings),
        Some(path) => {
            let path = path.clone();
            let max_frames = (cli.seconds * settings.sample_rate as f32) as u64;
            let synth_settings = settings.clone();
            MidiDriver::new(
                move || {
                    Box::new(RustySynthPort::new(
                        Arc::clone(&sound_font),
                        synth_settings.clone(),
                    )) as Box<dyn SynthesisPort>
                },
                move || {
                    Box::new(
                        WavSink::new(&path)
                            .with_max_frames(max_frames)
                            .with_realtime_pacing(),
                    ) as Box<dyn AudioSink>
                },
            )
        }
    };

    Ok(driver)
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    // Initialize logging (RUST_LOG controls verbosity)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut settings = match &cli.config {
        Some(path) => DriverSettings::load_from_file(path)
            .with_context(|| format!("Failed to load settings: {}", path.display()))?,
        None => DriverSettings::default(),
    };
    if let Some(volume) = cli.volume {
        settings.volume = volume;
    }
    if let Some(reverb) = cli.reverb {
        settings.reverb = reverb;
    }

    let (ready_tx, ready_rx) = bounded(1);
    let driver = build_driver(&cli, settings)?.with_start_listener(move || {
        let _ = ready_tx.try_send(());
    });

    // Queued before start; fed ahead of the first buffer
    driver.submit_event(Event::program_change(0, 0));

    driver.start().context("Failed to start driver")?;
    if ready_rx.recv_timeout(READY_TIMEOUT).is_err() {
        driver.stop();
        match driver.query_config() {
            Err(e) => bail!("Driver did not start: {}", e),
            Ok(_) => bail!("Driver did not start within {:?}", READY_TIMEOUT),
        }
    }

    let config = driver.query_config()?;
    tracing::info!(
        "Streaming: {} voices, {} channels, {} Hz, {} frames per block",
        config.max_voices,
        config.num_channels,
        config.sample_rate,
        config.buffer_frame_count
    );

    let names: Vec<String> = cli.notes.iter().map(|&n| note_to_name(n)).collect();
    eprintln!("Playing {}", names.join(" "));

    // Half the time as a chord, half as an arpeggio
    let half = Duration::from_secs_f32(cli.seconds / 2.0);
    for &note in &cli.notes {
        driver.submit_event(Event::note_on(0, note, VELOCITY));
    }
    thread::sleep(half);
    for &note in &cli.notes {
        driver.submit_event(Event::note_off(0, note));
    }

    let step = half / cli.notes.len() as u32;
    for &note in &cli.notes {
        if !driver.is_streaming() {
            break;
        }
        driver.submit_event(Event::note_on(0, note, VELOCITY));
        thread::sleep(step);
        driver.submit_event(Event::note_off(0, note));
    }

    driver.stop();
    tracing::info!("Driver finished in state {:?}", driver.state());
    if let Some(path) = &cli.wav {
        eprintln!("Wrote {}", path.display());
    }

    Ok(())
}
