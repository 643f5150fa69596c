// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use harmonium::{
    config, midi, observer,
    pitch::NOTE_NAMES,
    playsync::CancelHandle,
    router::{keyboard::Keyboard, song::Playback, song::Song, Source},
    scale::ScaleSelector,
    session::{self, Session},
};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A harmonium played from the terminal, MIDI, or MIDI files."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays the instrument from the terminal and the configured MIDI input.
    Play {
        /// The path to the instrument config.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// A MIDI file to play along with live input.
        #[arg[short, long]]
        song: Option<PathBuf>,
    },
    /// Plays a MIDI file through the instrument and exits.
    Song {
        /// The path to the MIDI file.
        path: PathBuf,
        /// The path to the instrument config.
        #[arg[short, long]]
        config: Option<PathBuf>,
    },
    /// Lists the available MIDI input/output devices.
    MidiDevices {},
    /// Lists the available scales.
    Scales {
        /// The path to the instrument config.
        #[arg[short, long]]
        config: Option<PathBuf>,
    },
}

/// Runs a session with the given sources until they finish.
async fn run(
    config: &config::Instrument,
    live: bool,
    song_path: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let engine = session::engine(config)?;
    println!("Sampler: {}", engine);
    let session = Session::new(config, engine, Arc::new(observer::Log::default()))?;

    let mut sources: Vec<Arc<dyn Source>> = Vec::new();
    if live {
        sources.push(Arc::new(Keyboard::new()));
        if let Some(source) = session.midi_source()? {
            sources.push(source);
        }
    }

    let cancel_handle = CancelHandle::new();
    if let Some(path) = song_path {
        let song = Song::load(path, session.midi_offset())?;
        println!("Playing {}", song);
        sources.push(Arc::new(Playback::new(
            Arc::new(song),
            cancel_handle.clone(),
        )));
    }

    let ticker = session.start_ticker();
    session.router().run(sources).await;

    cancel_handle.cancel();
    ticker.stop();
    ticker.join().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { config, song } => {
            let config = config::load(config.as_deref())?;
            run(&config, true, song.as_deref()).await?;
        }
        Commands::Song { path, config } => {
            let config = config::load(config.as_deref())?;
            run(&config, false, Some(&path)).await?;
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Scales { config } => {
            let config = config::load(config.as_deref())?;
            let selector = ScaleSelector::new(config.scales());

            println!("Scales (count: {}):", selector.scales().len());
            for scale in selector.scales() {
                let notes: Vec<&str> = (0..12)
                    .filter(|note| scale.contains(*note))
                    .map(|note| NOTE_NAMES[note])
                    .collect();
                println!("- {}: {}", scale, notes.join(" "));
            }
        }
    }

    Ok(())
}
