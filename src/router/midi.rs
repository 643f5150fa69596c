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
use std::{io, sync::Arc};

use midly::{live::LiveEvent, MidiMessage};
use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tracing::{debug, error, info, span, Instrument, Level};

use super::Event;
use crate::midi::Device;

/// Decodes raw MIDI bytes into a note event. Only note on and note off are used,
/// and a note on with zero velocity counts as a note off.
pub fn decode(raw: &[u8], offset: i32) -> Option<Event> {
    let event = match LiveEvent::parse(raw) {
        Ok(event) => event,
        Err(e) => {
            debug!(err = format!("{:?}", e), "Unparseable MIDI input");
            return None;
        }
    };

    let LiveEvent::Midi { message, .. } = event else {
        return None;
    };
    match message {
        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => Some(Event::Press {
            index: i32::from(key.as_int()).saturating_sub(offset),
            velocity: Some(f32::from(vel.as_int()) / 127.0),
        }),
        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
            Some(Event::Release {
                index: i32::from(key.as_int()).saturating_sub(offset),
            })
        }
        _ => None,
    }
}

/// A source that plays the instrument from a MIDI input device.
pub struct Midi {
    device: Arc<dyn Device>,
    /// Subtracted from MIDI note numbers to get key indices.
    offset: i32,
}

impl Midi {
    pub fn new(device: Arc<dyn Device>, offset: i32) -> Midi {
        Midi { device, offset }
    }
}

impl super::Source for Midi {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<Vec<u8>>(64);
        let device = self.device.clone();
        let offset = self.offset;

        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "MIDI source");
            let _enter = span.enter();

            info!(device = device.name(), "MIDI source started.");

            // On failure the sender is dropped and the source goes quiet.
            if let Err(e) = device.watch_events(midi_events_tx) {
                error!(err = e.to_string(), "Error watching MIDI events");
            }
        });

        let device = self.device.clone();
        tokio::spawn(
            async move {
                loop {
                    let raw_event = match midi_events_rx.recv().await {
                        Some(raw_event) => raw_event,
                        None => {
                            info!("MIDI watcher closed.");
                            device.stop_watch_events();
                            return Ok(());
                        }
                    };

                    if let Some(event) = decode(&raw_event, offset) {
                        if events_tx.send(event).await.is_err() {
                            device.stop_watch_events();
                            return Ok(());
                        }
                    }
                }
            }
            .instrument(span!(Level::INFO, "MIDI events")),
        )
    }
}
