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
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, span, Instrument, Level};

use crate::air::AirSupply;
use crate::registry::NoteRegistry;

pub mod keyboard;
pub mod midi;
pub mod song;

/// Instrument events produced by input sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// A key went down. A missing velocity means the default.
    Press { index: i32, velocity: Option<f32> },

    /// A key came up.
    Release { index: i32 },

    /// Moves the transposition by the given number of semitones.
    Transpose(i32),

    /// Sets the octave shift.
    Octave(i32),

    /// Turns a mode on or off.
    Mode(Mode, bool),

    /// Steps through the scale list.
    ScaleStep(i32),

    /// One bellows stroke.
    Pump,

    /// Stops every sounding voice.
    Panic,

    /// Ends the session.
    Quit,
}

/// The toggleable modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Drone,
    Coupler,
    SubOctave,
    Sustain,
    StrictScale,
    ManualAir,
}

/// Something that produces instrument events.
pub trait Source: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Funnels events from every source into the registry and air supply, one at a time.
#[derive(Clone)]
pub struct Router {
    registry: Arc<Mutex<NoteRegistry>>,
    air: Arc<Mutex<AirSupply>>,
}

impl Router {
    pub fn new(registry: Arc<Mutex<NoteRegistry>>, air: Arc<Mutex<AirSupply>>) -> Router {
        Router { registry, air }
    }

    /// Applies a single event.
    pub fn dispatch(&self, event: Event) {
        match event {
            Event::Press { index, velocity } => {
                let outcome = self.registry.lock().press(index, velocity);
                debug!(index, outcome = format!("{:?}", outcome), "Press");
            }
            Event::Release { index } => {
                let outcome = self.registry.lock().release(index);
                debug!(index, outcome = format!("{:?}", outcome), "Release");
            }
            Event::Transpose(delta) => self.registry.lock().transpose_by(delta),
            Event::Octave(octave) => self.registry.lock().set_octave(octave),
            Event::Mode(mode, enabled) => match mode {
                Mode::Drone => self.registry.lock().set_drone(enabled),
                Mode::Coupler => self.registry.lock().set_coupler(enabled),
                Mode::SubOctave => self.registry.lock().set_sub_octave(enabled),
                Mode::Sustain => self.registry.lock().set_sustain(enabled),
                Mode::StrictScale => self.registry.lock().set_strict_scale(enabled),
                Mode::ManualAir => self.air.lock().set_manual(enabled),
            },
            Event::ScaleStep(direction) => self.registry.lock().step_scale(direction),
            Event::Pump => {
                self.air.lock().pump();
            }
            Event::Panic | Event::Quit => self.registry.lock().panic(),
        }
    }

    /// Runs the given sources until one of them asks to quit or all of them
    /// finish. Nothing is left sounding afterwards.
    pub async fn run(&self, sources: Vec<Arc<dyn Source>>) {
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let handles: Vec<JoinHandle<Result<(), io::Error>>> = sources
            .iter()
            .map(|source| source.monitor_events(events_tx.clone()))
            .collect();
        // Only the sources hold senders, so the channel closes once they're all done.
        drop(events_tx);

        async {
            info!(sources = handles.len(), "Router started.");
            while let Some(event) = events_rx.recv().await {
                self.dispatch(event);
                if event == Event::Quit {
                    info!("Quit requested.");
                    return;
                }
            }
            self.dispatch(Event::Panic);
            info!("All sources closed.");
        }
        .instrument(span!(Level::INFO, "router"))
        .await;

        for handle in handles {
            if !handle.is_finished() {
                // Blocking sources can't be aborted and are left to finish on their own.
                handle.abort();
                continue;
            }
            match handle.await {
                Ok(Err(e)) => error!(err = e.to_string(), "Source failed"),
                Err(e) => error!(err = e.to_string(), "Error waiting for source"),
                Ok(Ok(())) => {}
            }
        }
    }
}
