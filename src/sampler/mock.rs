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
use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::pitch::Pitch;

/// A command received by the mock engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start { pitch: Pitch, velocity: f32 },
    Stop { pitches: Vec<Pitch> },
    Gain { decibels: f64, ramp: Duration },
}

/// A mock engine. Doesn't play anything, records every command in order.
#[derive(Clone, Default)]
pub struct Engine {
    commands: Arc<Mutex<Vec<Command>>>,
}

impl Engine {
    pub fn new() -> Engine {
        Engine::default()
    }

    /// Every note command received so far. Gain commands are left out.
    pub fn commands(&self) -> Vec<Command> {
        self.commands
            .lock()
            .iter()
            .filter(|command| !matches!(command, Command::Gain { .. }))
            .cloned()
            .collect()
    }

    /// The pitches started so far, in order.
    pub fn starts(&self) -> Vec<Pitch> {
        self.commands
            .lock()
            .iter()
            .filter_map(|command| match command {
                Command::Start { pitch, .. } => Some(*pitch),
                _ => None,
            })
            .collect()
    }

    /// The stop commands received so far, in order.
    pub fn stops(&self) -> Vec<Vec<Pitch>> {
        self.commands
            .lock()
            .iter()
            .filter_map(|command| match command {
                Command::Stop { pitches } => Some(pitches.clone()),
                _ => None,
            })
            .collect()
    }

    /// The most recent gain, if any was set.
    pub fn last_gain(&self) -> Option<f64> {
        self.commands
            .lock()
            .iter()
            .rev()
            .find_map(|command| match command {
                Command::Gain { decibels, .. } => Some(*decibels),
                _ => None,
            })
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

impl super::Engine for Engine {
    fn start_pitch(&self, pitch: Pitch, velocity: f32) {
        self.commands.lock().push(Command::Start { pitch, velocity });
    }

    fn stop_pitches(&self, pitches: &[Pitch]) {
        self.commands.lock().push(Command::Stop {
            pitches: pitches.to_vec(),
        });
    }

    fn set_gain(&self, decibels: f64, ramp: Duration) {
        self.commands.lock().push(Command::Gain { decibels, ramp });
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mock")
    }
}
