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
use std::{fmt, time::Duration};

use tracing::{info, trace};

use crate::pitch::Pitch;

/// An engine that only logs what it's asked to play.
#[derive(Default)]
pub struct Engine {}

impl Engine {
    pub fn new() -> Engine {
        Engine {}
    }
}

impl super::Engine for Engine {
    fn start_pitch(&self, pitch: Pitch, velocity: f32) {
        info!(
            pitch = %pitch,
            frequency = format!("{:.2}", pitch.frequency()),
            velocity,
            "Start pitch"
        );
    }

    fn stop_pitches(&self, pitches: &[Pitch]) {
        info!(
            pitches = pitches
                .iter()
                .map(|pitch| pitch.to_string())
                .collect::<Vec<String>>()
                .join(","),
            "Stop pitches"
        );
    }

    fn set_gain(&self, decibels: f64, ramp: Duration) {
        // Called every tick, so keep it out of the default log level.
        trace!(decibels, ramp = ?ramp, "Set gain");
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Log")
    }
}
