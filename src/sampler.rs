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

//! The sampling engine that actually makes sound.
//!
//! The instrument only issues named-pitch commands. Commands are fire and
//! forget: an engine that can't honour one (unloaded samples, a pitch outside
//! its range, a dead output) logs and carries on.

use std::{fmt, time::Duration};

use crate::pitch::Pitch;

pub mod log;
pub mod midi;
pub mod mock;

pub trait Engine: fmt::Display + Send + Sync {
    /// Starts sounding the pitch at the given velocity (0.0-1.0).
    fn start_pitch(&self, pitch: Pitch, velocity: f32);

    /// Stops the given pitches. Stopping a pitch that isn't sounding is a no-op.
    fn stop_pitches(&self, pitches: &[Pitch]);

    /// Sets the output gain, ramping to it over the given time.
    fn set_gain(&self, decibels: f64, ramp: Duration);
}
