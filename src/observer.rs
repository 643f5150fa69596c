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

//! Notifications for whatever is presenting the instrument.

use tracing::{debug, info, trace};

use crate::pitch::Shift;

pub trait Observer: Send + Sync {
    /// A key started or stopped sounding.
    fn voice_changed(&self, index: i32, sounding: bool);

    /// The reservoir level changed, in percent.
    fn reservoir_changed(&self, percent: f64);

    /// The active scale or its key mapping changed. The mask is indexed by
    /// key index modulo 12.
    fn scale_changed(&self, name: &str, allowed_by_index: [bool; 12]);

    /// The transposition or octave shift changed.
    fn shift_changed(&self, shift: Shift);
}

/// An observer that logs notifications.
#[derive(Default)]
pub struct Log {}

impl Observer for Log {
    fn voice_changed(&self, index: i32, sounding: bool) {
        debug!(index, sounding, "Voice changed");
    }

    fn reservoir_changed(&self, percent: f64) {
        trace!(percent, "Reservoir changed");
    }

    fn scale_changed(&self, name: &str, allowed_by_index: [bool; 12]) {
        info!(
            scale = name,
            allowed = allowed_by_index
                .iter()
                .map(|allowed| if *allowed { '*' } else { '.' })
                .collect::<String>(),
            "Scale changed"
        );
    }

    fn shift_changed(&self, shift: Shift) {
        info!(
            transpose = format!("{:+}", shift.transpose),
            octave = shift.octave,
            "Shift changed"
        );
    }
}

/// A notification received by the recorder.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Voice { index: i32, sounding: bool },
    Reservoir(f64),
    Scale { name: String, allowed: [bool; 12] },
    Shift(Shift),
}

/// Records notifications for tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct Recorder {
    notifications: std::sync::Arc<parking_lot::Mutex<Vec<Notification>>>,
}

#[cfg(test)]
impl Recorder {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// The voice notifications only.
    pub fn voice_changes(&self) -> Vec<(i32, bool)> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|notification| match notification {
                Notification::Voice { index, sounding } => Some((*index, *sounding)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl Observer for Recorder {
    fn voice_changed(&self, index: i32, sounding: bool) {
        self.notifications
            .lock()
            .push(Notification::Voice { index, sounding });
    }

    fn reservoir_changed(&self, percent: f64) {
        self.notifications
            .lock()
            .push(Notification::Reservoir(percent));
    }

    fn scale_changed(&self, name: &str, allowed_by_index: [bool; 12]) {
        self.notifications.lock().push(Notification::Scale {
            name: name.to_string(),
            allowed: allowed_by_index,
        });
    }

    fn shift_changed(&self, shift: Shift) {
        self.notifications.lock().push(Notification::Shift(shift));
    }
}
