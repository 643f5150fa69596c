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

use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{midi::Device, pitch::Pitch};

/// Channel volume.
const VOLUME_CONTROLLER: u8 = 7;

/// The span of gains mapped onto the volume controller. Anything this far below
/// 0 dB or lower sends a volume of zero.
const GAIN_RANGE_DB: f64 = 60.0;

/// An engine that drives an external sampler or synth over MIDI.
pub struct Engine {
    device: Arc<dyn Device>,
    channel: u4,
    /// The last volume sent, so per-tick gain updates only go out on change.
    last_volume: Mutex<Option<u7>>,
}

impl Engine {
    /// Creates an engine sending on the given zero-based channel.
    pub fn new(device: Arc<dyn Device>, channel: u8) -> Engine {
        Engine {
            device,
            channel: u4::new(channel & 0x0f),
            last_volume: Mutex::new(None),
        }
    }

    fn send(&self, message: MidiMessage) {
        let event = LiveEvent::Midi {
            channel: self.channel,
            message,
        };
        if let Err(e) = self.device.emit(event) {
            error!(
                device = self.device.name(),
                err = e.as_ref(),
                "Failed to send to sampler"
            );
        }
    }
}

/// Maps a gain in dB onto the 0-127 volume controller range.
fn volume_for_gain(decibels: f64) -> u7 {
    let level = ((decibels + GAIN_RANGE_DB) / GAIN_RANGE_DB).clamp(0.0, 1.0);
    u7::new((level * 127.0).round() as u8)
}

/// Maps a 0.0-1.0 velocity onto MIDI velocity. Anything audible is at least 1,
/// since a note on with velocity 0 is a note off.
fn midi_velocity(velocity: f32) -> u7 {
    let velocity = (velocity.clamp(0.0, 1.0) * 127.0).round() as u8;
    u7::new(velocity.max(1))
}

impl super::Engine for Engine {
    fn start_pitch(&self, pitch: Pitch, velocity: f32) {
        match pitch.midi_note() {
            Some(note) => self.send(MidiMessage::NoteOn {
                key: u7::new(note),
                vel: midi_velocity(velocity),
            }),
            None => debug!(pitch = %pitch, "Pitch outside of MIDI range, not starting"),
        }
    }

    fn stop_pitches(&self, pitches: &[Pitch]) {
        for pitch in pitches {
            if let Some(note) = pitch.midi_note() {
                self.send(MidiMessage::NoteOff {
                    key: u7::new(note),
                    vel: u7::new(0),
                });
            }
        }
    }

    fn set_gain(&self, decibels: f64, _ramp: Duration) {
        let volume = volume_for_gain(decibels);
        {
            let mut last_volume = self.last_volume.lock();
            if *last_volume == Some(volume) {
                return;
            }
            *last_volume = Some(volume);
        }
        self.send(MidiMessage::Controller {
            controller: u7::new(VOLUME_CONTROLLER),
            value: volume,
        });
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MIDI ({}, channel {})", self.device, self.channel.as_int() + 1)
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use crate::{midi::mock, pitch::Pitch, sampler::Engine as _};

    use super::*;

    fn engine() -> (mock::Device, Engine) {
        let device = mock::Device::get("mock-sampler");
        let engine = Engine::new(Arc::new(device.clone()), 1);
        (device, engine)
    }

    #[test]
    fn test_notes() {
        let (device, engine) = engine();
        engine.start_pitch(Pitch::new(60), 1.0);
        engine.start_pitch(Pitch::new(72), 0.0);
        engine.stop_pitches(&[Pitch::new(60), Pitch::new(72)]);

        assert_eq!(
            vec![
                vec![0x91, 60, 127],
                vec![0x91, 72, 1],
                vec![0x81, 60, 0],
                vec![0x81, 72, 0],
            ],
            device.emitted_events()
        );
    }

    #[test]
    fn test_out_of_range_pitches_are_skipped() {
        let (device, engine) = engine();
        engine.start_pitch(Pitch::new(-3), 0.5);
        engine.start_pitch(Pitch::new(140), 0.5);
        engine.stop_pitches(&[Pitch::new(-3), Pitch::new(140), Pitch::new(0)]);

        assert_eq!(vec![vec![0x81, 0, 0]], device.emitted_events());
    }

    #[test]
    fn test_gain_only_sends_changes() {
        let (device, engine) = engine();
        engine.set_gain(0.0, Duration::from_millis(100));
        engine.set_gain(0.0, Duration::from_millis(100));
        engine.set_gain(-100.0, Duration::from_millis(100));

        assert_eq!(
            vec![vec![0xB1, 7, 127], vec![0xB1, 7, 0]],
            device.emitted_events()
        );
    }

    #[test]
    fn test_volume_for_gain() {
        assert_eq!(127, volume_for_gain(6.0).as_int());
        assert_eq!(64, volume_for_gain(-30.0).as_int());
        assert_eq!(0, volume_for_gain(-60.0).as_int());
    }
}
