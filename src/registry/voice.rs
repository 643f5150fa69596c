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

//! Sounding voices and the shared voice counter.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::pitch::{self, Pitch};

/// Which octave doublings are sounding alongside a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Doubling {
    /// One octave above.
    pub coupler: bool,
    /// One octave below.
    pub sub_octave: bool,
}

/// The live state of one sounding key.
///
/// Voices are snapshots: a change to the doublings replaces the whole voice
/// rather than mutating it in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    /// The main sounding pitch.
    pitch: Pitch,
    /// The velocity the key was pressed with (0.0-1.0).
    velocity: f32,
    /// The doublings started with this voice.
    doubling: Doubling,
}

impl Voice {
    pub fn new(pitch: Pitch, velocity: f32, doubling: Doubling) -> Voice {
        Voice {
            pitch,
            velocity,
            doubling,
        }
    }

    pub fn pitch(&self) -> Pitch {
        self.pitch
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn doubling(&self) -> Doubling {
        self.doubling
    }

    /// A copy of this voice with different doublings.
    pub fn with_doubling(&self, doubling: Doubling) -> Voice {
        Voice { doubling, ..*self }
    }

    pub fn coupler_pitch(&self) -> Pitch {
        pitch::coupler(self.pitch)
    }

    pub fn sub_octave_pitch(&self) -> Pitch {
        pitch::sub_octave(self.pitch)
    }

    /// The main pitch and both doublings, whether or not the doublings are on.
    pub fn all_pitches(&self) -> [Pitch; 3] {
        [self.pitch, self.coupler_pitch(), self.sub_octave_pitch()]
    }
}

/// The number of sounding voices, readable without locking the registry.
#[derive(Clone, Default, Debug)]
pub struct VoiceCount(Arc<AtomicUsize>);

impl VoiceCount {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    pub(super) fn set(&self, count: usize) {
        self.0.store(count, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_pitches() {
        let voice = Voice::new(Pitch::new(48), 0.8, Doubling::default());
        assert_eq!(
            [Pitch::new(48), Pitch::new(60), Pitch::new(36)],
            voice.all_pitches()
        );
    }

    #[test]
    fn test_with_doubling_replaces_only_doubling() {
        let voice = Voice::new(Pitch::new(50), 0.3, Doubling::default());
        let doubled = voice.with_doubling(Doubling {
            coupler: true,
            sub_octave: false,
        });

        assert_eq!(voice.pitch(), doubled.pitch());
        assert_eq!(voice.velocity(), doubled.velocity());
        assert!(doubled.doubling().coupler);
        assert!(!voice.doubling().coupler);
    }

    #[test]
    fn test_voice_count_is_shared() {
        let count = VoiceCount::default();
        let reader = count.clone();
        count.set(3);
        assert_eq!(3, reader.get());
    }
}
