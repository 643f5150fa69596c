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

//! Maps logical keys to concrete pitches.

use std::fmt;

/// Sharp-spelled note names, indexed by pitch class.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Semitones in one octave.
pub const OCTAVE: i32 = 12;

/// A concrete pitch, counted in semitones on the MIDI scale (C4 = 60).
///
/// The value is not bounded: keys far outside the playable register still
/// resolve to a pitch, and it is up to the sampling engine to decide whether
/// it can sound it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pitch(i32);

impl Pitch {
    pub const fn new(semitone: i32) -> Pitch {
        Pitch(semitone)
    }

    /// The raw semitone number.
    pub fn semitone(&self) -> i32 {
        self.0
    }

    /// The pitch class, 0 (C) through 11 (B).
    pub fn pitch_class(&self) -> usize {
        self.0.rem_euclid(OCTAVE) as usize
    }

    /// The scientific octave number (C4 is middle C).
    pub fn octave(&self) -> i32 {
        self.0.div_euclid(OCTAVE) - 1
    }

    /// Transposes the pitch by the given number of semitones.
    pub fn transpose(&self, semitones: i32) -> Pitch {
        Pitch(self.0.saturating_add(semitones))
    }

    /// The frequency of the pitch in Hz, tuned to A4 = 440 Hz.
    pub fn frequency(&self) -> f64 {
        440.0 * 2f64.powf((f64::from(self.0) - 69.0) / 12.0)
    }

    /// The MIDI note number for this pitch, if it fits in the MIDI range.
    pub fn midi_note(&self) -> Option<u8> {
        u8::try_from(self.0).ok().filter(|note| *note <= 127)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NOTE_NAMES[self.pitch_class()], self.octave())
    }
}

/// The process-wide pitch shift applied to every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shift {
    /// Transposition in semitones.
    pub transpose: i32,
    /// Octave shift in whole octaves.
    pub octave: i32,
}

impl Shift {
    /// The total shift in semitones.
    pub fn semitones(&self) -> i32 {
        self.transpose
            .saturating_add(self.octave.saturating_mul(OCTAVE))
    }
}

/// Resolves a logical key to its sounding pitch.
///
/// Key 0 is C in `base_octave`; every 12 keys move up one octave. Negative
/// keys count downwards from there. Pitches past the ends of `i32` saturate.
pub fn resolve_pitch(index: i32, shift: Shift, base_octave: i32) -> Pitch {
    let semitone = (i64::from(base_octave) + 1) * i64::from(OCTAVE)
        + i64::from(index)
        + i64::from(shift.semitones());
    Pitch::new(semitone.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
}

/// The coupler doubling, one octave above.
pub fn coupler(pitch: Pitch) -> Pitch {
    pitch.transpose(OCTAVE)
}

/// The sub-octave doubling, one octave below.
pub fn sub_octave(pitch: Pitch) -> Pitch {
    pitch.transpose(-OCTAVE)
}
