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

//! Raga/scale membership filtering.
//!
//! A scale is a set of allowed pitch classes relative to the tonic (Sa). Keys
//! are checked after undoing the current transposition, so a transposed
//! keyboard keeps the same raga relative to its new tonic.

use std::fmt;

use crate::pitch::OCTAVE;

/// Name of the sentinel scale that allows everything.
pub const CHROMATIC: &str = "none";

/// The built-in raga table, in stepping order.
const RAGAS: &[(&str, &[u8])] = &[
    (CHROMATIC, &[]),
    ("bilawal", &[0, 2, 4, 5, 7, 9, 11]),
    ("kalyan", &[0, 2, 4, 6, 7, 9, 11]),
    ("khamaj", &[0, 2, 4, 5, 7, 9, 10]),
    ("bhairav", &[0, 1, 4, 5, 7, 8, 11]),
    ("bhairavi", &[0, 1, 3, 5, 7, 8, 10]),
    ("kafi", &[0, 2, 3, 5, 7, 9, 10]),
    ("asavari", &[0, 2, 3, 5, 7, 8, 10]),
    ("purvi", &[0, 1, 4, 6, 7, 8, 11]),
    ("marwa", &[0, 1, 4, 6, 7, 9, 11]),
    ("todi", &[0, 1, 3, 6, 7, 8, 11]),
    ("desh", &[0, 2, 4, 5, 7, 9, 10, 11]),
    ("shree", &[0, 1, 4, 6, 7, 8, 11]),
    ("bhopali", &[0, 2, 4, 7, 9]),
    ("malkauns", &[0, 3, 5, 8, 10]),
];

/// A named set of allowed pitch classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale {
    name: String,
    /// None for the chromatic sentinel.
    allowed: Option<[bool; 12]>,
}

impl Scale {
    /// Creates a scale from pitch classes. Out-of-octave values wrap.
    pub fn new(name: &str, notes: &[u8]) -> Scale {
        let mut allowed = [false; 12];
        for note in notes {
            allowed[usize::from(*note) % 12] = true;
        }
        Scale {
            name: name.to_lowercase(),
            allowed: Some(allowed),
        }
    }

    /// The scale that lets every note through.
    pub fn chromatic() -> Scale {
        Scale {
            name: CHROMATIC.to_string(),
            allowed: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name shown to players.
    pub fn display_name(&self) -> &str {
        if self.is_chromatic() {
            "Chromatic"
        } else {
            &self.name
        }
    }

    pub fn is_chromatic(&self) -> bool {
        self.allowed.is_none()
    }

    /// Whether the logical note (0-11, relative to the tonic) is in the scale.
    pub fn contains(&self, logical_note: usize) -> bool {
        match &self.allowed {
            Some(allowed) => allowed[logical_note % 12],
            None => true,
        }
    }

    /// The display colour family used for member keys.
    pub fn color_group(&self) -> Option<ColorGroup> {
        if self.is_chromatic() {
            return None;
        }
        Some(match self.name.as_str() {
            "bhairav" | "todi" | "bhopali" | "shree" => ColorGroup::Orange,
            "malkauns" | "asavari" | "bhairavi" | "darbari" => ColorGroup::Blue,
            "khamaj" | "kafi" | "desh" => ColorGroup::Green,
            "kalyan" | "purvi" | "marwa" | "yaman" => ColorGroup::Purple,
            _ => ColorGroup::Yellow,
        })
    }

    /// The allowed mask by key, indexed by `index mod 12`, for the given transposition.
    pub fn allowed_by_index(&self, transpose: i32) -> [bool; 12] {
        let mut mask = [true; 12];
        for (key, allowed) in mask.iter_mut().enumerate() {
            *allowed = is_allowed(key as i32, transpose, self);
        }
        mask
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Colour families used by the presentation layer to highlight member keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorGroup {
    Yellow,
    Orange,
    Blue,
    Green,
    Purple,
}

/// How a key relates to the current scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub member: bool,
    /// Set only for members of a non-chromatic scale.
    pub color_group: Option<ColorGroup>,
}

/// The scale degree of a key once the transposition is undone.
pub fn logical_note(index: i32, transpose: i32) -> usize {
    (index.rem_euclid(OCTAVE) - transpose.rem_euclid(OCTAVE)).rem_euclid(OCTAVE) as usize
}

/// Whether pressing the key is allowed under the given scale.
pub fn is_allowed(index: i32, transpose: i32, scale: &Scale) -> bool {
    scale.contains(logical_note(index, transpose))
}

/// Classifies a key for highlighting.
pub fn classify(index: i32, transpose: i32, scale: &Scale) -> Classification {
    let member = is_allowed(index, transpose, scale);
    Classification {
        member,
        color_group: if member { scale.color_group() } else { None },
    }
}

/// An ordered scale list with a cursor that cycles through it.
#[derive(Debug, Clone)]
pub struct ScaleSelector {
    scales: Vec<Scale>,
    current: usize,
}

impl ScaleSelector {
    /// Creates a selector over the built-in raga table plus any extra scales.
    /// Extra scales with a built-in name replace the built-in definition.
    pub fn new(extra: Vec<Scale>) -> ScaleSelector {
        let mut scales: Vec<Scale> = RAGAS
            .iter()
            .map(|(name, notes)| {
                if *name == CHROMATIC {
                    Scale::chromatic()
                } else {
                    Scale::new(name, notes)
                }
            })
            .collect();

        for scale in extra {
            match scales.iter_mut().find(|s| s.name == scale.name) {
                Some(existing) => *existing = scale,
                None => scales.push(scale),
            }
        }

        ScaleSelector { scales, current: 0 }
    }

    pub fn current(&self) -> &Scale {
        &self.scales[self.current]
    }

    pub fn scales(&self) -> &[Scale] {
        &self.scales
    }

    /// Moves the cursor by the given number of steps, wrapping at both ends.
    pub fn step(&mut self, direction: i32) -> &Scale {
        let len = self.scales.len() as i64;
        self.current = (self.current as i64 + i64::from(direction)).rem_euclid(len) as usize;
        self.current()
    }

    /// Selects the scale with the given name. Returns false if there is none.
    pub fn select(&mut self, name: &str) -> bool {
        let name = name.to_lowercase();
        match self.scales.iter().position(|s| s.name == name) {
            Some(position) => {
                self.current = position;
                true
            }
            None => false,
        }
    }
}

impl Default for ScaleSelector {
    fn default() -> Self {
        ScaleSelector::new(Vec::new())
    }
}
