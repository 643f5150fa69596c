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

//! The note registry: which keys are sounding, which are held, and how the
//! instrument's modes change that.
//!
//! Every key is either silent or sounding, and a sounding key owns exactly one
//! voice. Pressing a sounding key first stops its voice, so a key can never be
//! double-voiced. Invalid requests (filtered presses, releases of silent keys)
//! are no-ops rather than errors, since live input must never interrupt sound.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::observer::Observer;
use crate::pitch::{resolve_pitch, Shift};
use crate::sampler::Engine;
use crate::scale::{self, Scale, ScaleSelector};

mod voice;

#[cfg(test)]
mod tests;

pub use voice::{Doubling, Voice, VoiceCount};

/// Fixed parameters of the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrySettings {
    /// The octave key 0 sounds in.
    pub base_octave: i32,
    /// Velocity for presses that don't carry one.
    pub default_velocity: f32,
    /// Velocity of doublings relative to their main note.
    pub doubling_velocity_ratio: f32,
    /// Transposition is clamped to +/- this.
    pub transpose_limit: i32,
    pub octave_min: i32,
    pub octave_max: i32,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        crate::config::Instrument::default().registry_settings()
    }
}

/// The independent mode toggles that affect note handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modes {
    /// Voices outlive key releases until pressed again.
    pub drone: bool,
    /// Double new and sounding voices an octave up.
    pub coupler: bool,
    /// Double new and sounding voices an octave down.
    pub sub_octave: bool,
    /// Voices outlive key releases until sustain is turned off.
    pub sustain: bool,
    /// Presses outside the current scale are ignored.
    pub strict_scale: bool,
}

/// What a press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// A silent key started sounding.
    Started,
    /// A sounding key was stopped and started again.
    Retriggered,
    /// A sounding key was stopped by pressing it in drone mode.
    ToggledOff,
    /// The key is outside the scale and strict filtering is on.
    Rejected,
}

/// What a release did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The voice was stopped.
    Stopped,
    /// Drone mode kept the voice sounding.
    Droned,
    /// Sustain kept the voice sounding and queued it.
    Sustained,
    /// The key wasn't sounding.
    NotSounding,
}

/// Tracks sounding voices and held keys and issues commands to the sampling engine.
pub struct NoteRegistry {
    settings: RegistrySettings,
    engine: Arc<dyn Engine>,
    observer: Arc<dyn Observer>,
    shift: Shift,
    modes: Modes,
    scales: ScaleSelector,
    /// At most one voice per key.
    voices: BTreeMap<i32, Voice>,
    /// Keys whose physical control is down.
    held: BTreeSet<i32>,
    /// Keys released while sustain was on whose voices are still sounding.
    sustain_queue: BTreeSet<i32>,
    voice_count: VoiceCount,
}

impl NoteRegistry {
    pub fn new(
        settings: RegistrySettings,
        scales: ScaleSelector,
        engine: Arc<dyn Engine>,
        observer: Arc<dyn Observer>,
    ) -> NoteRegistry {
        NoteRegistry {
            settings,
            engine,
            observer,
            shift: Shift::default(),
            modes: Modes::default(),
            scales,
            voices: BTreeMap::new(),
            held: BTreeSet::new(),
            sustain_queue: BTreeSet::new(),
            voice_count: VoiceCount::default(),
        }
    }

    /// Handles a key press. A missing velocity uses the default.
    pub fn press(&mut self, index: i32, velocity: Option<f32>) -> PressOutcome {
        if !self.allows(index) {
            debug!(index, scale = %self.scale(), "Press outside of scale ignored");
            return PressOutcome::Rejected;
        }

        let velocity = velocity
            .unwrap_or(self.settings.default_velocity)
            .clamp(0.0, 1.0);

        self.held.insert(index);
        self.sustain_queue.remove(&index);

        if !self.voices.contains_key(&index) {
            self.start_voice(index, velocity);
            return PressOutcome::Started;
        }

        self.stop_voice(index);
        if self.modes.drone {
            debug!(index, "Drone voice toggled off");
            return PressOutcome::ToggledOff;
        }
        self.start_voice(index, velocity);
        PressOutcome::Retriggered
    }

    /// Handles a key release.
    pub fn release(&mut self, index: i32) -> ReleaseOutcome {
        self.held.remove(&index);

        if !self.voices.contains_key(&index) {
            return ReleaseOutcome::NotSounding;
        }
        if self.modes.drone {
            return ReleaseOutcome::Droned;
        }
        if self.modes.sustain {
            self.sustain_queue.insert(index);
            return ReleaseOutcome::Sustained;
        }

        self.stop_voice(index);
        ReleaseOutcome::Stopped
    }

    /// Turns the octave-up doubling on or off for new and sounding voices.
    pub fn set_coupler(&mut self, enabled: bool) {
        info!(enabled, "Coupler");
        self.modes.coupler = enabled;
        self.update_doublings();
    }

    /// Turns the octave-down doubling on or off for new and sounding voices.
    pub fn set_sub_octave(&mut self, enabled: bool) {
        info!(enabled, "Sub-octave");
        self.modes.sub_octave = enabled;
        self.update_doublings();
    }

    /// Moves the transposition by the given number of semitones, within the limit.
    /// Sounding voices restart at the new pitch.
    pub fn transpose_by(&mut self, delta: i32) {
        let limit = self.settings.transpose_limit;
        let transpose = self.shift.transpose.saturating_add(delta).clamp(-limit, limit);
        if transpose == self.shift.transpose {
            debug!(transpose, "Transpose unchanged");
            return;
        }

        self.shift.transpose = transpose;
        self.retrigger_all();
        self.observer.shift_changed(self.shift);
        // The allowed keys move with the transposition.
        self.notify_scale();
    }

    /// Sets the octave shift, within the configured range. Sounding voices
    /// restart at the new pitch.
    pub fn set_octave(&mut self, octave: i32) {
        let octave = octave.clamp(self.settings.octave_min, self.settings.octave_max);
        if octave == self.shift.octave {
            return;
        }

        self.shift.octave = octave;
        self.retrigger_all();
        self.observer.shift_changed(self.shift);
    }

    pub fn set_sustain(&mut self, enabled: bool) {
        info!(enabled, "Sustain");
        self.modes.sustain = enabled;
        if enabled {
            return;
        }

        // Lifting sustain also lifts drone.
        self.modes.drone = false;
        self.stop_unheld();
        self.sustain_queue.clear();
    }

    pub fn set_drone(&mut self, enabled: bool) {
        info!(enabled, "Drone");
        self.modes.drone = enabled;
        if !enabled {
            self.stop_unheld();
            return;
        }

        // Keys still held whose voices were toggled off sound again.
        let silent_held: Vec<i32> = self
            .held
            .iter()
            .filter(|index| !self.voices.contains_key(index))
            .copied()
            .collect();
        for index in silent_held {
            if self.allows(index) {
                self.start_voice(index, self.settings.default_velocity);
            }
        }
    }

    pub fn set_strict_scale(&mut self, enabled: bool) {
        info!(enabled, "Strict scale");
        self.modes.strict_scale = enabled;
    }

    /// Moves through the scale list. Sounding voices are left alone.
    pub fn step_scale(&mut self, direction: i32) {
        self.scales.step(direction);
        self.notify_scale();
    }

    /// Selects a scale by name. Returns false if there is no such scale.
    pub fn select_scale(&mut self, name: &str) -> bool {
        if !self.scales.select(name) {
            return false;
        }
        self.notify_scale();
        true
    }

    /// Stops every voice regardless of held keys, sustain, or drone.
    pub fn panic(&mut self) {
        let indices: Vec<i32> = self.voices.keys().copied().collect();
        for index in indices.iter() {
            self.stop_voice(*index);
        }
        self.sustain_queue.clear();

        if !indices.is_empty() {
            info!(stopped = indices.len(), "All voices stopped");
        }
    }

    pub fn is_sounding(&self, index: i32) -> bool {
        self.voices.contains_key(&index)
    }

    pub fn voice(&self, index: i32) -> Option<&Voice> {
        self.voices.get(&index)
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }

    /// A counter that follows the number of sounding voices.
    pub fn voice_count(&self) -> VoiceCount {
        self.voice_count.clone()
    }

    pub fn is_held(&self, index: i32) -> bool {
        self.held.contains(&index)
    }

    pub fn sustain_queue(&self) -> &BTreeSet<i32> {
        &self.sustain_queue
    }

    pub fn shift(&self) -> Shift {
        self.shift
    }

    pub fn modes(&self) -> Modes {
        self.modes
    }

    pub fn scale(&self) -> &Scale {
        self.scales.current()
    }

    pub fn scales(&self) -> &ScaleSelector {
        &self.scales
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Whether the strict scale filter lets the key through.
    fn allows(&self, index: i32) -> bool {
        !self.modes.strict_scale || scale::is_allowed(index, self.shift.transpose, self.scale())
    }

    fn start_voice(&mut self, index: i32, velocity: f32) {
        let pitch = resolve_pitch(index, self.shift, self.settings.base_octave);
        let voice = Voice::new(
            pitch,
            velocity,
            Doubling {
                coupler: self.modes.coupler,
                sub_octave: self.modes.sub_octave,
            },
        );

        self.engine.start_pitch(pitch, velocity);
        let doubling_velocity = velocity * self.settings.doubling_velocity_ratio;
        if voice.doubling().coupler {
            self.engine
                .start_pitch(voice.coupler_pitch(), doubling_velocity);
        }
        if voice.doubling().sub_octave {
            self.engine
                .start_pitch(voice.sub_octave_pitch(), doubling_velocity);
        }

        self.voices.insert(index, voice);
        self.voice_count.set(self.voices.len());
        debug!(index, pitch = %pitch, velocity, "Voice started");
        self.observer.voice_changed(index, true);
    }

    /// Stops the key's voice. Returns false if it wasn't sounding.
    fn stop_voice(&mut self, index: i32) -> bool {
        let voice = match self.voices.remove(&index) {
            Some(voice) => voice,
            None => return false,
        };

        self.sustain_queue.remove(&index);
        // Doublings are stopped whether or not they were started.
        self.engine.stop_pitches(&voice.all_pitches());
        self.voice_count.set(self.voices.len());
        debug!(index, pitch = %voice.pitch(), "Voice stopped");
        self.observer.voice_changed(index, false);
        true
    }

    /// Restarts every voice at its recorded velocity so it picks up a new shift.
    fn retrigger_all(&mut self) {
        let sounding: Vec<(i32, f32)> = self
            .voices
            .iter()
            .map(|(index, voice)| (*index, voice.velocity()))
            .collect();
        for (index, velocity) in sounding {
            let sustained = self.sustain_queue.contains(&index);
            self.stop_voice(index);
            self.start_voice(index, velocity);
            if sustained {
                self.sustain_queue.insert(index);
            }
        }
    }

    /// Starts or stops doublings on sounding voices so they match the modes,
    /// leaving the main pitches untouched.
    fn update_doublings(&mut self) {
        let target = Doubling {
            coupler: self.modes.coupler,
            sub_octave: self.modes.sub_octave,
        };
        let ratio = self.settings.doubling_velocity_ratio;

        for voice in self.voices.values_mut() {
            let current = voice.doubling();
            if current == target {
                continue;
            }

            if current.coupler != target.coupler {
                if target.coupler {
                    self.engine
                        .start_pitch(voice.coupler_pitch(), voice.velocity() * ratio);
                } else {
                    self.engine.stop_pitches(&[voice.coupler_pitch()]);
                }
            }
            if current.sub_octave != target.sub_octave {
                if target.sub_octave {
                    self.engine
                        .start_pitch(voice.sub_octave_pitch(), voice.velocity() * ratio);
                } else {
                    self.engine.stop_pitches(&[voice.sub_octave_pitch()]);
                }
            }

            *voice = voice.with_doubling(target);
        }
    }

    /// Stops every voice whose key isn't held down.
    fn stop_unheld(&mut self) {
        let unheld: Vec<i32> = self
            .voices
            .keys()
            .filter(|index| !self.held.contains(index))
            .copied()
            .collect();
        for index in unheld {
            self.stop_voice(index);
        }
    }

    fn notify_scale(&self) {
        let scale = self.scale();
        info!(scale = %scale, "Scale");
        self.observer
            .scale_changed(scale.display_name(), scale.allowed_by_index(self.shift.transpose));
    }
}

impl std::fmt::Debug for NoteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteRegistry")
            .field("active_voices", &self.voices.len())
            .field("held", &self.held.len())
            .field("shift", &self.shift)
            .field("modes", &self.modes)
            .field("scale", &self.scale().name())
            .finish()
    }
}
