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
use std::{path::Path, time::Duration};

use config::{Config, File};
use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::air::AirParams;
use crate::registry::RegistrySettings;
use crate::scale::Scale;

/// Key 0 sounds C3.
pub const DEFAULT_BASE_OCTAVE: i32 = 3;
/// MIDI note 48 (C3) maps to key 0.
pub const DEFAULT_MIDI_OFFSET: i32 = 48;
pub const DEFAULT_VELOCITY: f32 = 0.8;
pub const DEFAULT_DOUBLING_VELOCITY_RATIO: f32 = 0.5;
pub const DEFAULT_TRANSPOSE_LIMIT: i32 = 12;
pub const DEFAULT_OCTAVE_MIN: i32 = -1;
pub const DEFAULT_OCTAVE_MAX: i32 = 1;
pub const DEFAULT_MIDI_CHANNEL: u8 = 1;

/// Base volume in dB for the decibel mapping.
pub const DEFAULT_BASE_VOLUME_DB: f64 = -12.0;
/// Base fader level for the linear mapping.
pub const DEFAULT_BASE_VOLUME_LINEAR: f64 = 0.25;
const DEFAULT_GAIN_RAMP: Duration = Duration::from_millis(100);

/// Roughly one display frame.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// A YAML representation of the instrument configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Instrument {
    /// The octave that key 0 sounds in.
    base_octave: Option<i32>,

    /// Subtracted from incoming MIDI note numbers to get the key index.
    midi_offset: Option<i32>,

    /// Velocity used by sources that don't supply one (0.0-1.0).
    default_velocity: Option<f32>,

    /// Velocity of coupler and sub-octave doublings relative to the main note.
    doubling_velocity_ratio: Option<f32>,

    /// Transposition is clamped to +/- this many semitones.
    transpose_limit: Option<i32>,

    /// The lowest octave shift.
    octave_min: Option<i32>,

    /// The highest octave shift.
    octave_max: Option<i32>,

    /// Output volume configuration.
    volume: Option<Volume>,

    /// Bellows simulation configuration.
    air: Option<Air>,

    /// The MIDI device to take note input from.
    midi_input: Option<String>,

    /// The MIDI device to send sampler commands to. If unset, commands are logged.
    midi_output: Option<String>,

    /// The MIDI channel (1-16) used for output.
    midi_channel: Option<u8>,

    /// Extra scales, appended to (or replacing) the built-in raga table.
    scales: Option<Vec<ScaleDefinition>>,
}

impl Instrument {
    /// Deserializes a file from the path into an instrument configuration.
    pub fn deserialize(path: &Path) -> Result<Instrument, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Instrument>()?)
    }

    /// The settings for the note registry.
    pub fn registry_settings(&self) -> RegistrySettings {
        let octave_min = self.octave_min.unwrap_or(DEFAULT_OCTAVE_MIN);
        RegistrySettings {
            base_octave: self.base_octave.unwrap_or(DEFAULT_BASE_OCTAVE),
            default_velocity: self
                .default_velocity
                .unwrap_or(DEFAULT_VELOCITY)
                .clamp(0.0, 1.0),
            doubling_velocity_ratio: self
                .doubling_velocity_ratio
                .unwrap_or(DEFAULT_DOUBLING_VELOCITY_RATIO)
                .clamp(0.0, 1.0),
            transpose_limit: self.transpose_limit.unwrap_or(DEFAULT_TRANSPOSE_LIMIT).abs(),
            octave_min,
            octave_max: self.octave_max.unwrap_or(DEFAULT_OCTAVE_MAX).max(octave_min),
        }
    }

    /// The MIDI note to key index calibration.
    pub fn midi_offset(&self) -> i32 {
        self.midi_offset.unwrap_or(DEFAULT_MIDI_OFFSET)
    }

    pub fn volume(&self) -> Volume {
        self.volume.clone().unwrap_or_default()
    }

    pub fn air(&self) -> Air {
        self.air.clone().unwrap_or_default()
    }

    pub fn midi_input(&self) -> Option<&str> {
        self.midi_input.as_deref()
    }

    pub fn midi_output(&self) -> Option<&str> {
        self.midi_output.as_deref()
    }

    /// The zero-based MIDI output channel.
    pub fn midi_channel(&self) -> Result<u8, ConfigError> {
        let channel = self.midi_channel.unwrap_or(DEFAULT_MIDI_CHANNEL);
        if !(1..=16).contains(&channel) {
            return Err(ConfigError::MidiChannel(channel));
        }
        Ok(channel - 1)
    }

    /// The extra scales.
    pub fn scales(&self) -> Vec<Scale> {
        self.scales
            .iter()
            .flatten()
            .map(|definition| Scale::new(&definition.name, &definition.notes))
            .collect()
    }
}

/// How the base volume and reservoir level combine into a gain.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMapping {
    /// The base volume is in dB and the reservoir level is applied as a dB offset.
    #[default]
    Decibels,
    /// The base volume is a 0-1 fader multiplied by the reservoir level.
    Linear,
}

/// A YAML representation of the output volume configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Volume {
    /// The base volume, in dB or as a fader level depending on the mapping.
    base_volume: Option<f64>,

    /// How the base volume is interpreted.
    mapping: Option<VolumeMapping>,

    /// How long each gain change ramps for.
    gain_ramp: Option<String>,
}

impl Volume {
    pub fn mapping(&self) -> VolumeMapping {
        self.mapping.unwrap_or_default()
    }

    pub fn base_volume(&self) -> f64 {
        match (self.base_volume, self.mapping()) {
            (Some(base_volume), _) => base_volume,
            (None, VolumeMapping::Decibels) => DEFAULT_BASE_VOLUME_DB,
            (None, VolumeMapping::Linear) => DEFAULT_BASE_VOLUME_LINEAR,
        }
    }

    pub fn gain_ramp(&self) -> Result<Duration, ConfigError> {
        parse_duration("gain_ramp", self.gain_ramp.as_ref(), DEFAULT_GAIN_RAMP)
    }
}

/// A YAML representation of the bellows simulation.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Air {
    smoothing: Option<f64>,
    decay: Option<f64>,
    idle_drain: Option<f64>,
    voice_drain: Option<f64>,
    pump_charge: Option<f64>,
    charge_limit: Option<f64>,
    reference_level: Option<f64>,
    floor_db: Option<f64>,
    silence_threshold: Option<f64>,

    /// How often the simulation advances.
    tick_interval: Option<String>,
}

impl Air {
    /// The model parameters, with unset values taken from the defaults.
    pub fn params(&self) -> AirParams {
        let defaults = AirParams::default();
        AirParams {
            smoothing: self.smoothing.unwrap_or(defaults.smoothing),
            decay: self.decay.unwrap_or(defaults.decay),
            idle_drain: self.idle_drain.unwrap_or(defaults.idle_drain),
            voice_drain: self.voice_drain.unwrap_or(defaults.voice_drain),
            pump_charge: self.pump_charge.unwrap_or(defaults.pump_charge),
            charge_limit: self.charge_limit.unwrap_or(defaults.charge_limit),
            reference_level: self.reference_level.unwrap_or(defaults.reference_level),
            floor_db: self.floor_db.unwrap_or(defaults.floor_db),
            silence_threshold: self.silence_threshold.unwrap_or(defaults.silence_threshold),
        }
    }

    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "tick_interval",
            self.tick_interval.as_ref(),
            DEFAULT_TICK_INTERVAL,
        )
    }
}

/// A user-defined scale.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ScaleDefinition {
    /// The name of the scale.
    name: String,
    /// Allowed pitch classes relative to the tonic, 0-11.
    notes: Vec<u8>,
}

fn parse_duration(
    field: &'static str,
    value: Option<&String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => Ok(DurationString::from_string(value.clone())
            .map_err(|e| ConfigError::Duration {
                field,
                message: e.to_string(),
            })?
            .into()),
        None => Ok(default),
    }
}
