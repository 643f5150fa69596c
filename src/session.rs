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

//! Everything one running instrument owns, built from its configuration.

use std::{error::Error, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::info;

use crate::air::{AirSupply, Ticker};
use crate::config::{ConfigError, Instrument};
use crate::midi;
use crate::observer::Observer;
use crate::registry::NoteRegistry;
use crate::router::{self, Router, Source};
use crate::sampler::{self, Engine};
use crate::scale::ScaleSelector;

/// Creates the sampling engine the configuration asks for: MIDI output if a
/// device is named, otherwise the log engine.
pub fn engine(config: &Instrument) -> Result<Arc<dyn Engine>, Box<dyn Error>> {
    match config.midi_output() {
        Some(name) => {
            let device = midi::get_device(name)?;
            let engine = sampler::midi::Engine::new(device, config.midi_channel()?);
            info!(engine = %engine, "Using MIDI sampler.");
            Ok(Arc::new(engine))
        }
        None => Ok(Arc::new(sampler::log::Engine::new())),
    }
}

pub struct Session {
    registry: Arc<Mutex<NoteRegistry>>,
    air: Arc<Mutex<AirSupply>>,
    engine: Arc<dyn Engine>,
    observer: Arc<dyn Observer>,
    midi_offset: i32,
    midi_input: Option<String>,
    tick_interval: Duration,
    gain_ramp: Duration,
}

impl Session {
    pub fn new(
        config: &Instrument,
        engine: Arc<dyn Engine>,
        observer: Arc<dyn Observer>,
    ) -> Result<Session, ConfigError> {
        let volume = config.volume();
        let air = config.air();

        let registry = NoteRegistry::new(
            config.registry_settings(),
            ScaleSelector::new(config.scales()),
            engine.clone(),
            observer.clone(),
        );
        let air_supply = AirSupply::new(air.params(), volume.mapping(), volume.base_volume());

        Ok(Session {
            registry: Arc::new(Mutex::new(registry)),
            air: Arc::new(Mutex::new(air_supply)),
            engine,
            observer,
            midi_offset: config.midi_offset(),
            midi_input: config.midi_input().map(str::to_string),
            tick_interval: air.tick_interval()?,
            gain_ramp: volume.gain_ramp()?,
        })
    }

    pub fn registry(&self) -> Arc<Mutex<NoteRegistry>> {
        self.registry.clone()
    }

    pub fn air(&self) -> Arc<Mutex<AirSupply>> {
        self.air.clone()
    }

    pub fn midi_offset(&self) -> i32 {
        self.midi_offset
    }

    /// A router that feeds this session.
    pub fn router(&self) -> Router {
        Router::new(self.registry.clone(), self.air.clone())
    }

    /// Starts applying the air supply's gain on a fixed tick.
    pub fn start_ticker(&self) -> Ticker {
        let voices = self.registry.lock().voice_count();
        Ticker::spawn(
            self.air.clone(),
            voices,
            self.engine.clone(),
            self.observer.clone(),
            self.tick_interval,
            self.gain_ramp,
        )
    }

    /// A source for the configured MIDI input device, if there is one.
    pub fn midi_source(&self) -> Result<Option<Arc<dyn Source>>, Box<dyn Error>> {
        match &self.midi_input {
            Some(name) => {
                let device = midi::get_device(name)?;
                info!(device = device.name(), "Using MIDI input.");
                Ok(Some(Arc::new(router::midi::Midi::new(
                    device,
                    self.midi_offset,
                ))))
            }
            None => Ok(None),
        }
    }
}
