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

//! The bellows simulation.
//!
//! In manual mode the player has to pump air into a reservoir. Pumping adds
//! charge, the charge bleeds into the reservoir over several ticks, and the
//! reservoir leaks, faster with more voices sounding. The reservoir level
//! scales the output gain. Outside manual mode the gain is just the base volume.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    task::{JoinError, JoinHandle},
    time::MissedTickBehavior,
};
use tracing::{debug, info, span, Instrument, Level};

use crate::config::VolumeMapping;
use crate::observer::Observer;
use crate::playsync::CancelHandle;
use crate::registry::VoiceCount;
use crate::sampler::Engine;

/// The reservoir is measured in percent.
pub const FULL: f64 = 100.0;

/// Parameters of the bellows model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirParams {
    /// How much of the gap between reservoir and target is closed each tick.
    pub smoothing: f64,
    /// Fraction of pump charge kept each tick.
    pub decay: f64,
    /// Leak per tick regardless of voices.
    pub idle_drain: f64,
    /// Extra leak per tick for each sounding voice.
    pub voice_drain: f64,
    /// Charge added by one pump.
    pub pump_charge: f64,
    /// Maximum pending charge.
    pub charge_limit: f64,
    /// The reservoir level that produces the base volume.
    pub reference_level: f64,
    /// The gain used when the reservoir is empty.
    pub floor_db: f64,
    /// Reservoir levels at or below this are treated as empty.
    pub silence_threshold: f64,
}

impl Default for AirParams {
    fn default() -> Self {
        AirParams {
            smoothing: 0.12,
            decay: 0.85,
            idle_drain: 0.05,
            voice_drain: 0.04,
            pump_charge: 70.0,
            charge_limit: 100.0,
            reference_level: 70.0,
            floor_db: -100.0,
            silence_threshold: 0.01,
        }
    }
}

/// The reservoir and pending pump charge.
#[derive(Debug, Clone)]
pub struct AirSupply {
    params: AirParams,
    mapping: VolumeMapping,
    base_volume: f64,
    manual: bool,
    reservoir: f64,
    charge: f64,
}

impl AirSupply {
    /// Creates a new air supply in automatic mode with a full reservoir.
    pub fn new(params: AirParams, mapping: VolumeMapping, base_volume: f64) -> AirSupply {
        AirSupply {
            params,
            mapping,
            base_volume,
            manual: false,
            reservoir: FULL,
            charge: 0.0,
        }
    }

    /// Turns manual pumping on or off. Turning it on starts with an empty
    /// reservoir, turning it off refills it.
    pub fn set_manual(&mut self, enabled: bool) {
        info!(enabled, "Manual air");
        self.manual = enabled;
        self.charge = 0.0;
        self.reservoir = if enabled { 0.0 } else { FULL };
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    /// One bellows stroke. Returns false if manual mode is off.
    pub fn pump(&mut self) -> bool {
        if !self.manual {
            debug!("Pump ignored outside of manual air mode");
            return false;
        }
        self.charge = (self.charge + self.params.pump_charge).min(self.params.charge_limit);
        true
    }

    /// Advances the model by one tick.
    pub fn tick(&mut self, active_voices: usize) {
        if !self.manual {
            return;
        }

        let params = &self.params;
        let target = (self.reservoir + self.charge).min(FULL);
        self.reservoir += (target - self.reservoir) * params.smoothing;
        self.charge *= params.decay;

        let drain = params.idle_drain + params.voice_drain * active_voices as f64;
        self.reservoir = (self.reservoir - drain).clamp(0.0, FULL);
    }

    /// The reservoir level in percent.
    pub fn reservoir(&self) -> f64 {
        self.reservoir
    }

    pub fn set_base_volume(&mut self, base_volume: f64) {
        self.base_volume = base_volume;
    }

    pub fn base_volume(&self) -> f64 {
        self.base_volume
    }

    /// The output gain in dB.
    pub fn gain_db(&self) -> f64 {
        let floor = self.params.floor_db;
        if !self.manual {
            return match self.mapping {
                VolumeMapping::Decibels => self.base_volume,
                VolumeMapping::Linear => linear_to_db(self.base_volume, floor),
            };
        }

        if self.reservoir <= self.params.silence_threshold {
            return floor;
        }
        let level = self.reservoir / self.params.reference_level;
        match self.mapping {
            VolumeMapping::Decibels => (self.base_volume + 20.0 * level.log10()).max(floor),
            VolumeMapping::Linear => linear_to_db(self.base_volume * level, floor),
        }
    }
}

fn linear_to_db(level: f64, floor: f64) -> f64 {
    if level <= 0.0 {
        return floor;
    }
    (20.0 * level.log10()).max(floor)
}

/// What the ticker drives and where it reports to.
struct Pulse {
    air: Arc<Mutex<AirSupply>>,
    voices: VoiceCount,
    engine: Arc<dyn Engine>,
    observer: Arc<dyn Observer>,
    ramp: Duration,
    /// The last reported gain and reservoir level.
    last: Option<(f64, f64)>,
}

impl Pulse {
    fn tick(&mut self) {
        let current = {
            let mut air = self.air.lock();
            air.tick(self.voices.get());
            (air.gain_db(), air.reservoir())
        };
        if self.last == Some(current) {
            return;
        }

        let (gain, reservoir) = current;
        self.engine.set_gain(gain, self.ramp);
        self.observer.reservoir_changed(reservoir);
        self.last = Some(current);
    }
}

/// Advances an air supply on a fixed interval and applies its gain.
pub struct Ticker {
    cancel_handle: CancelHandle,
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawns the ticker on the current tokio runtime.
    pub fn spawn(
        air: Arc<Mutex<AirSupply>>,
        voices: VoiceCount,
        engine: Arc<dyn Engine>,
        observer: Arc<dyn Observer>,
        interval: Duration,
        ramp: Duration,
    ) -> Ticker {
        let cancel_handle = CancelHandle::new();
        let mut pulse = Pulse {
            air,
            voices,
            engine,
            observer,
            ramp,
            last: None,
        };

        let cancel = cancel_handle.clone();
        let span = span!(Level::INFO, "air ticker");
        let handle = tokio::spawn(
            async move {
                info!(interval = format!("{:?}", interval), "Air ticker started.");
                // A zero period isn't a valid interval.
                let mut interval = tokio::time::interval(interval.max(Duration::from_millis(1)));
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    if cancel.is_cancelled() {
                        info!("Air ticker stopped.");
                        return;
                    }
                    pulse.tick();
                }
            }
            .instrument(span),
        );

        Ticker {
            cancel_handle,
            handle,
        }
    }

    /// Asks the ticker to stop. It finishes on its next tick.
    pub fn stop(&self) {
        self.cancel_handle.cancel();
    }

    /// Waits for the ticker to finish.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc, time::Duration};

    use parking_lot::Mutex;

    use super::*;
    use crate::observer::{Notification, Recorder};
    use crate::sampler::mock;
    use crate::testutil::eventually;

    fn manual() -> AirSupply {
        let mut air = AirSupply::new(AirParams::default(), VolumeMapping::Decibels, -12.0);
        air.set_manual(true);
        air
    }

    #[test]
    fn test_automatic_mode() {
        let mut air = AirSupply::new(AirParams::default(), VolumeMapping::Decibels, -12.0);
        assert!(!air.pump());
        air.tick(10);
        assert_eq!(FULL, air.reservoir());
        assert_eq!(-12.0, air.gain_db());

        air.set_base_volume(-6.0);
        assert_eq!(-6.0, air.gain_db());
    }

    #[test]
    fn test_manual_mode_resets_reservoir() {
        let mut air = manual();
        assert_eq!(0.0, air.reservoir());
        assert_eq!(-100.0, air.gain_db());

        air.set_manual(false);
        assert_eq!(FULL, air.reservoir());
    }

    #[test]
    fn test_pump_rises_then_settles() {
        let mut air = manual();
        assert!(air.pump());

        let mut previous = air.reservoir();
        for _ in 0..20 {
            air.tick(0);
            assert!(air.reservoir() > previous);
            assert!(air.reservoir() <= FULL);
            previous = air.reservoir();
        }
    }

    #[test]
    fn test_never_exceeds_full() {
        let mut air = manual();
        for _ in 0..500 {
            air.pump();
            air.tick(0);
            assert!(air.reservoir() <= FULL);
        }
        assert!(air.reservoir() > 90.0);
    }

    #[test]
    fn test_drains_to_silence() {
        let mut air = manual();
        air.pump();
        // Let the pump charge run out.
        for _ in 0..60 {
            air.tick(0);
        }
        assert!(air.reservoir() > 0.0);

        let mut previous = air.reservoir();
        let mut ticks = 0;
        while air.reservoir() > 0.0 {
            air.tick(0);
            assert!(air.reservoir() <= previous);
            previous = air.reservoir();
            ticks += 1;
            assert!(ticks < 100_000, "reservoir never emptied");
        }
        assert_eq!(-100.0, air.gain_db());
    }

    #[test]
    fn test_voices_drain_faster() {
        let mut quiet = manual();
        let mut busy = manual();
        quiet.pump();
        busy.pump();
        for _ in 0..40 {
            quiet.tick(0);
            busy.tick(8);
        }
        assert!(busy.reservoir() < quiet.reservoir());
    }

    #[test]
    fn test_decibel_mapping() {
        let mut air = manual();
        air.reservoir = 70.0;
        assert!((air.gain_db() - -12.0).abs() < 1e-9);
        air.reservoir = 35.0;
        assert!((air.gain_db() - (-12.0 + 20.0 * 0.5f64.log10())).abs() < 1e-9);
        air.reservoir = 0.005;
        assert_eq!(-100.0, air.gain_db());
    }

    #[test]
    fn test_linear_mapping() {
        let mut air = AirSupply::new(AirParams::default(), VolumeMapping::Linear, 0.5);
        assert!((air.gain_db() - 20.0 * 0.5f64.log10()).abs() < 1e-9);

        air.set_manual(true);
        air.reservoir = 70.0;
        assert!((air.gain_db() - 20.0 * 0.5f64.log10()).abs() < 1e-9);

        air.set_base_volume(0.0);
        assert_eq!(-100.0, air.gain_db());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ticker() -> Result<(), Box<dyn Error>> {
        let air = Arc::new(Mutex::new(manual()));
        let engine = mock::Engine::new();
        let recorder = Recorder::default();

        air.lock().pump();
        let ticker = Ticker::spawn(
            air.clone(),
            VoiceCount::default(),
            Arc::new(engine.clone()),
            Arc::new(recorder.clone()),
            Duration::from_millis(1),
            Duration::from_millis(10),
        );

        eventually(
            || engine.last_gain().is_some_and(|gain| gain > -100.0),
            "Gain never rose above the floor",
        );
        eventually(
            || {
                recorder
                    .notifications()
                    .iter()
                    .any(|n| matches!(n, Notification::Reservoir(level) if *level > 0.0))
            },
            "Reservoir level never reported",
        );

        ticker.stop();
        ticker.join().await?;
        Ok(())
    }
}
