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
use std::sync::Arc;

use super::*;
use crate::observer::{Notification, Recorder};
use crate::pitch::Pitch;
use crate::sampler::mock::{self, Command};

const C3: i32 = 48;

fn registry() -> (NoteRegistry, mock::Engine, Recorder) {
    let engine = mock::Engine::new();
    let recorder = Recorder::default();
    let registry = NoteRegistry::new(
        RegistrySettings::default(),
        ScaleSelector::default(),
        Arc::new(engine.clone()),
        Arc::new(recorder.clone()),
    );
    (registry, engine, recorder)
}

fn start(semitone: i32, velocity: f32) -> Command {
    Command::Start {
        pitch: Pitch::new(semitone),
        velocity,
    }
}

fn stop(semitone: i32) -> Command {
    Command::Stop {
        pitches: vec![
            Pitch::new(semitone),
            Pitch::new(semitone + 12),
            Pitch::new(semitone - 12),
        ],
    }
}

#[test]
fn test_press_and_release() {
    let (mut registry, engine, recorder) = registry();

    assert_eq!(PressOutcome::Started, registry.press(0, Some(0.6)));
    assert!(registry.is_sounding(0));
    assert!(registry.is_held(0));
    assert_eq!(1, registry.voice_count().get());

    assert_eq!(ReleaseOutcome::Stopped, registry.release(0));
    assert!(!registry.is_sounding(0));
    assert!(!registry.is_held(0));
    assert_eq!(0, registry.voice_count().get());

    assert_eq!(vec![start(C3, 0.6), stop(C3)], engine.commands());
    assert_eq!(vec![(0, true), (0, false)], recorder.voice_changes());
}

#[test]
fn test_default_velocity() {
    let (mut registry, engine, _) = registry();
    registry.press(4, None);
    assert_eq!(vec![start(C3 + 4, 0.8)], engine.commands());
    assert_eq!(Some(0.8), registry.voice(4).map(|voice| voice.velocity()));
}

#[test]
fn test_repeated_press_never_double_voices() {
    let (mut registry, engine, _) = registry();

    for _ in 0..5 {
        registry.press(7, Some(0.5));
        assert_eq!(1, registry.active_voice_count());
    }
    assert_eq!(5, engine.starts().len());
    assert_eq!(4, engine.stops().len());

    // Every restart is preceded by a stop.
    let commands = engine.commands();
    for pair in commands[1..].chunks(2) {
        assert_eq!(vec![stop(C3 + 7), start(C3 + 7, 0.5)], pair.to_vec());
    }
}

#[test]
fn test_at_most_one_voice_under_mixed_input() {
    let (mut registry, _, _) = registry();
    registry.set_sustain(true);

    let steps = [
        (3, true),
        (3, true),
        (3, false),
        (3, true),
        (3, false),
        (3, false),
        (3, true),
    ];
    for (index, press) in steps {
        if press {
            registry.press(index, None);
        } else {
            registry.release(index);
        }
        assert!(registry.active_voice_count() <= 1);
    }
}

#[test]
fn test_release_without_voice_is_noop() {
    let (mut registry, engine, recorder) = registry();
    assert_eq!(ReleaseOutcome::NotSounding, registry.release(9));
    assert!(engine.commands().is_empty());
    assert!(recorder.notifications().is_empty());

    registry.set_sustain(true);
    assert_eq!(ReleaseOutcome::NotSounding, registry.release(9));
    assert!(registry.sustain_queue().is_empty());
}

#[test]
fn test_negative_and_far_indices() {
    let (mut registry, engine, _) = registry();
    registry.press(-5, Some(1.0));
    registry.press(40, Some(1.0));
    assert_eq!(
        vec![start(C3 - 5, 1.0), start(C3 + 40, 1.0)],
        engine.commands()
    );
}

#[test]
fn test_strict_scale_filter() {
    let (mut registry, engine, _) = registry();
    assert!(registry.select_scale("bilawal"));
    registry.set_strict_scale(true);

    assert_eq!(PressOutcome::Rejected, registry.press(1, None));
    assert!(!registry.is_sounding(1));
    assert!(!registry.is_held(1));
    assert!(engine.commands().is_empty());

    assert_eq!(PressOutcome::Started, registry.press(2, None));
    assert!(registry.is_sounding(2));

    // Transposing up a semitone moves Sa to key 1.
    registry.transpose_by(1);
    engine.clear();
    assert_eq!(PressOutcome::Started, registry.press(1, None));
    assert_eq!(PressOutcome::Rejected, registry.press(4, None));
}

#[test]
fn test_scale_membership_ignored_when_not_strict() {
    let (mut registry, _, _) = registry();
    registry.select_scale("bilawal");
    assert_eq!(PressOutcome::Started, registry.press(1, None));
}

#[test]
fn test_drone_toggle() {
    let (mut registry, engine, _) = registry();
    registry.set_drone(true);

    assert_eq!(PressOutcome::Started, registry.press(5, Some(0.7)));
    assert_eq!(ReleaseOutcome::Droned, registry.release(5));
    assert!(registry.is_sounding(5));

    assert_eq!(PressOutcome::ToggledOff, registry.press(5, Some(0.7)));
    assert!(!registry.is_sounding(5));
    assert_eq!(ReleaseOutcome::NotSounding, registry.release(5));
    assert!(!registry.is_sounding(5));

    assert_eq!(vec![start(C3 + 5, 0.7), stop(C3 + 5)], engine.commands());
}

#[test]
fn test_drone_off_stops_only_released_keys() {
    let (mut registry, _, _) = registry();
    registry.set_drone(true);
    registry.press(1, None);
    registry.press(2, None);
    registry.release(1);

    registry.set_drone(false);
    assert!(!registry.is_sounding(1));
    assert!(registry.is_sounding(2));
}

#[test]
fn test_drone_on_restarts_held_silent_keys() {
    let (mut registry, engine, _) = registry();
    registry.set_drone(true);
    registry.press(5, Some(0.3));
    // Toggled off while still held down.
    registry.press(5, Some(0.3));
    assert!(registry.is_held(5));
    assert!(!registry.is_sounding(5));

    engine.clear();
    registry.set_drone(true);
    assert!(registry.is_sounding(5));
    assert_eq!(vec![start(C3 + 5, 0.8)], engine.commands());
}

#[test]
fn test_sustain() {
    let (mut registry, engine, _) = registry();
    registry.set_sustain(true);

    registry.press(0, None);
    registry.press(4, None);
    assert_eq!(ReleaseOutcome::Sustained, registry.release(0));
    assert!(registry.is_sounding(0));
    assert!(registry.sustain_queue().contains(&0));
    assert!(!registry.sustain_queue().contains(&4));

    engine.clear();
    registry.set_sustain(false);
    assert!(!registry.is_sounding(0));
    assert!(registry.is_sounding(4));
    assert!(registry.sustain_queue().is_empty());
    assert_eq!(vec![stop(C3)], engine.commands());
}

#[test]
fn test_sustained_key_pressed_again_leaves_queue() {
    let (mut registry, _, _) = registry();
    registry.set_sustain(true);
    registry.press(2, None);
    registry.release(2);
    assert_eq!(PressOutcome::Retriggered, registry.press(2, None));
    assert!(registry.sustain_queue().is_empty());

    registry.set_sustain(false);
    assert!(registry.is_sounding(2));
}

#[test]
fn test_sustain_off_turns_drone_off() {
    let (mut registry, _, _) = registry();
    registry.set_sustain(true);
    registry.set_drone(true);
    registry.press(3, None);
    registry.release(3);

    registry.set_sustain(false);
    assert!(!registry.modes().drone);
    assert!(!registry.is_sounding(3));
}

#[test]
fn test_transpose_clamps() {
    let (mut registry, _, _) = registry();
    for _ in 0..20 {
        registry.transpose_by(1);
        assert!(registry.shift().transpose <= 12);
    }
    assert_eq!(12, registry.shift().transpose);

    registry.transpose_by(-100);
    assert_eq!(-12, registry.shift().transpose);
    registry.transpose_by(i32::MIN);
    assert_eq!(-12, registry.shift().transpose);
}

#[test]
fn test_transpose_retriggers_sounding_voices() {
    let (mut registry, engine, recorder) = registry();
    registry.press(0, Some(0.4));
    engine.clear();

    registry.transpose_by(2);
    assert_eq!(vec![stop(C3), start(C3 + 2, 0.4)], engine.commands());
    assert_eq!(Some(Pitch::new(C3 + 2)), registry.voice(0).map(|v| v.pitch()));
    assert!(recorder.notifications().contains(&Notification::Shift(Shift {
        transpose: 2,
        octave: 0
    })));
}

#[test]
fn test_unchanged_transpose_does_nothing() {
    let (mut registry, engine, recorder) = registry();
    registry.press(0, None);
    registry.transpose_by(0);
    assert_eq!(1, engine.commands().len());
    assert_eq!(1, recorder.notifications().len());
}

#[test]
fn test_octave_shift() {
    let (mut registry, engine, _) = registry();
    registry.press(0, Some(0.9));
    engine.clear();

    registry.set_octave(5);
    assert_eq!(1, registry.shift().octave);
    assert_eq!(vec![stop(C3), start(C3 + 12, 0.9)], engine.commands());

    registry.set_octave(-3);
    assert_eq!(-1, registry.shift().octave);
    assert_eq!(Some(Pitch::new(C3 - 12)), registry.voice(0).map(|v| v.pitch()));
}

#[test]
fn test_coupler_toggle_is_smooth() {
    let (mut registry, engine, _) = registry();
    registry.press(0, Some(0.8));
    engine.clear();

    registry.set_coupler(true);
    assert_eq!(vec![start(C3 + 12, 0.4)], engine.commands());
    assert!(registry.voice(0).is_some_and(|v| v.doubling().coupler));

    engine.clear();
    registry.set_coupler(false);
    assert_eq!(
        vec![Command::Stop {
            pitches: vec![Pitch::new(C3 + 12)]
        }],
        engine.commands()
    );
    assert!(registry.is_sounding(0));
}

#[test]
fn test_repeated_doubling_toggle_is_noop() {
    let (mut registry, engine, _) = registry();
    registry.set_sub_octave(true);
    registry.press(0, Some(0.8));
    engine.clear();

    registry.set_sub_octave(true);
    assert!(engine.commands().is_empty());
}

#[test]
fn test_doublings_snapshot_at_press() {
    let (mut registry, engine, _) = registry();
    registry.set_coupler(true);
    registry.set_sub_octave(true);

    registry.press(0, Some(0.6));
    assert_eq!(
        vec![
            start(C3, 0.6),
            start(C3 + 12, 0.3),
            start(C3 - 12, 0.3)
        ],
        engine.commands()
    );

    engine.clear();
    registry.release(0);
    assert_eq!(vec![stop(C3)], engine.commands());
}

#[test]
fn test_scale_change_keeps_voices() {
    let (mut registry, engine, recorder) = registry();
    registry.set_strict_scale(true);
    registry.press(1, None);
    engine.clear();

    registry.step_scale(1);
    assert_eq!("bilawal", registry.scale().name());
    assert!(registry.is_sounding(1));
    assert!(engine.commands().is_empty());

    let last = recorder.notifications().pop();
    assert_eq!(
        Some(Notification::Scale {
            name: "bilawal".to_string(),
            allowed: [true, false, true, false, true, true, false, true, false, true, false, true],
        }),
        last
    );

    assert!(!registry.select_scale("nope"));
    assert_eq!("bilawal", registry.scale().name());
}

#[test]
fn test_panic_stops_everything() {
    let (mut registry, _, _) = registry();
    registry.set_sustain(true);
    registry.set_drone(true);
    registry.press(0, None);
    registry.press(1, None);
    registry.release(1);

    registry.panic();
    assert_eq!(0, registry.active_voice_count());
    assert_eq!(0, registry.voice_count().get());
    assert!(registry.sustain_queue().is_empty());
    assert!(registry.is_held(0));
}

#[test]
fn test_extreme_indices_under_strict_transpose() {
    let (mut registry, engine, _) = registry();
    assert!(registry.select_scale("bilawal"));
    registry.set_strict_scale(true);
    registry.transpose_by(1);

    // Scale degrees 6 and 3 once the semitone is undone.
    assert_eq!(PressOutcome::Rejected, registry.press(i32::MAX, None));
    assert_eq!(PressOutcome::Rejected, registry.press(i32::MIN, None));
    assert!(engine.commands().is_empty());

    // Degrees 5 and 4.
    assert_eq!(PressOutcome::Started, registry.press(i32::MAX - 1, Some(1.0)));
    assert_eq!(PressOutcome::Started, registry.press(i32::MIN + 1, Some(1.0)));
    assert_eq!(
        vec![start(i32::MAX, 1.0), start(i32::MIN + C3 + 2, 1.0)],
        engine.commands()
    );

    registry.panic();
    assert_eq!(0, registry.active_voice_count());
}

#[test]
fn test_extreme_indices_with_doublings() {
    let (mut registry, _, _) = registry();
    registry.set_coupler(true);
    registry.set_sub_octave(true);
    let octave_max = registry.settings().octave_max;
    registry.set_octave(octave_max);

    assert_eq!(PressOutcome::Started, registry.press(i32::MAX, None));
    assert_eq!(PressOutcome::Started, registry.press(i32::MIN, None));
    registry.transpose_by(-1);
    assert_eq!(ReleaseOutcome::Stopped, registry.release(i32::MAX));
    assert_eq!(ReleaseOutcome::Stopped, registry.release(i32::MIN));
}

#[test]
fn test_stopped_voice_leaves_sustain_queue() {
    let (mut registry, _, _) = registry();
    registry.set_sustain(true);
    registry.press(3, None);
    assert_eq!(ReleaseOutcome::Sustained, registry.release(3));

    registry.set_drone(true);
    registry.set_drone(false);
    assert!(!registry.is_sounding(3));
    assert!(registry.sustain_queue().is_empty());
}

#[test]
fn test_transpose_keeps_sustained_keys_queued() {
    let (mut registry, _, _) = registry();
    registry.set_sustain(true);
    registry.press(3, None);
    registry.release(3);

    registry.transpose_by(2);
    assert!(registry.is_sounding(3));
    assert!(registry.sustain_queue().contains(&3));

    registry.set_sustain(false);
    assert!(!registry.is_sounding(3));
}
