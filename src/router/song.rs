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

//! Scheduled song playback from Standard MIDI Files.
//!
//! A song is reduced to a list of notes with absolute start times and
//! durations. Playback turns each note into a press at its start and a release
//! at its end, and feeds them through the same path as live input.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    fmt, fs, io,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, info, span, Level};

use super::Event;
use crate::playsync::CancelHandle;

/// 120 beats per minute.
const DEFAULT_TEMPO: u32 = 500_000;

#[derive(Debug, Error)]
pub enum SongError {
    #[error("unable to read song: {0}")]
    Io(#[from] io::Error),

    #[error("unable to parse MIDI file: {0}")]
    Parse(#[from] midly::Error),

    #[error("unsupported MIDI timing: {0}")]
    Timing(String),
}

/// A single note of a song.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SongNote {
    pub midi_note: u8,
    /// When the note starts, from the beginning of the song.
    pub start: Duration,
    pub duration: Duration,
    /// Velocity from 0.0 to 1.0.
    pub velocity: f32,
}

impl SongNote {
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// Converts ticks into time.
enum Clock {
    Metrical { ticks_per_beat: u64, tempo: u32 },
    Timecode { ticks_per_second: f64 },
}

impl Clock {
    fn new(timing: Timing) -> Result<Clock, SongError> {
        match timing {
            Timing::Metrical(ticks_per_beat) => {
                let ticks_per_beat = u64::from(ticks_per_beat.as_int());
                if ticks_per_beat == 0 {
                    return Err(SongError::Timing("zero ticks per beat".into()));
                }
                Ok(Clock::Metrical {
                    ticks_per_beat,
                    tempo: DEFAULT_TEMPO,
                })
            }
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = f64::from(fps.as_f32()) * f64::from(subframes);
                if ticks_per_second <= 0.0 {
                    return Err(SongError::Timing("zero subframes per frame".into()));
                }
                Ok(Clock::Timecode { ticks_per_second })
            }
        }
    }

    fn elapsed(&self, ticks: u64) -> Duration {
        match self {
            Clock::Metrical {
                ticks_per_beat,
                tempo,
            } => Duration::from_micros(ticks * u64::from(*tempo) / ticks_per_beat),
            Clock::Timecode { ticks_per_second } => {
                Duration::from_secs_f64(ticks as f64 / ticks_per_second)
            }
        }
    }

    fn set_tempo(&mut self, new_tempo: u32) {
        // Tempo changes mean nothing under timecode timing.
        if let Clock::Metrical { tempo, .. } = self {
            *tempo = new_tempo;
        }
    }
}

/// The events that matter for playback.
#[derive(Debug, Clone, Copy)]
enum Mark {
    Tempo(u32),
    On { channel: u8, key: u8, velocity: u8 },
    Off { channel: u8, key: u8 },
    /// Anything else, kept so the end of the song is known.
    Other,
}

impl Mark {
    fn from_kind(kind: &TrackEventKind) -> Mark {
        match kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Mark::Tempo(tempo.as_int()),
            TrackEventKind::Midi { channel, message } => match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => Mark::On {
                    channel: channel.as_int(),
                    key: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => Mark::Off {
                    channel: channel.as_int(),
                    key: key.as_int(),
                },
                _ => Mark::Other,
            },
            _ => Mark::Other,
        }
    }
}

/// A song to play on the instrument.
#[derive(Debug, Clone)]
pub struct Song {
    name: String,
    notes: Vec<SongNote>,
    /// Subtracted from MIDI note numbers to get key indices.
    offset: i32,
}

impl Song {
    /// Loads a song from a MIDI file.
    pub fn load(path: &Path, offset: i32) -> Result<Song, SongError> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let buf = fs::read(path)?;
        Song::parse(&name, &buf, offset)
    }

    /// Parses a song from the contents of a MIDI file.
    pub fn parse(name: &str, buf: &[u8], offset: i32) -> Result<Song, SongError> {
        let smf = Smf::parse(buf)?;
        let mut clock = Clock::new(smf.header.timing)?;

        // Merge every track into one list of marks on a shared tick line.
        let sequential = matches!(smf.header.format, Format::Sequential);
        let mut marks: Vec<(u64, Mark)> = Vec::new();
        let mut track_start = 0;
        for track in smf.tracks.iter() {
            let mut tick = if sequential { track_start } else { 0 };
            for event in track.iter() {
                tick += u64::from(event.delta.as_int());
                marks.push((tick, Mark::from_kind(&event.kind)));
            }
            track_start = tick;
        }
        marks.sort_by_key(|(tick, _)| *tick);

        let mut notes = Vec::new();
        let mut pending: HashMap<(u8, u8), VecDeque<(Duration, u8)>> = HashMap::new();
        let mut now = Duration::ZERO;
        let mut last_tick = 0;
        for (tick, mark) in marks {
            now += clock.elapsed(tick - last_tick);
            last_tick = tick;

            match mark {
                Mark::Tempo(tempo) => clock.set_tempo(tempo),
                Mark::On {
                    channel,
                    key,
                    velocity,
                } => pending
                    .entry((channel, key))
                    .or_default()
                    .push_back((now, velocity)),
                Mark::Off { channel, key } => {
                    match pending.get_mut(&(channel, key)).and_then(VecDeque::pop_front) {
                        Some((start, velocity)) => notes.push(note(key, start, now, velocity)),
                        None => debug!(channel, key, "Note off without note on"),
                    }
                }
                Mark::Other => {}
            }
        }

        // Notes that never end stop with the song.
        for ((_, key), starts) in pending {
            for (start, velocity) in starts {
                notes.push(note(key, start, now, velocity));
            }
        }
        notes.sort_by(|a, b| a.start.cmp(&b.start).then(a.midi_note.cmp(&b.midi_note)));

        Ok(Song {
            name: name.to_string(),
            notes,
            offset,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The notes, ordered by start time.
    pub fn notes(&self) -> &[SongNote] {
        &self.notes
    }

    /// When the last note ends.
    pub fn duration(&self) -> Duration {
        self.notes
            .iter()
            .map(SongNote::end)
            .max()
            .unwrap_or_default()
    }

    /// The key index a MIDI note plays.
    pub fn index(&self, midi_note: u8) -> i32 {
        i32::from(midi_note).saturating_sub(self.offset)
    }

    /// Every press and release with its time. At equal times releases come
    /// first, so a note ending as another starts on the same key doesn't cut
    /// the new one short.
    pub fn timeline(&self) -> Vec<(Duration, Event)> {
        let mut timeline: Vec<(Duration, Event)> = self
            .notes
            .iter()
            .flat_map(|note| {
                let index = self.index(note.midi_note);
                [
                    (
                        note.start,
                        Event::Press {
                            index,
                            velocity: Some(note.velocity),
                        },
                    ),
                    (note.end(), Event::Release { index }),
                ]
            })
            .collect();
        timeline.sort_by_key(|(at, event)| (*at, matches!(event, Event::Press { .. })));
        timeline
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (notes: {}, duration: {:.1}s)",
            self.name,
            self.notes.len(),
            self.duration().as_secs_f64()
        )
    }
}

fn note(key: u8, start: Duration, end: Duration, velocity: u8) -> SongNote {
    SongNote {
        midi_note: key,
        start,
        duration: end.saturating_sub(start),
        velocity: f32::from(velocity) / 127.0,
    }
}

/// A source that plays a song once, in real time.
pub struct Playback {
    song: Arc<Song>,
    cancel_handle: CancelHandle,
}

impl Playback {
    pub fn new(song: Arc<Song>, cancel_handle: CancelHandle) -> Playback {
        Playback {
            song,
            cancel_handle,
        }
    }

    fn play(
        song: &Song,
        cancel_handle: &CancelHandle,
        events_tx: &Sender<Event>,
    ) -> Result<(), io::Error> {
        // Keys pressed by the song and not yet released.
        let mut sounding: BTreeMap<i32, usize> = BTreeMap::new();
        let start = Instant::now();

        for (at, event) in song.timeline() {
            let wait = at.saturating_sub(start.elapsed());
            if !wait.is_zero() && cancel_handle.wait_timeout(wait) {
                info!(song = song.name(), "Song cancelled.");
                break;
            }
            if cancel_handle.is_cancelled() {
                break;
            }

            match event {
                Event::Press { index, .. } => *sounding.entry(index).or_default() += 1,
                Event::Release { index } => {
                    if let Some(count) = sounding.get_mut(&index) {
                        *count -= 1;
                        if *count == 0 {
                            sounding.remove(&index);
                        }
                    }
                }
                _ => {}
            }
            events_tx.blocking_send(event).map_err(io::Error::other)?;
        }

        // Nothing the song started is left behind.
        for index in sounding.into_keys() {
            events_tx
                .blocking_send(Event::Release { index })
                .map_err(io::Error::other)?;
        }
        Ok(())
    }
}

impl super::Source for Playback {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let song = self.song.clone();
        let cancel_handle = self.cancel_handle.clone();

        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "song playback");
            let _enter = span.enter();

            info!(song = song.to_string(), "Song started.");
            Self::play(&song, &cancel_handle, &events_tx)?;
            info!(song = song.name(), "Song finished.");
            Ok(())
        })
    }
}
