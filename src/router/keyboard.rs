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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::{Event, Mode};

/// Computer keys laid out like a piano, starting at key 0.
pub const KEY_MAP: [char; 18] = [
    'a', 'w', 's', 'e', 'd', 'f', 't', 'g', 'y', 'h', 'u', 'j', 'k', 'o', 'l', 'p', ';', '\'',
];

const HELP: &str = "down/up <key>, press <index> [velocity], release <index>, \
transpose +|-, octave <n>, <drone|coupler|sub|sustain|strict|air> on|off, \
scale next|prev, pump, panic, quit";

/// The key index for a computer key.
pub fn key_index(key: &str) -> Option<i32> {
    let mut chars = key.chars();
    let key = chars.next()?.to_ascii_lowercase();
    if chars.next().is_some() {
        return None;
    }
    KEY_MAP
        .iter()
        .position(|mapped| *mapped == key)
        .map(|position| position as i32)
}

/// Parses one line of keyboard input. Returns None for anything unrecognized.
pub fn parse_line(line: &str) -> Option<Event> {
    let words: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
    let words: Vec<&str> = words.iter().map(String::as_str).collect();

    match words.as_slice() {
        ["down", key] => Some(Event::Press {
            index: key_index(key)?,
            velocity: None,
        }),
        ["up", key] => Some(Event::Release {
            index: key_index(key)?,
        }),
        ["press", index] => Some(Event::Press {
            index: index.parse().ok()?,
            velocity: None,
        }),
        ["press", index, velocity] => Some(Event::Press {
            index: index.parse().ok()?,
            velocity: Some(velocity.parse().ok()?),
        }),
        ["release", index] => Some(Event::Release {
            index: index.parse().ok()?,
        }),
        ["transpose", "+"] => Some(Event::Transpose(1)),
        ["transpose", "-"] => Some(Event::Transpose(-1)),
        ["octave", octave] => Some(Event::Octave(octave.parse().ok()?)),
        ["scale", "next"] => Some(Event::ScaleStep(1)),
        ["scale", "prev"] => Some(Event::ScaleStep(-1)),
        ["pump"] => Some(Event::Pump),
        ["panic"] => Some(Event::Panic),
        ["quit"] => Some(Event::Quit),
        [mode, state] => {
            let mode = match *mode {
                "drone" => Mode::Drone,
                "coupler" => Mode::Coupler,
                "sub" | "sub_octave" => Mode::SubOctave,
                "sustain" => Mode::Sustain,
                "strict" => Mode::StrictScale,
                "air" => Mode::ManualAir,
                _ => return None,
            };
            match *state {
                "on" => Some(Event::Mode(mode, true)),
                "off" => Some(Event::Mode(mode, false)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// A source that reads commands from the terminal.
#[derive(Default)]
pub struct Keyboard {}

impl Keyboard {
    pub fn new() -> Keyboard {
        Keyboard {}
    }

    /// Reads and forwards one line. Returns false once input has ended or a
    /// quit was requested.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "> ")?;
        writer.flush()?;
        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            // End of input quits.
            events_tx
                .blocking_send(Event::Quit)
                .map_err(io::Error::other)?;
            return Ok(false);
        }

        let input = input.trim();
        if input.is_empty() {
            return Ok(true);
        }
        if input == "help" {
            writeln!(writer, "{}", HELP)?;
            return Ok(true);
        }

        match parse_line(input) {
            Some(event) => {
                events_tx.blocking_send(event).map_err(io::Error::other)?;
                Ok(event != Event::Quit)
            }
            None => {
                warn!(input, "Unrecognized input");
                Ok(true)
            }
        }
    }
}

impl super::Source for Keyboard {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard source");
            let _enter = span.enter();

            info!("Keyboard source started. Type help for commands.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard source closed.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader};

    use tokio::sync::mpsc;

    use super::*;

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());
        let mut writer: Vec<u8> = Vec::new();
        let more = Keyboard::monitor_io(&sender, reader, &mut writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((more, receiver.blocking_recv()))
    }

    #[test]
    fn test_key_map() {
        assert_eq!(Some(0), key_index("a"));
        assert_eq!(Some(1), key_index("W"));
        assert_eq!(Some(12), key_index("k"));
        assert_eq!(Some(17), key_index("'"));
        assert_eq!(None, key_index("z"));
        assert_eq!(None, key_index("as"));
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            Some(Event::Press {
                index: 0,
                velocity: None
            }),
            parse_line("down a")
        );
        assert_eq!(Some(Event::Release { index: 12 }), parse_line("up k"));
        assert_eq!(
            Some(Event::Press {
                index: -3,
                velocity: Some(0.5)
            }),
            parse_line("press -3 0.5")
        );
        assert_eq!(Some(Event::Transpose(1)), parse_line("transpose +"));
        assert_eq!(Some(Event::Transpose(-1)), parse_line("transpose -"));
        assert_eq!(Some(Event::Octave(-1)), parse_line("octave -1"));
        assert_eq!(
            Some(Event::Mode(Mode::Sustain, false)),
            parse_line("Sustain OFF")
        );
        assert_eq!(
            Some(Event::Mode(Mode::ManualAir, true)),
            parse_line("air on")
        );
        assert_eq!(Some(Event::ScaleStep(-1)), parse_line("scale prev"));
        assert_eq!(Some(Event::Pump), parse_line(" pump "));
        assert_eq!(None, parse_line("drone maybe"));
        assert_eq!(None, parse_line("press x"));
        assert_eq!(None, parse_line("down q"));
    }

    #[test]
    fn test_monitor_io() -> Result<(), io::Error> {
        assert_eq!((true, Some(Event::Panic)), get_event("panic\n")?);
        assert_eq!((true, None), get_event("unrecognized\n")?);
        assert_eq!((true, None), get_event("\n")?);
        assert_eq!((false, Some(Event::Quit)), get_event("quit\n")?);
        assert_eq!((false, Some(Event::Quit)), get_event("")?);
        Ok(())
    }
}
