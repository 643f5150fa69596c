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
use std::{error::Error, fmt, sync::Arc};

use midly::live::LiveEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc::Sender;
use tracing::info;

/// A mock device. Input is injected by tests and output is recorded.
#[derive(Clone)]
pub struct Device {
    name: String,
    sender: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
    emitted: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            sender: Arc::new(Mutex::new(None)),
            emitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Whether something is currently watching this device.
    pub fn is_watched(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Sends the mock event through to the watcher, if any.
    pub fn mock_event(&self, event: &[u8]) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.try_send(event.to_vec()).is_ok(),
            None => false,
        }
    }

    /// Gets every event emitted so far, as raw bytes.
    pub fn emitted_events(&self) -> Vec<Vec<u8>> {
        self.emitted.lock().clone()
    }

    /// Forgets the recorded output.
    pub fn reset_emitted_events(&self) {
        self.emitted.lock().clear();
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), Box<dyn Error>> {
        let mut current = self.sender.lock();
        if current.is_some() {
            return Err("Already watching events.".into());
        }
        info!(device = self.name, "Watching mock MIDI events.");
        *current = Some(sender);
        Ok(())
    }

    fn stop_watch_events(&self) {
        // Dropping the sender closes the watcher's channel.
        self.sender.lock().take();
    }

    fn emit(&self, event: LiveEvent<'static>) -> Result<(), Box<dyn Error>> {
        let mut buf: Vec<u8> = Vec::with_capacity(8);
        event.write(&mut buf)?;
        self.emitted.lock().push(buf);
        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[cfg(test)]
mod test {
    use midly::{live::LiveEvent, MidiMessage};
    use tokio::sync::mpsc;

    use crate::midi::Device as _;

    use super::Device;

    #[test]
    fn test_mock_event_round_trip() {
        let device = Device::get("mock-keys");
        assert!(!device.mock_event(&[0x90, 60, 100]));

        let (tx, mut rx) = mpsc::channel(4);
        assert!(device.watch_events(tx.clone()).is_ok());
        assert!(device.watch_events(tx).is_err());
        assert!(device.is_watched());
        assert!(device.mock_event(&[0x90, 60, 100]));
        assert_eq!(Some(vec![0x90, 60, 100]), rx.blocking_recv());

        device.stop_watch_events();
        assert!(!device.is_watched());
        assert_eq!(None, rx.blocking_recv());
    }

    #[test]
    fn test_emit_records_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let device = Device::get("mock-synth");
        device.emit(LiveEvent::Midi {
            channel: 0.into(),
            message: MidiMessage::NoteOn {
                key: 60.into(),
                vel: 127.into(),
            },
        })?;
        assert_eq!(vec![vec![0x90, 60, 127]], device.emitted_events());
        device.reset_emitted_events();
        assert!(device.emitted_events().is_empty());
        Ok(())
    }
}
