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

//! MIDI ports the instrument talks to. A device's input side is where a
//! controller keyboard plays the harmonium from, and its output side is where
//! the MIDI sampler sends voices and bellows volume.

use std::{error::Error, fmt, sync::Arc};

use midly::live::LiveEvent;
use tokio::sync::mpsc::Sender;

mod midir;
pub mod mock;

/// A named MIDI port pair. Either side may be missing: a controller with no
/// output can still play keys, and a sound module with no input can still be
/// the sampler.
pub trait Device: fmt::Display + Send + Sync {
    /// The port name used to select the device in the instrument config.
    fn name(&self) -> String;

    /// Forwards every raw message from the input port to `sender` until
    /// [`Device::stop_watch_events`] is called. Fails if the device has no
    /// input port or it can't be opened.
    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), Box<dyn Error>>;

    fn stop_watch_events(&self);

    /// Sends a note or controller message to the output port, opening it on
    /// first use.
    fn emit(&self, event: LiveEvent<'static>) -> Result<(), Box<dyn Error>>;
}

/// Every port the system MIDI backend can see, with inputs and outputs of the
/// same name merged into one device.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    midir::list()
}

/// Looks up `midi_input` or `midi_output` from the config. Names starting with
/// "mock" give an in-memory device for tests and dry runs.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    match name.strip_prefix("mock") {
        Some(_) => Ok(Arc::new(mock::Device::get(name))),
        None => Ok(Arc::new(midir::get(name)?)),
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::get_device;

    #[test]
    fn test_mock_lookup() -> Result<(), Box<dyn Error>> {
        let device = get_device("mock-sampler")?;
        assert_eq!("mock-sampler", device.name());
        Ok(())
    }
}
