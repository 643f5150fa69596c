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
use std::path::Path;

use tracing::info;

mod error;
mod instrument;

pub use error::ConfigError;
pub use instrument::{Air, Instrument, ScaleDefinition, Volume, VolumeMapping};

/// Loads the instrument configuration from the given YAML file, or the
/// defaults if no file was given.
pub fn load(path: Option<&Path>) -> Result<Instrument, ConfigError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading instrument configuration");
            Instrument::deserialize(path)
        }
        None => Ok(Instrument::default()),
    }
}
