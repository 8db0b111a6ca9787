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
use std::error::Error;
use std::sync::Arc;

use tracing::info;

use crate::audio::{Backend, BusId};
use crate::dispatch::{DispatchEngine, SoundEntry};

pub mod engine;
pub mod error;
pub mod library;
pub mod preferences;

pub use engine::{BusConfig, ClampPolicy, EngineConfig};
pub use error::ConfigError;
pub use library::{Library, PlaybackPolicy, SoundDefinition};
pub use preferences::{PreferenceFile, Preferences};

/// Collects every sound of a bus: the inline definitions followed by those of
/// its library file.
pub fn bus_sounds(config: &EngineConfig, bus: &BusConfig) -> Result<Vec<SoundDefinition>, ConfigError> {
    let mut sounds = bus.sounds().to_vec();
    if let Some(library) = bus.library() {
        let path = config.resolve(library);
        sounds.extend(Library::deserialize(&path)?.into_sounds());
    }
    Ok(sounds)
}

/// Builds an engine from a loaded config: buses, libraries and stored
/// preferences.
pub fn init_engine(
    config: &EngineConfig,
    backend: Arc<dyn Backend>,
) -> Result<DispatchEngine, Box<dyn Error>> {
    let mut engine = DispatchEngine::new(config, backend)?;

    for bus in config.buses() {
        let entries: Vec<SoundEntry> = bus_sounds(config, bus)?
            .iter()
            .map(SoundEntry::from)
            .collect();
        engine.register_library(&BusId::new(bus.name()), entries)?;
    }

    if let Some(path) = config.preferences_path() {
        let preferences = PreferenceFile::load_or_default(&path)?;
        info!(path = ?path, entries = preferences.len(), "Loaded preferences");
        engine.apply_preferences(&preferences);
    }

    Ok(engine)
}
