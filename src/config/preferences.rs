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

//! Read access to persisted user preferences (bus gains in dB).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::error::ConfigError;

/// A key/value store of persisted volume levels.
pub trait Preferences {
    /// Returns the stored value for the key, if any.
    fn get(&self, key: &str) -> Option<f32>;
}

impl Preferences for HashMap<String, f32> {
    fn get(&self, key: &str) -> Option<f32> {
        HashMap::get(self, key).copied()
    }
}

/// Preferences read from a flat YAML map, e.g. `MusicVol: -12.0`.
#[derive(Debug, Default)]
pub struct PreferenceFile {
    values: HashMap<String, f32>,
}

impl PreferenceFile {
    /// Loads preferences from the given file.
    pub fn load(path: &Path) -> Result<PreferenceFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Preferences {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads preferences from the given file, treating a missing file as empty.
    pub fn load_or_default(path: &Path) -> Result<PreferenceFile, ConfigError> {
        if !path.exists() {
            return Ok(PreferenceFile::default());
        }
        Self::load(path)
    }

    fn parse(contents: &str) -> Result<PreferenceFile, serde_yml::Error> {
        if contents.trim().is_empty() {
            return Ok(PreferenceFile::default());
        }
        Ok(PreferenceFile {
            values: serde_yml::from_str(contents)?,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Preferences for PreferenceFile {
    fn get(&self, key: &str) -> Option<f32> {
        self.values.get(key).copied()
    }
}
