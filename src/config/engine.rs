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
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::library::SoundDefinition;
use crate::util::parse_duration;

const DEFAULT_MASTER_PARAMETER: &str = "MasterVol";
const DEFAULT_SILENCE_LEVEL: f32 = -80.0;
const DEFAULT_PREWARM: usize = 1;
const DEFAULT_BUS_FADE_TIME: Duration = Duration::from_secs(1);

fn default_master_parameter() -> String {
    DEFAULT_MASTER_PARAMETER.to_string()
}

fn default_silence_level() -> f32 {
    DEFAULT_SILENCE_LEVEL
}

fn default_prewarm() -> usize {
    DEFAULT_PREWARM
}

fn default_true() -> bool {
    true
}

/// Bounds applied to the per-play channel parameters after jitter.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, PartialEq)]
pub struct ClampPolicy {
    /// Clamp volume to [0, 1].
    #[serde(default = "default_true")]
    volume: bool,

    /// Optional [min, max] pitch bounds. Unclamped when unset.
    #[serde(default)]
    pitch: Option<[f32; 2]>,
}

impl Default for ClampPolicy {
    fn default() -> Self {
        ClampPolicy {
            volume: true,
            pitch: None,
        }
    }
}

impl ClampPolicy {
    pub fn new(volume: bool, pitch: Option<[f32; 2]>) -> ClampPolicy {
        ClampPolicy { volume, pitch }
    }

    /// Checks that the pitch bounds, when set, are finite and ordered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.pitch {
            Some([min, max]) if !min.is_finite() || !max.is_finite() || min > max => {
                Err(ConfigError::PitchRange { min, max })
            }
            _ => Ok(()),
        }
    }

    pub fn clamp_volume(&self, volume: f32) -> f32 {
        if self.volume {
            crate::util::clamp01(volume)
        } else {
            volume
        }
    }

    pub fn clamp_pitch(&self, pitch: f32) -> f32 {
        match self.pitch {
            Some([min, max]) if min <= max => pitch.clamp(min, max),
            _ => pitch,
        }
    }
}

/// A YAML representation of an output bus.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct BusConfig {
    /// The bus name sounds are routed by.
    name: String,

    /// The mixer parameter controlling this bus's gain.
    gain_parameter: String,

    /// Channels allocated up front.
    #[serde(default = "default_prewarm")]
    prewarm: usize,

    /// Default duration for bus fades, e.g. "1s".
    fade_time: Option<String>,

    /// A library file with this bus's sounds, relative to the config file.
    library: Option<String>,

    /// Sounds defined inline.
    #[serde(default)]
    sounds: Vec<SoundDefinition>,
}

impl BusConfig {
    pub fn new(name: &str, gain_parameter: &str) -> BusConfig {
        BusConfig {
            name: name.to_string(),
            gain_parameter: gain_parameter.to_string(),
            prewarm: DEFAULT_PREWARM,
            fade_time: None,
            library: None,
            sounds: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gain_parameter(&self) -> &str {
        &self.gain_parameter
    }

    pub fn prewarm(&self) -> usize {
        self.prewarm
    }

    /// Returns the default bus fade duration (default: 1s).
    pub fn fade_time(&self) -> Result<Duration, ConfigError> {
        match &self.fade_time {
            Some(value) => parse_duration(value).map_err(|source| ConfigError::Duration {
                value: value.clone(),
                source,
            }),
            None => Ok(DEFAULT_BUS_FADE_TIME),
        }
    }

    pub fn library(&self) -> Option<&str> {
        self.library.as_deref()
    }

    pub fn sounds(&self) -> &[SoundDefinition] {
        &self.sounds
    }
}

/// The engine configuration.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct EngineConfig {
    /// The mixer parameter for the master gain.
    #[serde(default = "default_master_parameter")]
    master_parameter: String,

    /// Gain (dB) bus fade-outs head to. Stored preferences below this level
    /// count as unset.
    #[serde(default = "default_silence_level")]
    silence_level: f32,

    #[serde(default)]
    clamp: ClampPolicy,

    buses: Vec<BusConfig>,

    /// A preference file relative to the config file.
    preferences: Option<String>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_path: PathBuf,
}

impl EngineConfig {
    pub fn new(buses: Vec<BusConfig>) -> EngineConfig {
        EngineConfig {
            master_parameter: default_master_parameter(),
            silence_level: DEFAULT_SILENCE_LEVEL,
            clamp: ClampPolicy::default(),
            buses,
            preferences: None,
            base_path: PathBuf::new(),
        }
    }

    /// Parse an engine config from a YAML file.
    pub fn deserialize(path: &Path) -> Result<EngineConfig, ConfigError> {
        let mut config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<EngineConfig>()?;
        config.clamp.validate()?;
        config.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    pub fn with_clamp(mut self, clamp: ClampPolicy) -> EngineConfig {
        self.clamp = clamp;
        self
    }

    pub fn master_parameter(&self) -> &str {
        &self.master_parameter
    }

    pub fn silence_level(&self) -> f32 {
        self.silence_level
    }

    pub fn clamp(&self) -> ClampPolicy {
        self.clamp
    }

    pub fn buses(&self) -> &[BusConfig] {
        &self.buses
    }

    pub fn bus(&self, name: &str) -> Option<&BusConfig> {
        self.buses.iter().find(|bus| bus.name == name)
    }

    /// Resolves a path from the config against the config file's directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    pub fn preferences_path(&self) -> Option<PathBuf> {
        self.preferences.as_deref().map(|path| self.resolve(path))
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> EngineConfig {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = parse(
            r#"
            buses:
              - name: sfx
                gain_parameter: SfxVol
        "#,
        );

        assert_eq!(config.master_parameter(), "MasterVol");
        assert_eq!(config.silence_level(), -80.0);
        assert_eq!(config.clamp(), ClampPolicy::default());
        assert_eq!(config.buses().len(), 1);

        let sfx = config.bus("sfx").unwrap();
        assert_eq!(sfx.gain_parameter(), "SfxVol");
        assert_eq!(sfx.prewarm(), 1);
        assert_eq!(sfx.fade_time().unwrap(), Duration::from_secs(1));
        assert!(sfx.library().is_none());
        assert!(sfx.sounds().is_empty());
        assert!(config.preferences_path().is_none());
    }

    #[test]
    fn test_engine_config_full() {
        let config = parse(
            r#"
            master_parameter: Master
            silence_level: -60.0
            clamp:
              volume: false
              pitch: [0.1, 3.0]
            preferences: prefs.yaml
            buses:
              - name: music
                gain_parameter: MusicVol
                prewarm: 2
                fade_time: 2500ms
                library: music.yaml
              - name: sfx
                gain_parameter: SfxVol
                sounds:
                  - id: click
                    clips: [click.wav]
        "#,
        );

        assert_eq!(config.master_parameter(), "Master");
        assert_eq!(config.silence_level(), -60.0);
        assert_eq!(config.clamp(), ClampPolicy::new(false, Some([0.1, 3.0])));

        let music = config.bus("music").unwrap();
        assert_eq!(music.prewarm(), 2);
        assert_eq!(music.fade_time().unwrap(), Duration::from_millis(2500));
        assert_eq!(music.library(), Some("music.yaml"));

        assert_eq!(config.bus("sfx").unwrap().sounds()[0].id(), "click");
        assert!(config.bus("voice").is_none());
    }

    #[test]
    fn test_invalid_fade_time() {
        let config = parse(
            r#"
            buses:
              - name: sfx
                gain_parameter: SfxVol
                fade_time: whenever
        "#,
        );

        assert!(matches!(
            config.bus("sfx").unwrap().fade_time(),
            Err(ConfigError::Duration { .. })
        ));
    }

    #[test]
    fn test_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(
            &path,
            "preferences: prefs.yaml\nbuses:\n  - name: sfx\n    gain_parameter: SfxVol\n    library: sfx.yaml\n",
        )
        .unwrap();

        let config = EngineConfig::deserialize(&path).unwrap();
        assert_eq!(config.preferences_path(), Some(dir.path().join("prefs.yaml")));
        assert_eq!(config.resolve("sfx.yaml"), dir.path().join("sfx.yaml"));
        assert_eq!(config.resolve("/abs/sfx.yaml"), PathBuf::from("/abs/sfx.yaml"));
    }

    #[test]
    fn test_invalid_pitch_range() {
        assert!(ClampPolicy::new(true, Some([0.5, 2.0])).validate().is_ok());
        assert!(ClampPolicy::default().validate().is_ok());
        assert!(matches!(
            ClampPolicy::new(true, Some([2.0, 0.5])).validate(),
            Err(ConfigError::PitchRange { .. })
        ));
        assert!(matches!(
            ClampPolicy::new(true, Some([f32::NAN, 2.0])).validate(),
            Err(ConfigError::PitchRange { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(
            &path,
            "clamp:\n  pitch: [3.0, 0.1]\nbuses:\n  - name: sfx\n    gain_parameter: SfxVol\n",
        )
        .unwrap();
        assert!(matches!(
            EngineConfig::deserialize(&path),
            Err(ConfigError::PitchRange { .. })
        ));
    }

    #[test]
    fn test_with_clamp() {
        let clamp = ClampPolicy::new(false, Some([0.5, 2.0]));
        let config = EngineConfig::new(Vec::new()).with_clamp(clamp);
        assert_eq!(config.clamp(), clamp);
    }

    #[test]
    fn test_clamp_policy() {
        let default = ClampPolicy::default();
        assert_eq!(default.clamp_volume(1.3), 1.0);
        assert_eq!(default.clamp_volume(-0.1), 0.0);
        assert_eq!(default.clamp_pitch(-2.0), -2.0);

        let custom = ClampPolicy::new(false, Some([0.5, 2.0]));
        assert_eq!(custom.clamp_volume(1.3), 1.3);
        assert_eq!(custom.clamp_pitch(0.1), 0.5);
        assert_eq!(custom.clamp_pitch(3.0), 2.0);
    }
}
