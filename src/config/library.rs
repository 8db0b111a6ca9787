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

use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// How a sound with several clips chooses what to play.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPolicy {
    /// Play one clip picked uniformly at random.
    #[default]
    Random,
    /// Play the clips one after another, wrapping around.
    Sequential,
    /// Play every clip at once, each on its own channel.
    All,
}

fn default_volume() -> f32 {
    crate::dispatch::DEFAULT_VOLUME
}

fn default_pitch() -> f32 {
    crate::dispatch::DEFAULT_PITCH
}

/// A YAML representation of a sound.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct SoundDefinition {
    /// The id the game plays this sound by.
    id: String,

    /// The clips this sound plays.
    #[serde(default)]
    clips: Vec<String>,

    /// Base volume (0.0 to 1.0).
    #[serde(default = "default_volume")]
    volume: f32,

    /// Random volume offset applied per play, in both directions.
    #[serde(default)]
    volume_variance: f32,

    /// Base pitch.
    #[serde(default = "default_pitch")]
    pitch: f32,

    /// Random pitch offset applied per play, in both directions.
    #[serde(default)]
    pitch_variance: f32,

    /// Whether the clip loops until stopped.
    #[serde(default, rename = "loop")]
    looping: bool,

    /// How the clip is chosen when there are several.
    #[serde(default)]
    policy: PlaybackPolicy,
}

impl SoundDefinition {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn clips(&self) -> &[String] {
        &self.clips
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn volume_variance(&self) -> f32 {
        self.volume_variance
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn pitch_variance(&self) -> f32 {
        self.pitch_variance
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn policy(&self) -> PlaybackPolicy {
        self.policy
    }
}

/// A library of sounds, typically one file per bus.
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct Library {
    #[serde(default)]
    sounds: Vec<SoundDefinition>,
}

impl Library {
    pub fn new(sounds: Vec<SoundDefinition>) -> Library {
        Library { sounds }
    }

    /// Parse a library from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Library, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Library>()?)
    }

    pub fn sounds(&self) -> &[SoundDefinition] {
        &self.sounds
    }

    pub fn into_sounds(self) -> Vec<SoundDefinition> {
        self.sounds
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Library {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_library_defaults() {
        let library = parse(
            r#"
            sounds:
              - id: click
                clips:
                  - ui/click.wav
        "#,
        );

        let click = &library.sounds()[0];
        assert_eq!(click.id(), "click");
        assert_eq!(click.clips(), &["ui/click.wav".to_string()]);
        assert_eq!(click.volume(), 0.75);
        assert_eq!(click.volume_variance(), 0.0);
        assert_eq!(click.pitch(), 1.0);
        assert_eq!(click.pitch_variance(), 0.0);
        assert!(!click.looping());
        assert_eq!(click.policy(), PlaybackPolicy::Random);
    }

    #[test]
    fn test_library_full_definition() {
        let library = parse(
            r#"
            sounds:
              - id: footsteps
                clips: [step1.wav, step2.wav, step3.wav]
                volume: 0.5
                volume_variance: 0.1
                pitch: 1.2
                pitch_variance: 0.05
                policy: sequential
              - id: ambience
                clips: [wind.ogg, birds.ogg]
                loop: true
                policy: all
        "#,
        );

        assert_eq!(library.sounds().len(), 2);
        let footsteps = &library.sounds()[0];
        assert_eq!(footsteps.clips().len(), 3);
        assert_eq!(footsteps.volume(), 0.5);
        assert_eq!(footsteps.volume_variance(), 0.1);
        assert_eq!(footsteps.pitch(), 1.2);
        assert_eq!(footsteps.pitch_variance(), 0.05);
        assert_eq!(footsteps.policy(), PlaybackPolicy::Sequential);

        let ambience = &library.sounds()[1];
        assert!(ambience.looping());
        assert_eq!(ambience.policy(), PlaybackPolicy::All);
    }

    #[test]
    fn test_library_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sfx.yaml");
        std::fs::write(
            &path,
            "sounds:\n  - id: explosion\n    clips: [boom1.wav, boom2.wav]\n",
        )
        .unwrap();

        let library = Library::deserialize(&path).unwrap();
        assert_eq!(library.sounds()[0].id(), "explosion");
        assert_eq!(library.sounds()[0].clips().len(), 2);
    }

    #[test]
    fn test_library_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Library::deserialize(&dir.path().join("missing.yaml")),
            Err(ConfigError::Load(_))
        ));
    }
}
