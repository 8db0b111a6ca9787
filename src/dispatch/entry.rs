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

use crate::audio::ClipHandle;
use crate::config::library::{PlaybackPolicy, SoundDefinition};

use super::error::DispatchError;

/// Default base volume for a sound.
pub const DEFAULT_VOLUME: f32 = 0.75;

/// Default base pitch for a sound.
pub const DEFAULT_PITCH: f32 = 1.0;

/// One logical, named sound: its clips, playback policy and per-play ranges.
#[derive(Clone, Debug)]
pub struct SoundEntry {
    /// Unique key the game plays this sound by.
    id: String,
    /// The clips this sound chooses from.
    clips: Vec<ClipHandle>,
    volume: f32,
    volume_variance: f32,
    pitch: f32,
    pitch_variance: f32,
    looping: bool,
    policy: PlaybackPolicy,
    /// Index of the next clip for sequential playback.
    cursor: usize,
}

impl SoundEntry {
    /// Creates a new entry with default volume, pitch and random policy.
    pub fn new(id: &str, clips: Vec<ClipHandle>) -> SoundEntry {
        SoundEntry {
            id: id.to_string(),
            clips,
            volume: DEFAULT_VOLUME,
            volume_variance: 0.0,
            pitch: DEFAULT_PITCH,
            pitch_variance: 0.0,
            looping: false,
            policy: PlaybackPolicy::Random,
            cursor: 0,
        }
    }

    pub fn with_volume(mut self, volume: f32, variance: f32) -> SoundEntry {
        self.volume = volume;
        self.volume_variance = variance;
        self
    }

    pub fn with_pitch(mut self, pitch: f32, variance: f32) -> SoundEntry {
        self.pitch = pitch;
        self.pitch_variance = variance;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> SoundEntry {
        self.looping = looping;
        self
    }

    pub fn with_policy(mut self, policy: PlaybackPolicy) -> SoundEntry {
        self.policy = policy;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn clips(&self) -> &[ClipHandle] {
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

    /// Returns the index the next sequential play will use.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns true if the clip is one of this entry's clips.
    pub fn contains(&self, clip: &ClipHandle) -> bool {
        self.clips.contains(clip)
    }

    /// Rewinds sequential playback to the first clip.
    pub fn reset_sequence(&mut self) {
        self.cursor = 0;
    }

    /// Returns the current sequential index and advances the cursor.
    /// Must not be called on an entry without clips.
    pub(crate) fn advance_sequence(&mut self) -> usize {
        let index = self.cursor % self.clips.len();
        self.cursor = (index + 1) % self.clips.len();
        index
    }

    /// Checks the structural constraints enforced at registration.
    pub fn validate(&self) -> Result<(), DispatchError> {
        let malformed = |reason: &str| DispatchError::MalformedEntry {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(malformed("id is empty"));
        }
        for (name, value) in [
            ("volume", self.volume),
            ("volume_variance", self.volume_variance),
            ("pitch", self.pitch),
            ("pitch_variance", self.pitch_variance),
        ] {
            if !value.is_finite() {
                return Err(malformed(&format!("{} is not a finite number", name)));
            }
        }
        if self.volume_variance < 0.0 || self.pitch_variance < 0.0 {
            return Err(malformed("variance must not be negative"));
        }
        // The jitter range spans twice the variance and must stay finite.
        if !(2.0 * self.volume_variance).is_finite() || !(2.0 * self.pitch_variance).is_finite() {
            return Err(malformed("variance is too large"));
        }
        Ok(())
    }
}

impl From<&SoundDefinition> for SoundEntry {
    fn from(definition: &SoundDefinition) -> Self {
        SoundEntry::new(
            definition.id(),
            definition
                .clips()
                .iter()
                .map(|clip| ClipHandle::new(clip))
                .collect(),
        )
        .with_volume(definition.volume(), definition.volume_variance())
        .with_pitch(definition.pitch(), definition.pitch_variance())
        .with_looping(definition.looping())
        .with_policy(definition.policy())
    }
}
