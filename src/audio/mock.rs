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
use std::{collections::HashMap, fmt, time::Duration};

use parking_lot::RwLock;
use tracing::debug;

use super::{BackendError, BusId, ChannelId, ChannelSettings, ClipHandle};

/// How long a clip plays when no explicit length was registered.
const DEFAULT_CLIP_LENGTH: Duration = Duration::from_secs(1);

struct Channel {
    bus: BusId,
    playing: bool,
    clip: Option<ClipHandle>,
    volume: f32,
    pitch: f32,
    looping: bool,
    /// Time left before a non-looping clip finishes on its own.
    remaining: Duration,
}

#[derive(Default)]
struct State {
    channels: Vec<Channel>,
    parameters: HashMap<String, f32>,
    clip_lengths: HashMap<ClipHandle, Duration>,
}

/// A mock backend. Doesn't actually play anything, but tracks channel state and
/// lets clips finish when time is advanced.
pub struct Backend {
    name: String,
    max_channels: Option<usize>,
    state: RwLock<State>,
}

impl Backend {
    /// Gets the given mock backend.
    pub fn get(name: &str) -> Backend {
        Backend {
            name: name.to_string(),
            max_channels: None,
            state: RwLock::new(State::default()),
        }
    }

    /// Caps the total number of channels; further allocations fail.
    pub fn with_max_channels(mut self, max_channels: usize) -> Backend {
        self.max_channels = Some(max_channels);
        self
    }

    /// Exposes a named mixer parameter with its initial value.
    pub fn with_parameter(self, name: &str, value: f32) -> Backend {
        self.state.write().parameters.insert(name.to_string(), value);
        self
    }

    /// Sets how long the given clip plays before finishing.
    pub fn with_clip_length(self, clip: &str, length: Duration) -> Backend {
        self.state
            .write()
            .clip_lengths
            .insert(ClipHandle::new(clip), length);
        self
    }

    /// Advances simulated time, finishing non-looping clips that ran out.
    pub fn advance(&self, dt: Duration) {
        let mut state = self.state.write();
        for (index, channel) in state.channels.iter_mut().enumerate() {
            if !channel.playing || channel.looping {
                continue;
            }
            channel.remaining = channel.remaining.saturating_sub(dt);
            if channel.remaining.is_zero() {
                channel.playing = false;
                debug!(channel = index, "Clip finished");
            }
        }
    }

    /// Returns the number of channels allocated for the bus.
    pub fn channel_count(&self, bus: &BusId) -> usize {
        self.state
            .read()
            .channels
            .iter()
            .filter(|channel| &channel.bus == bus)
            .count()
    }

    /// Returns the channels that are currently playing.
    pub fn playing_channels(&self) -> Vec<ChannelId> {
        self.state
            .read()
            .channels
            .iter()
            .enumerate()
            .filter(|(_, channel)| channel.playing)
            .map(|(index, _)| ChannelId::new(index as u64))
            .collect()
    }

    /// Returns the last settings applied to a channel.
    pub fn settings(&self, channel: ChannelId) -> Option<ChannelSettings> {
        let state = self.state.read();
        let channel = state.channels.get(channel.get() as usize)?;
        channel.clip.as_ref().map(|clip| ChannelSettings {
            clip: clip.clone(),
            volume: channel.volume,
            pitch: channel.pitch,
            looping: channel.looping,
        })
    }

    fn with_channel<T>(
        &self,
        channel: ChannelId,
        f: impl FnOnce(&mut Channel, Duration) -> T,
    ) -> Result<T, BackendError> {
        let mut state = self.state.write();
        let state = &mut *state;
        let entry = state
            .channels
            .get_mut(channel.get() as usize)
            .ok_or(BackendError::UnknownChannel(channel))?;
        let length = entry
            .clip
            .as_ref()
            .and_then(|clip| state.clip_lengths.get(clip))
            .copied()
            .unwrap_or(DEFAULT_CLIP_LENGTH);
        Ok(f(entry, length))
    }
}

impl super::Backend for Backend {
    fn create_channel(&self, bus: &BusId) -> Result<ChannelId, BackendError> {
        let mut state = self.state.write();
        if self
            .max_channels
            .is_some_and(|max| state.channels.len() >= max)
        {
            return Err(BackendError::Exhausted(bus.clone()));
        }

        state.channels.push(Channel {
            bus: bus.clone(),
            playing: false,
            clip: None,
            volume: 1.0,
            pitch: 1.0,
            looping: false,
            remaining: Duration::ZERO,
        });
        Ok(ChannelId::new((state.channels.len() - 1) as u64))
    }

    fn play(&self, channel: ChannelId, settings: &ChannelSettings) -> Result<(), BackendError> {
        let mut state = self.state.write();
        let length = state
            .clip_lengths
            .get(&settings.clip)
            .copied()
            .unwrap_or(DEFAULT_CLIP_LENGTH);
        let entry = state
            .channels
            .get_mut(channel.get() as usize)
            .ok_or(BackendError::UnknownChannel(channel))?;
        entry.clip = Some(settings.clip.clone());
        entry.volume = settings.volume;
        entry.pitch = settings.pitch;
        entry.looping = settings.looping;
        entry.remaining = length;
        entry.playing = true;
        Ok(())
    }

    fn start(&self, channel: ChannelId) -> Result<(), BackendError> {
        self.with_channel(channel, |entry, length| {
            if entry.clip.is_some() {
                entry.remaining = length;
                entry.playing = true;
            }
        })
    }

    fn stop(&self, channel: ChannelId) -> Result<(), BackendError> {
        self.with_channel(channel, |entry, _| entry.playing = false)
    }

    fn is_playing(&self, channel: ChannelId) -> bool {
        self.state
            .read()
            .channels
            .get(channel.get() as usize)
            .is_some_and(|entry| entry.playing)
    }

    fn current_clip(&self, channel: ChannelId) -> Option<ClipHandle> {
        self.state
            .read()
            .channels
            .get(channel.get() as usize)
            .and_then(|entry| entry.clip.clone())
    }

    fn volume(&self, channel: ChannelId) -> Result<f32, BackendError> {
        self.with_channel(channel, |entry, _| entry.volume)
    }

    fn set_volume(&self, channel: ChannelId, volume: f32) -> Result<(), BackendError> {
        self.with_channel(channel, |entry, _| entry.volume = volume)
    }

    fn parameter(&self, name: &str) -> Result<f32, BackendError> {
        self.state
            .read()
            .parameters
            .get(name)
            .copied()
            .ok_or_else(|| BackendError::UnknownParameter(name.to_string()))
    }

    fn set_parameter(&self, name: &str, value: f32) -> Result<(), BackendError> {
        let mut state = self.state.write();
        match state.parameters.get_mut(name) {
            Some(current) => {
                *current = value;
                Ok(())
            }
            None => Err(BackendError::UnknownParameter(name.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
