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

//! The seam between the dispatch engine and the platform audio backend.
//!
//! The engine never mixes audio. It allocates output channels, points them at
//! opaque clips, sets their live parameters and starts or stops them. Named
//! mixer parameters (bus gains) are read and written through the same trait.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod mock;

/// Identifies an output channel allocated by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    pub fn new(id: u64) -> ChannelId {
        ChannelId(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// An opaque reference to playable audio data owned by the asset layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ClipHandle(String);

impl ClipHandle {
    pub fn new(name: &str) -> ClipHandle {
        ClipHandle(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The name of an output group ("music", "sfx").
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct BusId(String);

impl BusId {
    pub fn new(name: &str) -> BusId {
        BusId(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a channel needs to start a clip.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelSettings {
    pub clip: ClipHandle,
    pub volume: f32,
    pub pitch: f32,
    pub looping: bool,
}

/// Failures reported by a backend.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BackendError {
    #[error("no more channels can be allocated for bus {0}")]
    Exhausted(BusId),
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),
    #[error("unknown mixer parameter {0}")]
    UnknownParameter(String),
}

/// A platform audio backend.
///
/// All methods take `&self`: implementations own their channel state and must
/// serialize access to it internally, since the backend is typically read by
/// an audio callback while the engine writes to it.
pub trait Backend: Send + Sync {
    /// Allocates a new idle channel routed to the given bus.
    fn create_channel(&self, bus: &BusId) -> Result<ChannelId, BackendError>;

    /// Loads the clip and parameters onto the channel and starts it.
    fn play(&self, channel: ChannelId, settings: &ChannelSettings) -> Result<(), BackendError>;

    /// Restarts whatever clip the channel currently holds.
    fn start(&self, channel: ChannelId) -> Result<(), BackendError>;

    fn stop(&self, channel: ChannelId) -> Result<(), BackendError>;

    /// Returns true while the channel is producing sound. Unknown channels are
    /// reported as not playing.
    fn is_playing(&self, channel: ChannelId) -> bool;

    fn current_clip(&self, channel: ChannelId) -> Option<ClipHandle>;

    fn volume(&self, channel: ChannelId) -> Result<f32, BackendError>;

    fn set_volume(&self, channel: ChannelId, volume: f32) -> Result<(), BackendError>;

    /// Reads a named mixer parameter (e.g. a bus gain in dB).
    fn parameter(&self, name: &str) -> Result<f32, BackendError>;

    fn set_parameter(&self, name: &str, value: f32) -> Result<(), BackendError>;
}
