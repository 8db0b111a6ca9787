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

//! The dispatch engine: pooled channels, playback policies and fades.
//!
//! This module provides:
//! - Sound entries with their per-play state
//! - Grow-only channel pools per bus
//! - Policy resolution (random, sequential, all)
//! - Tick-driven fades on channels and mixer parameters
//! - The engine façade tying them together

mod engine;
mod entry;
mod error;
mod fade;
mod pool;
mod resolver;

pub use engine::{DispatchEngine, SoundState};
pub use entry::{SoundEntry, DEFAULT_PITCH, DEFAULT_VOLUME};
pub use error::DispatchError;
pub use fade::{FadeCompletion, FadeHandle, FadeScheduler, FadeTarget};
pub use pool::ChannelPool;
pub use resolver::PlaybackResolver;
