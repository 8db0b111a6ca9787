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

//! The engine façade the game talks to.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::entry::SoundEntry;
use super::error::DispatchError;
use super::fade::{FadeCompletion, FadeHandle, FadeScheduler, FadeTarget};
use super::pool::ChannelPool;
use super::resolver::PlaybackResolver;
use crate::audio::{Backend, BackendError, BusId, ChannelId};
use crate::config::{EngineConfig, Preferences};

/// Whether a sound currently has audible channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundState {
    Idle,
    Playing,
}

/// A registered sound and the bus it plays on.
struct RegisteredSound {
    bus: BusId,
    entry: SoundEntry,
}

/// A play waiting for its delay to run out.
struct PendingPlay {
    id: String,
    remaining: Duration,
}

/// Dispatches logical sound ids onto pooled backend channels and runs fades.
///
/// The engine is driven by one `tick` per frame. Nothing blocks: delayed plays
/// and fades are timers advanced by the tick's elapsed time.
pub struct DispatchEngine {
    backend: Arc<dyn Backend>,
    /// Gain parameter per bus.
    buses: BTreeMap<BusId, String>,
    master_parameter: String,
    /// Gain bus fade-outs head to; stored preferences below it are unset.
    silence_level: f32,
    sounds: HashMap<String, RegisteredSound>,
    pool: ChannelPool,
    resolver: PlaybackResolver,
    fades: FadeScheduler,
    pending: Vec<PendingPlay>,
    /// The sound that last started each channel.
    owners: HashMap<ChannelId, String>,
    /// Gain levels seeded from stored preferences, per parameter.
    preferred: HashMap<String, f32>,
}

impl DispatchEngine {
    /// Creates an engine for the configured buses and allocates their initial
    /// channels.
    pub fn new(
        config: &EngineConfig,
        backend: Arc<dyn Backend>,
    ) -> Result<DispatchEngine, DispatchError> {
        let mut pool = ChannelPool::new();
        let mut buses = BTreeMap::new();
        for bus in config.buses() {
            let id = BusId::new(bus.name());
            pool.prewarm(&id, bus.prewarm(), backend.as_ref())?;
            buses.insert(id, bus.gain_parameter().to_string());
        }

        Ok(DispatchEngine {
            backend,
            buses,
            master_parameter: config.master_parameter().to_string(),
            silence_level: config.silence_level(),
            sounds: HashMap::new(),
            pool,
            resolver: PlaybackResolver::new(config.clamp()),
            fades: FadeScheduler::new(),
            pending: Vec::new(),
            owners: HashMap::new(),
            preferred: HashMap::new(),
        })
    }

    /// Replaces the resolver's randomness with a fixed seed.
    pub fn with_resolver(mut self, resolver: PlaybackResolver) -> DispatchEngine {
        self.resolver = resolver;
        self
    }

    /// Registers a library of sounds on a bus.
    ///
    /// The batch is registered all or nothing: a malformed entry, or an id
    /// that appears twice in the batch or is already registered, rejects the
    /// whole library.
    pub fn register_library(
        &mut self,
        bus: &BusId,
        entries: Vec<SoundEntry>,
    ) -> Result<(), DispatchError> {
        if !self.buses.contains_key(bus) {
            return Err(DispatchError::UnknownBus(bus.clone()));
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            entry.validate()?;
            if self.sounds.contains_key(entry.id()) || !seen.insert(entry.id()) {
                return Err(DispatchError::DuplicateId(entry.id().to_string()));
            }
        }

        let count = entries.len();
        for entry in entries {
            if entry.clips().is_empty() {
                warn!(sound = entry.id(), bus = %bus, "Registered sound has no clips");
            }
            self.sounds.insert(
                entry.id().to_string(),
                RegisteredSound {
                    bus: bus.clone(),
                    entry,
                },
            );
        }

        info!(bus = %bus, sounds = count, "Library registered");
        Ok(())
    }

    /// Plays a sound now and returns the channels it started.
    ///
    /// Unknown ids and sounds without clips are logged and play nothing. Only
    /// a failure to obtain or start a channel is returned as an error.
    pub fn play(&mut self, id: &str) -> Result<Vec<ChannelId>, DispatchError> {
        let Some(sound) = self.sounds.get_mut(id) else {
            warn!(err = %not_found(id), "Ignoring play");
            return Ok(Vec::new());
        };

        let channels = self.resolver.play(
            &mut sound.entry,
            &sound.bus,
            &mut self.pool,
            self.backend.as_ref(),
        )?;

        for channel in &channels {
            // A fade left over from the channel's previous sound must not touch this one.
            if self.fades.cancel(&FadeTarget::Channel(*channel)) {
                debug!(channel = %channel, "Cancelled stale fade on reused channel");
            }
            self.owners.insert(*channel, id.to_string());
        }
        Ok(channels)
    }

    /// Plays a sound once `delay` of tick time has passed. A zero delay plays
    /// immediately and returns the started channels; otherwise nothing has
    /// started yet and the returned list is empty.
    pub fn play_after(
        &mut self,
        id: &str,
        delay: Duration,
    ) -> Result<Vec<ChannelId>, DispatchError> {
        if delay.is_zero() {
            return self.play(id);
        }
        if !self.sounds.contains_key(id) {
            warn!(err = %not_found(id), "Ignoring play");
            return Ok(Vec::new());
        }

        debug!(sound = id, delay = ?delay, "Play scheduled");
        self.pending.push(PendingPlay {
            id: id.to_string(),
            remaining: delay,
        });
        Ok(Vec::new())
    }

    /// Stops every channel this sound started that is still playing one of its
    /// clips, and drops its pending delayed plays. Returns the number of
    /// channels stopped.
    pub fn stop(&mut self, id: &str) -> usize {
        let Some(sound) = self.sounds.get(id) else {
            warn!(err = %not_found(id), "Ignoring stop");
            return 0;
        };

        self.pending.retain(|pending| pending.id != id);

        let backend = self.backend.as_ref();
        let channels: Vec<ChannelId> = self
            .owners
            .iter()
            .filter(|(channel, owner)| {
                owner.as_str() == id
                    && backend.is_playing(**channel)
                    && backend
                        .current_clip(**channel)
                        .is_some_and(|clip| sound.entry.contains(&clip))
            })
            .map(|(channel, _)| *channel)
            .collect();

        let mut stopped = 0;
        for channel in channels {
            self.fades.cancel(&FadeTarget::Channel(channel));
            match backend.stop(channel) {
                Ok(()) => stopped += 1,
                Err(e) => warn!(sound = id, channel = %channel, err = %e, "Unable to stop channel"),
            }
        }

        debug!(sound = id, stopped, "Sound stopped");
        stopped
    }

    /// Fades a target up to `to_value`. For a channel, `replay` restarts its
    /// clip first. A zero duration sets the value at once and creates no fade.
    pub fn fade_in(
        &mut self,
        target: FadeTarget,
        duration: Duration,
        to_value: f32,
        replay: bool,
    ) -> Option<FadeHandle> {
        if let (FadeTarget::Channel(channel), true) = (&target, replay) {
            if let Err(e) = self.backend.start(*channel) {
                warn!(channel = %channel, err = %e, "Unable to restart channel");
                return None;
            }
        }
        self.fade(target, duration, to_value, FadeCompletion::Hold)
    }

    /// Fades a target down to `to_value`. For a channel, `stop` stops it once
    /// the fade completes. A zero duration applies both at once.
    pub fn fade_out(
        &mut self,
        target: FadeTarget,
        duration: Duration,
        to_value: f32,
        stop: bool,
    ) -> Option<FadeHandle> {
        let completion = if stop {
            FadeCompletion::Stop
        } else {
            FadeCompletion::Hold
        };
        self.fade(target, duration, to_value, completion)
    }

    /// Fades a bus's gain back up to its stored preference, or 0 dB.
    pub fn fade_in_bus(&mut self, bus: &BusId, duration: Duration) -> Option<FadeHandle> {
        let parameter = self.gain_parameter(bus)?.to_string();
        let to_value = self.preferred.get(&parameter).copied().unwrap_or(0.0);
        self.fade(
            FadeTarget::Parameter(parameter),
            duration,
            to_value,
            FadeCompletion::Hold,
        )
    }

    /// Fades a bus's gain down to the silence level.
    pub fn fade_out_bus(&mut self, bus: &BusId, duration: Duration) -> Option<FadeHandle> {
        let parameter = self.gain_parameter(bus)?.to_string();
        let to_value = self.silence_level;
        self.fade(
            FadeTarget::Parameter(parameter),
            duration,
            to_value,
            FadeCompletion::Hold,
        )
    }

    fn fade(
        &mut self,
        target: FadeTarget,
        duration: Duration,
        to_value: f32,
        completion: FadeCompletion,
    ) -> Option<FadeHandle> {
        let from = match self.read(&target) {
            Ok(value) => value,
            Err(e) => {
                warn!(fade = %target, err = %e, "Unable to fade");
                return None;
            }
        };

        if !duration.is_zero() {
            return Some(
                self.fades
                    .schedule(target, from, to_value, duration, completion),
            );
        }

        self.fades.cancel(&target);
        let result = self.write(&target, to_value).and_then(|_| match (&target, completion) {
            (FadeTarget::Channel(channel), FadeCompletion::Stop) => self.backend.stop(*channel),
            _ => Ok(()),
        });
        if let Err(e) = result {
            warn!(fade = %target, err = %e, "Unable to set value");
        }
        None
    }

    fn read(&self, target: &FadeTarget) -> Result<f32, BackendError> {
        match target {
            FadeTarget::Channel(channel) => self.backend.volume(*channel),
            FadeTarget::Parameter(name) => self.backend.parameter(name),
        }
    }

    fn write(&self, target: &FadeTarget, value: f32) -> Result<(), BackendError> {
        match target {
            FadeTarget::Channel(channel) => self.backend.set_volume(*channel, value),
            FadeTarget::Parameter(name) => self.backend.set_parameter(name, value),
        }
    }

    /// Raises a mixer parameter by `delta` and returns the new value.
    pub fn increase_volume(&mut self, parameter: &str, delta: f32) -> Option<f32> {
        self.nudge(parameter, delta)
    }

    /// Lowers a mixer parameter by `delta` and returns the new value.
    pub fn decrease_volume(&mut self, parameter: &str, delta: f32) -> Option<f32> {
        self.nudge(parameter, -delta)
    }

    fn nudge(&mut self, parameter: &str, delta: f32) -> Option<f32> {
        if !delta.is_finite() {
            warn!(parameter, delta, "Ignoring non-finite volume change");
            return None;
        }

        let target = FadeTarget::Parameter(parameter.to_string());
        let value = match self.read(&target) {
            Ok(current) => current + delta,
            Err(e) => {
                warn!(parameter, err = %e, "Unable to change volume");
                return None;
            }
        };

        self.fades.cancel(&target);
        if let Err(e) = self.write(&target, value) {
            warn!(parameter, err = %e, "Unable to change volume");
            return None;
        }
        Some(value)
    }

    /// Seeds the master and bus gain parameters from stored preferences.
    /// Values below the silence level count as unset and are skipped.
    pub fn apply_preferences(&mut self, preferences: &dyn Preferences) {
        let parameters: Vec<String> = std::iter::once(self.master_parameter.clone())
            .chain(self.buses.values().cloned())
            .collect();

        for parameter in parameters {
            let Some(value) = preferences.get(&parameter) else {
                continue;
            };
            if value < self.silence_level {
                debug!(parameter, value, "Preference unset, keeping mixer default");
                continue;
            }
            match self.backend.set_parameter(&parameter, value) {
                Ok(()) => {
                    info!(parameter, value, "Applied volume preference");
                    self.preferred.insert(parameter, value);
                }
                Err(e) => warn!(parameter, err = %e, "Unable to apply volume preference"),
            }
        }
    }

    /// Rewinds a sequential sound to its first clip.
    pub fn reset_sequence(&mut self, id: &str) {
        match self.sounds.get_mut(id) {
            Some(sound) => sound.entry.reset_sequence(),
            None => warn!(err = %not_found(id), "Ignoring sequence reset"),
        }
    }

    /// Advances the engine by `dt`: fires due delayed plays, then steps every
    /// fade.
    pub fn tick(&mut self, dt: Duration) {
        let mut due = Vec::new();
        self.pending.retain_mut(|pending| {
            pending.remaining = pending.remaining.saturating_sub(dt);
            if pending.remaining.is_zero() {
                due.push(pending.id.clone());
                false
            } else {
                true
            }
        });

        for id in due {
            if let Err(e) = self.play(&id) {
                error!(sound = id, err = %e, "Delayed play failed");
            }
        }

        self.fades.tick(dt, self.backend.as_ref());
    }

    /// Returns whether any channel started by the sound is still playing.
    pub fn state(&self, id: &str) -> SoundState {
        let playing = self
            .owners
            .iter()
            .any(|(channel, owner)| owner == id && self.backend.is_playing(*channel));
        if playing {
            SoundState::Playing
        } else {
            SoundState::Idle
        }
    }

    pub fn sound(&self, id: &str) -> Option<&SoundEntry> {
        self.sounds.get(id).map(|sound| &sound.entry)
    }

    /// Returns the bus a sound plays on.
    pub fn sound_bus(&self, id: &str) -> Option<&BusId> {
        self.sounds.get(id).map(|sound| &sound.bus)
    }

    /// Returns all registered ids, sorted.
    pub fn sound_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sounds.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn buses(&self) -> impl Iterator<Item = &BusId> {
        self.buses.keys()
    }

    pub fn gain_parameter(&self, bus: &BusId) -> Option<&str> {
        let parameter = self.buses.get(bus).map(String::as_str);
        if parameter.is_none() {
            warn!(bus = %bus, "Bus not found");
        }
        parameter
    }

    pub fn master_parameter(&self) -> &str {
        &self.master_parameter
    }

    pub fn pool(&self) -> &ChannelPool {
        &self.pool
    }

    pub fn fades(&self) -> &FadeScheduler {
        &self.fades
    }

    /// Returns the number of delayed plays that haven't fired yet.
    pub fn pending_plays(&self) -> usize {
        self.pending.len()
    }
}

fn not_found(id: &str) -> DispatchError {
    DispatchError::NotFound(id.to_string())
}

impl fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("buses", &self.buses.len())
            .field("sounds", &self.sounds.len())
            .field("channels", &self.pool.total())
            .field("fades", &self.fades.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
