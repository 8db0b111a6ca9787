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

//! Tick-driven linear fades on channel volumes and mixer parameters.
//!
//! Each target has at most one fade. Scheduling a fade on a target that is
//! already fading replaces the running fade without applying its completion,
//! so two fades never write the same parameter within a tick.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};

use crate::audio::{Backend, BackendError, ChannelId};
use crate::util::{clamp01, lerp};

/// What a fade writes to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FadeTarget {
    /// The volume of a single channel.
    Channel(ChannelId),
    /// A named mixer parameter, such as a bus gain.
    Parameter(String),
}

impl fmt::Display for FadeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FadeTarget::Channel(channel) => write!(f, "{}", channel),
            FadeTarget::Parameter(name) => write!(f, "param:{}", name),
        }
    }
}

/// What happens once a fade reaches its final value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FadeCompletion {
    /// Leave the target at the final value.
    #[default]
    Hold,
    /// Stop the channel. Has no effect on parameter targets.
    Stop,
}

/// Identifies one scheduled fade. Stays unique per target even after the fade
/// is superseded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FadeHandle {
    target: FadeTarget,
    generation: u64,
}

impl FadeHandle {
    pub fn target(&self) -> &FadeTarget {
        &self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct FadeTask {
    target: FadeTarget,
    from: f32,
    to: f32,
    duration: Duration,
    elapsed: Duration,
    on_complete: FadeCompletion,
    generation: u64,
}

impl FadeTask {
    fn finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// The value for the current elapsed time. Exactly `to` once finished.
    fn value(&self) -> f32 {
        if self.finished() {
            return self.to;
        }
        let t = self.elapsed.as_secs_f32() / self.duration.as_secs_f32();
        lerp(self.from, self.to, clamp01(t))
    }

    fn write(&self, backend: &dyn Backend, value: f32) -> Result<(), BackendError> {
        match &self.target {
            FadeTarget::Channel(channel) => backend.set_volume(*channel, value),
            FadeTarget::Parameter(name) => backend.set_parameter(name, value),
        }
    }

    fn complete(&self, backend: &dyn Backend) -> Result<(), BackendError> {
        match (&self.target, self.on_complete) {
            (FadeTarget::Channel(channel), FadeCompletion::Stop) => backend.stop(*channel),
            _ => Ok(()),
        }
    }

    fn handle(&self) -> FadeHandle {
        FadeHandle {
            target: self.target.clone(),
            generation: self.generation,
        }
    }
}

/// Runs all active fades, one step per `tick`.
#[derive(Default)]
pub struct FadeScheduler {
    tasks: Vec<FadeTask>,
    /// Last generation handed out per target.
    generations: HashMap<FadeTarget, u64>,
}

impl FadeScheduler {
    pub fn new() -> FadeScheduler {
        FadeScheduler::default()
    }

    /// Schedules a fade from `from` to `to` over `duration`, replacing any fade
    /// already running on the same target.
    pub fn schedule(
        &mut self,
        target: FadeTarget,
        from: f32,
        to: f32,
        duration: Duration,
        on_complete: FadeCompletion,
    ) -> FadeHandle {
        if self.cancel(&target) {
            debug!(fade = %target, "Fade superseded");
        }

        let generation = self.generations.entry(target.clone()).or_insert(0);
        *generation += 1;

        let task = FadeTask {
            target,
            from,
            to,
            duration,
            elapsed: Duration::ZERO,
            on_complete,
            generation: *generation,
        };
        let handle = task.handle();
        debug!(
            fade = %task.target,
            from,
            to,
            duration = ?duration,
            generation = task.generation,
            "Fade scheduled"
        );
        self.tasks.push(task);
        handle
    }

    /// Removes the fade on the target without applying its completion. The
    /// target keeps whatever value was last written. Returns true if a fade
    /// was removed.
    pub fn cancel(&mut self, target: &FadeTarget) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| &task.target != target);
        before != self.tasks.len()
    }

    /// Returns true while the exact fade behind the handle is still running.
    pub fn is_active(&self, handle: &FadeHandle) -> bool {
        self.tasks
            .iter()
            .any(|task| task.target == handle.target && task.generation == handle.generation)
    }

    /// Returns true if any fade is running on the target.
    pub fn is_fading(&self, target: &FadeTarget) -> bool {
        self.tasks.iter().any(|task| &task.target == target)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advances every fade by `dt`, writes the interpolated values and
    /// completes fades that reached their duration. Returns the handles of the
    /// fades that completed during this tick.
    pub fn tick(&mut self, dt: Duration, backend: &dyn Backend) -> Vec<FadeHandle> {
        let mut completed = Vec::new();

        self.tasks.retain_mut(|task| {
            task.elapsed += dt;
            let value = task.value();

            if let Err(e) = task.write(backend, value) {
                warn!(fade = %task.target, err = %e, "Dropping fade, target unavailable");
                return false;
            }

            if !task.finished() {
                return true;
            }

            if let Err(e) = task.complete(backend) {
                warn!(fade = %task.target, err = %e, "Unable to complete fade");
            }
            debug!(fade = %task.target, value, "Fade complete");
            completed.push(task.handle());
            false
        });

        completed
    }
}

impl fmt::Debug for FadeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FadeScheduler")
            .field("active", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{mock, BusId, ChannelSettings, ClipHandle};

    const SECOND: Duration = Duration::from_secs(1);

    fn playing_channel(backend: &mock::Backend, volume: f32) -> ChannelId {
        let channel = backend.create_channel(&BusId::new("sfx")).unwrap();
        backend
            .play(
                channel,
                &ChannelSettings {
                    clip: ClipHandle::new("music"),
                    volume,
                    pitch: 1.0,
                    looping: true,
                },
            )
            .unwrap();
        channel
    }

    #[test]
    fn test_fade_out_and_stop() {
        let backend = mock::Backend::get("mock");
        let channel = playing_channel(&backend, 0.8);
        let mut scheduler = FadeScheduler::new();

        scheduler.schedule(
            FadeTarget::Channel(channel),
            0.8,
            0.0,
            Duration::from_secs(2),
            FadeCompletion::Stop,
        );

        assert!(scheduler.tick(SECOND, &backend).is_empty());
        assert!((backend.volume(channel).unwrap() - lerp(0.8, 0.0, 0.5)).abs() < 1e-6);
        assert!(backend.is_playing(channel));

        assert_eq!(scheduler.tick(SECOND, &backend).len(), 1);
        assert_eq!(backend.volume(channel).unwrap(), 0.0);
        assert!(!backend.is_playing(channel));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_endpoints_are_exact() {
        let backend = mock::Backend::get("mock").with_parameter("MusicVol", -80.0);
        let mut scheduler = FadeScheduler::new();
        let target = FadeTarget::Parameter("MusicVol".to_string());

        scheduler.schedule(
            target,
            -80.0,
            -3.3,
            Duration::from_millis(700),
            FadeCompletion::Hold,
        );

        scheduler.tick(Duration::ZERO, &backend);
        assert_eq!(backend.parameter("MusicVol").unwrap(), -80.0);

        // Uneven steps overshoot the duration; the final value must still be exact.
        for _ in 0..3 {
            scheduler.tick(Duration::from_millis(333), &backend);
        }
        assert_eq!(backend.parameter("MusicVol").unwrap(), -3.3);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_supersession() {
        let backend = mock::Backend::get("mock");
        let channel = playing_channel(&backend, 1.0);
        let mut scheduler = FadeScheduler::new();
        let target = FadeTarget::Channel(channel);

        let first = scheduler.schedule(
            target.clone(),
            1.0,
            0.0,
            SECOND,
            FadeCompletion::Stop,
        );
        scheduler.tick(Duration::from_millis(500), &backend);

        let second = scheduler.schedule(target.clone(), 0.5, 0.9, SECOND, FadeCompletion::Hold);
        assert!(!scheduler.is_active(&first));
        assert!(scheduler.is_active(&second));
        assert!(second.generation() > first.generation());
        assert_eq!(scheduler.len(), 1);

        let completed = scheduler.tick(Duration::from_secs(2), &backend);
        assert_eq!(completed, vec![second]);
        assert_eq!(backend.volume(channel).unwrap(), 0.9);
        // The first fade's stop never fired.
        assert!(backend.is_playing(channel));
    }

    #[test]
    fn test_cancel_leaves_last_value() {
        let backend = mock::Backend::get("mock");
        let channel = playing_channel(&backend, 1.0);
        let mut scheduler = FadeScheduler::new();
        let target = FadeTarget::Channel(channel);

        scheduler.schedule(target.clone(), 1.0, 0.0, Duration::from_secs(4), FadeCompletion::Stop);
        scheduler.tick(SECOND, &backend);
        assert!(scheduler.is_fading(&target));
        assert!(scheduler.cancel(&target));
        assert!(!scheduler.is_fading(&target));
        assert!(!scheduler.cancel(&target));

        scheduler.tick(SECOND, &backend);
        assert_eq!(backend.volume(channel).unwrap(), 0.75);
        assert!(backend.is_playing(channel));
    }

    #[test]
    fn test_channel_and_parameter_fades_are_independent() {
        let backend = mock::Backend::get("mock").with_parameter("SfxVol", 0.0);
        let channel = playing_channel(&backend, 1.0);
        let mut scheduler = FadeScheduler::new();

        scheduler.schedule(
            FadeTarget::Channel(channel),
            1.0,
            0.0,
            SECOND,
            FadeCompletion::Hold,
        );
        scheduler.schedule(
            FadeTarget::Parameter("SfxVol".to_string()),
            0.0,
            -80.0,
            SECOND,
            FadeCompletion::Stop,
        );
        assert_eq!(scheduler.len(), 2);

        scheduler.tick(SECOND, &backend);
        assert_eq!(backend.volume(channel).unwrap(), 0.0);
        assert_eq!(backend.parameter("SfxVol").unwrap(), -80.0);
        // Stop has no meaning for a parameter and leaves the channel alone.
        assert!(backend.is_playing(channel));
    }

    #[test]
    fn test_unknown_parameter_drops_fade() {
        let backend = mock::Backend::get("mock");
        let mut scheduler = FadeScheduler::new();

        scheduler.schedule(
            FadeTarget::Parameter("Missing".to_string()),
            0.0,
            1.0,
            SECOND,
            FadeCompletion::Hold,
        );
        assert!(scheduler.tick(Duration::from_millis(10), &backend).is_empty());
        assert!(scheduler.is_empty());
    }
}
