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

//! Resolves a sound entry's playback policy into started channels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use super::entry::SoundEntry;
use super::error::DispatchError;
use super::pool::ChannelPool;
use crate::audio::{Backend, BusId, ChannelId, ChannelSettings, ClipHandle};
use crate::config::engine::ClampPolicy;
use crate::config::library::PlaybackPolicy;

/// Picks clips for an entry and starts them on pooled channels.
pub struct PlaybackResolver {
    rng: StdRng,
    clamp: ClampPolicy,
}

impl PlaybackResolver {
    /// Creates a resolver seeded from the OS.
    pub fn new(clamp: ClampPolicy) -> PlaybackResolver {
        PlaybackResolver {
            rng: StdRng::from_entropy(),
            clamp,
        }
    }

    /// Creates a resolver with a fixed seed for reproducible choices.
    pub fn with_seed(clamp: ClampPolicy, seed: u64) -> PlaybackResolver {
        PlaybackResolver {
            rng: StdRng::seed_from_u64(seed),
            clamp,
        }
    }

    /// Plays the entry on channels drawn from the bus's pool and returns the
    /// channels that were started.
    ///
    /// An entry without clips is a logged no-op. If a channel can't be
    /// allocated partway through an `All` play, the channels already started
    /// by this call are stopped again and the error is returned.
    pub fn play(
        &mut self,
        entry: &mut SoundEntry,
        bus: &BusId,
        pool: &mut ChannelPool,
        backend: &dyn Backend,
    ) -> Result<Vec<ChannelId>, DispatchError> {
        if entry.clips().is_empty() {
            let err = DispatchError::EmptyEntry(entry.id().to_string());
            warn!(err = %err, "Nothing to play");
            return Ok(Vec::new());
        }

        // A single clip always plays as-is, whatever the policy says.
        let indices = if entry.clips().len() == 1 {
            vec![0]
        } else {
            match entry.policy() {
                PlaybackPolicy::All => (0..entry.clips().len()).collect(),
                // The cursor moves before the channel is acquired so ordering
                // holds even when this play fails.
                PlaybackPolicy::Sequential => vec![entry.advance_sequence()],
                PlaybackPolicy::Random => vec![self.rng.gen_range(0..entry.clips().len())],
            }
        };

        let mut started = Vec::with_capacity(indices.len());
        for index in indices {
            let clip = &entry.clips()[index];
            match self.start_clip(entry, clip, bus, pool, backend) {
                Ok(channel) => started.push(channel),
                Err(e) => {
                    for channel in started {
                        if let Err(stop_err) = backend.stop(channel) {
                            warn!(channel = %channel, err = %stop_err, "Unable to roll back channel");
                        }
                    }
                    return Err(e);
                }
            }
        }

        debug!(
            sound = entry.id(),
            bus = %bus,
            policy = ?entry.policy(),
            channels = started.len(),
            "Sound dispatched"
        );
        Ok(started)
    }

    /// Acquires a channel and starts the clip on it with jittered parameters.
    /// The channel is playing before this returns, so the next acquisition
    /// can't hand it out again.
    fn start_clip(
        &mut self,
        entry: &SoundEntry,
        clip: &ClipHandle,
        bus: &BusId,
        pool: &mut ChannelPool,
        backend: &dyn Backend,
    ) -> Result<ChannelId, DispatchError> {
        let channel = pool.acquire(bus, backend)?;
        let volume_jitter = self.jitter(entry.volume_variance());
        let pitch_jitter = self.jitter(entry.pitch_variance());
        let settings = ChannelSettings {
            clip: clip.clone(),
            volume: self.clamp.clamp_volume(entry.volume() + volume_jitter),
            pitch: self.clamp.clamp_pitch(entry.pitch() + pitch_jitter),
            looping: entry.looping(),
        };
        backend.play(channel, &settings)?;
        Ok(channel)
    }

    /// Returns a uniform offset in `[-variance, variance]`. The offset is
    /// scaled from the unit range so no variance can overflow the sampler.
    fn jitter(&mut self, variance: f32) -> f32 {
        if variance > 0.0 {
            self.rng.gen_range(-1.0f32..=1.0) * variance
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::audio::mock;

    fn clips(names: &[&str]) -> Vec<ClipHandle> {
        names.iter().map(|name| ClipHandle::new(name)).collect()
    }

    struct Fixture {
        backend: mock::Backend,
        pool: ChannelPool,
        resolver: PlaybackResolver,
        bus: BusId,
    }

    impl Fixture {
        fn new() -> Fixture {
            Fixture::with_backend(mock::Backend::get("mock"))
        }

        fn with_backend(backend: mock::Backend) -> Fixture {
            Fixture {
                backend,
                pool: ChannelPool::new(),
                resolver: PlaybackResolver::with_seed(ClampPolicy::default(), 7),
                bus: BusId::new("sfx"),
            }
        }

        fn play(&mut self, entry: &mut SoundEntry) -> Result<Vec<ChannelId>, DispatchError> {
            self.resolver
                .play(entry, &self.bus, &mut self.pool, &self.backend)
        }

        fn clip_on(&self, channel: ChannelId) -> ClipHandle {
            self.backend.current_clip(channel).unwrap()
        }
    }

    #[test]
    fn test_single_clip_ignores_policy() {
        let mut fixture = Fixture::new();
        for policy in [
            PlaybackPolicy::Random,
            PlaybackPolicy::Sequential,
            PlaybackPolicy::All,
        ] {
            let mut entry = SoundEntry::new("click", clips(&["c1"])).with_policy(policy);
            for _ in 0..3 {
                let channels = fixture.play(&mut entry).unwrap();
                assert_eq!(channels.len(), 1);
                assert_eq!(fixture.clip_on(channels[0]), ClipHandle::new("c1"));
            }
            // Single-clip sounds never touch the sequence.
            assert_eq!(entry.cursor(), 0);
        }
    }

    #[test]
    fn test_sequential_order_wraps() {
        let mut fixture = Fixture::new();
        let mut entry = SoundEntry::new("steps", clips(&["a", "b", "c"]))
            .with_policy(PlaybackPolicy::Sequential);

        let order: Vec<String> = (0..4)
            .map(|_| {
                let channels = fixture.play(&mut entry).unwrap();
                fixture.clip_on(channels[0]).as_str().to_string()
            })
            .collect();
        assert_eq!(order, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_sequential_advances_on_failure() {
        let mut fixture = Fixture::with_backend(mock::Backend::get("mock").with_max_channels(0));
        let mut entry = SoundEntry::new("steps", clips(&["a", "b", "c"]))
            .with_policy(PlaybackPolicy::Sequential);

        assert!(matches!(
            fixture.play(&mut entry),
            Err(DispatchError::ResourceExhausted { .. })
        ));
        assert_eq!(entry.cursor(), 1);
    }

    #[test]
    fn test_all_starts_one_channel_per_clip() {
        let mut fixture = Fixture::new();
        let mut entry = SoundEntry::new("layers", clips(&["low", "mid", "high"]))
            .with_policy(PlaybackPolicy::All);

        let channels = fixture.play(&mut entry).unwrap();
        assert_eq!(channels.len(), 3);
        assert_eq!(channels.iter().collect::<HashSet<_>>().len(), 3);
        for (channel, expected) in channels.iter().zip(["low", "mid", "high"]) {
            assert!(fixture.backend.is_playing(*channel));
            assert_eq!(fixture.clip_on(*channel), ClipHandle::new(expected));
        }
    }

    #[test]
    fn test_all_rolls_back_on_exhaustion() {
        let mut fixture = Fixture::with_backend(mock::Backend::get("mock").with_max_channels(2));
        let mut entry = SoundEntry::new("layers", clips(&["low", "mid", "high"]))
            .with_policy(PlaybackPolicy::All);

        assert!(matches!(
            fixture.play(&mut entry),
            Err(DispatchError::ResourceExhausted { .. })
        ));
        assert!(fixture.backend.playing_channels().is_empty());
        assert_eq!(fixture.pool.len(&fixture.bus), 2);
    }

    #[test]
    fn test_random_stays_in_clip_set() {
        let mut fixture = Fixture::new();
        let mut entry = SoundEntry::new("hit", clips(&["a", "b", "c"]));

        let mut seen = HashSet::new();
        for _ in 0..50 {
            let channels = fixture.play(&mut entry).unwrap();
            assert_eq!(channels.len(), 1);
            let clip = fixture.clip_on(channels[0]);
            assert!(entry.contains(&clip));
            seen.insert(clip);
            fixture.backend.stop(channels[0]).unwrap();
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_volume_jitter_and_clamp() {
        let mut fixture = Fixture::new();
        let mut entry = SoundEntry::new("click", clips(&["c1"])).with_volume(0.75, 0.1);

        for _ in 0..20 {
            let channels = fixture.play(&mut entry).unwrap();
            let settings = fixture.backend.settings(channels[0]).unwrap();
            assert!(settings.volume >= 0.65 - 1e-6 && settings.volume <= 0.85 + 1e-6);
            assert_eq!(settings.pitch, 1.0);
            assert!(!settings.looping);
        }

        let mut loud = SoundEntry::new("loud", clips(&["c1"])).with_volume(1.5, 0.0);
        let channels = fixture.play(&mut loud).unwrap();
        assert_eq!(fixture.backend.settings(channels[0]).unwrap().volume, 1.0);
    }

    #[test]
    fn test_huge_variance_does_not_panic() {
        let mut fixture = Fixture::new();
        let mut entry = SoundEntry::new("wild", clips(&["c1"]))
            .with_volume(0.5, f32::MAX)
            .with_pitch(1.0, f32::MAX);

        for _ in 0..10 {
            let channels = fixture.play(&mut entry).unwrap();
            let settings = fixture.backend.settings(channels[0]).unwrap();
            assert!((0.0..=1.0).contains(&settings.volume));
            assert!(settings.pitch.is_finite());
            fixture.backend.stop(channels[0]).unwrap();
        }
    }

    #[test]
    fn test_pitch_clamp_bounds() {
        let mut fixture = Fixture::new();
        fixture.resolver = PlaybackResolver::with_seed(ClampPolicy::new(true, Some([0.5, 2.0])), 7);

        let mut low = SoundEntry::new("low", clips(&["c1"])).with_pitch(-0.5, 0.0);
        let channels = fixture.play(&mut low).unwrap();
        assert_eq!(fixture.backend.settings(channels[0]).unwrap().pitch, 0.5);
    }

    #[test]
    fn test_pitch_is_not_clamped_by_default() {
        let mut fixture = Fixture::new();
        let mut entry = SoundEntry::new("low", clips(&["c1"])).with_pitch(-0.5, 0.0);

        let channels = fixture.play(&mut entry).unwrap();
        assert_eq!(fixture.backend.settings(channels[0]).unwrap().pitch, -0.5);
    }

    #[test]
    fn test_empty_entry_is_noop() {
        let mut fixture = Fixture::new();
        let mut entry = SoundEntry::new("nothing", Vec::new());

        assert_eq!(fixture.play(&mut entry), Ok(Vec::new()));
        assert_eq!(fixture.pool.total(), 0);
    }

    #[test]
    fn test_loop_flag_is_applied() {
        let mut fixture = Fixture::new();
        let mut entry = SoundEntry::new("ambience", clips(&["wind"])).with_looping(true);

        let channels = fixture.play(&mut entry).unwrap();
        assert!(fixture.backend.settings(channels[0]).unwrap().looping);
    }
}
