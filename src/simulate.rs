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
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{info, span, warn, Level};

use crate::audio::{mock, Backend as _, BusId};
use crate::config::{init_engine, EngineConfig};
use crate::controller::Command;
use crate::dispatch::{DispatchEngine, SoundState};

/// Creates a mock backend exposing every mixer parameter the config names,
/// each starting at 0 dB.
pub fn mock_backend(name: &str, config: &EngineConfig) -> mock::Backend {
    config
        .buses()
        .iter()
        .fold(
            mock::Backend::get(name).with_parameter(config.master_parameter(), 0.0),
            |backend, bus| backend.with_parameter(bus.gain_parameter(), 0.0),
        )
}

/// Runs an engine against the mock backend at a fixed frame rate.
pub struct Simulation {
    engine: DispatchEngine,
    backend: Arc<mock::Backend>,
    /// Default fade time per bus.
    fade_times: HashMap<BusId, Duration>,
    frame: Duration,
}

impl Simulation {
    /// Builds the simulation for a loaded config.
    pub fn new(config: &EngineConfig, frame_rate: u32) -> Result<Simulation, Box<dyn Error>> {
        if frame_rate == 0 {
            return Err("frame rate must be greater than zero".into());
        }

        let mut fade_times = HashMap::new();
        for bus in config.buses() {
            fade_times.insert(BusId::new(bus.name()), bus.fade_time()?);
        }

        let backend = Arc::new(mock_backend("simulation", config));
        let engine = init_engine(config, backend.clone())?;
        Ok(Simulation {
            engine,
            backend,
            fade_times,
            frame: Duration::from_secs_f64(1.0 / f64::from(frame_rate)),
        })
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    /// Runs frames until a quit command arrives or the command source closes.
    pub fn run(&mut self, commands_rx: Receiver<Command>) {
        let span = span!(Level::INFO, "simulation");
        let _enter = span.enter();

        info!(frame = ?self.frame, "Simulation started");
        let mut last = Instant::now();
        loop {
            loop {
                match commands_rx.try_recv() {
                    Ok(command) => {
                        if !self.handle(command) {
                            info!("Simulation stopped");
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("Command source closed, stopping simulation");
                        return;
                    }
                }
            }

            let now = Instant::now();
            self.step(now - last);
            last = now;

            spin_sleep::sleep(self.frame.saturating_sub(now.elapsed()));
        }
    }

    /// Advances the engine and the simulated clips by one frame.
    pub fn step(&mut self, dt: Duration) {
        self.engine.tick(dt);
        self.backend.advance(dt);
    }

    /// Applies a command. Returns false when the simulation should end.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Play { id, delay } => {
                if let Err(e) = self.engine.play_after(&id, delay) {
                    warn!(sound = id, err = %e, "Unable to play sound");
                }
            }
            Command::Stop(id) => {
                self.engine.stop(&id);
            }
            Command::FadeIn { bus, duration } => {
                let bus = BusId::new(&bus);
                let duration = self.fade_time(&bus, duration);
                self.engine.fade_in_bus(&bus, duration);
            }
            Command::FadeOut { bus, duration } => {
                let bus = BusId::new(&bus);
                let duration = self.fade_time(&bus, duration);
                self.engine.fade_out_bus(&bus, duration);
            }
            Command::Volume(delta) => {
                let master = self.engine.master_parameter().to_string();
                let result = if delta >= 0.0 {
                    self.engine.increase_volume(&master, delta)
                } else {
                    self.engine.decrease_volume(&master, -delta)
                };
                if let Some(value) = result {
                    info!(parameter = master, value, "Master volume changed");
                }
            }
            Command::Status => println!("{}", self.status()),
            Command::Quit => return false,
        }
        true
    }

    fn fade_time(&self, bus: &BusId, duration: Option<Duration>) -> Duration {
        duration
            .or_else(|| self.fade_times.get(bus).copied())
            .unwrap_or(Duration::ZERO)
    }

    /// Describes the channels, fades and sounds currently in play.
    pub fn status(&self) -> String {
        let mut status = String::new();
        for bus in self.engine.buses() {
            let channels = self.engine.pool().channels(bus);
            let playing = channels
                .iter()
                .filter(|channel| self.backend.is_playing(**channel))
                .count();
            let gain = self
                .engine
                .gain_parameter(bus)
                .and_then(|parameter| self.backend.parameter(parameter).ok())
                .unwrap_or(f32::NAN);
            let _ = writeln!(
                status,
                "{}: {}/{} channels playing, gain {:.1} dB",
                bus,
                playing,
                channels.len(),
                gain
            );
        }

        let playing: Vec<&str> = self
            .engine
            .sound_ids()
            .into_iter()
            .filter(|id| self.engine.state(id) == SoundState::Playing)
            .collect();
        let _ = write!(
            status,
            "Fades: {}, pending plays: {}, playing: [{}]",
            self.engine.fades().len(),
            self.engine.pending_plays(),
            playing.join(", ")
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn create_simulation() -> Simulation {
        let config = Config::builder()
            .add_source(File::from_str(
                r#"
                buses:
                  - name: music
                    gain_parameter: MusicVol
                    fade_time: 2s
                    sounds:
                      - id: theme
                        clips: [theme]
                        loop: true
                  - name: sfx
                    gain_parameter: SfxVol
                    sounds:
                      - id: click
                        clips: [click]
                "#,
                FileFormat::Yaml,
            ))
            .build()
            .unwrap()
            .try_deserialize::<EngineConfig>()
            .unwrap();
        Simulation::new(&config, 60).unwrap()
    }

    #[test]
    fn test_zero_frame_rate() {
        let config = EngineConfig::new(Vec::new());
        assert!(Simulation::new(&config, 0).is_err());
    }

    #[test]
    fn test_play_and_stop() {
        let mut simulation = create_simulation();

        assert!(simulation.handle(Command::Play {
            id: "theme".to_string(),
            delay: Duration::ZERO,
        }));
        assert_eq!(simulation.engine().state("theme"), SoundState::Playing);

        assert!(simulation.handle(Command::Stop("theme".to_string())));
        assert_eq!(simulation.engine().state("theme"), SoundState::Idle);
    }

    #[test]
    fn test_delayed_play_and_clip_end() {
        let mut simulation = create_simulation();

        simulation.handle(Command::Play {
            id: "click".to_string(),
            delay: Duration::from_millis(100),
        });
        assert_eq!(simulation.engine().pending_plays(), 1);

        simulation.step(Duration::from_millis(100));
        assert_eq!(simulation.engine().state("click"), SoundState::Playing);

        // Clips default to a second of audio.
        simulation.step(Duration::from_secs(1));
        assert_eq!(simulation.engine().state("click"), SoundState::Idle);
    }

    #[test]
    fn test_bus_fade_uses_configured_time() {
        let mut simulation = create_simulation();

        simulation.handle(Command::FadeOut {
            bus: "music".to_string(),
            duration: None,
        });
        simulation.step(Duration::from_secs(1));
        assert_eq!(simulation.backend.parameter("MusicVol"), Ok(-40.0));
        simulation.step(Duration::from_secs(1));
        assert_eq!(simulation.backend.parameter("MusicVol"), Ok(-80.0));

        simulation.handle(Command::FadeIn {
            bus: "music".to_string(),
            duration: Some(Duration::ZERO),
        });
        assert_eq!(simulation.backend.parameter("MusicVol"), Ok(0.0));
    }

    #[test]
    fn test_volume_and_status() {
        let mut simulation = create_simulation();

        simulation.handle(Command::Volume(-6.0));
        simulation.handle(Command::Volume(2.5));
        assert_eq!(simulation.backend.parameter("MasterVol"), Ok(-3.5));

        simulation.handle(Command::Play {
            id: "theme".to_string(),
            delay: Duration::ZERO,
        });
        let status = simulation.status();
        assert!(status.contains("music: 1/1 channels playing, gain 0.0 dB"));
        assert!(status.contains("sfx: 0/1 channels playing"));
        assert!(status.contains("playing: [theme]"));
    }

    #[test]
    fn test_quit_and_closed_source() {
        let mut simulation = create_simulation();
        assert!(!simulation.handle(Command::Quit));

        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
        commands_tx.send(Command::Status).unwrap();
        drop(commands_tx);
        simulation.run(commands_rx);
    }
}
