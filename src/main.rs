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
use clap::{crate_version, Parser, Subcommand};
use sounddispatch::audio::BusId;
use sounddispatch::config::{init_engine, EngineConfig};
use sounddispatch::controller::{console, Driver as _};
use sounddispatch::simulate::{mock_backend, Simulation};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A game sound dispatch engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Loads and verifies an engine config and its sound libraries.
    Verify {
        /// The path to the engine config.
        config_path: String,
    },
    /// Runs the engine against a simulated backend, driven from the console.
    Simulate {
        /// The path to the engine config.
        config_path: String,
        /// How many engine ticks run per second.
        #[arg(short, long, default_value_t = 60)]
        frame_rate: u32,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Verify { config_path } => {
            let config = EngineConfig::deserialize(&PathBuf::from(&config_path))?;
            let engine = init_engine(&config, Arc::new(mock_backend("verify", &config)))?;

            println!("Buses (count: {}):", config.buses().len());
            for bus in config.buses() {
                println!(
                    "- {} (gain: {}, channels: {}, fade time: {:?})",
                    bus.name(),
                    bus.gain_parameter(),
                    bus.prewarm(),
                    bus.fade_time()?,
                );
            }

            let ids = engine.sound_ids();
            println!("\nSounds (count: {}):", ids.len());
            for id in ids {
                let (Some(sound), Some(bus)) = (engine.sound(id), engine.sound_bus(id)) else {
                    continue;
                };
                println!(
                    "- {} [{}] {:?}, {} clip(s){}",
                    id,
                    bus,
                    sound.policy(),
                    sound.clips().len(),
                    if sound.looping() { ", looping" } else { "" },
                );
            }

            let empty: Vec<&BusId> = engine
                .buses()
                .filter(|bus| {
                    !engine
                        .sound_ids()
                        .into_iter()
                        .any(|id| engine.sound_bus(id) == Some(*bus))
                })
                .collect();
            for bus in empty {
                println!("\nWarning: bus {} has no sounds.", bus);
            }
        }
        Commands::Simulate {
            config_path,
            frame_rate,
        } => {
            let config = EngineConfig::deserialize(&PathBuf::from(&config_path))?;
            let mut simulation = Simulation::new(&config, frame_rate)?;

            let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
            let driver = console::Driver::new();
            let handle = driver.monitor_commands(commands_tx);

            simulation.run(commands_rx);

            // The console thread stays blocked on stdin after a quit command,
            // so it's only joined when it already finished.
            if handle.is_finished() {
                handle
                    .join()
                    .map_err(|e| format!("console driver panicked: {:?}", e))??;
            }
        }
    }

    Ok(())
}
