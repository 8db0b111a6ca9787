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
use std::io;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;

pub mod console;

/// Commands that drive a running engine.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Plays a sound, optionally after a delay.
    Play { id: String, delay: Duration },

    /// Stops every channel the sound is playing on.
    Stop(String),

    /// Fades a bus back up. Uses the bus's configured fade time when no
    /// duration is given.
    FadeIn {
        bus: String,
        duration: Option<Duration>,
    },

    /// Fades a bus down to silence.
    FadeOut {
        bus: String,
        duration: Option<Duration>,
    },

    /// Nudges the master volume by the given number of decibels.
    Volume(f32),

    /// Prints the engine state.
    Status,

    /// Ends the session.
    Quit,
}

/// A source of commands.
pub trait Driver: Send + Sync + 'static {
    /// Starts monitoring for commands on a separate thread. The thread ends
    /// when its input is exhausted or the receiving side hangs up.
    fn monitor_commands(&self, commands_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>>;
}
