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
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{info, span, warn, Level};

use super::Command;
use crate::util::parse_duration;

const PLAY: &str = "play";
const STOP: &str = "stop";
const FADE_IN: &str = "fade-in";
const FADE_OUT: &str = "fade-out";
const VOLUME: &str = "volume";
const STATUS: &str = "status";
const QUIT: &str = "quit";

/// A driver that reads commands typed on the console.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Prompts for and handles a single line of input. Returns false once the
    /// input is exhausted.
    fn monitor_io<R, W>(
        commands_tx: &Sender<Command>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <id> [delay], {} <id>, {} <bus> [duration], {} <bus> [duration], {} <+|-db>, {}, {}): ",
            PLAY, STOP, FADE_IN, FADE_OUT, VOLUME, STATUS, QUIT,
        )?;
        writer.flush()?;

        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        match parse(&input) {
            Some(command) => commands_tx
                .send(command)
                .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?,
            None => warn!(input = input.trim(), "Unrecognized input"),
        }
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

/// Parses a console line into a command. Only the command word is case
/// insensitive; sound and bus names are taken as typed.
fn parse(input: &str) -> Option<Command> {
    let mut words = input.split_whitespace();
    let command = words.next()?.to_lowercase();
    let first = words.next();
    let second = words.next();
    if words.next().is_some() {
        return None;
    }

    let duration = |value: Option<&str>| -> Option<Option<Duration>> {
        match value {
            Some(value) => parse_duration(value).ok().map(Some),
            None => Some(None),
        }
    };

    match (command.as_str(), first, second) {
        (PLAY, Some(id), delay) => Some(Command::Play {
            id: id.to_string(),
            delay: duration(delay)?.unwrap_or(Duration::ZERO),
        }),
        (STOP, Some(id), None) => Some(Command::Stop(id.to_string())),
        (FADE_IN, Some(bus), value) => Some(Command::FadeIn {
            bus: bus.to_string(),
            duration: duration(value)?,
        }),
        (FADE_OUT, Some(bus), value) => Some(Command::FadeOut {
            bus: bus.to_string(),
            duration: duration(value)?,
        }),
        (VOLUME, Some(delta), None) => delta
            .parse::<f32>()
            .ok()
            .filter(|delta| delta.is_finite())
            .map(Command::Volume),
        (STATUS, None, None) => Some(Command::Status),
        (QUIT, None, None) => Some(Command::Quit),
        _ => None,
    }
}

impl super::Driver for Driver {
    fn monitor_commands(&self, commands_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>> {
        thread::spawn(move || {
            let span = span!(Level::INFO, "console driver");
            let _enter = span.enter();

            info!("Console driver started.");

            while Self::monitor_io(&commands_tx, io::stdin().lock(), io::stdout())? {}

            info!("Console input closed.");
            Ok(())
        })
    }
}
