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

use crate::audio::{BackendError, BusId};

/// Errors raised by the dispatch engine.
///
/// Only registration errors and failed channel allocation are ever returned to
/// callers. Lookups that miss are logged and swallowed so a gameplay call site
/// asking for an optional sound never fails.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DispatchError {
    #[error("sound {0} not found")]
    NotFound(String),
    #[error("sound {0} has no clips")]
    EmptyEntry(String),
    #[error("sound id {0} is registered more than once")]
    DuplicateId(String),
    #[error("sound {id} is malformed: {reason}")]
    MalformedEntry { id: String, reason: String },
    #[error("bus {0} is not configured")]
    UnknownBus(BusId),
    #[error("no channel could be allocated on bus {bus}")]
    ResourceExhausted { bus: BusId },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl DispatchError {
    /// Maps a backend allocation failure onto the pool's error.
    pub(crate) fn from_allocation(bus: &BusId, err: BackendError) -> DispatchError {
        match err {
            BackendError::Exhausted(_) => DispatchError::ResourceExhausted { bus: bus.clone() },
            other => DispatchError::Backend(other),
        }
    }
}
