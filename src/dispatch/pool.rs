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

//! Grow-only pools of output channels, one per bus.

use std::collections::HashMap;

use tracing::debug;

use super::error::DispatchError;
use crate::audio::{Backend, BusId, ChannelId};

/// Hands out idle channels per bus, allocating new ones when every existing
/// channel is busy. Channels are never released back to the backend.
#[derive(Default)]
pub struct ChannelPool {
    /// Channels per bus in creation order, which is also the scan order.
    buses: HashMap<BusId, Vec<ChannelId>>,
    /// Reverse lookup of the bus a channel belongs to.
    owners: HashMap<ChannelId, BusId>,
}

impl ChannelPool {
    pub fn new() -> ChannelPool {
        ChannelPool::default()
    }

    /// Returns the first channel on the bus that isn't playing, or allocates a
    /// new one. Allocation failure leaves the pool untouched.
    pub fn acquire(
        &mut self,
        bus: &BusId,
        backend: &dyn Backend,
    ) -> Result<ChannelId, DispatchError> {
        if let Some(channel) = self
            .buses
            .get(bus)
            .and_then(|channels| channels.iter().find(|ch| !backend.is_playing(**ch)))
        {
            return Ok(*channel);
        }

        self.grow(bus, backend)
    }

    /// Makes sure the bus has at least `count` channels.
    pub fn prewarm(
        &mut self,
        bus: &BusId,
        count: usize,
        backend: &dyn Backend,
    ) -> Result<(), DispatchError> {
        self.buses.entry(bus.clone()).or_default();
        while self.len(bus) < count {
            self.grow(bus, backend)?;
        }
        Ok(())
    }

    fn grow(&mut self, bus: &BusId, backend: &dyn Backend) -> Result<ChannelId, DispatchError> {
        let channel = backend
            .create_channel(bus)
            .map_err(|e| DispatchError::from_allocation(bus, e))?;

        let channels = self.buses.entry(bus.clone()).or_default();
        channels.push(channel);
        self.owners.insert(channel, bus.clone());
        debug!(bus = %bus, channel = %channel, size = channels.len(), "Channel pool grown");
        Ok(channel)
    }

    /// Returns the channels of a bus in creation order.
    pub fn channels(&self, bus: &BusId) -> &[ChannelId] {
        self.buses.get(bus).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the number of channels allocated for a bus.
    pub fn len(&self, bus: &BusId) -> usize {
        self.channels(bus).len()
    }

    /// Returns the total number of channels across all buses.
    pub fn total(&self) -> usize {
        self.owners.len()
    }

    pub fn bus_of(&self, channel: ChannelId) -> Option<&BusId> {
        self.owners.get(&channel)
    }
}

impl std::fmt::Debug for ChannelPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelPool")
            .field("buses", &self.buses.len())
            .field("channels", &self.owners.len())
            .finish()
    }
}
