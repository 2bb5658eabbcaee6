// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol registration, AP-local CPort allocation, and the per-bundle
//! connection setup that follows a manifest fetch (§4.H).
//!
//! `init_bundles` walks a mirrored [`crate::Interface`] and, for every
//! CPort whose protocol this firmware has registered support for,
//! allocates a local CPort ID and asks a [`ConnectionFactory`] to create
//! the switch route. CPort 0 (Control) is never routed through here — it
//! is fixed and already up by the time a manifest exists to walk.

use abi::registers::is_reserved_cport;

use crate::control::CONTROL_PROTOCOL_ID;
use crate::manifest_mirror::Interface;
use crate::ApError;

/// Upper bound on simultaneously registered protocols.
pub const MAX_PROTOCOLS: usize = 16;
/// Upper bound on connections `init_bundles` can report in one call.
pub const MAX_ALLOCATED: usize = 32;

pub struct ProtocolRegistry<const N: usize> {
    protocols: heapless::Vec<u8, N>,
}

impl<const N: usize> Default for ProtocolRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ProtocolRegistry<N> {
    pub const fn new() -> Self {
        ProtocolRegistry { protocols: heapless::Vec::new() }
    }

    pub fn register(&mut self, protocol: u8) -> Result<(), ApError> {
        if self.protocols.contains(&protocol) {
            return Err(ApError::DuplicateProtocol(protocol));
        }
        self.protocols
            .push(protocol)
            .map_err(|_| ApError::TooManyConnections)
    }

    pub fn supports(&self, protocol: u8) -> bool {
        self.protocols.contains(&protocol)
    }
}

/// Hands out sequential local CPort IDs in `[start, max)`, skipping the
/// silicon's reserved range (§3 `RESERVED_CPORT_IDS`).
pub struct ApCPortAllocator {
    next: u16,
    max: u16,
}

impl ApCPortAllocator {
    pub fn new(start: u16, max: u16) -> Self {
        ApCPortAllocator { next: start, max }
    }

    pub fn alloc(&mut self) -> Option<u16> {
        while self.next < self.max {
            let id = self.next;
            self.next += 1;
            if !is_reserved_cport(id as u8) {
                return Some(id);
            }
        }
        None
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AllocatedConnection {
    pub bundle_id: u8,
    pub protocol: u8,
    pub peer_cport: u16,
    pub ap_cport: u16,
}

/// Decouples this crate from `drv-gb-svc`: in firmware this would be an
/// IPC call to the SVC task rather than a direct function call, since the
/// two roles run on different chips (§1, §4.H).
pub trait ConnectionFactory {
    fn create_connection(
        &mut self,
        peer_interface: usize,
        peer_cport: u16,
        local_cport: u16,
    ) -> Result<(), ApError>;
}

/// For every CPort in `interface` whose protocol is registered, allocates
/// a local CPort ID and asks `connections` to create the switch route.
/// CPorts with an unregistered protocol, or tagged [`CONTROL_PROTOCOL_ID`]
/// (fixed to CPort 0 and brought up before a manifest exists), are
/// skipped rather than treated as errors — an interface is allowed to
/// declare bundles this firmware doesn't support.
pub fn init_bundles<const N: usize>(
    peer_interface: usize,
    interface: &Interface,
    registry: &ProtocolRegistry<N>,
    allocator: &mut ApCPortAllocator,
    connections: &mut impl ConnectionFactory,
) -> Result<heapless::Vec<AllocatedConnection, MAX_ALLOCATED>, ApError> {
    let mut allocated = heapless::Vec::new();

    for bundle in &interface.bundles {
        for cport in &bundle.cports {
            if cport.protocol == CONTROL_PROTOCOL_ID || !registry.supports(cport.protocol) {
                continue;
            }
            let ap_cport = allocator.alloc().ok_or(ApError::CPortsExhausted)?;
            if connections
                .create_connection(peer_interface, cport.id, ap_cport)
                .is_err()
            {
                continue;
            }
            let _ = allocated.push(AllocatedConnection {
                bundle_id: bundle.id,
                protocol: cport.protocol,
                peer_cport: cport.id,
                ap_cport,
            });
        }
    }

    Ok(allocated)
}
