// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The AP-side protocol layer (§4.H): mirrors a connected interface's
//! manifest into typed descriptors, builds Control-protocol request
//! frames, and drives the per-bundle connection setup that follows a
//! manifest fetch.
//!
//! This crate never touches a CPort transport directly — it hands back
//! frame bytes for the caller to send through `gb-op`/`drv-gb-cport`, and
//! asks for connections through [`registry::ConnectionFactory`] rather
//! than calling `drv-gb-svc` itself. On real hardware the AP and SVC roles
//! run on different chips; the trait boundary here is where an IPC call
//! to the SVC task would go.

#![cfg_attr(not(test), no_std)]

pub mod control;
pub mod manifest_mirror;
pub mod registry;

pub use manifest_mirror::{Bundle, CPortMirror, Interface, MAX_BUNDLES, MAX_CPORTS_PER_BUNDLE};
pub use registry::{AllocatedConnection, ApCPortAllocator, ConnectionFactory, ProtocolRegistry};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ApError {
    Manifest(abi::manifest::ManifestError),
    /// A CPort descriptor named a bundle ID not yet seen in the manifest.
    UnknownBundle(u8),
    TooManyBundles,
    TooManyCPorts,
    /// The registry or allocator's fixed capacity was exceeded.
    TooManyConnections,
    /// A protocol appeared twice in one [`registry::ProtocolRegistry`].
    DuplicateProtocol(u8),
    /// No CPort IDs remain in the allocator's range.
    CPortsExhausted,
    ConnectionFailed,
}

impl From<abi::manifest::ManifestError> for ApError {
    fn from(e: abi::manifest::ManifestError) -> Self {
        ApError::Manifest(e)
    }
}
