// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mirrors a fetched manifest into a small typed tree the rest of the AP
//! stack can walk without re-parsing the descriptor stream (§4.H: "the
//! AP side keeps a protocol mirror of whatever a connected interface's
//! manifest declares").

use abi::manifest::{Descriptor, DescriptorIter};

use crate::ApError;

/// Upper bound on bundles per interface this firmware tracks. A real
/// interface rarely declares more than a handful; this is sized generously
/// rather than tied to any specific module's count.
pub const MAX_BUNDLES: usize = 8;
pub const MAX_CPORTS_PER_BUNDLE: usize = 8;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CPortMirror {
    pub id: u16,
    pub protocol: u8,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bundle {
    pub id: u8,
    pub class: u8,
    pub cports: heapless::Vec<CPortMirror, MAX_CPORTS_PER_BUNDLE>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Interface {
    pub vendor_id: u8,
    pub product_id: u8,
    pub bundles: heapless::Vec<Bundle, MAX_BUNDLES>,
}

impl Interface {
    /// Parses a raw manifest (header included) into a mirror tree. Bundle
    /// descriptors must precede the CPort descriptors that reference them
    /// — the same order the manifest's own producer always emits them in
    /// — since a CPort naming an unseen bundle is rejected rather than
    /// buffered for a later pass.
    pub fn parse(buf: &[u8]) -> Result<Self, ApError> {
        let header = abi::manifest::ManifestHeader::parse(buf)
            .ok_or(ApError::Manifest(abi::manifest::ManifestError::Truncated))?;
        let body = buf
            .get(abi::manifest::MANIFEST_HEADER_SIZE..header.size() as usize)
            .ok_or(ApError::Manifest(abi::manifest::ManifestError::Truncated))?;

        let mut vendor_id = 0u8;
        let mut product_id = 0u8;
        let mut bundles: heapless::Vec<Bundle, MAX_BUNDLES> = heapless::Vec::new();

        for descriptor in DescriptorIter::new(body) {
            match descriptor? {
                Descriptor::Interface(iface) => {
                    vendor_id = iface.vendor_id;
                    product_id = iface.product_id;
                }
                Descriptor::String(_, _) => {}
                Descriptor::Bundle(b) => {
                    bundles
                        .push(Bundle {
                            id: b.id,
                            class: b.class,
                            cports: heapless::Vec::new(),
                        })
                        .map_err(|_| ApError::TooManyBundles)?;
                }
                Descriptor::CPort(c) => {
                    let bundle = bundles
                        .iter_mut()
                        .find(|b| b.id == c.bundle)
                        .ok_or(ApError::UnknownBundle(c.bundle))?;
                    bundle
                        .cports
                        .push(CPortMirror { id: c.id, protocol: c.protocol })
                        .map_err(|_| ApError::TooManyCPorts)?;
                }
            }
        }

        Ok(Interface { vendor_id, product_id, bundles })
    }
}
