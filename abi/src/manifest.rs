// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Manifest binary layout (§3 Data Model, §6 External Interfaces).
//!
//! `{size:u16, major:u8, minor:u8}` followed by a sequence of descriptors,
//! each beginning with `{size:u16, type:u8, pad:u8}`. An unknown descriptor
//! type rejects the whole manifest — there is no forward-compatible
//! skip-unknown story here, by design (§6).

use zerocopy::{AsBytes, FromBytes, Unaligned};

pub const MANIFEST_HEADER_SIZE: usize = 4;
pub const DESCRIPTOR_HEADER_SIZE: usize = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct ManifestHeader {
    size_le: [u8; 2],
    pub major: u8,
    pub minor: u8,
}

impl ManifestHeader {
    pub fn size(&self) -> u16 {
        u16::from_le_bytes(self.size_le)
    }

    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < MANIFEST_HEADER_SIZE {
            return None;
        }
        Some(ManifestHeader {
            size_le: [buf[0], buf[1]],
            major: buf[2],
            minor: buf[3],
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum DescriptorType {
    Interface = 1,
    String = 2,
    Bundle = 3,
    CPort = 4,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DescriptorHeader {
    pub size: u16,
    pub kind: u8,
}

impl DescriptorHeader {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < DESCRIPTOR_HEADER_SIZE {
            return None;
        }
        Some(DescriptorHeader {
            size: u16::from_le_bytes([buf[0], buf[1]]),
            kind: buf[2],
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InterfaceDescriptor {
    pub vendor_id: u8,
    pub product_id: u8,
}

impl InterfaceDescriptor {
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() < 2 {
            return None;
        }
        Some(InterfaceDescriptor {
            vendor_id: body[0],
            product_id: body[1],
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StringDescriptor {
    pub id: u8,
    pub length: u8,
}

impl StringDescriptor {
    /// Parses the fixed part of a string descriptor. The UTF-8 payload
    /// itself lives in the remaining `length` bytes of the body and is left
    /// in place rather than copied.
    pub fn parse(body: &[u8]) -> Option<(Self, &[u8])> {
        if body.len() < 2 {
            return None;
        }
        let length = body[0];
        let id = body[1];
        let text = body.get(2..2 + length as usize)?;
        Some((StringDescriptor { id, length }, text))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BundleDescriptor {
    pub id: u8,
    pub class: u8,
}

impl BundleDescriptor {
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() < 2 {
            return None;
        }
        Some(BundleDescriptor {
            id: body[0],
            class: body[1],
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CPortDescriptor {
    pub id: u16,
    pub bundle: u8,
    pub protocol: u8,
}

impl CPortDescriptor {
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() < 4 {
            return None;
        }
        Some(CPortDescriptor {
            id: u16::from_le_bytes([body[0], body[1]]),
            bundle: body[2],
            protocol: body[3],
        })
    }
}

/// A single parsed descriptor. Unknown descriptor types are not representable
/// here: the caller's walk over `DescriptorType::from_u8` fails first and the
/// whole manifest is rejected before we ever reach this enum.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Descriptor<'a> {
    Interface(InterfaceDescriptor),
    String(StringDescriptor, &'a [u8]),
    Bundle(BundleDescriptor),
    CPort(CPortDescriptor),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ManifestError {
    Truncated,
    UnknownDescriptor(u8),
    ShortDescriptor,
}

/// Iterates the descriptor stream of a parsed manifest, rejecting the whole
/// manifest (by returning `Err`) the moment an unknown descriptor type is
/// seen, per §6.
pub struct DescriptorIter<'a> {
    buf: &'a [u8],
}

impl<'a> DescriptorIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        DescriptorIter { buf }
    }
}

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = Result<Descriptor<'a>, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        let hdr = match DescriptorHeader::parse(self.buf) {
            Some(h) => h,
            None => {
                self.buf = &[];
                return Some(Err(ManifestError::Truncated));
            }
        };
        let total = hdr.size as usize;
        if total < DESCRIPTOR_HEADER_SIZE || total > self.buf.len() {
            self.buf = &[];
            return Some(Err(ManifestError::Truncated));
        }
        let body = &self.buf[DESCRIPTOR_HEADER_SIZE..total];
        let rest = &self.buf[total..];

        let parsed = match num_traits::FromPrimitive::from_u8(hdr.kind) {
            Some(DescriptorType::Interface) => InterfaceDescriptor::parse(body)
                .map(Descriptor::Interface)
                .ok_or(ManifestError::ShortDescriptor),
            Some(DescriptorType::String) => StringDescriptor::parse(body)
                .map(|(d, text)| Descriptor::String(d, text))
                .ok_or(ManifestError::ShortDescriptor),
            Some(DescriptorType::Bundle) => BundleDescriptor::parse(body)
                .map(Descriptor::Bundle)
                .ok_or(ManifestError::ShortDescriptor),
            Some(DescriptorType::CPort) => CPortDescriptor::parse(body)
                .map(Descriptor::CPort)
                .ok_or(ManifestError::ShortDescriptor),
            None => Err(ManifestError::UnknownDescriptor(hdr.kind)),
        };

        self.buf = rest;
        Some(parsed)
    }
}
