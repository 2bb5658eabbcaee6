// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire-format definitions shared between every crate in the workspace:
//! the Greybus operation header, result codes, manifest descriptor layout,
//! and the UniPro attribute/register constants the silicon dictates.
//!
//! This crate holds data only — no behavior — the same role `abi` plays in
//! the teacher's workspace for the kernel/task boundary.

#![cfg_attr(not(test), no_std)]

pub mod errno;
pub mod manifest;
pub mod registers;

use zerocopy::{AsBytes, FromBytes, Unaligned};

/// Greybus frame header: 8 bytes, little-endian, present on every frame on
/// the wire whether it carries a request or a response.
///
/// `pad` is nominally reserved but the AP-bridge transport overloads it to
/// carry the destination CPort ID outside the header (§6 of the
/// specification); callers that need that behavior use `pad` directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct OperationHeader {
    size_le: [u8; 2],
    id_le: [u8; 2],
    pub op_type: u8,
    pub result: u8,
    pub pad: [u8; 2],
}

/// Size in bytes of [`OperationHeader`] on the wire.
pub const HEADER_SIZE: usize = core::mem::size_of::<OperationHeader>();

/// Set on `op_type` to mark a frame as a response rather than a request.
pub const TYPE_RESPONSE_FLAG: u8 = 0x80;

/// `id == 0` means "no response expected, no correlation state kept".
pub const OPERATION_ID_NONE: u16 = 0;

impl OperationHeader {
    pub fn new(size: u16, id: u16, op_type: u8, result: u8) -> Self {
        OperationHeader {
            size_le: size.to_le_bytes(),
            id_le: id.to_le_bytes(),
            op_type,
            result,
            pad: [0; 2],
        }
    }

    pub fn size(&self) -> u16 {
        u16::from_le_bytes(self.size_le)
    }

    pub fn set_size(&mut self, size: u16) {
        self.size_le = size.to_le_bytes();
    }

    pub fn id(&self) -> u16 {
        u16::from_le_bytes(self.id_le)
    }

    pub fn set_id(&mut self, id: u16) {
        self.id_le = id.to_le_bytes();
    }

    pub fn is_response(&self) -> bool {
        self.op_type & TYPE_RESPONSE_FLAG != 0
    }

    /// The bare operation type, with the response flag masked off.
    pub fn base_type(&self) -> u8 {
        self.op_type & !TYPE_RESPONSE_FLAG
    }

    pub fn response_type(request_type: u8) -> u8 {
        request_type | TYPE_RESPONSE_FLAG
    }

    /// Parses a header from the first [`HEADER_SIZE`] bytes of `buf`.
    /// Returns `None` if `buf` is too short, matching `ProtocolBad` at call
    /// sites ("response-size smaller than header", §7).
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&buf[..HEADER_SIZE]);
        Some(OperationHeader {
            size_le: [raw[0], raw[1]],
            id_le: [raw[2], raw[3]],
            op_type: raw[4],
            result: raw[5],
            pad: [raw[6], raw[7]],
        })
    }

    /// Serializes the header into the first [`HEADER_SIZE`] bytes of `buf`.
    /// Returns `false` if `buf` is too short to hold a header.
    pub fn write_into(&self, buf: &mut [u8]) -> bool {
        if buf.len() < HEADER_SIZE {
            return false;
        }
        buf[..HEADER_SIZE].copy_from_slice(self.as_bytes());
        true
    }
}

/// Result codes carried in `OperationHeader::result` on response frames,
/// per the errno→result-code table of §4.D.
#[derive(Copy, Clone, Debug, Eq, PartialEq, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum ResultCode {
    Success = 0x00,
    Interrupted = 0x01,
    Timeout = 0x02,
    OutOfMemory = 0x03,
    ProtocolError = 0x04,
    Overflow = 0x05,
    /// Greybus reserves this value for "unknown/unsupported operation".
    Invalid = 0x06,
    Retry = 0x07,
    NonExistent = 0x08,
    Unknown = 0xfe,
}

impl ResultCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A 16-bit correlation ID allocator. `0` is never handed out; the counter
/// wraps from 65,535 back to 1, skipping 0 (§4.D ID allocation, §8 ID wrap
/// boundary behaviour).
#[derive(Debug)]
pub struct IdAllocator {
    next: u16,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub const fn new() -> Self {
        IdAllocator { next: 1 }
    }

    /// Allocates the next correlation ID, skipping `0`.
    pub fn alloc(&mut self) -> u16 {
        let id = self.next;
        self.next = match self.next.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        id
    }
}
