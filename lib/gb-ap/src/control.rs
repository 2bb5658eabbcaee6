// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control-protocol frame builders and response parsers (§4.H, §6
//! External Interfaces): the six operations the AP uses to bring a
//! freshly connected interface's CPort 0 up to the point of a manifest
//! mirror — protocol version, probe, manifest size, manifest fetch, and
//! the connected/disconnected notifications every other CPort's
//! connection lifecycle is bracketed by.
//!
//! These are frame builders only, not an orchestration helper: the two
//! manifest-fetch operations are sequential sends over the same CPort,
//! and how a caller schedules two sequential sync sends is a main-loop
//! concern this crate has no business owning.

use abi::{OperationHeader, HEADER_SIZE};
use gb_op::FrameBuf;

pub const OP_PROTOCOL_VERSION: u8 = 0x01;
pub const OP_PROBE_AP: u8 = 0x02;
pub const OP_GET_MANIFEST_SIZE: u8 = 0x03;
pub const OP_GET_MANIFEST: u8 = 0x04;
pub const OP_CONNECTED: u8 = 0x05;
pub const OP_DISCONNECTED: u8 = 0x06;

/// The Control protocol always lives on CPort 0 of every interface.
pub const CONTROL_CPORT_ID: u16 = 0;
pub const CONTROL_PROTOCOL_ID: u8 = 0x00;

fn request(id: u16, op_type: u8, body: &[u8]) -> FrameBuf {
    let mut frame = FrameBuf::new();
    let _ = frame.resize(HEADER_SIZE, 0);
    let header = OperationHeader::new((HEADER_SIZE + body.len()) as u16, id, op_type, 0);
    header.write_into(&mut frame);
    let _ = frame.extend_from_slice(body);
    frame
}

pub fn protocol_version_request(id: u16) -> FrameBuf {
    request(id, OP_PROTOCOL_VERSION, &[])
}

pub fn probe_ap_request(id: u16) -> FrameBuf {
    request(id, OP_PROBE_AP, &[])
}

pub fn get_manifest_size_request(id: u16) -> FrameBuf {
    request(id, OP_GET_MANIFEST_SIZE, &[])
}

pub fn get_manifest_request(id: u16) -> FrameBuf {
    request(id, OP_GET_MANIFEST, &[])
}

/// Tells the interface that `cport_id` has just been connected on its side
/// (§4.H: sent once per bundle CPort after its switch route is
/// programmed, before any protocol-specific traffic starts).
pub fn connected_request(id: u16, cport_id: u16) -> FrameBuf {
    request(id, OP_CONNECTED, &cport_id.to_le_bytes())
}

pub fn disconnected_request(id: u16, cport_id: u16) -> FrameBuf {
    request(id, OP_DISCONNECTED, &cport_id.to_le_bytes())
}

/// Extracts the manifest size from a `get_manifest_size` response body.
/// Returns `None` if the body is too short to hold the `u16`.
pub fn parse_manifest_size_response(body: &[u8]) -> Option<u16> {
    let bytes: [u8; 2] = body.get(0..2)?.try_into().ok()?;
    Some(u16::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_version_request_has_no_body() {
        let frame = protocol_version_request(1);
        let hdr = OperationHeader::parse(&frame).unwrap();
        assert_eq!(hdr.size() as usize, HEADER_SIZE);
        assert_eq!(hdr.id(), 1);
        assert_eq!(hdr.base_type(), OP_PROTOCOL_VERSION);
        assert!(!hdr.is_response());
    }

    #[test]
    fn connected_request_carries_the_cport_id() {
        let frame = connected_request(9, 0x0042);
        let hdr = OperationHeader::parse(&frame).unwrap();
        assert_eq!(hdr.base_type(), OP_CONNECTED);
        assert_eq!(&frame[HEADER_SIZE..], &0x0042u16.to_le_bytes());
    }

    #[test]
    fn manifest_size_response_parses_le_u16() {
        assert_eq!(parse_manifest_size_response(&[0x34, 0x12]), Some(0x1234));
        assert_eq!(parse_manifest_size_response(&[0x01]), None);
    }
}
