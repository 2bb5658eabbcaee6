// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handler dispatch (§4.E) and the RX entry point that ties a parsed frame
//! either into [`gb_op::Bus::complete_response`] (it carries the response
//! flag) or into a registered request handler (it doesn't).
//!
//! This is the single place that decides "response or request", which is
//! what lets `gb-tape`'s replay feed recorded frames back through exactly
//! the same path a live silicon RX would have taken (§4.F: "the RX path is
//! the single entry point so replay needs no other hooks").

#![cfg_attr(not(test), no_std)]

use abi::{OperationHeader, ResultCode, HEADER_SIZE};
use gb_op::{Bus, CPortSend, FrameBuf, GbOpError};
use ringbuf::{ringbuf, ringbuf_entry};

/// Largest body a handler may write into a response, sized to leave room
/// for the header within one CPort buffer.
pub const MAX_BODY: usize = abi::registers::CPORT_BUF_SIZE - HEADER_SIZE;

pub type ResponseBody = heapless::Vec<u8, MAX_BODY>;

/// `fn(cport, request_body) -> (result, response_body)`. The handler
/// writes nothing but its response payload; the header (size, id,
/// response-type bit, result) is assembled by [`dispatch_rx`].
pub type HandlerFn = fn(cport: u8, request_body: &[u8], response: &mut ResponseBody) -> ResultCode;

/// Exactly one of `Fast`/`Slow` tags a registered entry (§4.E, §9 design
/// note). `Fast` entries are meant to be invoked straight from the CPort's
/// EOM interrupt — callers choosing to do that must neither block nor
/// allocate inside the handler, which is only possible because
/// `ResponseBody` is a fixed-capacity `heapless::Vec`. `Slow` entries are
/// invoked from worker context, where that restriction doesn't apply.
#[derive(Copy, Clone)]
pub enum Handler {
    Fast(HandlerFn),
    Slow(HandlerFn),
}

impl Handler {
    fn call(&self, cport: u8, body: &[u8], response: &mut ResponseBody) -> ResultCode {
        match self {
            Handler::Fast(f) | Handler::Slow(f) => f(cport, body, response),
        }
    }

    pub fn is_fast(&self) -> bool {
        matches!(self, Handler::Fast(_))
    }
}

struct Entry {
    op_type: u8,
    handler: Handler,
}

/// A per-CPort driver's `{type, handler, fast_handler}` array (§4.E), kept
/// sorted by `op_type` so lookup is a binary search.
pub struct HandlerTable<const N: usize> {
    entries: heapless::Vec<Entry, N>,
}

impl<const N: usize> Default for HandlerTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> HandlerTable<N> {
    pub const fn new() -> Self {
        HandlerTable {
            entries: heapless::Vec::new(),
        }
    }

    /// Registers `handler` for `op_type`. Re-sorts the table so lookup
    /// stays a binary search; fails with `AlreadyRegistered` if `op_type`
    /// already has an entry, or `NoMemory` if the table is full.
    pub fn register(&mut self, op_type: u8, handler: Handler) -> Result<(), GbOpError> {
        if self.entries.iter().any(|e| e.op_type == op_type) {
            return Err(GbOpError::AlreadyRegistered);
        }
        self.entries
            .push(Entry { op_type, handler })
            .map_err(|_| GbOpError::NoMemory)?;
        self.entries.sort_unstable_by_key(|e| e.op_type);
        Ok(())
    }

    pub fn lookup(&self, op_type: u8) -> Option<&Handler> {
        self.entries
            .binary_search_by_key(&op_type, |e| e.op_type)
            .ok()
            .map(|i| &self.entries[i].handler)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    Response { cport: u8 },
    RequestHandled { cport: u8, op_type: u8 },
    RequestUnknownType { cport: u8, op_type: u8 },
    Malformed { cport: u8 },
}

ringbuf!(Trace, 32, Trace::Malformed { cport: 0 });

fn send_response(
    transport: &mut impl CPortSend,
    cport: u8,
    request_id: u16,
    request_type: u8,
    result: ResultCode,
    body: &[u8],
) {
    if request_id == 0 {
        return;
    }
    let mut hdr = Bus::build_response_header(request_id, request_type, result);
    hdr.set_size((HEADER_SIZE + body.len()) as u16);

    let mut frame = FrameBuf::new();
    let _ = frame.resize(HEADER_SIZE, 0);
    hdr.write_into(&mut frame);
    let _ = frame.extend_from_slice(body);
    let _ = transport.send(cport, &frame);
}

/// The RX entry point (§4.D RX dispatch, §4.F "the single entry point"):
/// decides response-vs-request and drives whichever path applies. Malformed
/// frames (short header) are dropped with a trace entry and nothing else,
/// per §7's "RX path never propagates errors upward".
pub fn dispatch_rx<const N: usize>(
    bus: &mut Bus,
    transport: &mut impl CPortSend,
    table: &HandlerTable<N>,
    cport: u8,
    frame: FrameBuf,
) {
    let Some(hdr) = OperationHeader::parse(&frame) else {
        ringbuf_entry!(Trace::Malformed { cport });
        return;
    };

    if hdr.is_response() {
        ringbuf_entry!(Trace::Response { cport });
        bus.complete_response(cport, frame);
        return;
    }

    let op_type = hdr.base_type();
    let id = hdr.id();
    let body = frame.get(HEADER_SIZE..).unwrap_or(&[]);

    match table.lookup(op_type) {
        Some(handler) => {
            ringbuf_entry!(Trace::RequestHandled { cport, op_type });
            let mut response = ResponseBody::new();
            let result = handler.call(cport, body, &mut response);
            send_response(transport, cport, id, op_type, result, &response);
        }
        None => {
            ringbuf_entry!(Trace::RequestUnknownType { cport, op_type });
            send_response(transport, cport, id, op_type, ResultCode::Invalid, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi::registers::AP_BRIDGE_CPORT_COUNT;

    struct RecordingTransport {
        sent: std::vec::Vec<(u8, std::vec::Vec<u8>)>,
    }

    impl CPortSend for RecordingTransport {
        fn send(&mut self, cport: u8, bytes: &[u8]) -> Result<(), GbOpError> {
            self.sent.push((cport, bytes.to_vec()));
            Ok(())
        }
    }

    fn request_frame(id: u16, op_type: u8, body: &[u8]) -> FrameBuf {
        let mut frame = FrameBuf::new();
        frame.resize(HEADER_SIZE, 0).unwrap();
        OperationHeader::new((HEADER_SIZE + body.len()) as u16, id, op_type, 0).write_into(&mut frame);
        frame.extend_from_slice(body).unwrap();
        frame
    }

    fn protocol_version_handler(_cport: u8, _body: &[u8], response: &mut ResponseBody) -> ResultCode {
        response.extend_from_slice(&[0x00, 0x01]).unwrap();
        ResultCode::Success
    }

    #[test]
    fn vibrator_protocol_version_scenario() {
        // Scenario 1: request {size=0x08, id=1, type=0x01}; response
        // {size=0x0A, id=1, type=0x81, result=0, major=0, minor=1}.
        let mut bus = Bus::new(AP_BRIDGE_CPORT_COUNT);
        let mut transport = RecordingTransport { sent: std::vec::Vec::new() };
        let mut table: HandlerTable<4> = HandlerTable::new();
        table.register(0x01, Handler::Slow(protocol_version_handler)).unwrap();

        let frame = request_frame(1, 0x01, &[]);
        dispatch_rx(&mut bus, &mut transport, &table, 0, frame);

        assert_eq!(transport.sent.len(), 1);
        let (cport, bytes) = &transport.sent[0];
        assert_eq!(*cport, 0);
        let hdr = OperationHeader::parse(bytes).unwrap();
        assert_eq!(hdr.size(), 0x0A);
        assert_eq!(hdr.id(), 1);
        assert_eq!(hdr.base_type(), OperationHeader::response_type(0x01));
        assert_eq!(bytes[HEADER_SIZE], 0);
        assert_eq!(bytes[HEADER_SIZE + 1], 1);
    }

    #[test]
    fn unknown_op_type_gets_invalid_result() {
        // Scenario 2: handlers for {1,3,5}; request type=2, id=7 ->
        // response {size=8, id=7, type=0x82, result=0x06}.
        let mut bus = Bus::new(AP_BRIDGE_CPORT_COUNT);
        let mut transport = RecordingTransport { sent: std::vec::Vec::new() };
        let mut table: HandlerTable<4> = HandlerTable::new();
        table.register(1, Handler::Slow(protocol_version_handler)).unwrap();
        table.register(3, Handler::Slow(protocol_version_handler)).unwrap();
        table.register(5, Handler::Slow(protocol_version_handler)).unwrap();

        let frame = request_frame(7, 2, &[]);
        dispatch_rx(&mut bus, &mut transport, &table, 0, frame);

        let (_, bytes) = &transport.sent[0];
        let hdr = OperationHeader::parse(bytes).unwrap();
        assert_eq!(hdr.size(), 8);
        assert_eq!(hdr.id(), 7);
        assert_eq!(hdr.base_type(), OperationHeader::response_type(2));
        assert_eq!(hdr.result, ResultCode::Invalid.as_u8());
    }

    #[test]
    fn malformed_frame_is_dropped_without_a_response() {
        let mut bus = Bus::new(AP_BRIDGE_CPORT_COUNT);
        let mut transport = RecordingTransport { sent: std::vec::Vec::new() };
        let table: HandlerTable<4> = HandlerTable::new();

        let mut short = FrameBuf::new();
        short.extend_from_slice(&[1, 2, 3]).unwrap();
        dispatch_rx(&mut bus, &mut transport, &table, 0, short);

        assert!(transport.sent.is_empty());
    }

    #[test]
    fn response_frame_is_routed_to_bus_not_a_handler() {
        let mut bus = Bus::new(AP_BRIDGE_CPORT_COUNT);
        let mut transport = RecordingTransport { sent: std::vec::Vec::new() };
        let table: HandlerTable<4> = HandlerTable::new();

        let frame = request_frame(9, OperationHeader::response_type(1), &[]);
        // No pending request with id 9: complete_response just drops it,
        // but the important thing is it never reaches the handler table
        // (which is empty and would have synthesized an Invalid response).
        dispatch_rx(&mut bus, &mut transport, &table, 0, frame);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn registering_duplicate_type_fails() {
        let mut table: HandlerTable<4> = HandlerTable::new();
        table.register(1, Handler::Fast(protocol_version_handler)).unwrap();
        assert_eq!(
            table.register(1, Handler::Slow(protocol_version_handler)),
            Err(GbOpError::AlreadyRegistered)
        );
    }
}
