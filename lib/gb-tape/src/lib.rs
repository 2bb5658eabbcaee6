// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tape and replay (§4.F): records every received frame, prefixed with a
//! `{size:u16, cport:u16}` header, through a pluggable `{open, close, read,
//! write}` sink; `replay` reads the same stream back and feeds each record
//! through `gb-dispatch`'s RX entry point as if it had arrived from
//! silicon.

#![cfg_attr(not(test), no_std)]

use gb_op::{Bus, CPortSend, FrameBuf};

/// Byte length of a tape record's `{size, cport}` header.
pub const RECORD_HEADER_SIZE: usize = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TapeError {
    /// The underlying sink reported a failure.
    Io,
    /// A record's header claimed a size that didn't arrive.
    Truncated,
    /// A record claimed a frame larger than a CPort buffer can hold.
    FrameTooLarge,
}

/// The pluggable sink a tape records to or replays from. A real
/// implementation might be backed by the auxiliary flash task or a host
/// pipe; tests use an in-memory one.
pub trait TapeIo {
    fn open(&mut self) -> Result<(), TapeError>;
    fn close(&mut self);
    /// Reads up to `buf.len()` bytes. Returns `0` only at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TapeError>;
    fn write(&mut self, buf: &[u8]) -> Result<(), TapeError>;
}

/// Records frames to `IO` while active. Registered once per bus; `record`
/// is a no-op until [`Tape::activate`] is called, so normal operation pays
/// nothing for this instrumentation.
pub struct Tape<IO: TapeIo> {
    io: IO,
    active: bool,
}

impl<IO: TapeIo> Tape<IO> {
    pub fn new(io: IO) -> Self {
        Tape { io, active: false }
    }

    pub fn activate(&mut self) -> Result<(), TapeError> {
        self.io.open()?;
        self.active = true;
        Ok(())
    }

    pub fn deactivate(&mut self) {
        if self.active {
            self.io.close();
            self.active = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Called from the RX path for every received frame. A no-op unless
    /// the tape is active.
    pub fn record(&mut self, cport: u8, frame: &[u8]) -> Result<(), TapeError> {
        if !self.active {
            return Ok(());
        }
        let mut header = [0u8; RECORD_HEADER_SIZE];
        header[0..2].copy_from_slice(&(frame.len() as u16).to_le_bytes());
        header[2..4].copy_from_slice(&(cport as u16).to_le_bytes());
        self.io.write(&header)?;
        self.io.write(frame)
    }
}

/// Reads every record from `io` and feeds it through
/// [`gb_dispatch::dispatch_rx`] exactly as a live RX would have, so a
/// replayed tape produces the same callback observations it recorded
/// (§8 scenario 6). Returns the number of records replayed.
pub fn replay<IO: TapeIo, const N: usize>(
    io: &mut IO,
    bus: &mut Bus,
    transport: &mut impl CPortSend,
    table: &gb_dispatch::HandlerTable<N>,
) -> Result<usize, TapeError> {
    io.open()?;
    let mut count = 0usize;
    loop {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        let n = io.read(&mut header)?;
        if n == 0 {
            break;
        }
        if n < RECORD_HEADER_SIZE {
            io.close();
            return Err(TapeError::Truncated);
        }
        let size = u16::from_le_bytes([header[0], header[1]]) as usize;
        let cport = u16::from_le_bytes([header[2], header[3]]) as u8;

        let mut frame = FrameBuf::new();
        frame
            .resize(size, 0)
            .map_err(|_| TapeError::FrameTooLarge)?;
        let read = io.read(&mut frame)?;
        if read != size {
            io.close();
            return Err(TapeError::Truncated);
        }

        gb_dispatch::dispatch_rx(bus, transport, table, cport, frame);
        count += 1;
    }
    io.close();
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi::registers::AP_BRIDGE_CPORT_COUNT;
    use abi::{OperationHeader, ResultCode, HEADER_SIZE};
    use gb_dispatch::{Handler, HandlerTable, ResponseBody};
    use gb_op::GbOpError;

    /// An in-memory tape: one `Vec<u8>` for recording, consumed
    /// byte-by-byte for replay.
    struct MemTape {
        storage: std::vec::Vec<u8>,
        cursor: usize,
        opened: bool,
    }

    impl MemTape {
        fn new() -> Self {
            MemTape {
                storage: std::vec::Vec::new(),
                cursor: 0,
                opened: false,
            }
        }
    }

    impl TapeIo for MemTape {
        fn open(&mut self) -> Result<(), TapeError> {
            self.opened = true;
            Ok(())
        }

        fn close(&mut self) {
            self.opened = false;
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, TapeError> {
            let remaining = self.storage.len() - self.cursor;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.storage[self.cursor..self.cursor + n]);
            self.cursor += n;
            Ok(n)
        }

        fn write(&mut self, buf: &[u8]) -> Result<(), TapeError> {
            self.storage.extend_from_slice(buf);
            Ok(())
        }
    }

    struct RecordingTransport {
        sent: std::vec::Vec<(u8, std::vec::Vec<u8>)>,
    }

    impl CPortSend for RecordingTransport {
        fn send(&mut self, cport: u8, bytes: &[u8]) -> Result<(), GbOpError> {
            self.sent.push((cport, bytes.to_vec()));
            Ok(())
        }
    }

    fn protocol_version_handler(_cport: u8, _body: &[u8], response: &mut ResponseBody) -> ResultCode {
        response.extend_from_slice(&[0x00, 0x01]).unwrap();
        ResultCode::Success
    }

    fn request_frame(id: u16, op_type: u8) -> FrameBuf {
        let mut frame = FrameBuf::new();
        frame.resize(HEADER_SIZE, 0).unwrap();
        OperationHeader::new(HEADER_SIZE as u16, id, op_type, 0).write_into(&mut frame);
        frame
    }

    #[test]
    fn inactive_tape_records_nothing() {
        let mut tape = Tape::new(MemTape::new());
        tape.record(0, &[1, 2, 3]).unwrap();
        assert!(tape.io.storage.is_empty());
    }

    #[test]
    fn record_then_replay_reproduces_the_same_response() {
        let mut bus = Bus::new(AP_BRIDGE_CPORT_COUNT);
        let mut transport = RecordingTransport { sent: std::vec::Vec::new() };
        let mut table: HandlerTable<4> = HandlerTable::new();
        table.register(0x01, Handler::Slow(protocol_version_handler)).unwrap();

        let frame = request_frame(1, 0x01);

        let mut tape = Tape::new(MemTape::new());
        tape.activate().unwrap();
        tape.record(0, &frame).unwrap();

        // Live dispatch first, to get the reference response.
        gb_dispatch::dispatch_rx(&mut bus, &mut transport, &table, 0, frame);
        let live_response = transport.sent[0].1.clone();

        // Replay against a fresh bus/transport; the tape alone should
        // reproduce byte-identical output with no silicon involved.
        let mut replay_bus = Bus::new(AP_BRIDGE_CPORT_COUNT);
        let mut replay_transport = RecordingTransport { sent: std::vec::Vec::new() };
        let replayed = replay(&mut tape.io, &mut replay_bus, &mut replay_transport, &table).unwrap();

        assert_eq!(replayed, 1);
        assert_eq!(replay_transport.sent.len(), 1);
        assert_eq!(replay_transport.sent[0].1, live_response);
    }

    #[test]
    fn truncated_record_header_is_reported() {
        let mut io = MemTape::new();
        io.write(&[1, 2]).unwrap();
        let mut bus = Bus::new(AP_BRIDGE_CPORT_COUNT);
        let mut transport = RecordingTransport { sent: std::vec::Vec::new() };
        let table: HandlerTable<4> = HandlerTable::new();
        assert_eq!(
            replay(&mut io, &mut bus, &mut transport, &table),
            Err(TapeError::Truncated)
        );
    }
}
