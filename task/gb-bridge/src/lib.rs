// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bridge firmware: wires the CPort transport, the operation bus, and
//! two fixed protocol handler tables (vibrator on CPort 1, loopback on
//! CPort 2) together behind a single `step()` call a real main loop would
//! invoke once per iteration.
//!
//! `gb_dispatch::dispatch_rx` needs `&mut Bus` and `&mut impl CPortSend`
//! together with the frame, but `CPortTransport::register_driver` only
//! hands a frame handler a bare `fn(cport, bytes, user_priv)` pointer —
//! there is no way to close over `&mut self` there without aliasing the
//! transport this struct already owns. Per the "initialisation-ordered
//! singleton" design note (§9), this crate instead parks received frames
//! in a module-level [`static_cell::StaticCell`]-backed queue from a free
//! function, and `step()` drains that queue itself before calling into
//! `gb-dispatch`. The capture function touches nothing but the static, so
//! it never aliases `transport` or `bus`.

#![cfg_attr(not(test), no_std)]

pub mod handlers;

use abi::registers::AP_BRIDGE_CPORT_COUNT;
use drv_gb_cport::{CPortTransport, FrameHandler, UniproRegs};
use gb_dispatch::{Handler, HandlerTable};
use gb_op::{Bus, FrameBuf};
use gb_tape::{Tape, TapeIo};
use ringbuf::{ringbuf, ringbuf_entry};
use static_cell::StaticCell;

use handlers::{
    loopback_ping, loopback_protocol_version, loopback_sink, loopback_transfer,
    vibrator_off, vibrator_on, vibrator_protocol_version, LOOPBACK_CPORT, LOOPBACK_OP_PING,
    LOOPBACK_OP_PROTOCOL_VERSION, LOOPBACK_OP_SINK, LOOPBACK_OP_TRANSFER, VIBRATOR_CPORT,
    VIBRATOR_OP_OFF, VIBRATOR_OP_ON, VIBRATOR_OP_PROTOCOL_VERSION,
};

const RX_QUEUE_DEPTH: usize = 8;

static RX_QUEUE: StaticCell<heapless::Vec<(u8, FrameBuf), RX_QUEUE_DEPTH>> =
    StaticCell::new(heapless::Vec::new());

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    RxCaptured { cport: u8 },
    RxQueueFull { cport: u8 },
    UnroutedCPort { cport: u8 },
}

ringbuf!(Trace, 16, Trace::RxCaptured { cport: 0 });

/// The `FrameHandler::Slow` registered on every routed CPort. Parks the
/// frame in [`RX_QUEUE`] for `BridgeFirmware::step` to drain; never calls
/// into `bus`/`transport` itself.
fn capture_handler(cport: u8, bytes: &[u8], _user_priv: *mut ()) {
    let mut frame = FrameBuf::new();
    let _ = frame.extend_from_slice(bytes);
    let mut queue = RX_QUEUE.borrow_mut();
    if queue.push((cport, frame)).is_err() {
        ringbuf_entry!(Trace::RxQueueFull { cport });
        return;
    }
    ringbuf_entry!(Trace::RxCaptured { cport });
}

/// Bundles the CPort transport, operation bus, two protocol handler
/// tables, and an optional tape recorder for this bridge's fixed Greybus
/// surface (vibrator, loopback).
pub struct BridgeFirmware<R: UniproRegs, const N: usize = AP_BRIDGE_CPORT_COUNT> {
    pub transport: CPortTransport<R, N>,
    pub bus: Bus,
    vibrator_table: HandlerTable<4>,
    loopback_table: HandlerTable<4>,
}

impl<R: UniproRegs, const N: usize> BridgeFirmware<R, N> {
    pub fn new(regs: R, cport_count: usize) -> Self {
        let mut vibrator_table = HandlerTable::new();
        vibrator_table
            .register(VIBRATOR_OP_PROTOCOL_VERSION, Handler::Slow(vibrator_protocol_version))
            .unwrap();
        vibrator_table
            .register(VIBRATOR_OP_ON, Handler::Slow(vibrator_on))
            .unwrap();
        vibrator_table
            .register(VIBRATOR_OP_OFF, Handler::Slow(vibrator_off))
            .unwrap();

        let mut loopback_table = HandlerTable::new();
        loopback_table
            .register(LOOPBACK_OP_PROTOCOL_VERSION, Handler::Slow(loopback_protocol_version))
            .unwrap();
        loopback_table
            .register(LOOPBACK_OP_PING, Handler::Slow(loopback_ping))
            .unwrap();
        loopback_table
            .register(LOOPBACK_OP_TRANSFER, Handler::Slow(loopback_transfer))
            .unwrap();
        loopback_table
            .register(LOOPBACK_OP_SINK, Handler::Slow(loopback_sink))
            .unwrap();

        BridgeFirmware {
            transport: CPortTransport::new(regs),
            bus: Bus::new(cport_count),
            vibrator_table,
            loopback_table,
        }
    }

    /// Registers the capture handler on both fixed CPorts. Call once
    /// after construction, before the mailbox handshake can connect
    /// either CPort.
    pub fn register_drivers(&mut self) -> Result<(), gb_op::GbOpError> {
        self.transport
            .register_driver(VIBRATOR_CPORT, FrameHandler::Slow(capture_handler), core::ptr::null_mut())?;
        self.transport
            .register_driver(LOOPBACK_CPORT, FrameHandler::Slow(capture_handler), core::ptr::null_mut())?;
        Ok(())
    }

    fn table_for(&self, cport: u8) -> Option<&HandlerTable<4>> {
        match cport {
            VIBRATOR_CPORT => Some(&self.vibrator_table),
            LOOPBACK_CPORT => Some(&self.loopback_table),
            _ => None,
        }
    }

    /// One main-loop iteration: drains queued TX, drains silicon RX into
    /// [`RX_QUEUE`], then dispatches every captured frame through
    /// `gb-dispatch`. `tape`, if given, records every dispatched frame.
    pub fn step(&mut self, mut tape: Option<&mut Tape<impl TapeIo>>) {
        self.transport.pump_tx();
        self.transport.pump_rx();

        loop {
            let next = {
                let mut queue = RX_QUEUE.borrow_mut();
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            };
            let Some((cport, frame)) = next else { break };

            if let Some(t) = tape.as_mut() {
                let _ = t.record(cport, &frame);
            }

            match self.table_for(cport) {
                Some(table) => gb_dispatch::dispatch_rx(&mut self.bus, &mut self.transport, table, cport, frame),
                None => ringbuf_entry!(Trace::UnroutedCPort { cport }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_gb_cport::regs::{AttrOutcome, AttrRequest};

    struct FakeRegs {
        tx_space: u32,
    }

    impl UniproRegs for FakeRegs {
        fn set_mode_ctrl(&mut self, _: u32, _: Option<u32>, _: Option<u32>) {}
        fn tx_space(&self, _: u8) -> u32 { self.tx_space }
        fn tx_offset(&self, _: u8) -> u32 { 0 }
        fn write_tx_bytes(&mut self, _: u8, _: &[u8], _: bool) {}
        fn set_eom(&mut self, _: u8) {}
        fn rx_transferred(&self, _: u8) -> usize { 0 }
        fn rx_buffer(&self, _: u8) -> &[u8] { &[] }
        fn set_rx_buffer(&mut self, _: u8, _: usize) {}
        fn unpause_rx(&mut self, _: u8, _: usize) {}
        fn clear_rx_eom_irq(&mut self, _: u8) {}
        fn set_rx_eom_irq_enabled(&mut self, _: u8, _: bool) {}
        fn set_fct_enabled(&mut self, _: u8, _: bool, _: bool) {}
        fn attr_access(&mut self, _: AttrRequest) -> AttrOutcome { AttrOutcome { result: 0, data: 0 } }
        fn generic_interrupt_status(&self) -> u32 { 0 }
        fn clear_generic_interrupt(&mut self, _: u32) {}
    }

    #[test]
    fn captured_frame_on_vibrator_cport_reaches_the_vibrator_table() {
        let mut fw: BridgeFirmware<FakeRegs, 4> = BridgeFirmware::new(FakeRegs { tx_space: 64 }, 4);
        fw.register_drivers().unwrap();
        fw.transport.set_connected(VIBRATOR_CPORT, true);

        let mut frame = FrameBuf::new();
        frame.resize(abi::HEADER_SIZE, 0).unwrap();
        abi::OperationHeader::new(abi::HEADER_SIZE as u16, 1, VIBRATOR_OP_ON, 0)
            .write_into(&mut frame);
        capture_handler(VIBRATOR_CPORT, &frame, core::ptr::null_mut());

        fw.step(None::<&mut Tape<NeverTapeIo>>);

        assert!(handlers::vibrator_is_on());
    }

    struct NeverTapeIo;
    impl TapeIo for NeverTapeIo {
        fn open(&mut self) -> Result<(), gb_tape::TapeError> { Ok(()) }
        fn close(&mut self) {}
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, gb_tape::TapeError> { Ok(0) }
        fn write(&mut self, _buf: &[u8]) -> Result<(), gb_tape::TapeError> { Ok(()) }
    }
}
