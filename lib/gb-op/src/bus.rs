// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-bus operation engine: ID allocation, send/receive correlation,
//! the per-CPort watchdog sweep, and refcounted operation lifetime (§4.D).

use crate::operation::{CallbackStatus, FrameBuf, Operation, OperationHandle};
use crate::pool::OperationPool;
use abi::registers::OPERATION_TIMEOUT_MS;
use abi::{IdAllocator, OperationHeader, ResultCode, HEADER_SIZE};
use ringbuf::{ringbuf, ringbuf_entry};

/// Upper bound on simultaneously-bridged CPorts — the AP-bridge's 44,
/// which is the largest silicon revision in §3.
pub const MAX_CPORTS: usize = 44;

/// How many requests may be outstanding (sent, awaiting response) on a
/// single CPort at once. §4.D's ID-allocation note observes the in-flight
/// window is always far smaller than `2^16` in practice; this is that
/// window, made concrete.
pub const MAX_OUTSTANDING_PER_CPORT: usize = 8;

type Pending = heapless::Vec<OperationHandle, MAX_OUTSTANDING_PER_CPORT>;

/// The minimal capability the operation engine needs from the CPort
/// transport: "accept these bytes for this CPort, blocking until they have
/// been handed to the TX FIFO". `drv-gb-cport::CPortTransport` implements
/// this; `Bus` is otherwise wire-layer agnostic, which is what lets it be
/// unit-tested on the host without any silicon underneath it.
pub trait CPortSend {
    fn send(&mut self, cport: u8, bytes: &[u8]) -> Result<(), GbOpError>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GbOpError {
    /// CPort has not completed the mailbox handshake (§4.A `Disconnected`).
    Disconnected,
    /// Payload exceeds `CPORT_BUF_SIZE` (§4.A `TooLarge`).
    TooLarge,
    /// The operation pool or a CPort's pending-request list is full.
    NoMemory,
    /// CPort index is out of range for this bus.
    BadCPort,
    /// A second driver tried to bind to a CPort that already has one
    /// (§4.A `register_driver`, §7 `AlreadyRegistered`).
    AlreadyRegistered,
    /// Silicon reported a non-zero result code on an attribute access
    /// (§4.B, §7 `IoError`).
    IoError,
    /// Frame malformed, descriptor type unknown, or response shorter than
    /// the header (§7 `ProtocolBad`).
    ProtocolBad,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    ResponseMatched { cport: u8, id: u16 },
    ResponseDropped { cport: u8, id: u16 },
    Timeout { cport: u8, id: u16 },
    PoolExhausted { cport: u8 },
}

ringbuf!(Trace, 32, Trace::PoolExhausted { cport: 0 });

/// Owns every `Operation` on one UniPro bus and the per-CPort bookkeeping
/// (pending list, correlation IDs) that drives request/response semantics.
///
/// Sending bytes on the wire is deliberately not this type's job — that is
/// `drv-gb-cport`'s `CPortTransport`. Callers pass already-accepted-or-failed
/// send results in; `Bus` only ever manages the correlation and lifetime
/// state machine.
pub struct Bus {
    pool: OperationPool,
    pending: [Pending; MAX_CPORTS],
    ids: IdAllocator,
    cport_count: usize,
}

impl Bus {
    pub fn new(cport_count: usize) -> Self {
        assert!(cport_count <= MAX_CPORTS);
        Bus {
            pool: OperationPool::new(),
            pending: core::array::from_fn(|_| Pending::new()),
            ids: IdAllocator::new(),
            cport_count,
        }
    }

    pub fn get(&self, handle: OperationHandle) -> Option<&Operation> {
        self.pool.get(handle)
    }

    pub fn get_mut(&mut self, handle: OperationHandle) -> Option<&mut Operation> {
        self.pool.get_mut(handle)
    }

    fn check_cport(&self, cport: u8) -> Result<(), GbOpError> {
        if (cport as usize) >= self.cport_count {
            return Err(GbOpError::BadCPort);
        }
        Ok(())
    }

    /// Allocates an operation to hold a freshly-received frame (request or
    /// response body), without touching the pending list. Used both by
    /// `complete_response` below and by the handler-dispatch layer for
    /// inbound requests.
    pub fn new_operation(&mut self, cport: u8, frame: FrameBuf) -> Option<OperationHandle> {
        self.pool.alloc(cport, frame)
    }

    pub fn ref_inc(&mut self, handle: OperationHandle) {
        self.pool.ref_inc(handle)
    }

    pub fn unref(&mut self, handle: OperationHandle) {
        self.pool.unref(handle)
    }

    /// Prepares a request for sending: assigns a correlation ID if
    /// `need_response`, stamps `submit_time`, registers the callback, and
    /// (if a response is wanted) inserts the operation into the CPort's
    /// pending list with an extra reference. The caller still owns writing
    /// the header into `request` bytes before handing them to the
    /// transport — see `gb-op`'s `lib.rs` doc for the expected call order.
    pub fn prepare_send(
        &mut self,
        cport: u8,
        mut request: FrameBuf,
        need_response: bool,
        callback: Option<crate::operation::OperationCallback>,
        user_priv: *mut (),
        now_ms: u32,
    ) -> Result<(OperationHandle, u16), GbOpError> {
        self.check_cport(cport)?;
        if request.len() > abi::registers::CPORT_BUF_SIZE {
            return Err(GbOpError::TooLarge);
        }

        let id = if need_response { self.ids.alloc() } else { 0 };
        if request.len() >= HEADER_SIZE {
            let mut hdr = OperationHeader::parse(&request).unwrap_or_default();
            hdr.set_id(id);
            hdr.write_into(&mut request);
        }

        let handle = self
            .pool
            .alloc(cport, request)
            .ok_or(GbOpError::NoMemory)?;

        if need_response {
            let op = self.pool.get_mut(handle).expect("just allocated");
            op.id = id;
            op.callback = callback;
            op.user_priv = user_priv;
            op.submit_time = now_ms;

            let pending = &mut self.pending[cport as usize];
            if pending.push(handle).is_err() {
                self.pool.unref(handle);
                return Err(GbOpError::NoMemory);
            }
            self.pool.ref_inc(handle);
        }

        Ok((handle, id))
    }

    /// Unwinds `prepare_send`'s bookkeeping after the transport failed to
    /// accept the bytes (§4.D "If send fails and need_response, remove from
    /// tx_fifo, unref(op), update watchdog, return the error").
    pub fn abort_send(&mut self, cport: u8, handle: OperationHandle, need_response: bool) {
        if need_response {
            let pending = &mut self.pending[cport as usize];
            if let Some(pos) = pending.iter().position(|h| *h == handle) {
                pending.remove(pos);
                self.pool.unref(handle);
            }
        }
        self.pool.unref(handle);
    }

    /// Processes an inbound frame carrying `TYPE_RESPONSE_FLAG`: matches it
    /// against the CPort's pending list by correlation ID, attaches it to
    /// the matched request, and invokes that request's callback. Returns
    /// `true` if a match was found, `false` if the frame was silently
    /// dropped (§8 scenario 3: a late response to an already-timed-out
    /// request has no entry left to match).
    pub fn complete_response(&mut self, cport: u8, frame: FrameBuf) -> bool {
        let Some(hdr) = OperationHeader::parse(&frame) else {
            return false;
        };
        let id = hdr.id();

        let Some(resp_handle) = self.pool.alloc(cport, frame) else {
            ringbuf_entry!(Trace::PoolExhausted { cport });
            return false;
        };

        let pending = &mut self.pending[cport as usize];
        let Some(pos) = pending.iter().position(|h| {
            self.pool
                .get(*h)
                .map(|op| op.id == id)
                .unwrap_or(false)
        }) else {
            ringbuf_entry!(Trace::ResponseDropped { cport, id });
            self.pool.unref(resp_handle);
            return false;
        };
        let req_handle = pending.remove(pos);

        self.pool.ref_inc(resp_handle);
        let (callback, user_priv) = {
            let req = self.pool.get_mut(req_handle).expect("matched handle is live");
            req.response_op = Some(resp_handle);
            req.has_responded = true;
            (req.callback, req.user_priv)
        };

        ringbuf_entry!(Trace::ResponseMatched { cport, id });
        if let Some(cb) = callback {
            cb(req_handle, CallbackStatus::Responded, user_priv);
        }
        self.pool.unref(req_handle);
        self.pool.unref(resp_handle);
        true
    }

    /// Returns the deadline (submit_time + timeout) of the oldest
    /// outstanding request on `cport`, or `None` if the watchdog should be
    /// disarmed because nothing is pending.
    pub fn next_deadline(&self, cport: u8) -> Option<u32> {
        self.pending[cport as usize]
            .iter()
            .filter_map(|h| self.pool.get(*h))
            .map(|op| op.submit_time.wrapping_add(OPERATION_TIMEOUT_MS))
            .min()
    }

    /// Sweeps `cport`'s pending list for requests whose deadline has
    /// passed, invoking each one's callback with `Timeout` and unref-ing it.
    /// Returns the number of operations timed out.
    pub fn check_timeouts(&mut self, cport: u8, now_ms: u32) -> usize {
        let mut timed_out = heapless::Vec::<OperationHandle, MAX_OUTSTANDING_PER_CPORT>::new();
        {
            let pending = &mut self.pending[cport as usize];
            let mut i = 0;
            while i < pending.len() {
                let due = self
                    .pool
                    .get(pending[i])
                    .map(|op| op.submit_time.wrapping_add(OPERATION_TIMEOUT_MS))
                    .unwrap_or(now_ms);
                // Wraparound-safe "has now reached due" check: true when due
                // lies at most half the u32 range behind now_ms.
                if now_ms.wrapping_sub(due) < u32::MAX / 2 {
                    let _ = timed_out.push(pending.remove(i));
                } else {
                    i += 1;
                }
            }
        }

        let n = timed_out.len();
        for handle in timed_out {
            let (callback, user_priv, id) = match self.pool.get(handle) {
                Some(op) => (op.callback, op.user_priv, op.id),
                None => continue,
            };
            ringbuf_entry!(Trace::Timeout { cport, id });
            if let Some(cb) = callback {
                cb(handle, CallbackStatus::Timeout, user_priv);
            }
            self.pool.unref(handle);
        }
        n
    }

    /// Cancels every request outstanding on `cport` (CPort teardown path).
    /// No forced cancellation happens from IRQ context by design (§5
    /// Cancellation) — this is only ever called from the worker/client
    /// execution context that owns the CPort.
    pub fn cancel_cport(&mut self, cport: u8) {
        let pending: Pending = core::mem::take(&mut self.pending[cport as usize]);
        for handle in pending {
            let (callback, user_priv) = match self.pool.get(handle) {
                Some(op) => (op.callback, op.user_priv),
                None => continue,
            };
            if let Some(cb) = callback {
                cb(handle, CallbackStatus::Cancelled, user_priv);
            }
            self.pool.unref(handle);
        }
    }

    /// Builds the response frame's header for an inbound request, assigning
    /// `result` and reusing the request's correlation ID, per §6's
    /// `response has MSB set` wire convention.
    pub fn build_response_header(request_id: u16, request_type: u8, result: ResultCode) -> OperationHeader {
        OperationHeader::new(
            HEADER_SIZE as u16,
            request_id,
            OperationHeader::response_type(request_type),
            result.as_u8(),
        )
    }

    pub fn pool_in_use(&self) -> usize {
        self.pool.in_use()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU8, Ordering};

    static LAST_STATUS: AtomicU8 = AtomicU8::new(0xff);

    fn status_to_u8(s: CallbackStatus) -> u8 {
        match s {
            CallbackStatus::Responded => 0,
            CallbackStatus::Timeout => 1,
            CallbackStatus::Cancelled => 2,
        }
    }

    fn record_cb(_h: OperationHandle, status: CallbackStatus, _p: *mut ()) {
        LAST_STATUS.store(status_to_u8(status), Ordering::SeqCst);
    }

    fn header_frame(size: u16, id: u16, op_type: u8, result: u8) -> FrameBuf {
        let hdr = OperationHeader::new(size, id, op_type, result);
        let mut buf = FrameBuf::new();
        buf.extend_from_slice(&[0u8; HEADER_SIZE]).unwrap();
        hdr.write_into(&mut buf);
        buf
    }

    #[test]
    fn send_request_then_response_invokes_callback_once() {
        let mut bus = Bus::new(32);
        let req = header_frame(HEADER_SIZE as u16, 0, 0x01, 0);
        let (handle, id) = bus
            .prepare_send(2, req, true, Some(record_cb), core::ptr::null_mut(), 0)
            .unwrap();
        assert_eq!(id, 1);
        assert!(bus.next_deadline(2).is_some());

        let resp = header_frame(HEADER_SIZE as u16, id, 0x81, 0);
        assert!(bus.complete_response(2, resp));
        assert_eq!(LAST_STATUS.load(Ordering::SeqCst), 0);

        let op = bus.get(handle).unwrap();
        assert!(op.response_op.is_some());
        assert!(bus.next_deadline(2).is_none());
    }

    #[test]
    fn unmatched_response_is_dropped_silently() {
        let mut bus = Bus::new(32);
        let resp = header_frame(HEADER_SIZE as u16, 0x42, 0x81, 0);
        assert!(!bus.complete_response(2, resp));
    }

    #[test]
    fn timeout_fires_after_deadline_and_later_response_is_dropped() {
        let mut bus = Bus::new(32);
        let req = header_frame(HEADER_SIZE as u16, 0, 0x01, 0);
        let (_, id) = bus
            .prepare_send(3, req, true, Some(record_cb), core::ptr::null_mut(), 0)
            .unwrap();

        assert_eq!(bus.check_timeouts(3, 500), 0, "deadline not yet reached");
        assert_eq!(
            bus.check_timeouts(3, OPERATION_TIMEOUT_MS),
            1,
            "deadline reached"
        );
        assert_eq!(LAST_STATUS.load(Ordering::SeqCst), 1);

        let late = header_frame(HEADER_SIZE as u16, id, 0x81, 0);
        assert!(!bus.complete_response(3, late), "no matching pending entry");
    }

    #[test]
    fn too_large_payload_is_rejected() {
        let mut bus = Bus::new(32);
        let mut req = FrameBuf::new();
        req.resize(abi::registers::CPORT_BUF_SIZE + 1, 0).unwrap();
        assert_eq!(
            bus.prepare_send(0, req, false, None, core::ptr::null_mut(), 0),
            Err(GbOpError::TooLarge)
        );
    }

    #[test]
    fn abort_send_unwinds_pending_and_refcount() {
        let mut bus = Bus::new(32);
        let req = header_frame(HEADER_SIZE as u16, 0, 0x01, 0);
        let (handle, _) = bus
            .prepare_send(0, req, true, None, core::ptr::null_mut(), 0)
            .unwrap();
        bus.abort_send(0, handle, true);
        assert!(bus.get(handle).is_none());
        assert!(bus.next_deadline(0).is_none());
    }
}
