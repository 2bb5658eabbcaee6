// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synchronous send (§4.D "Synchronous wait").
//!
//! `send_request_sync` stands in for `gb_operation_send_request_sync`'s use
//! of a per-operation semaphore. The real firmware's client task would
//! suspend on that semaphore, which is a scheduler primitive this
//! workspace's core does not implement (scheduling is an external
//! collaborator per §1). Here the default callback instead stores the
//! outcome in a [`SyncSlot`] and the caller polls it; on real hardware this
//! poll loop is exactly where a `task::sys_recv`-style block would go. No
//! timeout is imposed at this layer — as the spec notes, the CPort watchdog
//! produces the synthetic `Timeout` callback that unblocks the wait.

use crate::bus::{Bus, CPortSend, GbOpError};
use crate::operation::{CallbackStatus, FrameBuf, OperationHandle};
use core::cell::Cell;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncOutcome {
    Responded,
    Timeout,
    Cancelled,
}

/// The synchronization point a synchronous send waits on. Lives on the
/// caller's stack for the duration of the call, referenced via its raw
/// pointer from the callback the same way `TxBuffer::user_priv` is used
/// elsewhere in this engine.
#[derive(Default)]
pub struct SyncSlot {
    outcome: Cell<Option<SyncOutcome>>,
}

impl SyncSlot {
    pub const fn new() -> Self {
        SyncSlot {
            outcome: Cell::new(None),
        }
    }

    pub fn is_done(&self) -> bool {
        self.outcome.get().is_some()
    }

    pub fn take(&self) -> Option<SyncOutcome> {
        self.outcome.take()
    }
}

/// The default callback installed by `send_request_sync`.
pub fn sync_cb(_handle: OperationHandle, status: CallbackStatus, user_priv: *mut ()) {
    let slot = unsafe { &*(user_priv as *const SyncSlot) };
    let outcome = match status {
        CallbackStatus::Responded => SyncOutcome::Responded,
        CallbackStatus::Timeout => SyncOutcome::Timeout,
        CallbackStatus::Cancelled => SyncOutcome::Cancelled,
    };
    slot.outcome.set(Some(outcome));
}

/// Sends `request` on `cport` and blocks (by busy-polling `poll`, which the
/// caller supplies so this crate never depends on a concrete scheduler)
/// until the response arrives or the watchdog times it out.
pub fn send_request_sync<T: CPortSend>(
    bus: &mut Bus,
    transport: &mut T,
    cport: u8,
    request: FrameBuf,
    now_ms: u32,
    slot: &SyncSlot,
    // Called with exclusive access to `bus` on every spin of the wait loop,
    // so the caller can pump whatever delivers responses (a simulated IRQ
    // in tests, or a real interrupt handler's effects on real hardware)
    // without this function needing to know what that is.
    mut poll: impl FnMut(&mut Bus),
) -> Result<OperationHandle, GbOpError> {
    let (handle, _id) = bus.prepare_send(
        cport,
        request,
        true,
        Some(sync_cb),
        slot as *const SyncSlot as *mut (),
        now_ms,
    )?;

    let bytes = bus.get(handle).expect("just allocated").request.clone();
    if let Err(e) = transport.send(cport, &bytes) {
        bus.abort_send(cport, handle, true);
        return Err(e);
    }

    while !slot.is_done() {
        poll(bus);
    }

    Ok(handle)
}
