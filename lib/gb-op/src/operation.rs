// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `Operation` type of §3 Data Model and its pool-backed lifetime.
//!
//! Operations are owned by a fixed-size pool rather than by `Rc`/`Arc`: this
//! is a `no_std` firmware target with a single core and no heap allocator,
//! so shared ownership is expressed the way the teacher expresses task
//! identity in `abi::TaskId` — an index into a static table, paired with a
//! generation counter so a stale handle can never alias a reused slot.

use abi::registers::CPORT_BUF_SIZE;
use core::sync::atomic::{AtomicU8, Ordering};

pub type FrameBuf = heapless::Vec<u8, CPORT_BUF_SIZE>;

/// Why a pending operation's callback is being invoked.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CallbackStatus {
    /// A response arrived and is attached to the operation.
    Responded,
    /// The per-CPort watchdog fired before a response arrived.
    Timeout,
    /// The owning CPort was torn down while the operation was outstanding.
    Cancelled,
}

/// `fn(handle, status, user_priv)`, invoked at most once per operation.
///
/// `user_priv` is an opaque caller-supplied pointer, exactly as
/// `TxBuffer::user_priv` is described in §3 — callers that need typed state
/// stash it behind this pointer and downcast in the callback body. This
/// mirrors the C callback-with-void-star convention the original firmware
/// uses throughout `greybus-core.c`.
pub type OperationCallback =
    fn(handle: OperationHandle, status: CallbackStatus, user_priv: *mut ());

/// An index + generation pair identifying a live entry in an
/// [`OperationPool`]. Two handles are equal only if they name the same slot
/// *incarnation* — a handle to a freed-and-reallocated slot compares unequal
/// to the new occupant's handle, the same protection `abi::TaskId` gives
/// task identity across restarts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OperationHandle {
    pub(crate) index: u8,
    pub(crate) generation: u16,
}

/// A request/response pair (§3 Operation).
pub struct Operation {
    pub cport: u8,
    pub request: FrameBuf,
    pub response: Option<FrameBuf>,
    /// 16-bit correlation number; `0` means "no response expected".
    pub id: u16,
    refcount: AtomicU8,
    pub callback: Option<OperationCallback>,
    pub user_priv: *mut (),
    /// Monotonic milliseconds at send time, for watchdog bookkeeping.
    pub submit_time: u32,
    pub has_responded: bool,
    /// The paired incoming operation, once a response arrives. Holds a
    /// handle into the same pool rather than the operation itself.
    pub response_op: Option<OperationHandle>,
}

impl Operation {
    pub(crate) fn new(cport: u8, request: FrameBuf) -> Self {
        Operation {
            cport,
            request,
            response: None,
            id: 0,
            refcount: AtomicU8::new(1),
            callback: None,
            user_priv: core::ptr::null_mut(),
            submit_time: 0,
            has_responded: false,
            response_op: None,
        }
    }

    pub fn refcount(&self) -> u8 {
        self.refcount.load(Ordering::Acquire)
    }

    /// Adds a reference. Returns the new count.
    pub(crate) fn ref_inc(&self) -> u8 {
        self.refcount.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drops a reference. Returns the new count; `0` means the caller must
    /// free the slot.
    pub(crate) fn ref_dec(&self) -> u8 {
        self.refcount.fetch_sub(1, Ordering::AcqRel) - 1
    }
}

// Safety: `user_priv` is only ever touched by the single firmware-controlled
// execution context that owns the corresponding CPort (IRQ, TX worker, or
// the client task that issued the send, never more than one at a time per
// the ordering guarantees of §5), so `Operation` never has its raw pointer
// aliased across a genuine concurrent access.
unsafe impl Send for Operation {}
