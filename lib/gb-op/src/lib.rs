// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Greybus operation engine (§4.D): request/response correlation,
//! 16-bit ID allocation, per-CPort timeout sweep, and refcounted operation
//! lifetime.
//!
//! Call order for an outgoing request that wants a response:
//!
//! 1. Build the request frame bytes (header + body) into a [`FrameBuf`].
//! 2. [`Bus::prepare_send`] assigns an ID, stamps the submit time, and adds
//!    the operation to the CPort's pending list.
//! 3. The caller hands the now-ID-stamped bytes to the CPort transport
//!    (`drv-gb-cport`). On failure, call [`Bus::abort_send`] to unwind.
//! 4. When a response frame arrives on that CPort, the transport layer
//!    calls [`Bus::complete_response`], which matches it by ID and invokes
//!    the original callback.
//! 5. The firmware's main loop calls [`Bus::check_timeouts`] periodically
//!    (scheduled against [`Bus::next_deadline`]) to fail anything that
//!    outlived `OPERATION_TIMEOUT_MS`.
//!
//! Synchronous sends ([`sync::send_request_sync`]) are built on top of this
//! using a completion flag rather than a real semaphore, since the
//! scheduler that would provide one is an external collaborator (§1) this
//! workspace does not implement.

#![cfg_attr(not(test), no_std)]

mod bus;
mod operation;
mod pool;
pub mod sync;

pub use bus::{Bus, CPortSend, GbOpError, MAX_CPORTS, MAX_OUTSTANDING_PER_CPORT};
pub use operation::{CallbackStatus, FrameBuf, Operation, OperationCallback, OperationHandle};
pub use pool::OPERATION_POOL_SIZE;
