// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The SVC (Switch-Supervisor Controller) bring-up state machine (§4.G),
//! its route-table construction, and the SVC-initiating half of the
//! mailbox handshake (§4.C steps 2 and 4).
//!
//! `drv-gb-cport` owns the bridge side of the mailbox handshake (the
//! interrupt-driven reaction to a mailbox write); this crate owns the SVC
//! side (deciding to write the mailbox and polling for the ack), plus
//! everything upstream of it that only the SVC chip does: regulator/switch
//! bring-up sequencing and NCP route programming.

#![cfg_attr(not(test), no_std)]

pub mod mailbox;
pub mod routes;
mod state;

pub use routes::{
    build_routes, ConnectionSpec, InterfaceRoute, RouteReport, RouteRequest, SwitchOps,
    DEFAULT_CONNECTION_FLAGS,
};
pub use state::{BoardOps, InterfaceRail, Svc, SvcState, INTERFACES_ON_HOLDOFF_MS};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SvcError {
    /// `board_init()` failed (§4.G `Booting` step).
    BoardInitFailed,
    /// `switch_init()` failed (§4.G `SwitchInit` step).
    SwitchInitFailed,
    /// Powering on a declared interface rail failed.
    RailSequenceFailed { index: usize },
    /// Silicon reported a non-zero result code on the mailbox attribute
    /// access (§4.B, §7 `IoError`).
    AttributeIo,
    /// The SVC's poll of the bridge's `TSB_MAILBOX` never read back zero
    /// (§4.C step 2).
    MailboxTimeout,
}

impl From<gb_op::GbOpError> for SvcError {
    fn from(_: gb_op::GbOpError) -> Self {
        SvcError::AttributeIo
    }
}
