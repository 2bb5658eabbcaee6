// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CPort transport, attribute access, and the mailbox handshake (§4.A,
//! §4.B, §4.C): the only layer that touches UniPro silicon directly.
//!
//! Hardware access is expressed through [`regs::UniproRegs`], a trait
//! rather than a concrete MMIO struct — the same move the teacher's
//! kernel makes with `task::ArchState` to let the same scheduling logic
//! run on real hardware or `kern::arch::simulator`. A real board support
//! crate implements `UniproRegs` over `vcell`-backed MMIO at the offsets
//! in `abi::registers::offset`; this crate's own tests use [`fake::FakeRegs`].
//!
//! [`transport::CPortTransport`] implements `gb_op::CPortSend`, so a
//! `gb_op::Bus` can send through it directly; the reverse path (silicon
//! EOM interrupt to `Bus::complete_response` or a request handler) is
//! wired by `gb-dispatch` one layer up, not by this crate.

#![cfg_attr(not(test), no_std)]

pub mod attr;
#[cfg(test)]
mod fake;
mod mailbox;
pub mod mphy;
pub mod regs;
pub mod transport;

pub use attr::AttributeAccess;
pub use regs::UniproRegs;
pub use transport::{CPortTransport, FrameHandler, TxCallback, TxOutcome};
