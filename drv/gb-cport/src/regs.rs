// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The register-level capability the transport needs from the UniPro
//! silicon, expressed as a trait rather than a concrete MMIO struct.
//!
//! This mirrors how the teacher's `kern::task::ArchState` abstracts the
//! syscall-argument registers away from whatever actually holds them (real
//! stacked exception frame vs. `arch::simulator::SavedState`): one real
//! implementation backed by `vcell` over the device's MMIO window, and one
//! in-memory fake used by this crate's own tests and by `drv-gb-svc`'s
//! mailbox-handshake tests, neither of which link against real silicon.

use abi::registers::offset;

/// Outcome of a single attribute-access transaction (§4.B).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AttrOutcome {
    /// Result code as reported by `A2D_ATTRACS_STS_00`; `0` is success.
    pub result: u8,
    /// Read data, valid only when the access was a read.
    pub data: u32,
}

/// One attribute-access request, assembled into the control register as
/// described in §4.B: "program control register (peer, selector, write,
/// attr), optionally write data, issue UPD|CNT=1, poll INT_BEF, clear,
/// read result code and (for reads) data."
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AttrRequest {
    pub peer: bool,
    pub write: bool,
    pub selector: u16,
    pub attr: u16,
    pub data: u32,
}

/// Everything `CPortTransport` needs from the silicon, split along the
/// same lines as §4.A/§4.B/§4.C. A real implementation owns the device's
/// MMIO window behind `vcell::VolatileCell` accesses at the offsets in
/// `abi::registers::offset`; tests use an in-memory stand-in.
pub trait UniproRegs {
    /// Programs `AHM_MODE_CTRL_{0,1,2}` (§4.A Transfer mode). Boot-time
    /// only; not called again once CPorts are live.
    fn set_mode_ctrl(&mut self, reg0: u32, reg1: Option<u32>, reg2: Option<u32>);

    /// Bytes of TX FIFO space currently available for `cport`
    /// (`CPB_TX_BUFFER_SPACE_n`), used by the split-send algorithm to size
    /// each partial send.
    fn tx_space(&self, cport: u8) -> u32;

    /// Current TX FIFO offset for `cport` (`REG_TX_BUFFER_SPACE_OFFSET_n`).
    fn tx_offset(&self, cport: u8) -> u32;

    /// Writes all of `bytes` into `cport`'s TX FIFO. `skip_first_four`
    /// reflects the silicon requirement that continuation partial sends
    /// (`som == false`, §4.A split-send) address four bytes further into
    /// the FIFO window than the start of a message does — a detail of how
    /// the real implementation computes its MMIO address, not a
    /// truncation of `bytes`.
    fn write_tx_bytes(&mut self, cport: u8, bytes: &[u8], skip_first_four: bool);

    /// Marks end-of-message on `cport`'s TX FIFO. Raises the peer's EOM
    /// interrupt once the bytes already written drain.
    fn set_eom(&mut self, cport: u8);

    /// Bytes received by the last completed message on `cport`
    /// (`CPB_RX_TRANSFERRED_DATA_SIZE_n`), read by the EOM handler.
    fn rx_transferred(&self, cport: u8) -> usize;

    /// The live RX buffer for `cport`; valid until the next
    /// `switch_buffer` or `unpause_rx`.
    fn rx_buffer(&self, cport: u8) -> &[u8];

    /// Installs a new RX destination for `cport` (`AHM_ADDRESS_n`); the
    /// next inbound frame lands there. Idempotent at the register level —
    /// repeating the same address is a no-op to the silicon.
    fn set_rx_buffer(&mut self, cport: u8, buf_index: usize);

    /// Rearms RX credit for `cport` (`REG_RX_PAUSE_SIZE_n` plus the
    /// RX-pause bit). Idempotent per §8.
    fn unpause_rx(&mut self, cport: u8, size: usize);

    /// Clears the latched EOM interrupt for `cport`
    /// (`AHM_RX_EOM_INT_BEF_n`).
    fn clear_rx_eom_irq(&mut self, cport: u8);

    /// Enables/disables the EOM interrupt for `cport`
    /// (`AHM_RX_EOM_INT_EN_n`).
    fn set_rx_eom_irq_enabled(&mut self, cport: u8, enabled: bool);

    /// Enables/disables FCT (flow-control tokens) TX and RX for `cport`
    /// (`CPB_{TX,RX}_E2EFC_EN_n`), per the mailbox handshake (§4.C).
    fn set_fct_enabled(&mut self, cport: u8, tx: bool, rx: bool);

    /// Runs one DME attribute-access transaction to completion
    /// (`A2D_ATTRACS_*`, §4.B). Blocking; each transaction completes in
    /// microseconds per the spec, so no yielding is attempted.
    fn attr_access(&mut self, req: AttrRequest) -> AttrOutcome;

    /// Reads `UNIPRO_INT_BEF`/`TSB_INTERRUPTSTATUS`-style cause bits for
    /// the generic (non-per-CPort) UniPro interrupt, used by the mailbox
    /// handler (§4.C step 3).
    fn generic_interrupt_status(&self) -> u32;

    fn clear_generic_interrupt(&mut self, bits: u32);
}

/// Byte offsets used by a real `vcell`-backed implementation; kept here so
/// board support crates share one source of truth instead of recomputing
/// per-CPort register addresses themselves. Each "_n" register in
/// `abi::registers::offset` is this base plus `cport * STRIDE`.
pub const CPORT_REGISTER_STRIDE: usize = 0x4;

pub fn cport_register(base: usize, cport: u8) -> usize {
    base + cport as usize * CPORT_REGISTER_STRIDE
}
