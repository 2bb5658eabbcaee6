// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DME attribute access (§4.B): local/peer reads and writes over the
//! single-shot blocking attribute machine, with the silicon's result code
//! translated to [`GbOpError::IoError`] on failure.

use crate::regs::{AttrRequest, UniproRegs};
use gb_op::GbOpError;

/// Attribute access never overlaps on the same device (§4.B); this type
/// is the single owner of that invariant. Also carries whether this
/// silicon revision's controller supports peer attribute writes — the ES1
/// controller returns `-ENOSYS` for them, an open question §9 says to
/// treat as "fail loudly" rather than synthesise a result.
pub struct AttributeAccess {
    peer_writes_supported: bool,
}

impl AttributeAccess {
    pub fn new(peer_writes_supported: bool) -> Self {
        AttributeAccess {
            peer_writes_supported,
        }
    }

    pub fn read_local<R: UniproRegs>(
        &mut self,
        regs: &mut R,
        selector: u16,
        attr: u16,
    ) -> Result<u32, GbOpError> {
        self.access(regs, false, false, selector, attr, 0)
    }

    pub fn write_local<R: UniproRegs>(
        &mut self,
        regs: &mut R,
        selector: u16,
        attr: u16,
        data: u32,
    ) -> Result<(), GbOpError> {
        self.access(regs, false, true, selector, attr, data).map(|_| ())
    }

    pub fn read_peer<R: UniproRegs>(
        &mut self,
        regs: &mut R,
        selector: u16,
        attr: u16,
    ) -> Result<u32, GbOpError> {
        self.access(regs, true, false, selector, attr, 0)
    }

    /// Peer attribute writes are an open question on the ES1 controller
    /// (§9): rather than guess at emulated success, this fails loudly with
    /// [`GbOpError::IoError`] before touching the hardware when the
    /// controller is known not to support them.
    pub fn write_peer<R: UniproRegs>(
        &mut self,
        regs: &mut R,
        selector: u16,
        attr: u16,
        data: u32,
    ) -> Result<(), GbOpError> {
        if !self.peer_writes_supported {
            return Err(GbOpError::IoError);
        }
        self.access(regs, true, true, selector, attr, data).map(|_| ())
    }

    fn access<R: UniproRegs>(
        &mut self,
        regs: &mut R,
        peer: bool,
        write: bool,
        selector: u16,
        attr: u16,
        data: u32,
    ) -> Result<u32, GbOpError> {
        let outcome = regs.attr_access(AttrRequest {
            peer,
            write,
            selector,
            attr,
            data,
        });
        if outcome.result != 0 {
            return Err(GbOpError::IoError);
        }
        Ok(outcome.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRegs;
    use abi::registers::attr::TSB_MAILBOX;

    #[test]
    fn write_then_read_local_round_trips_through_the_fake() {
        let mut regs = FakeRegs::new(44);
        let mut access = AttributeAccess::new(true);
        access.write_local(&mut regs, 0, TSB_MAILBOX, 5).unwrap();
        assert_eq!(access.read_local(&mut regs, 0, TSB_MAILBOX).unwrap(), 5);
    }

    #[test]
    fn nonzero_result_code_surfaces_as_io_error() {
        let mut regs = FakeRegs::new(44);
        regs.set_attr_result(0x0d);
        let mut access = AttributeAccess::new(true);
        assert_eq!(
            access.read_local(&mut regs, 0, TSB_MAILBOX),
            Err(GbOpError::IoError)
        );
    }

    #[test]
    fn peer_write_fails_loudly_when_controller_does_not_support_it() {
        let mut regs = FakeRegs::new(44);
        let mut access = AttributeAccess::new(false);
        assert_eq!(
            access.write_peer(&mut regs, 0, TSB_MAILBOX, 1),
            Err(GbOpError::IoError)
        );
        // Never touched the hardware: no attribute access was logged.
        assert!(regs.attr_writes(TSB_MAILBOX).is_empty());
    }
}
