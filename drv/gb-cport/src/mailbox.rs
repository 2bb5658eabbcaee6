// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bridge side of the mailbox handshake (§4.C): the switch decides
//! when a CPort is connected, and tells the bridge by writing
//! `TSB_MAILBOX` on it. This module is the bridge's reaction to that
//! write; the SVC side that performs it lives in `drv-gb-svc`, which
//! drives the same [`crate::attr::AttributeAccess`] machine as a peer
//! write instead.

use crate::attr::AttributeAccess;
use crate::regs::UniproRegs;
use crate::transport::CPortTransport;
use abi::registers::attr::TSB_MAILBOX;
use abi::registers::TSB_MAIL_RESET;
use ringbuf::{ringbuf, ringbuf_entry};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    MailboxIgnored { value: u32 },
    MailboxHandshook { cport: u8 },
}

ringbuf!(Trace, 16, Trace::MailboxIgnored { value: 0 });

impl<R: UniproRegs, const N: usize> CPortTransport<R, N> {
    /// Reacts to the generic UniPro interrupt firing because of a mailbox
    /// write (§4.C step 3). Idempotent against spurious wakeups: a zero or
    /// `TSB_MAIL_RESET` mailbox value is ignored.
    pub fn handle_mailbox_interrupt(&mut self, access: &mut AttributeAccess) {
        let status = self.regs_mut().generic_interrupt_status();
        self.regs_mut().clear_generic_interrupt(status);

        let mailbox = match access.read_local(self.regs_mut(), 0, TSB_MAILBOX) {
            Ok(v) => v,
            Err(_) => return,
        };
        if mailbox == 0 || mailbox == TSB_MAIL_RESET {
            ringbuf_entry!(Trace::MailboxIgnored { value: mailbox });
            return;
        }

        // `cport_id + 1` was written; `0` is reserved to mean "no CPort".
        let cport = (mailbox - 1) as u8;
        self.regs_mut().set_fct_enabled(cport, false, true);
        self.set_connected(cport, true);
        self.regs_mut().set_rx_eom_irq_enabled(cport, true);
        let _ = access.write_local(self.regs_mut(), 0, TSB_MAILBOX, 0);
        ringbuf_entry!(Trace::MailboxHandshook { cport });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRegs;

    #[test]
    fn mailbox_write_of_five_connects_cport_four() {
        let mut t: CPortTransport<FakeRegs, 44> = CPortTransport::new(FakeRegs::new(44));
        let mut access = AttributeAccess::new(true);
        t.regs_mut().set_attr(false, 0, TSB_MAILBOX, 5);

        t.handle_mailbox_interrupt(&mut access);

        assert!(t.is_connected(4));
        assert_eq!(t.regs().fct_state(4), (false, true));
        assert!(t.regs().rx_eom_irq_enabled(4));
        assert_eq!(t.regs().last_attr_write(TSB_MAILBOX), Some(0));
    }

    #[test]
    fn zero_mailbox_value_is_ignored() {
        let mut t: CPortTransport<FakeRegs, 44> = CPortTransport::new(FakeRegs::new(44));
        let mut access = AttributeAccess::new(true);
        t.handle_mailbox_interrupt(&mut access);
        for cport in 0..44 {
            assert!(!t.is_connected(cport));
        }
    }
}
