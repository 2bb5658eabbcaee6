// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The SVC-initiating half of the mailbox handshake (§4.C steps 2 and 4):
//! the switch decides a CPort is ready, writes `cport_id + 1` into the
//! bridge's `TSB_MAILBOX` as a peer attribute access, waits out the
//! silicon race (§9 `MBOX_RACE_HACK_DELAY_MS`), then polls the same
//! attribute until the bridge clears it back to zero. The bridge's
//! reaction to the write lives in `drv_gb_cport::mailbox`, driven from its
//! own interrupt instead of a poll loop.

use abi::registers::attr::TSB_MAILBOX;
use abi::registers::MBOX_RACE_HACK_DELAY_MS;
use drv_gb_cport::{AttributeAccess, UniproRegs};
use ringbuf::{ringbuf, ringbuf_entry};

use crate::SvcError;

const MAX_POLLS: u32 = 64;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    HandshakeStarted { cport: u8 },
    HandshakeAcked { cport: u8, polls: u32 },
    HandshakeTimedOut { cport: u8 },
}

ringbuf!(Trace, 16, Trace::HandshakeStarted { cport: 0 });

/// Connects `cport` on the bridge addressed by `bridge_regs` (§4.C step 2
/// onward). `delay_100ms` is injected so tests don't actually sleep; real
/// firmware passes its timer-based delay primitive.
pub fn connect_cport<R: UniproRegs>(
    access: &mut AttributeAccess,
    bridge_regs: &mut R,
    cport: u8,
    mut delay_100ms: impl FnMut(u32),
) -> Result<(), SvcError> {
    ringbuf_entry!(Trace::HandshakeStarted { cport });

    access
        .write_peer(bridge_regs, 0, TSB_MAILBOX, cport as u32 + 1)
        .map_err(|_| SvcError::AttributeIo)?;

    // The bridge's EOM/generic-interrupt handler races the SVC's own
    // execution after the mailbox write lands; the fixed delay below is
    // the same `MBOX_RACE_HACK_DELAY_MS` hack the bridge's own boot code
    // uses elsewhere for the identical race (§9).
    delay_100ms(MBOX_RACE_HACK_DELAY_MS);

    for polls in 1..=MAX_POLLS {
        let value = access
            .read_peer(bridge_regs, 0, TSB_MAILBOX)
            .map_err(|_| SvcError::AttributeIo)?;
        if value == 0 {
            ringbuf_entry!(Trace::HandshakeAcked { cport, polls });
            return Ok(());
        }
    }

    ringbuf_entry!(Trace::HandshakeTimedOut { cport });
    Err(SvcError::MailboxTimeout)
}
