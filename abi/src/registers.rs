// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! UniPro/silicon register and attribute constants named in §6 External
//! Interfaces. These addresses and bit layouts are part of the external
//! contract because they are dictated by the silicon, not a design choice
//! of this firmware.

/// Byte offsets from the UniPro device base. Only the registers the core
/// touches are named; the rest of the programming model belongs to the
/// board bring-up code called out as an external collaborator in §1.
pub mod offset {
    pub const AHM_MODE_CTRL_0: usize = 0x1400;
    pub const AHM_MODE_CTRL_1: usize = 0x1404;
    pub const AHM_MODE_CTRL_2: usize = 0x1408;
    pub const AHM_ADDRESS_0: usize = 0x1440;
    pub const AHM_RX_EOM_INT_BEF_0: usize = 0x1480;
    pub const AHM_RX_EOM_INT_EN_0: usize = 0x14C0;
    pub const CPB_RX_TRANSFERRED_DATA_SIZE_0: usize = 0x1500;
    pub const CPB_TX_BUFFER_SPACE_0: usize = 0x1540;
    pub const REG_TX_BUFFER_SPACE_OFFSET_0: usize = 0x1580;
    pub const REG_RX_PAUSE_SIZE_0: usize = 0x15C0;
    pub const CPB_TX_E2EFC_EN_0: usize = 0x1600;
    pub const CPB_RX_E2EFC_EN_0: usize = 0x1640;
    pub const CPORT_STATUS_0: usize = 0x1680;
    pub const A2D_ATTRACS_CTRL_00: usize = 0x2000;
    pub const A2D_ATTRACS_DATA_CTRL_00: usize = 0x2004;
    pub const A2D_ATTRACS_MSTR_CTRL: usize = 0x2008;
    pub const A2D_ATTRACS_INT_BEF: usize = 0x200C;
    pub const A2D_ATTRACS_STS_00: usize = 0x2010;
    pub const A2D_ATTRACS_DATA_STS_00: usize = 0x2014;
    pub const UNIPRO_INT_EN: usize = 0x2200;
    pub const UNIPRO_INT_BEF: usize = 0x2204;
}

/// Mode-2 transfer-mode programming values (§4.A Transfer mode). Mode 2
/// lets the receiver choose the destination buffer and carries the 8-byte
/// header transparently as part of the payload.
pub const AHM_MODE_CTRL_0_GP_BRIDGE: u32 = 0xAAAA_AAAA;
pub const AHM_MODE_CTRL_0_AP_BRIDGE: u32 = 0xAAAA_AAAA;
pub const AHM_MODE_CTRL_1_AP_BRIDGE: u32 = 0xAAAA_AAA5;
pub const AHM_MODE_CTRL_2_AP_BRIDGE: u32 = 0x00AA_AAAA;

/// DME attribute numbers.
pub mod attr {
    pub const TSB_MAILBOX: u16 = 0xA000;
    pub const TSB_INTERRUPTSTATUS: u16 = 0xA001;
    pub const TSB_INTERRUPTENABLE: u16 = 0xA002;
    pub const TSB_MPHY_MAP: u16 = 0x7F;
}

/// Bit in `TSB_INTERRUPTENABLE` that gates the mailbox IRQ.
pub const TSB_INTERRUPTENABLE_MAILBOX_BIT: u16 = 1 << 15;

/// `TSB_MAILBOX` sentinel values (§3 Mailbox state, §4.C).
pub const TSB_MAIL_RESET: u32 = 0x0000_0000;
/// The AP writes this value upward once enumeration of the bus is complete.
pub const TSB_MAIL_READY_AP: u32 = 0x0000_00FF;

/// `TSB_MPHY_MAP` values (§6 Expected attributes).
pub const TSB_MPHY_MAP_NORMAL: u8 = 0x00;
pub const TSB_MPHY_MAP_REGISTER_1: u8 = 0x01;
pub const TSB_MPHY_MAP_REGISTER_2: u8 = 0x81;

/// CPort IDs reserved for display/camera; must never be brought up by the
/// core (§3, §6, and the open question at the end of §9).
pub const RESERVED_CPORT_IDS: [u8; 2] = [16, 17];

pub fn is_reserved_cport(id: u8) -> bool {
    RESERVED_CPORT_IDS.contains(&id)
}

/// Per-CPort buffer sizing (§3 CPort, §8 boundary behaviours).
pub const CPORT_BUF_SIZE: usize = 2048;
pub const CPORT_RX_BUF_BASE: usize = 0x4000_0000;
pub const CPORT_TX_BUF_BASE: usize = 0x4010_0000;

/// Number of CPorts per silicon revision (§3 UniPro Device).
pub const GP_BRIDGE_CPORT_COUNT: usize = 32;
pub const AP_BRIDGE_CPORT_COUNT: usize = 44;

/// Watchdog timeout for an outstanding request (§4.D Timeout).
pub const OPERATION_TIMEOUT_MS: u32 = 1000;

/// Fixed silicon-bug delay between a mailbox write and the next read of
/// `TSB_MAILBOX` (§4.C step 4, §9 design note, upstream bug ENG-436). Kept
/// behind a named constant so it can be tuned or removed if the silicon
/// revision changes.
pub const MBOX_RACE_HACK_DELAY_MS: u32 = 100;
