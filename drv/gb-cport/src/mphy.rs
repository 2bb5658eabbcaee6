// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! M-PHY fixups (§4.A): two vendor-supplied attribute-write tables applied
//! once at boot, before any CPort is enabled, to stabilise HS-G1 links.

use crate::regs::{AttrRequest, UniproRegs};
use abi::registers::attr::TSB_MPHY_MAP;
use abi::registers::{TSB_MPHY_MAP_NORMAL, TSB_MPHY_MAP_REGISTER_1, TSB_MPHY_MAP_REGISTER_2};

/// A single entry's value: either a fixed constant, or the "magic" value
/// derived from bits `[5:1]` of a silicon debug register (§4.A).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FixupValue {
    Fixed(u32),
    /// Resolved at application time from the debug register passed to
    /// [`run_mphy_fixups`].
    Magic,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FixupEntry {
    pub selector: u16,
    pub attr: u16,
    pub value: FixupValue,
}

const fn fixed(selector: u16, attr: u16, value: u32) -> FixupEntry {
    FixupEntry {
        selector,
        attr,
        value: FixupValue::Fixed(value),
    }
}

/// The "register-1 map": applied with `TSB_MPHY_MAP = 0x01`. The vendor
/// table's single "magic" entry substitutes bits `[5:1]` of a silicon
/// debug register rather than a fixed constant.
pub const REGISTER_1_MAP: &[FixupEntry] = &[
    fixed(0, 0x8002, 0x0000_0000),
    fixed(0, 0x8003, 0x0000_0001),
    FixupEntry {
        selector: 0,
        attr: 0x8004,
        value: FixupValue::Magic,
    },
    fixed(0, 0x8005, 0x0000_0001),
];

/// The "register-2 map": applied with `TSB_MPHY_MAP = 0x81`.
pub const REGISTER_2_MAP: &[FixupEntry] = &[
    fixed(0, 0x8041, 0x0000_0000),
    fixed(0, 0x8042, 0x0000_0001),
    fixed(0, 0x8043, 0x0000_0000),
];

fn resolve(value: FixupValue, debug_register: u32) -> u32 {
    match value {
        FixupValue::Fixed(v) => v,
        FixupValue::Magic => (debug_register >> 1) & 0x1F,
    }
}

fn apply_table<R: UniproRegs>(regs: &mut R, map_select: u8, table: &[FixupEntry], debug_register: u32) {
    regs.attr_access(AttrRequest {
        peer: false,
        write: true,
        selector: 0,
        attr: TSB_MPHY_MAP,
        data: map_select as u32,
    });
    for entry in table {
        regs.attr_access(AttrRequest {
            peer: false,
            write: true,
            selector: entry.selector,
            attr: entry.attr,
            data: resolve(entry.value, debug_register),
        });
    }
    regs.attr_access(AttrRequest {
        peer: false,
        write: true,
        selector: 0,
        attr: TSB_MPHY_MAP,
        data: TSB_MPHY_MAP_NORMAL as u32,
    });
}

/// Runs both fixup tables in order, toggling `TSB_MPHY_MAP` before and
/// after each as §4.A specifies. Run once at boot, before any CPort is
/// brought up.
pub fn run_mphy_fixups<R: UniproRegs>(regs: &mut R, debug_register: u32) {
    apply_table(regs, TSB_MPHY_MAP_REGISTER_1, REGISTER_1_MAP, debug_register);
    apply_table(regs, TSB_MPHY_MAP_REGISTER_2, REGISTER_2_MAP, debug_register);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRegs;

    #[test]
    fn fixups_toggle_map_select_before_and_after_each_table() {
        let mut regs = FakeRegs::new(44);
        run_mphy_fixups(&mut regs, 0b0010_1010);

        let writes = regs.attr_writes(TSB_MPHY_MAP);
        assert_eq!(
            writes,
            [
                TSB_MPHY_MAP_REGISTER_1 as u32,
                TSB_MPHY_MAP_NORMAL as u32,
                TSB_MPHY_MAP_REGISTER_2 as u32,
                TSB_MPHY_MAP_NORMAL as u32,
            ]
        );
    }

    #[test]
    fn magic_entry_resolves_from_debug_register_bits_5_1() {
        let mut regs = FakeRegs::new(44);
        // bits [5:1] of 0b0010_1010 (0x2A) are 0b10101 = 0x15.
        run_mphy_fixups(&mut regs, 0x2A);
        assert_eq!(regs.last_attr_write(0x8004), Some(0x15));
    }
}
