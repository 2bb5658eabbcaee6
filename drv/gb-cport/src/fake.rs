// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A host-side stand-in for the UniPro silicon, used by this crate's own
//! tests. Plays the same role `kern::arch::simulator` plays for the
//! teacher's kernel: a faithful-enough model of the register contract that
//! exercises the real driver code without linking against real hardware.

#![cfg(test)]

use crate::regs::{AttrOutcome, AttrRequest, UniproRegs};
use std::collections::HashMap;
use std::vec::Vec;

pub struct FakeRegs {
    mode_ctrl: [u32; 3],
    tx_space: HashMap<u8, u32>,
    tx_offset: HashMap<u8, u32>,
    tx_buf: HashMap<u8, Vec<u8>>,
    eom_count: HashMap<u8, u32>,
    rx_transferred: HashMap<u8, usize>,
    rx_buf: HashMap<u8, Vec<u8>>,
    rx_buf_index: HashMap<u8, usize>,
    rx_pause: HashMap<u8, usize>,
    rx_eom_irq_enabled: HashMap<u8, bool>,
    fct: HashMap<u8, (bool, bool)>,
    skip_flags: HashMap<u8, Vec<bool>>,
    attr_state: HashMap<(bool, u16, u16), u32>,
    attr_log: Vec<(u16, u32)>,
    attr_result: u8,
    generic_irq: u32,
}

impl FakeRegs {
    pub fn new(_cport_count: usize) -> Self {
        FakeRegs {
            mode_ctrl: [0; 3],
            tx_space: HashMap::new(),
            tx_offset: HashMap::new(),
            tx_buf: HashMap::new(),
            eom_count: HashMap::new(),
            rx_transferred: HashMap::new(),
            rx_buf: HashMap::new(),
            rx_buf_index: HashMap::new(),
            rx_pause: HashMap::new(),
            rx_eom_irq_enabled: HashMap::new(),
            fct: HashMap::new(),
            skip_flags: HashMap::new(),
            attr_state: HashMap::new(),
            attr_log: Vec::new(),
            attr_result: 0,
            generic_irq: 0,
        }
    }

    pub fn set_tx_space(&mut self, cport: u8, bytes: u32) {
        self.tx_space.insert(cport, bytes);
    }

    pub fn tx_bytes(&self, cport: u8) -> &[u8] {
        self.tx_buf.get(&cport).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn eom_writes(&self, cport: u8) -> u32 {
        *self.eom_count.get(&cport).unwrap_or(&0)
    }

    pub fn attr_writes(&self, attr: u16) -> Vec<u32> {
        self.attr_log
            .iter()
            .filter(|(a, _)| *a == attr)
            .map(|(_, d)| *d)
            .collect()
    }

    pub fn last_attr_write(&self, attr: u16) -> Option<u32> {
        self.attr_writes(attr).last().copied()
    }

    pub fn set_attr(&mut self, peer: bool, selector: u16, attr: u16, value: u32) {
        self.attr_state.insert((peer, selector, attr), value);
    }

    pub fn set_attr_result(&mut self, result: u8) {
        self.attr_result = result;
    }

    pub fn inject_rx(&mut self, cport: u8, bytes: &[u8]) {
        self.rx_buf.insert(cport, bytes.to_vec());
        self.rx_transferred.insert(cport, bytes.len());
    }

    pub fn mode_ctrl(&self) -> [u32; 3] {
        self.mode_ctrl
    }

    pub fn fct_state(&self, cport: u8) -> (bool, bool) {
        *self.fct.get(&cport).unwrap_or(&(false, false))
    }

    pub fn rx_eom_irq_enabled(&self, cport: u8) -> bool {
        *self.rx_eom_irq_enabled.get(&cport).unwrap_or(&false)
    }

    pub fn rx_pause_size(&self, cport: u8) -> Option<usize> {
        self.rx_pause.get(&cport).copied()
    }

    pub fn set_generic_irq(&mut self, bits: u32) {
        self.generic_irq = bits;
    }

    /// Per-partial-send record of the `skip_first_four` flag passed to
    /// `write_tx_bytes`, in call order — used to check the split-send
    /// algorithm's `som` bookkeeping (scenario 5).
    pub fn skip_flags(&self, cport: u8) -> &[bool] {
        self.skip_flags.get(&cport).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

impl UniproRegs for FakeRegs {
    fn set_mode_ctrl(&mut self, reg0: u32, reg1: Option<u32>, reg2: Option<u32>) {
        self.mode_ctrl[0] = reg0;
        if let Some(r1) = reg1 {
            self.mode_ctrl[1] = r1;
        }
        if let Some(r2) = reg2 {
            self.mode_ctrl[2] = r2;
        }
    }

    fn tx_space(&self, cport: u8) -> u32 {
        *self.tx_space.get(&cport).unwrap_or(&0)
    }

    fn tx_offset(&self, cport: u8) -> u32 {
        *self.tx_offset.get(&cport).unwrap_or(&0)
    }

    fn write_tx_bytes(&mut self, cport: u8, bytes: &[u8], skip_first_four: bool) {
        // `skip_first_four` only changes where in the real hardware's FIFO
        // window the write lands; every byte of `bytes` is still payload
        // and is recorded in full here.
        self.tx_buf.entry(cport).or_default().extend_from_slice(bytes);
        self.skip_flags.entry(cport).or_default().push(skip_first_four);
        *self.tx_offset.entry(cport).or_insert(0) += bytes.len() as u32;
        // Unlike real silicon, this fake does not model FIFO drain over
        // time: `tx_space` stays at whatever the test configured until it
        // calls `set_tx_space` again. That is deliberate — it lets tests
        // assert the exact partial-send chunk boundaries the split-send
        // algorithm produces for a given constant window size.
    }

    fn set_eom(&mut self, cport: u8) {
        *self.eom_count.entry(cport).or_insert(0) += 1;
    }

    fn rx_transferred(&self, cport: u8) -> usize {
        *self.rx_transferred.get(&cport).unwrap_or(&0)
    }

    fn rx_buffer(&self, cport: u8) -> &[u8] {
        self.rx_buf.get(&cport).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn set_rx_buffer(&mut self, cport: u8, buf_index: usize) {
        self.rx_buf_index.insert(cport, buf_index);
    }

    fn unpause_rx(&mut self, cport: u8, size: usize) {
        self.rx_pause.insert(cport, size);
    }

    fn clear_rx_eom_irq(&mut self, cport: u8) {
        self.rx_eom_irq_enabled.entry(cport).or_insert(false);
    }

    fn set_rx_eom_irq_enabled(&mut self, cport: u8, enabled: bool) {
        self.rx_eom_irq_enabled.insert(cport, enabled);
    }

    fn set_fct_enabled(&mut self, cport: u8, tx: bool, rx: bool) {
        self.fct.insert(cport, (tx, rx));
    }

    fn attr_access(&mut self, req: AttrRequest) -> AttrOutcome {
        self.attr_log.push((req.attr, req.data));
        if req.write {
            self.attr_state
                .insert((req.peer, req.selector, req.attr), req.data);
            AttrOutcome {
                result: self.attr_result,
                data: 0,
            }
        } else {
            let data = *self
                .attr_state
                .get(&(req.peer, req.selector, req.attr))
                .unwrap_or(&0);
            AttrOutcome {
                result: self.attr_result,
                data,
            }
        }
    }

    fn generic_interrupt_status(&self) -> u32 {
        self.generic_irq
    }

    fn clear_generic_interrupt(&mut self, bits: u32) {
        self.generic_irq &= !bits;
    }
}
