// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The SVC bring-up state machine (§4.G): boot the board, bring the
//! switch out of reset, power interface rails in sequence, program
//! routes, then turn interrupts on. Each step is one `BoardOps` call so
//! the sequence itself can be driven and tested without real regulators
//! or a real switch ASIC, the same way `drv-gb-cport` tests the transport
//! against `UniproRegs` fakes instead of silicon.

use crate::SvcError;
use ringbuf::{ringbuf, ringbuf_entry};

/// One declared interface power rail, in bring-up order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InterfaceRail {
    pub name: &'static str,
    pub hold_time_ms: u32,
}

/// Minimum time the `InterfacesOn` step waits after the last rail comes up
/// before routes are programmed (§4.G: interfaces need settling time after
/// power before they'll answer on the switch).
pub const INTERFACES_ON_HOLDOFF_MS: u32 = 300;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SvcState {
    Stopped,
    Booting,
    SwitchInit,
    InterfacesOn,
    Routing,
    IrqOn,
    Stopping,
}

/// Everything the state machine needs from the board: regulator
/// sequencing, the switch ASIC's own init, and interrupt enables. A real
/// board support crate implements this over GPIO/I2C; tests use a fake
/// that just records calls.
pub trait BoardOps {
    fn board_init(&mut self) -> Result<(), SvcError>;
    fn release_switch_reset(&mut self);
    fn switch_init(&mut self) -> Result<(), SvcError>;
    fn power_interface_rail(&mut self, index: usize, hold_time_ms: u32) -> Result<(), SvcError>;
    fn enable_switch_irq(&mut self);
    fn enable_port_irq(&mut self, port: u8);
    /// Called on any bring-up failure, or on `stop()`, to leave the board
    /// in a safe de-energised state.
    fn teardown(&mut self);
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    Entered { state: SvcState },
    Failed { state: SvcState },
}

ringbuf!(Trace, 16, Trace::Entered { state: SvcState::Stopped });

/// Drives exactly one `BoardOps` step per [`Svc::advance`] call, so the
/// caller controls pacing (a real firmware task calls it once per its main
/// loop iteration; a test calls it in a tight loop and inspects the state
/// after each step).
pub struct Svc<B: BoardOps> {
    board: B,
    state: SvcState,
    rails: &'static [InterfaceRail],
    interfaces_on_at: Option<u32>,
}

impl<B: BoardOps> Svc<B> {
    pub fn new(board: B, rails: &'static [InterfaceRail]) -> Self {
        Svc {
            board,
            state: SvcState::Stopped,
            rails,
            interfaces_on_at: None,
        }
    }

    pub fn state(&self) -> SvcState {
        self.state
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    /// Starts the bring-up sequence from `Stopped`. A no-op if already in
    /// progress or running.
    pub fn start(&mut self) {
        if self.state == SvcState::Stopped {
            self.enter(SvcState::Booting);
        }
    }

    /// Tears the board down and returns to `Stopped`, regardless of the
    /// current state.
    pub fn stop(&mut self) {
        self.enter(SvcState::Stopping);
        self.board.teardown();
        self.enter(SvcState::Stopped);
    }

    fn enter(&mut self, state: SvcState) {
        self.state = state;
        ringbuf_entry!(Trace::Entered { state });
    }

    fn fail(&mut self) {
        ringbuf_entry!(Trace::Failed { state: self.state });
        self.board.teardown();
        self.enter(SvcState::Stopped);
    }

    /// Advances the state machine by exactly one step, using `now_ms` only
    /// to honour `INTERFACES_ON_HOLDOFF_MS`. Returns the state after the
    /// call. On any `BoardOps` failure, falls back straight to `Stopped`
    /// after tearing down (§4.G: "bring-up never retries a failed step;
    /// encountering an error abandons the whole boot").
    pub fn advance(&mut self, now_ms: u32) -> SvcState {
        match self.state {
            SvcState::Stopped | SvcState::Stopping => {}
            SvcState::Booting => match self.board.board_init() {
                Ok(()) => self.enter(SvcState::SwitchInit),
                Err(_) => self.fail(),
            },
            SvcState::SwitchInit => {
                self.board.release_switch_reset();
                match self.board.switch_init() {
                    Ok(()) => {
                        self.interfaces_on_at = None;
                        self.enter(SvcState::InterfacesOn);
                    }
                    Err(_) => self.fail(),
                }
            }
            SvcState::InterfacesOn => {
                let mut powered_all = true;
                for (i, rail) in self.rails.iter().enumerate() {
                    if let Err(_) = self.board.power_interface_rail(i, rail.hold_time_ms) {
                        powered_all = false;
                        break;
                    }
                }
                if !powered_all {
                    self.fail();
                    return self.state;
                }
                match self.interfaces_on_at {
                    None => {
                        self.interfaces_on_at = Some(now_ms);
                    }
                    Some(started) if now_ms.wrapping_sub(started) >= INTERFACES_ON_HOLDOFF_MS => {
                        self.enter(SvcState::Routing);
                    }
                    Some(_) => {}
                }
            }
            SvcState::Routing => {
                self.board.enable_switch_irq();
                for port in 0..self.rails.len() as u8 {
                    self.board.enable_port_irq(port);
                }
                self.enter(SvcState::IrqOn);
            }
            SvcState::IrqOn => {}
        }
        self.state
    }
}
