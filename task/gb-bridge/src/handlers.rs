// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Greybus-facing handlers for this bridge's two fixed protocols:
//! vibrator and loopback. Each op is a plain `gb_dispatch::HandlerFn` —
//! the actual GPIO/I2C/UART shim a real vibrator or loopback driver would
//! call into is an out-of-scope external collaborator (§1); what's
//! implemented here is only the Greybus protocol surface above it.

use core::sync::atomic::{AtomicBool, Ordering};

use abi::ResultCode;
use gb_dispatch::ResponseBody;

pub const VIBRATOR_CPORT: u8 = 1;
pub const LOOPBACK_CPORT: u8 = 2;

pub const VIBRATOR_OP_PROTOCOL_VERSION: u8 = 0x01;
pub const VIBRATOR_OP_ON: u8 = 0x02;
pub const VIBRATOR_OP_OFF: u8 = 0x03;

const VIBRATOR_PROTOCOL_MAJOR: u8 = 0;
const VIBRATOR_PROTOCOL_MINOR: u8 = 1;

/// Stands in for the external GPIO shim's on/off state. A real
/// implementation would toggle a pin here instead.
static VIBRATOR_ON: AtomicBool = AtomicBool::new(false);

pub fn vibrator_protocol_version(_cport: u8, _body: &[u8], response: &mut ResponseBody) -> ResultCode {
    let _ = response.extend_from_slice(&[VIBRATOR_PROTOCOL_MAJOR, VIBRATOR_PROTOCOL_MINOR]);
    ResultCode::Success
}

pub fn vibrator_on(_cport: u8, _body: &[u8], _response: &mut ResponseBody) -> ResultCode {
    VIBRATOR_ON.store(true, Ordering::SeqCst);
    ResultCode::Success
}

pub fn vibrator_off(_cport: u8, _body: &[u8], _response: &mut ResponseBody) -> ResultCode {
    VIBRATOR_ON.store(false, Ordering::SeqCst);
    ResultCode::Success
}

pub fn vibrator_is_on() -> bool {
    VIBRATOR_ON.load(Ordering::SeqCst)
}

pub const LOOPBACK_OP_PROTOCOL_VERSION: u8 = 0x01;
pub const LOOPBACK_OP_PING: u8 = 0x02;
pub const LOOPBACK_OP_TRANSFER: u8 = 0x03;
pub const LOOPBACK_OP_SINK: u8 = 0x04;

const LOOPBACK_PROTOCOL_MAJOR: u8 = 0;
const LOOPBACK_PROTOCOL_MINOR: u8 = 1;

pub fn loopback_protocol_version(_cport: u8, _body: &[u8], response: &mut ResponseBody) -> ResultCode {
    let _ = response.extend_from_slice(&[LOOPBACK_PROTOCOL_MAJOR, LOOPBACK_PROTOCOL_MINOR]);
    ResultCode::Success
}

pub fn loopback_ping(_cport: u8, _body: &[u8], _response: &mut ResponseBody) -> ResultCode {
    ResultCode::Success
}

/// Echoes the request body back verbatim, truncated to whatever fits in a
/// response (it always does: both share the same `MAX_BODY` ceiling).
pub fn loopback_transfer(_cport: u8, body: &[u8], response: &mut ResponseBody) -> ResultCode {
    if response.extend_from_slice(body).is_err() {
        return ResultCode::Overflow;
    }
    ResultCode::Success
}

/// Accepts and discards the request body, returning no payload.
pub fn loopback_sink(_cport: u8, _body: &[u8], _response: &mut ResponseBody) -> ResultCode {
    ResultCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vibrator_on_then_off_toggles_state() {
        let mut response = ResponseBody::new();
        vibrator_on(VIBRATOR_CPORT, &[], &mut response);
        assert!(vibrator_is_on());
        vibrator_off(VIBRATOR_CPORT, &[], &mut response);
        assert!(!vibrator_is_on());
    }

    #[test]
    fn loopback_transfer_echoes_the_body() {
        let mut response = ResponseBody::new();
        let result = loopback_transfer(LOOPBACK_CPORT, &[1, 2, 3], &mut response);
        assert_eq!(result, ResultCode::Success);
        assert_eq!(&response[..], &[1, 2, 3]);
    }

    #[test]
    fn protocol_version_reports_major_minor() {
        let mut response = ResponseBody::new();
        vibrator_protocol_version(VIBRATOR_CPORT, &[], &mut response);
        assert_eq!(&response[..], &[VIBRATOR_PROTOCOL_MAJOR, VIBRATOR_PROTOCOL_MINOR]);
    }
}
