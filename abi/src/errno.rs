// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The conventional-errno → Greybus result-code table of §4.D.

use crate::ResultCode;

/// A small, closed set of POSIX-style error numbers that local drivers and
/// the operation engine report in. Kept deliberately narrow — just the
/// values §4.D's table names — rather than importing a full errno crate,
/// since nothing else in this firmware needs the rest of that namespace.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Errno {
    Success,
    NoMemory,
    Interrupted,
    TimedOut,
    Proto,
    NoSys,
    Invalid,
    Overflow,
    NoDevice,
    NoSuchDevice,
    Busy,
    Other,
}

/// Converts a conventional errno value to the Greybus result code the peer
/// sees on the wire. This is the single table §4.D calls for; every other
/// error path in the operation engine and handler dispatch funnels through
/// it so there is exactly one place that knows the mapping.
pub fn errno_to_result(e: Errno) -> ResultCode {
    match e {
        Errno::Success => ResultCode::Success,
        Errno::NoMemory => ResultCode::OutOfMemory,
        Errno::Interrupted => ResultCode::Interrupted,
        Errno::TimedOut => ResultCode::Timeout,
        Errno::Proto | Errno::NoSys => ResultCode::ProtocolError,
        Errno::Invalid => ResultCode::Invalid,
        Errno::Overflow => ResultCode::Overflow,
        Errno::NoDevice | Errno::NoSuchDevice => ResultCode::NonExistent,
        Errno::Busy => ResultCode::Retry,
        Errno::Other => ResultCode::Unknown,
    }
}
