// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring buffer for debugging firmware tasks and drivers.
//!
//! A static ring buffer designed to be used to instrument arbitrary
//! contexts — IRQ handlers included. Ring buffers are the ambient substitute
//! for a logging façade on this target: there is no UART available to every
//! caller, and formatting costs flash and cycles we don't have at IRQ
//! priority, so state transitions, dropped frames and protocol errors are
//! recorded here instead and inspected post-hoc with a debugger.
//!
//! ## Creating a ring buffer
//!
//! ```ignore
//! ringbuf!(u32, 16, 0);
//! ringbuf_entry!(value);
//! ```
//!
//! Entries of the same payload and call site as the most recent entry
//! increment that entry's count instead of allocating a new slot, so a
//! spinning error doesn't evict the history that led up to it.

#![no_std]

pub use static_cell::StaticCell;

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
        static $name: () = ();
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

/// Declares a ring buffer in the current module or context.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a ring buffer named `NAME`,
/// containing entries of type `Type`, with room for `N` such entries, all
/// initialized to `expr`. The name defaults to `__RINGBUF` if omitted, so
/// that one module only ever needs one.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        static $name: $crate::StaticCell<$crate::Ringbuf<$t, $n>> =
            $crate::StaticCell::new($crate::Ringbuf {
                last: None,
                buffer: [$crate::RingbufEntry {
                    line: 0,
                    count: 0,
                    payload: $init,
                }; $n],
            });
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

/// Inserts data into a named ring buffer declared with [`ringbuf!`].
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let (p, buf) = ($payload, &$buf);
        $crate::RecordEntry::record_entry(buf, line!() as u16, p);
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

/// Inserts data into a ring buffer at the root of the current crate.
#[allow(clippy::crate_in_macro_def)]
#[macro_export]
macro_rules! ringbuf_entry_root {
    ($payload:expr) => {
        $crate::ringbuf_entry!(crate::__RINGBUF, $payload);
    };
    ($buf:ident, $payload:expr) => {
        $crate::ringbuf_entry!(crate::$buf, $payload);
    };
}

/// A single ring buffer slot.
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy> {
    pub line: u16,
    pub payload: T,
    pub count: u16,
}

/// A ring buffer of parameterized entry type and size.
///
/// Instantiating this directly is unusual — use the [`ringbuf!`] macro.
#[derive(Debug)]
pub struct Ringbuf<T: Copy, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

/// Abstracts over the types the [`ringbuf_entry!`] macro can record into, so
/// the macro works the same whether the "disabled" feature is on or off.
pub trait RecordEntry<T: Copy> {
    fn record_entry(&self, line: u16, payload: T);
}

impl<T: Copy + PartialEq, const N: usize> RecordEntry<T>
    for StaticCell<Ringbuf<T, N>>
{
    fn record_entry(&self, line: u16, payload: T) {
        // If the ring buffer is already borrowed, drop the entry rather than
        // risk a panic from inside what might be IRQ context. This shouldn't
        // happen on a single-CPU target that isn't re-entering its own IRQ
        // handler, but there is no cheap way to prove it statically.
        let Some(mut ring) = self.try_borrow_mut() else {
            return;
        };

        let last = ring.last.unwrap_or(usize::MAX);
        if let Some(ent) = ring.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        let next = match ring.last {
            Some(i) => (i + 1) % N,
            None => 0,
        };
        ring.buffer[next] = RingbufEntry {
            line,
            payload,
            count: 1,
        };
        ring.last = Some(next);
    }
}

impl<T: Copy> RecordEntry<T> for () {
    fn record_entry(&self, _line: u16, _payload: T) {}
}
