// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![no_std]

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// A `RefCell`-style container for statics where only a single borrow needs
/// to happen at any given time.
///
/// This only provides `mut` access because that's all ring buffer recording
/// ever needs. It does _not_ provide the many-reader one-writer behavior of
/// `RefCell`, only the one-writer part.
#[derive(Default)]
pub struct StaticCell<T> {
    borrowed: AtomicBool,
    cell: UnsafeCell<T>,
}

impl<T> StaticCell<T> {
    /// Creates a `StaticCell` containing `contents`.
    pub const fn new(contents: T) -> Self {
        Self {
            borrowed: AtomicBool::new(false),
            cell: UnsafeCell::new(contents),
        }
    }

    /// Gets mutable access to the contents of `self`.
    ///
    /// If a `StaticRef` for `self` still exists anywhere in the program,
    /// this panics.
    pub fn borrow_mut(&self) -> StaticRef<'_, T> {
        match self.try_borrow_mut() {
            Some(r) => r,
            None => panic!("StaticCell already borrowed"),
        }
    }

    /// Like `borrow_mut`, but returns `None` instead of panicking if the
    /// cell is already borrowed. Used by ring buffer recording, which must
    /// never panic on the happy path of an IRQ handler.
    pub fn try_borrow_mut(&self) -> Option<StaticRef<'_, T>> {
        let already_borrowed = self.borrowed.swap(true, Ordering::Acquire);
        if already_borrowed {
            return None;
        }
        // Safety: the swap above ensures we are not producing an aliasing
        // &mut to our contents.
        Some(StaticRef {
            contents: unsafe { &mut *self.cell.get() },
            borrow: &self.borrowed,
        })
    }
}

unsafe impl<T> Sync for StaticCell<T> where for<'a> &'a mut T: Send {}

pub struct StaticRef<'a, T> {
    contents: &'a mut T,
    borrow: &'a AtomicBool,
}

impl<'a, T> Drop for StaticRef<'a, T> {
    fn drop(&mut self) {
        self.borrow.store(false, Ordering::Release);
    }
}

impl<'a, T> core::ops::Deref for StaticRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.contents
    }
}

impl<'a, T> core::ops::DerefMut for StaticRef<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.contents
    }
}
