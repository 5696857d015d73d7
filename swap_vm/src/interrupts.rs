/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Interrupt masking for the current core.
//!
//! The host has no `cli`/`sti`, so each thread plays the role of one core and keeps
//! its own nesting counter. Interrupts are enabled while the counter is zero.

use core::{cell::Cell, marker::PhantomData};

thread_local! {
    static INTR_DISABLE_COUNT: Cell<usize> = const { Cell::new(0) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrLevel {
    IntrOn,
    IntrOff,
}

pub fn intr_get_level() -> IntrLevel {
    if INTR_DISABLE_COUNT.with(|count| count.get()) == 0 {
        IntrLevel::IntrOn
    } else {
        IntrLevel::IntrOff
    }
}

/// Disables interrupts on this core until the returned guard is dropped.
///
/// Guards nest: interrupts are only enabled again once the outermost guard is gone.
pub fn hold_interrupts() -> InterruptGuard {
    let prev = INTR_DISABLE_COUNT.with(|count| {
        let prev = count.get();
        count.set(prev.checked_add(1).expect("BUG: overflow"));
        prev
    });

    InterruptGuard {
        interrupts_were_enabled: prev == 0,
        _not_send: PhantomData,
    }
}

/// A guard type that ensures interrupts stay disabled as long as it is held.
pub struct InterruptGuard {
    /// Interrupts were enabled when this guard was created
    interrupts_were_enabled: bool,

    /// Interrupt state belongs to the core that created the guard
    _not_send: PhantomData<*const ()>,
}

impl InterruptGuard {
    pub fn interrupts_were_enabled(&self) -> bool {
        self.interrupts_were_enabled
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        INTR_DISABLE_COUNT.with(|count| {
            let prev = count.get();
            if prev == 0 {
                panic!("BUG: underflow");
            }
            count.set(prev - 1);
        });
    }
}
