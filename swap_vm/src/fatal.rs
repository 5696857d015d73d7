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

//! Kernel halt for unrecoverable errors.
//!
//! Exhausted swap resources and broken bookkeeping invariants stop the whole system.
//! Ordinary caller errors are reported through [`crate::VmError`] instead.

use core::fmt::{self, Display};

use log::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalError {
    /// Every slot of the backing store is occupied
    StoreExhausted { pid: u32 },

    /// The backing store rejected a page write
    SwapWriteFailed { pid: u32, slot: usize },

    /// The backing store could not return a swapped page
    SwapReadFailed { pid: u32, slot: usize },

    /// No physical frame left while bringing a page back in
    OutOfFrames { pid: u32, address: u32 },

    /// A present page was mapped a second time
    Remap { address: u32 },

    /// A page was marked as paged out but no slot holds it
    MissingSwapSlot { pid: u32, address: u32 },

    /// A tracked address has no page table entry
    MissingPageTableEntry { address: u32 },

    /// A page that should be present is not
    PageNotPresent { address: u32 },

    /// Eviction was requested while no page is resident
    EmptyResidentSet { pid: u32 },

    /// The replacement policy did not pick a victim in time
    PolicyStalled { pid: u32, policy: &'static str },

    /// Resident list and page table disagree about a page
    ResidentListCorrupted { pid: u32, address: u32 },
}

impl Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::StoreExhausted { pid } => {
                write!(f, "swap_out: backing store of pid {} is full", pid)
            }
            FatalError::SwapWriteFailed { pid, slot } => {
                write!(f, "swap_out: could not write slot {} of pid {}", slot, pid)
            }
            FatalError::SwapReadFailed { pid, slot } => {
                write!(f, "swap_in: could not read slot {} of pid {}", slot, pid)
            }
            FatalError::OutOfFrames { pid, address } => {
                write!(f, "swap_in: no free frame for {:#x} of pid {}", address, pid)
            }
            FatalError::Remap { address } => write!(f, "remap of {:#x}", address),
            FatalError::MissingSwapSlot { pid, address } => {
                write!(f, "swap_in: page {:#x} of pid {} not found", address, pid)
            }
            FatalError::MissingPageTableEntry { address } => {
                write!(f, "no page table entry for {:#x}", address)
            }
            FatalError::PageNotPresent { address } => {
                write!(f, "page {:#x} not present", address)
            }
            FatalError::EmptyResidentSet { pid } => {
                write!(f, "eviction with empty resident set (pid {})", pid)
            }
            FatalError::PolicyStalled { pid, policy } => {
                write!(f, "{} did not select a victim for pid {}", policy, pid)
            }
            FatalError::ResidentListCorrupted { pid, address } => {
                write!(f, "resident list of pid {} lost page {:#x}", pid, address)
            }
        }
    }
}

/// Halts the system.
#[track_caller]
pub fn fatal(reason: FatalError) -> ! {
    error!("kernel panic: {}", reason);
    panic!("{}", reason)
}
