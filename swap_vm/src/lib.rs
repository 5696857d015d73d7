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

mod address_space;
mod fatal;
mod interrupts;
mod paging;
mod swap_manager;
mod vm_error;

#[cfg(test)]
mod test;

pub mod modules;
pub mod vm_config;

pub use address_space::{AddressSpace, FaultOutcome, TeardownSummary};
pub use fatal::{fatal, FatalError};
pub use interrupts::{hold_interrupts, intr_get_level, InterruptGuard, IntrLevel};
pub use paging::{FrameNumber, PagePermissions, PageTable, PageTableEntry};
pub use swap_manager::{ResidentList, ResidentPage, SwapManager, SwapStats, SwappedList};
pub use vm_error::VmError;
