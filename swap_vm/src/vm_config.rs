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

use static_assertions::const_assert;
use static_assertions::const_assert_eq;

/// Size of a virtual page and of a physical frame in bytes
pub const PAGE_SIZE: usize = 4096;

/// First address that belongs to the kernel half of every address space.
/// User memory lives in `[0, KERNBASE)`.
pub const KERNBASE: u32 = 0x8000_0000;

/// Maximum number of pages a process may have resident at the same time
pub const MAX_RESIDENT_PAGES: usize = 16;

/// Maximum number of tracked pages (resident + swapped) per process
pub const MAX_TOTAL_PAGES: usize = 32;

/// Number of slots in every per-process backing store
pub const MAX_SWAPPED_PAGES: usize = MAX_TOTAL_PAGES - MAX_RESIDENT_PAGES;

/// Size in bytes a backing store has to provide at least
pub const SWAP_AREA_SIZE: usize = MAX_SWAPPED_PAGES * PAGE_SIZE;

/// Processes with a pid up to (and including) this value never swap.
/// These are the bootstrap processes (init and the shell).
pub const EXEMPT_PIDS: u32 = 2;

const_assert!(PAGE_SIZE.is_power_of_two());
const_assert!(MAX_RESIDENT_PAGES >= 2);
const_assert!(MAX_TOTAL_PAGES > MAX_RESIDENT_PAGES);
const_assert_eq!(KERNBASE as usize % PAGE_SIZE, 0);

/// Rounds `addr` up to the next page boundary
pub const fn page_round_up(addr: u32) -> u32 {
    ((addr as u64 + PAGE_SIZE as u64 - 1) & !(PAGE_SIZE as u64 - 1)) as u32
}

/// Rounds `addr` down to the start of its page
pub const fn page_round_down(addr: u32) -> u32 {
    addr & !(PAGE_SIZE as u32 - 1)
}
