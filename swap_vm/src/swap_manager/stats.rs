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

use core::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Paging counters of one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SwapStats {
    pub pid: u32,

    /// Name of the active replacement policy
    pub policy: &'static str,

    /// Pages currently backed by a frame and tracked by the resident list
    pub resident_count: usize,

    /// Pages currently stored in the backing store
    pub swapped_count: usize,

    /// Pages written to the backing store since the process was created
    pub lifetime_swap_outs: u32,

    /// Faults that brought a page back from the backing store
    pub page_faults: u32,

    /// Translation cache flushes caused by evictions
    pub tlb_flushes: u32,
}

impl SwapStats {
    /// Counters of a process that does not swap
    pub fn untracked(pid: u32, policy: &'static str) -> Self {
        Self {
            pid,
            policy,
            resident_count: 0,
            swapped_count: 0,
            lifetime_swap_outs: 0,
            page_faults: 0,
            tlb_flushes: 0,
        }
    }
}

impl Display for SwapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] resident: {} swapped: {} page faults: {} total paged out: {}",
            self.pid,
            self.policy,
            self.resident_count,
            self.swapped_count,
            self.page_faults,
            self.lifetime_swap_outs
        )
    }
}
