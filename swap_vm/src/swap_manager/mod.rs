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

//! Demand paging of one process.
//!
//! [`SwapManager`] is the only place that changes the resident list, the swapped list
//! and the page table together. Every such change runs with interrupts held.

use arbitrary_int::u20;
use log::{debug, info, trace};

use crate::{
    fatal::{fatal, FatalError},
    interrupts::hold_interrupts,
    modules::{
        frame_allocator::FrameAllocatorModule, page_replacement::PageReplacementModule,
        persistent_storage::PersistentStorageModule,
    },
    paging::PageTable,
    vm_config::{MAX_RESIDENT_PAGES, PAGE_SIZE},
};

mod resident_list;
mod stats;
mod swapped_list;

pub use resident_list::{ResidentList, ResidentPage};
pub use stats::SwapStats;
pub use swapped_list::{slot_offset, SwappedList};

#[cfg(test)]
mod test;

/// Upper bound of policy calls for a single eviction
const MAX_VICTIM_SELECTIONS: usize = 2 * MAX_RESIDENT_PAGES;

pub struct SwapManager<P: PageReplacementModule, S: PersistentStorageModule> {
    pid: u32,

    /// Pages that are backed by a frame
    resident: ResidentList,

    /// Pages that live in `storage`
    swapped: SwappedList,

    /// Backing store of this process
    storage: S,

    policy: P,

    lifetime_swap_outs: u32,
    page_faults: u32,
    tlb_flushes: u32,
}

impl<P: PageReplacementModule, S: PersistentStorageModule> SwapManager<P, S> {
    pub fn new(pid: u32, storage: S) -> Self {
        Self {
            pid,
            resident: ResidentList::new(),
            swapped: SwappedList::new(),
            storage,
            policy: P::new(),
            lifetime_swap_outs: 0,
            page_faults: 0,
            tlb_flushes: 0,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn resident(&self) -> &ResidentList {
        &self.resident
    }

    pub fn swapped(&self) -> &SwappedList {
        &self.swapped
    }

    pub fn stats(&self) -> SwapStats {
        SwapStats {
            pid: self.pid,
            policy: P::NAME,
            resident_count: self.resident.len(),
            swapped_count: self.swapped.len(),
            lifetime_swap_outs: self.lifetime_swap_outs,
            page_faults: self.page_faults,
            tlb_flushes: self.tlb_flushes,
        }
    }

    /// Evicts a page if a new one would not fit into the resident list.
    pub fn make_room<F: FrameAllocatorModule>(
        &mut self,
        page_table: &mut PageTable,
        memory: &F,
    ) {
        if self.resident.is_full() {
            self.evict(page_table, memory);
        }
    }

    /// Starts tracking the freshly mapped page `address`.
    ///
    /// Call [`SwapManager::make_room`] before the page is mapped.
    pub fn track(&mut self, address: u32, page_table: &mut PageTable) {
        let _guard = hold_interrupts();

        let index = self.policy.insert_position(&mut self.resident);
        self.resident.insert_at(
            index,
            ResidentPage {
                address,
                reference_metric: self.policy.initial_metric(),
            },
        );

        match page_table.entry_mut(address) {
            Some(entry) if entry.present() => *entry = entry.with_accessed(false),
            _ => fatal(FatalError::PageNotPresent { address }),
        }

        trace!("track {:#x} of pid {} in slot {}", address, self.pid, index);
        self.check_integrity(page_table);
    }

    /// Swaps out one page chosen by the replacement policy.
    pub fn evict<F: FrameAllocatorModule>(&mut self, page_table: &mut PageTable, memory: &F) {
        let _guard = hold_interrupts();

        if self.resident.is_empty() {
            fatal(FatalError::EmptyResidentSet { pid: self.pid });
        }

        let victim = self.select_victim(page_table);
        self.swap_out(victim, page_table, memory);
        self.check_integrity(page_table);
    }

    fn select_victim(&mut self, page_table: &mut PageTable) -> u32 {
        for _ in 0..MAX_VICTIM_SELECTIONS {
            if let Some(index) = self.policy.select_victim(&mut self.resident, page_table) {
                if let Some(page) = self.resident.get(index) {
                    return page.address;
                }
                break;
            }
        }

        fatal(FatalError::PolicyStalled {
            pid: self.pid,
            policy: P::NAME,
        })
    }

    /// Moves the resident page `address` to a free slot of the backing store.
    fn swap_out<F: FrameAllocatorModule>(
        &mut self,
        address: u32,
        page_table: &mut PageTable,
        memory: &F,
    ) {
        let pid = self.pid;

        let entry = match page_table.entry_mut(address) {
            Some(entry) => entry,
            None => fatal(FatalError::MissingPageTableEntry { address }),
        };
        if !entry.present() {
            fatal(FatalError::PageNotPresent { address });
        }

        let frame = entry.frame_number();
        *entry = entry
            .with_present(false)
            .with_paged_out(true)
            .with_accessed(false)
            .with_dirty(false)
            .with_frame(u20::new(0));

        let slot = self
            .swapped
            .allocate_slot(address)
            .unwrap_or_else(|_| fatal(FatalError::StoreExhausted { pid }));

        let mut buffer = [0u8; PAGE_SIZE];
        memory.read_frame(frame, 0, &mut buffer);
        self.storage
            .write(slot_offset(slot), &buffer)
            .unwrap_or_else(|_| fatal(FatalError::SwapWriteFailed { pid, slot }));

        if self.resident.remove(address).is_none() {
            fatal(FatalError::ResidentListCorrupted { pid, address });
        }

        memory.free_frame(frame);
        self.flush_tlb();
        self.lifetime_swap_outs += 1;

        debug!(
            "swapped out {:#x} of pid {} to slot {} (frame {})",
            address, pid, slot, frame
        );
    }

    /// Brings the paged out page `address` back into memory.
    pub fn swap_in<F: FrameAllocatorModule>(
        &mut self,
        address: u32,
        page_table: &mut PageTable,
        memory: &F,
    ) {
        let _guard = hold_interrupts();
        let pid = self.pid;

        let entry = match page_table.entry(address) {
            Some(entry) => entry,
            None => fatal(FatalError::MissingPageTableEntry { address }),
        };
        debug_assert!(!entry.present() && entry.paged_out());

        let slot = match self.swapped.find_slot(address) {
            Some(slot) => slot,
            None => fatal(FatalError::MissingSwapSlot { pid, address }),
        };

        // released before evicting, the victim may take over this slot
        let mut buffer = [0u8; PAGE_SIZE];
        self.storage
            .read(slot_offset(slot), &mut buffer)
            .unwrap_or_else(|_| fatal(FatalError::SwapReadFailed { pid, slot }));
        self.swapped.release_slot(slot);

        if self.resident.is_full() {
            self.evict(page_table, memory);
        }

        let frame = memory
            .allocate_frame()
            .unwrap_or_else(|_| fatal(FatalError::OutOfFrames { pid, address }));
        memory.write_frame(frame, 0, &buffer);

        page_table.map(address, frame, entry.permissions());
        self.page_faults += 1;

        debug!(
            "swapped in {:#x} of pid {} from slot {} (frame {})",
            address, pid, slot, frame
        );

        self.track(address, page_table);
    }

    /// Stops tracking a resident page that is about to be unmapped.
    ///
    /// Pages mapped before swapping was enabled are not tracked, so a missing page is fine.
    pub fn forget_resident(&mut self, address: u32) {
        let _guard = hold_interrupts();
        if let Some(index) = self.resident.remove(address) {
            trace!("untrack {:#x} of pid {} from slot {}", address, self.pid, index);
        }
    }

    /// Releases the backing store slot of a paged out page without reading it.
    pub fn discard_swapped(&mut self, address: u32) {
        let _guard = hold_interrupts();

        match self.swapped.find_slot(address) {
            Some(slot) => {
                self.swapped.release_slot(slot);
                trace!("released slot {} ({:#x}) of pid {}", slot, address, self.pid);
            }
            None => fatal(FatalError::MissingSwapSlot {
                pid: self.pid,
                address,
            }),
        }
    }

    /// Timer tick
    pub fn age(&mut self, page_table: &mut PageTable) {
        let _guard = hold_interrupts();
        self.policy.age(&mut self.resident, page_table);
    }

    /// Copy of the bookkeeping for a forked child.
    ///
    /// Slot contents are copied into `child_storage` at the same slot indices so the
    /// placeholders of the child can be faulted in later. Counters start at zero.
    pub fn duplicate(&mut self, child_pid: u32, mut child_storage: S) -> Result<Self, ()> {
        let _guard = hold_interrupts();

        let mut buffer = [0u8; PAGE_SIZE];
        for (slot, address) in self.swapped.iter() {
            self.storage.read(slot_offset(slot), &mut buffer)?;
            child_storage.write(slot_offset(slot), &buffer)?;
            trace!(
                "copied slot {} ({:#x}) from pid {} to pid {}",
                slot,
                address,
                self.pid,
                child_pid
            );
        }

        Ok(Self {
            pid: child_pid,
            resident: self.resident.clone(),
            swapped: self.swapped.clone(),
            storage: child_storage,
            policy: P::new(),
            lifetime_swap_outs: 0,
            page_faults: 0,
            tlb_flushes: 0,
        })
    }

    /// Drops all bookkeeping, frames and page table entries are the caller's job.
    ///
    /// Returns the number of backing store slots that were released.
    pub fn clear(&mut self) -> usize {
        let _guard = hold_interrupts();
        let slots = self.swapped.len();

        self.resident.clear();
        self.swapped.clear();

        info!("cleared swap state of pid {} ({} slots)", self.pid, slots);
        slots
    }

    /// Reloads the page directory register. The simulated MMU has no translation cache,
    /// so this only counts.
    fn flush_tlb(&mut self) {
        self.tlb_flushes += 1;
    }

    #[cfg(debug_assertions)]
    fn check_integrity(&self, page_table: &PageTable) {
        let pid = self.pid;
        assert!(self.resident.len() <= MAX_RESIDENT_PAGES);

        for (_, page) in self.resident.iter() {
            let address = page.address;
            let resident = page_table
                .entry(address)
                .is_some_and(|entry| entry.present() && !entry.paged_out());

            if !resident || self.swapped.find_slot(address).is_some() {
                fatal(FatalError::ResidentListCorrupted { pid, address });
            }
        }

        for (_, address) in self.swapped.iter() {
            let swapped = page_table
                .entry(address)
                .is_some_and(|entry| !entry.present() && entry.paged_out());

            if !swapped {
                fatal(FatalError::MissingSwapSlot { pid, address });
            }
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    fn check_integrity(&self, _page_table: &PageTable) {
        // check nothing
    }
}
