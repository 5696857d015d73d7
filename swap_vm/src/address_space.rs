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

use log::{debug, info, trace, warn};

use crate::{
    fatal::{fatal, FatalError},
    interrupts::hold_interrupts,
    modules::{
        frame_allocator::FrameAllocatorModule, page_replacement::PageReplacementModule,
        persistent_storage::PersistentStorageModule,
    },
    paging::{next_directory_boundary, FrameNumber, PagePermissions, PageTable},
    swap_manager::{SwapManager, SwapStats},
    vm_config::{page_round_down, page_round_up, EXEMPT_PIDS, KERNBASE, PAGE_SIZE, SWAP_AREA_SIZE},
    vm_error::VmError,
};

/// Result of [`AddressSpace::handle_fault`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// The page is present now, the access can be retried
    Handled,

    /// The address was never allocated, the process has to be killed
    Unhandled,
}

/// What [`AddressSpace::destroy`] gave back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownSummary {
    pub frames_released: usize,
    pub slots_released: usize,
}

/// User half of the virtual memory of one process.
///
/// Frames come from the shared allocator `F`. If swapping is enabled, at most
/// [`crate::vm_config::MAX_RESIDENT_PAGES`] tracked pages are resident and the rest
/// lives in the backing store `S`; `P` decides which page leaves memory.
pub struct AddressSpace<'m, P, S, F>
where
    P: PageReplacementModule,
    S: PersistentStorageModule,
    F: FrameAllocatorModule,
{
    pid: u32,

    /// Physical memory shared by all address spaces
    memory: &'m F,

    page_table: PageTable,

    /// `None` for exempt processes and before [`AddressSpace::enable_swapping`]
    swap: Option<SwapManager<P, S>>,

    /// Current top of the user memory
    size: u32,

    torn_down: bool,
}

impl<'m, P, S, F> AddressSpace<'m, P, S, F>
where
    P: PageReplacementModule,
    S: PersistentStorageModule,
    F: FrameAllocatorModule,
{
    pub fn new(pid: u32, memory: &'m F) -> Self {
        Self {
            pid,
            memory,
            page_table: PageTable::new(),
            swap: None,
            size: 0,
            torn_down: false,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Current top of the user memory
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    pub fn swap_manager(&self) -> Option<&SwapManager<P, S>> {
        self.swap.as_ref()
    }

    pub fn is_swapping(&self) -> bool {
        self.swap.is_some()
    }

    pub fn stats(&self) -> SwapStats {
        match &self.swap {
            Some(swap) => swap.stats(),
            None => SwapStats::untracked(self.pid, P::NAME),
        }
    }

    /// Can a process with this pid ever swap?
    fn may_swap(pid: u32) -> bool {
        pid > EXEMPT_PIDS && P::TRACKS_PAGES
    }

    /// Pages allocated from now on are tracked and may be swapped to `storage`.
    pub fn enable_swapping(&mut self, storage: S) -> Result<(), VmError> {
        if !Self::may_swap(self.pid) || self.swap.is_some() {
            warn!("pid {}: swapping not allowed", self.pid);
            return Err(VmError::SwapNotAllowed);
        }
        if storage.get_max_size() < SWAP_AREA_SIZE {
            warn!(
                "pid {}: backing store too small ({} < {} bytes)",
                self.pid,
                storage.get_max_size(),
                SWAP_AREA_SIZE
            );
            return Err(VmError::SwapNotAllowed);
        }

        self.swap = Some(SwapManager::new(self.pid, storage));
        info!("pid {}: swapping enabled ({})", self.pid, P::NAME);
        Ok(())
    }

    /// Maps zeroed pages for `[old_top, new_top)`.
    ///
    /// If physical memory runs out, every page mapped by this call is released again.
    pub fn grow(&mut self, old_top: u32, new_top: u32) -> Result<u32, VmError> {
        if new_top >= KERNBASE {
            warn!("pid {}: grow to {:#x} crosses the kernel base", self.pid, new_top);
            return Err(VmError::AboveKernelBase);
        }
        if new_top < old_top {
            return Ok(old_top);
        }

        let mut address = page_round_up(old_top);
        while address < new_top {
            if let Some(swap) = &mut self.swap {
                swap.make_room(&mut self.page_table, self.memory);
            }

            let frame = match self.memory.allocate_frame() {
                Ok(frame) => frame,
                Err(()) => {
                    warn!("pid {}: out of memory at {:#x}", self.pid, address);
                    self.release_range(old_top, address);
                    return Err(VmError::OutOfMemory);
                }
            };

            self.memory.zero_frame(frame);
            self.page_table
                .map(address, frame, PagePermissions::USER_RW);
            if let Some(swap) = &mut self.swap {
                swap.track(address, &mut self.page_table);
            }

            trace!("pid {}: mapped {:#x} to frame {}", self.pid, address, frame);
            address += PAGE_SIZE as u32;
        }

        self.size = new_top;
        Ok(new_top)
    }

    /// Unmaps `[new_top, old_top)`, resident pages give back their frame and paged out
    /// pages their backing store slot.
    ///
    /// `old_top` may not lie above the current top, that range was never mapped.
    pub fn shrink(&mut self, old_top: u32, new_top: u32) -> Result<u32, VmError> {
        if new_top > old_top || old_top > KERNBASE || old_top > self.size {
            warn!(
                "pid {}: invalid shrink from {:#x} to {:#x}",
                self.pid, old_top, new_top
            );
            return Err(VmError::InvalidRange);
        }

        self.release_range(new_top, old_top);
        self.size = new_top;
        Ok(new_top)
    }

    /// Grows or shrinks the memory by `delta` bytes and returns the previous top.
    pub fn sbrk(&mut self, delta: i32) -> Result<u32, VmError> {
        let old_top = self.size;

        if delta >= 0 {
            let new_top = old_top
                .checked_add(delta as u32)
                .ok_or(VmError::AboveKernelBase)?;
            self.grow(old_top, new_top)?;
        } else {
            let new_top = old_top
                .checked_sub(delta.unsigned_abs())
                .ok_or(VmError::InvalidRange)?;
            self.shrink(old_top, new_top)?;
        }

        Ok(old_top)
    }

    /// Loads the first program into a single page at address 0.
    pub fn load_initial_image(&mut self, image: &[u8]) -> Result<(), VmError> {
        if image.len() >= PAGE_SIZE {
            return Err(VmError::ImageTooLarge);
        }

        self.grow(0, PAGE_SIZE as u32)?;
        self.copy_out(0, image)
    }

    /// Makes the page of `address` inaccessible for user code, used for the guard page
    /// below the user stack.
    pub fn clear_user_access(&mut self, address: u32) -> Result<(), VmError> {
        self.page_table
            .clear_user_access(address)
            .map_err(|_| VmError::SegmentationFault { address })
    }

    /// Copies `data` to `address` from kernel side. Only present user pages are written,
    /// nothing is faulted in.
    pub fn copy_out(&mut self, address: u32, data: &[u8]) -> Result<(), VmError> {
        if address as u64 + data.len() as u64 > KERNBASE as u64 {
            return Err(VmError::SegmentationFault { address });
        }

        let mut address = address;
        let mut rest = data;
        while !rest.is_empty() {
            let entry = match self.page_table.entry(address) {
                Some(entry) if entry.present() => entry,
                _ => return Err(VmError::SegmentationFault { address }),
            };
            if !entry.user() {
                return Err(VmError::ProtectionFault { address });
            }

            let offset = (address - page_round_down(address)) as usize;
            let len = rest.len().min(PAGE_SIZE - offset);
            self.memory
                .write_frame(entry.frame_number(), offset, &rest[..len]);

            rest = &rest[len..];
            address += len as u32;
        }

        Ok(())
    }

    /// User mode read of `buffer.len()` bytes at `address`.
    pub fn load(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), VmError> {
        let mut address = address;
        let mut done = 0;

        while done < buffer.len() {
            let frame = self.access(address, false)?;
            let offset = (address - page_round_down(address)) as usize;
            let len = (buffer.len() - done).min(PAGE_SIZE - offset);

            self.memory
                .read_frame(frame, offset, &mut buffer[done..done + len]);
            done += len;
            address = address.wrapping_add(len as u32);
        }

        Ok(())
    }

    /// User mode write of `data` to `address`.
    pub fn store(&mut self, address: u32, data: &[u8]) -> Result<(), VmError> {
        let mut address = address;
        let mut rest = data;

        while !rest.is_empty() {
            let frame = self.access(address, true)?;
            let offset = (address - page_round_down(address)) as usize;
            let len = rest.len().min(PAGE_SIZE - offset);

            self.memory.write_frame(frame, offset, &rest[..len]);
            rest = &rest[len..];
            address = address.wrapping_add(len as u32);
        }

        Ok(())
    }

    /// Translation of one user access like the MMU does it: faults the page in if
    /// needed, checks the protection bits and sets accessed (and dirty) bits.
    fn access(&mut self, address: u32, write: bool) -> Result<FrameNumber, VmError> {
        if address >= KERNBASE {
            return Err(VmError::SegmentationFault { address });
        }

        let present = self
            .page_table
            .entry(address)
            .is_some_and(|entry| entry.present());
        if !present && self.handle_fault(address) == FaultOutcome::Unhandled {
            return Err(VmError::SegmentationFault { address });
        }

        let entry = match self.page_table.entry_mut(address) {
            Some(entry) if entry.present() => entry,
            _ => fatal(FatalError::PageNotPresent {
                address: page_round_down(address),
            }),
        };
        if !entry.user() || (write && !entry.writable()) {
            return Err(VmError::ProtectionFault { address });
        }

        *entry = entry.with_accessed(true).with_dirty(entry.dirty() || write);
        Ok(entry.frame_number())
    }

    /// Page fault entry point.
    pub fn handle_fault(&mut self, address: u32) -> FaultOutcome {
        let page = page_round_down(address);

        let paged_out = address < KERNBASE
            && self
                .page_table
                .entry(page)
                .is_some_and(|entry| !entry.present() && entry.paged_out());
        if !paged_out {
            warn!("pid {}: unhandled page fault at {:#x}", self.pid, address);
            return FaultOutcome::Unhandled;
        }

        match &mut self.swap {
            Some(swap) => {
                swap.swap_in(page, &mut self.page_table, self.memory);
                FaultOutcome::Handled
            }
            None => fatal(FatalError::MissingSwapSlot {
                pid: self.pid,
                address: page,
            }),
        }
    }

    /// Timer interrupt
    pub fn tick(&mut self) {
        if let Some(swap) = &mut self.swap {
            swap.age(&mut self.page_table);
        }
    }

    /// Copy of this address space for a forked child.
    ///
    /// Resident pages are copied into new frames. Paged out pages become placeholders
    /// in the child and their content is copied from this process's backing store into
    /// `child_storage`. If that copy fails, the child is released again and
    /// [`VmError::SwapCopyFailed`] is returned.
    pub fn duplicate(
        &mut self,
        child_pid: u32,
        child_storage: S,
    ) -> Result<AddressSpace<'m, P, S, F>, VmError> {
        let _guard = hold_interrupts();
        let mut child = AddressSpace::new(child_pid, self.memory);
        child.size = self.size;

        match &mut self.swap {
            Some(_) if !Self::may_swap(child_pid) => return Err(VmError::SwapNotAllowed),
            Some(swap) => {
                let child_swap = swap.duplicate(child_pid, child_storage).map_err(|_| {
                    warn!(
                        "pid {}: could not copy swapped pages to pid {}",
                        self.pid, child_pid
                    );
                    VmError::SwapCopyFailed
                })?;
                child.swap = Some(child_swap);
            }
            None if Self::may_swap(child_pid) => {
                child.swap = Some(SwapManager::new(child_pid, child_storage));
            }
            None => {}
        }

        for (address, entry) in self.page_table.iter() {
            if entry.present() {
                let frame = match self.memory.allocate_frame() {
                    Ok(frame) => frame,
                    Err(()) => {
                        warn!("pid {}: out of memory while forking", self.pid);
                        return Err(VmError::OutOfMemory);
                    }
                };

                self.memory.copy_frame(entry.frame_number(), frame);
                child
                    .page_table
                    .map(address, frame, entry.permissions());
            } else if entry.paged_out() {
                child
                    .page_table
                    .map_placeholder(address, entry.permissions());
            }
        }

        info!("pid {}: forked into pid {}", self.pid, child_pid);
        Ok(child)
    }

    /// Releases all memory of this process.
    pub fn destroy(mut self) -> TeardownSummary {
        self.teardown()
    }

    fn teardown(&mut self) -> TeardownSummary {
        if self.torn_down {
            return TeardownSummary::default();
        }

        let _guard = hold_interrupts();
        let summary = self.release_range(0, KERNBASE);

        if let Some(mut swap) = self.swap.take() {
            swap.clear();
        }
        self.page_table = PageTable::new();
        self.size = 0;
        self.torn_down = true;

        info!(
            "pid {}: released {} frames and {} swap slots",
            self.pid, summary.frames_released, summary.slots_released
        );
        summary
    }

    /// Unmaps every page in `[page_round_up(from), to)`.
    fn release_range(&mut self, from: u32, to: u32) -> TeardownSummary {
        let _guard = hold_interrupts();
        let mut summary = TeardownSummary::default();

        let mut address = page_round_up(from) as u64;
        while address < to as u64 {
            let page = address as u32;
            if !self.page_table.has_leaf_table(page) {
                address = next_directory_boundary(page);
                continue;
            }

            if let Some(entry) = self.page_table.entry(page) {
                if entry.present() {
                    if let Some(frame) = self.page_table.unmap(page) {
                        self.memory.free_frame(frame);
                        summary.frames_released += 1;
                    }
                    if let Some(swap) = &mut self.swap {
                        swap.forget_resident(page);
                    }
                } else if entry.paged_out() {
                    match &mut self.swap {
                        Some(swap) => swap.discard_swapped(page),
                        None => fatal(FatalError::MissingSwapSlot {
                            pid: self.pid,
                            address: page,
                        }),
                    }
                    self.page_table.clear_entry(page);
                    summary.slots_released += 1;
                }
            }

            address += PAGE_SIZE as u64;
        }

        debug!(
            "pid {}: released [{:#x}, {:#x}): {} frames, {} slots",
            self.pid, from, to, summary.frames_released, summary.slots_released
        );
        summary
    }
}

impl<P, S, F> Drop for AddressSpace<'_, P, S, F>
where
    P: PageReplacementModule,
    S: PersistentStorageModule,
    F: FrameAllocatorModule,
{
    fn drop(&mut self) {
        // a halt unwinds through here, the bookkeeping may be half updated
        if std::thread::panicking() {
            return;
        }
        self.teardown();
    }
}
