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

// https://wiki.osdev.org/Paging

use crate::{
    fatal::{fatal, FatalError},
    vm_config::{page_round_down, KERNBASE, PAGE_SIZE},
};
use arbitrary_int::{u10, u12, u20};
use bitbybit::bitfield;
use core::{
    mem::size_of,
    ops::{Deref, DerefMut},
};
use static_assertions::const_assert_eq;

/// Number of a physical frame inside the frame allocator
pub type FrameNumber = u32;

const PAGE_DIRECTORY_LEN: usize = PAGE_SIZE / size_of::<PageDirectoryEntry>();
const PAGE_TABLE_LEN: usize = PAGE_SIZE / size_of::<PageTableEntry>();

const_assert_eq!(size_of::<PageTableEntry>(), 4);
const_assert_eq!(size_of::<PageDirectoryEntry>(), 4);

#[bitfield(u32, default = 0)]
pub struct PageDirectoryEntry {
    #[bit(0, rw)]
    present: bool,
    #[bit(1, rw)]
    writable: bool,
    #[bit(2, rw)]
    user: bool,
    /// Index of the leaf table inside [`PageTable::tables`]
    #[bits(12..=31, rw)]
    table_index: u20,
}

#[bitfield(u32, default = 0)]
pub struct PageTableEntry {
    #[bit(0, rw)]
    present: bool,
    #[bit(1, rw)]
    writable: bool,
    #[bit(2, rw)]
    user: bool,
    /// Set by the MMU on every reference, only cleared by software
    #[bit(5, rw)]
    accessed: bool,
    /// Set by the MMU on every write
    #[bit(6, rw)]
    dirty: bool,
    /// Content lives in the backing store, not in memory
    #[bit(9, rw)]
    paged_out: bool,
    #[bits(12..=31, rw)]
    frame: u20,
}

impl PageTableEntry {
    pub fn permissions(&self) -> PagePermissions {
        PagePermissions {
            writable: self.writable(),
            user: self.user(),
        }
    }

    pub fn frame_number(&self) -> FrameNumber {
        self.frame().value()
    }

    /// Entry was never used or was cleared again
    pub fn is_unused(&self) -> bool {
        self.raw_value() == 0
    }
}

#[bitfield(u32)]
pub struct VirtualAddress {
    #[bits(22..=31, r)]
    page_directory_index: u10,
    #[bits(12..=21, r)]
    page_table_index: u10,
    #[bits(0..=11, r)]
    offset: u12,
}

impl VirtualAddress {
    fn directory_index(&self) -> usize {
        self.page_directory_index().value().into()
    }

    fn table_index(&self) -> usize {
        self.page_table_index().value().into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePermissions {
    pub writable: bool,
    pub user: bool,
}

impl PagePermissions {
    /// Default permissions for user memory
    pub const USER_RW: Self = Self {
        writable: true,
        user: true,
    };
}

pub struct LeafTable(pub [PageTableEntry; PAGE_TABLE_LEN]);

impl Default for LeafTable {
    fn default() -> Self {
        Self([PageTableEntry::default(); PAGE_TABLE_LEN])
    }
}

impl Deref for LeafTable {
    type Target = [PageTableEntry; PAGE_TABLE_LEN];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for LeafTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Two level page table covering the user half of an address space.
///
/// Leaf tables live in an arena owned by the page table. A present directory entry
/// stores the index of its leaf table instead of a physical address.
pub struct PageTable {
    directory: Box<[PageDirectoryEntry; PAGE_DIRECTORY_LEN]>,
    tables: Vec<LeafTable>,
}

impl PageTable {
    pub fn new() -> Self {
        Self {
            directory: Box::new([PageDirectoryEntry::default(); PAGE_DIRECTORY_LEN]),
            tables: Vec::new(),
        }
    }

    /// Returns the entry for `va` if its leaf table exists.
    pub fn entry(&self, va: u32) -> Option<PageTableEntry> {
        let addr = VirtualAddress::new_with_raw_value(va);
        let pde = self.directory[addr.directory_index()];
        if !pde.present() {
            return None;
        }

        let table = &self.tables[pde.table_index().value() as usize];
        Some(table[addr.table_index()])
    }

    /// Returns a mutable reference to the entry for `va` if its leaf table exists.
    pub fn entry_mut(&mut self, va: u32) -> Option<&mut PageTableEntry> {
        let addr = VirtualAddress::new_with_raw_value(va);
        let pde = self.directory[addr.directory_index()];
        if !pde.present() {
            return None;
        }

        let table = &mut self.tables[pde.table_index().value() as usize];
        Some(&mut table[addr.table_index()])
    }

    /// Returns the entry for `va`, allocating a zeroed leaf table if required.
    fn entry_alloc(&mut self, va: u32) -> &mut PageTableEntry {
        let addr = VirtualAddress::new_with_raw_value(va);
        let directory_index = addr.directory_index();

        if !self.directory[directory_index].present() {
            // all entries of a new table start as non present
            self.tables.push(LeafTable::default());
            let table_index = self.tables.len() - 1;

            // the permissions here are generous, entries restrict them further
            self.directory[directory_index] = PageDirectoryEntry::default()
                .with_present(true)
                .with_writable(true)
                .with_user(true)
                .with_table_index(u20::new(table_index as u32));
        }

        let table_index = self.directory[directory_index].table_index().value() as usize;
        &mut self.tables[table_index][addr.table_index()]
    }

    /// Physical frame `va` is mapped to, if present.
    pub fn translate(&self, va: u32) -> Option<FrameNumber> {
        self.entry(va)
            .filter(|entry| entry.present())
            .map(|entry| entry.frame_number())
    }

    /// Maps the page containing `va` to `frame`.
    ///
    /// Mapping an already present page halts the system.
    pub fn map(&mut self, va: u32, frame: FrameNumber, perm: PagePermissions) {
        debug_assert!(va < KERNBASE);
        let va = page_round_down(va);

        let entry = self.entry_alloc(va);
        if entry.present() {
            fatal(FatalError::Remap { address: va });
        }

        *entry = PageTableEntry::default()
            .with_present(true)
            .with_writable(perm.writable)
            .with_user(perm.user)
            .with_frame(u20::new(frame));
    }

    /// Creates a non present entry for a page whose content lives in the backing store.
    pub fn map_placeholder(&mut self, va: u32, perm: PagePermissions) {
        debug_assert!(va < KERNBASE);
        let va = page_round_down(va);

        let entry = self.entry_alloc(va);
        if entry.present() {
            fatal(FatalError::Remap { address: va });
        }

        *entry = PageTableEntry::default()
            .with_paged_out(true)
            .with_writable(perm.writable)
            .with_user(perm.user);
    }

    /// Removes the mapping of a present page and returns its frame.
    pub fn unmap(&mut self, va: u32) -> Option<FrameNumber> {
        let entry = self.entry_mut(va)?;
        if !entry.present() {
            return None;
        }

        let frame = entry.frame_number();
        *entry = PageTableEntry::default();
        Some(frame)
    }

    /// Resets the entry of `va` regardless of its state.
    pub fn clear_entry(&mut self, va: u32) {
        if let Some(entry) = self.entry_mut(va) {
            *entry = PageTableEntry::default();
        }
    }

    /// Clears the user bit of a page, used for the guard page below the user stack.
    pub fn clear_user_access(&mut self, va: u32) -> Result<(), ()> {
        let entry = self.entry_mut(va).ok_or(())?;
        if entry.is_unused() {
            return Err(());
        }

        *entry = entry.with_user(false);
        Ok(())
    }

    /// Is there a leaf table for the directory slot `va` belongs to?
    pub fn has_leaf_table(&self, va: u32) -> bool {
        let addr = VirtualAddress::new_with_raw_value(va);
        self.directory[addr.directory_index()].present()
    }

    /// Number of leaf tables allocated so far
    pub fn leaf_table_count(&self) -> usize {
        self.tables.len()
    }

    /// Iterates all used entries as `(virtual page address, entry)` in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, PageTableEntry)> + '_ {
        self.directory
            .iter()
            .enumerate()
            .filter(|(_, pde)| pde.present())
            .flat_map(move |(directory_index, pde)| {
                let table = &self.tables[pde.table_index().value() as usize];
                table
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| !entry.is_unused())
                    .map(move |(table_index, entry)| {
                        let va = ((directory_index << 22) | (table_index << 12)) as u32;
                        (va, *entry)
                    })
            })
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

/// First address covered by the directory entry after the one `va` belongs to.
pub(crate) fn next_directory_boundary(va: u32) -> u64 {
    ((va as u64 >> 22) + 1) << 22
}
