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

use crate::vm_config::{MAX_SWAPPED_PAGES, PAGE_SIZE};

/// Occupancy of the backing store of one process.
///
/// Slot `i` holds the page stored at byte offset `i * PAGE_SIZE`.
#[derive(Clone)]
pub struct SwappedList {
    slots: [Option<u32>; MAX_SWAPPED_PAGES],
    count: usize,
}

impl SwappedList {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_SWAPPED_PAGES],
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Reserves the lowest free slot for `address`.
    pub fn allocate_slot(&mut self, address: u32) -> Result<usize, ()> {
        debug_assert!(self.find_slot(address).is_none());

        let slot = self.slots.iter().position(|s| s.is_none()).ok_or(())?;
        self.slots[slot] = Some(address);
        self.count += 1;
        Ok(slot)
    }

    /// Frees `slot` and returns the address it held.
    pub fn release_slot(&mut self, slot: usize) -> Option<u32> {
        let address = self.slots[slot].take()?;
        self.count -= 1;
        Some(address)
    }

    pub fn find_slot(&self, address: u32) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(address))
    }

    /// `(slot, address)` of all used slots
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, address)| address.map(|address| (slot, address)))
    }

    pub(crate) fn clear(&mut self) {
        self.slots = [None; MAX_SWAPPED_PAGES];
        self.count = 0;
    }
}

impl Default for SwappedList {
    fn default() -> Self {
        Self::new()
    }
}

/// Backing store byte offset of `slot`
pub const fn slot_offset(slot: usize) -> usize {
    slot * PAGE_SIZE
}

#[cfg(test)]
mod test {
    use super::{slot_offset, SwappedList};
    use crate::vm_config::{MAX_SWAPPED_PAGES, PAGE_SIZE};

    #[test]
    fn test_allocate_release() {
        let mut list = SwappedList::new();
        assert_eq!(list.allocate_slot(0x1000), Ok(0));
        assert_eq!(list.allocate_slot(0x5000), Ok(1));
        assert_eq!(list.find_slot(0x5000), Some(1));
        assert_eq!(list.len(), 2);

        assert_eq!(list.release_slot(0), Some(0x1000));
        assert_eq!(list.release_slot(0), None);
        assert_eq!(list.find_slot(0x1000), None);

        // lowest free slot is reused
        assert_eq!(list.allocate_slot(0x9000), Ok(0));
        assert_eq!(slot_offset(1), PAGE_SIZE);
    }

    #[test]
    fn test_store_full() {
        let mut list = SwappedList::new();
        for i in 0..MAX_SWAPPED_PAGES {
            list.allocate_slot(i as u32 * 0x1000).unwrap();
        }

        list.allocate_slot(0xdead_0000)
            .expect_err("store should be full");
        assert_eq!(list.len(), MAX_SWAPPED_PAGES);
    }
}
