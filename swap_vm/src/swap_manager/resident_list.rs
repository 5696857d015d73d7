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

use crate::vm_config::MAX_RESIDENT_PAGES;

/// Metadata of a page that is currently backed by a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidentPage {
    /// Page aligned virtual address
    pub address: u32,

    /// Reference history used by the aging policies
    pub reference_metric: u32,
}

/// Fixed capacity table of the resident pages of one process.
///
/// Used slots form a prefix in insertion order. Only replacement policies reorder
/// them explicitly, so slot order doubles as queue order for the FIFO-like policies.
#[derive(Clone)]
pub struct ResidentList {
    slots: [Option<ResidentPage>; MAX_RESIDENT_PAGES],
    count: usize,
}

impl ResidentList {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_RESIDENT_PAGES],
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        MAX_RESIDENT_PAGES
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == MAX_RESIDENT_PAGES
    }

    pub fn get(&self, index: usize) -> Option<&ResidentPage> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ResidentPage> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Slot index of `address`
    pub fn find(&self, address: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(page) if page.address == address))
    }

    /// Lowest unused slot
    pub fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_none())
    }

    /// Lowest used slot, which is the head of the queue
    pub fn first_used(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_some())
    }

    /// Stores `page` in the unused slot `index`.
    pub fn insert_at(&mut self, index: usize, page: ResidentPage) {
        assert!(
            self.slots[index].is_none(),
            "BUG: resident slot {} is already used",
            index
        );
        debug_assert!(self.find(page.address).is_none());

        self.slots[index] = Some(page);
        self.count += 1;
    }

    /// Removes `address` and returns its former index.
    ///
    /// All later slots move one to the front, so the queue has no holes afterwards.
    pub fn remove(&mut self, address: u32) -> Option<usize> {
        let index = self.find(address)?;
        self.take(index);
        self.slots[index..].rotate_left(1);
        Some(index)
    }

    /// Clears slot `index`.
    pub fn take(&mut self, index: usize) -> Option<ResidentPage> {
        let page = self.slots[index].take()?;
        self.count -= 1;
        Some(page)
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
    }

    /// Moves slot `index` to the last position, shifting all later slots one to the front.
    pub fn rotate_to_tail(&mut self, index: usize) {
        self.slots[index..].rotate_left(1);
    }

    /// Shifts slots `[0, index)` one position back and leaves slot 0 unused.
    ///
    /// Slot `index` has to be unused.
    pub fn shift_right_from_head(&mut self, index: usize) {
        assert!(
            self.slots[index].is_none(),
            "BUG: shifting over used resident slot {}",
            index
        );
        self.slots[..=index].rotate_right(1);
    }

    /// Used slots in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ResidentPage)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|page| (i, page)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut ResidentPage)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|page| (i, page)))
    }

    /// Addresses of all used slots in slot order
    pub fn addresses(&self) -> Vec<u32> {
        self.iter().map(|(_, page)| page.address).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.slots = [None; MAX_RESIDENT_PAGES];
        self.count = 0;
    }
}

impl Default for ResidentList {
    fn default() -> Self {
        Self::new()
    }
}
