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

use super::{take_accessed, PageReplacementModule};
use crate::{paging::PageTable, swap_manager::ResidentList};

/// Second chance FIFO.
///
/// Slot order is queue order. A head page that was referenced since the last scan
/// loses its accessed bit and moves to the tail instead of being evicted.
pub struct ScFifoReplacementModule;

impl PageReplacementModule for ScFifoReplacementModule {
    const NAME: &'static str = "SCFIFO";

    fn new() -> Self {
        Self
    }

    fn select_victim(
        &mut self,
        list: &mut ResidentList,
        page_table: &mut PageTable,
    ) -> Option<usize> {
        let head = list.first_used()?;
        let address = list.get(head)?.address;
        let referenced = take_accessed(page_table, address);

        // the victim moves to the tail as well, so its slot is refilled by the next insert
        list.rotate_to_tail(head);

        if referenced {
            None
        } else {
            Some(list.capacity() - 1)
        }
    }
}

#[cfg(test)]
mod test {
    use super::ScFifoReplacementModule;
    use crate::{
        modules::page_replacement::{
            test::{list_with_metrics, set_accessed},
            PageReplacementModule,
        },
        vm_config::MAX_RESIDENT_PAGES,
    };

    #[test]
    fn test_evicts_head_without_reference() {
        let (mut list, mut table) = list_with_metrics(&[0; MAX_RESIDENT_PAGES]);
        let mut policy = ScFifoReplacementModule::new();

        let victim = policy.select_victim(&mut list, &mut table).unwrap();
        assert_eq!(victim, MAX_RESIDENT_PAGES - 1);
        assert_eq!(list.get(victim).unwrap().address, 0);
        assert_eq!(list.get(0).unwrap().address, 0x1000);
    }

    #[test]
    fn test_second_chance_makes_progress() {
        let (mut list, mut table) = list_with_metrics(&[0; MAX_RESIDENT_PAGES]);
        for i in 0..MAX_RESIDENT_PAGES {
            set_accessed(&mut table, i as u32 * 0x1000);
        }
        let mut policy = ScFifoReplacementModule::new();

        // a single call clears exactly one accessed bit and rotates that page
        assert_eq!(policy.select_victim(&mut list, &mut table), None);
        let cleared: Vec<u32> = (0..MAX_RESIDENT_PAGES as u32)
            .map(|i| i * 0x1000)
            .filter(|address| !table.entry(*address).unwrap().accessed())
            .collect();
        assert_eq!(cleared, vec![0]);
        assert_eq!(list.get(MAX_RESIDENT_PAGES - 1).unwrap().address, 0);
        assert_eq!(list.len(), MAX_RESIDENT_PAGES);

        // every other page gets its second chance too
        for _ in 1..MAX_RESIDENT_PAGES {
            assert_eq!(policy.select_victim(&mut list, &mut table), None);
        }

        // queue went full circle, the oldest page is evicted
        let victim = policy.select_victim(&mut list, &mut table).unwrap();
        assert_eq!(list.get(victim).unwrap().address, 0);
    }

    #[test]
    fn test_referenced_head_is_skipped() {
        let (mut list, mut table) = list_with_metrics(&[0; MAX_RESIDENT_PAGES]);
        set_accessed(&mut table, 0);
        let mut policy = ScFifoReplacementModule::new();

        assert_eq!(policy.select_victim(&mut list, &mut table), None);
        let victim = policy.select_victim(&mut list, &mut table).unwrap();
        assert_eq!(list.get(victim).unwrap().address, 0x1000);

        // page 0 is now just before the victim in the queue
        assert_eq!(list.get(victim - 1).unwrap().address, 0);
    }
}
