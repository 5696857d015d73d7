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

use super::{age_reference_metrics, is_accessed, PageReplacementModule};
use crate::{paging::PageTable, swap_manager::ResidentList};

/// Advancing queue.
///
/// New pages enter at the head (slot 0) and the tail is evicted. On every tick a
/// referenced page advances one slot towards the head if its predecessor was not
/// referenced.
pub struct AqReplacementModule;

impl PageReplacementModule for AqReplacementModule {
    const NAME: &'static str = "AQ";

    fn new() -> Self {
        Self
    }

    fn insert_position(&mut self, list: &mut ResidentList) -> usize {
        let free = list
            .first_free()
            .expect("BUG: insert into full resident list");
        list.shift_right_from_head(free);
        0
    }

    fn select_victim(
        &mut self,
        list: &mut ResidentList,
        _page_table: &mut PageTable,
    ) -> Option<usize> {
        list.iter().last().map(|(index, _)| index)
    }

    fn age(&mut self, list: &mut ResidentList, page_table: &mut PageTable) {
        fn referenced(list: &ResidentList, page_table: &PageTable, index: usize) -> bool {
            list.get(index)
                .is_some_and(|page| is_accessed(page_table, page.address))
        }

        for i in 0..list.capacity() - 1 {
            if !referenced(list, page_table, i) && referenced(list, page_table, i + 1) {
                list.swap(i, i + 1);
            }
        }

        age_reference_metrics(list, page_table);
    }
}

#[cfg(test)]
mod test {
    use super::AqReplacementModule;
    use crate::{
        modules::page_replacement::{
            test::{list_with_metrics, set_accessed},
            PageReplacementModule,
        },
        swap_manager::{ResidentList, ResidentPage},
        vm_config::MAX_RESIDENT_PAGES,
    };

    #[test]
    fn test_referenced_page_advances() {
        let (mut list, mut table) = list_with_metrics(&[0; 4]);
        set_accessed(&mut table, 0x2000);
        let mut policy = AqReplacementModule::new();

        policy.age(&mut list, &mut table);
        assert_eq!(list.addresses(), vec![0, 0x2000, 0x1000, 0x3000]);

        // accessed bits are cleared after reordering
        assert!(!table.entry(0x2000).unwrap().accessed());

        // without new references the order is stable
        policy.age(&mut list, &mut table);
        assert_eq!(list.addresses(), vec![0, 0x2000, 0x1000, 0x3000]);
    }

    #[test]
    fn test_unreferenced_page_sinks_in_one_pass() {
        let (mut list, mut table) = list_with_metrics(&[0; 4]);
        set_accessed(&mut table, 0x2000);
        set_accessed(&mut table, 0x3000);
        let mut policy = AqReplacementModule::new();

        policy.age(&mut list, &mut table);
        assert_eq!(list.addresses(), vec![0, 0x2000, 0x3000, 0x1000]);
    }

    #[test]
    fn test_tail_is_victim() {
        let (mut list, mut table) = list_with_metrics(&[0; MAX_RESIDENT_PAGES]);
        let mut policy = AqReplacementModule::new();

        assert_eq!(
            policy.select_victim(&mut list, &mut table),
            Some(MAX_RESIDENT_PAGES - 1)
        );
    }

    #[test]
    fn test_insert_at_head() {
        let mut list = ResidentList::new();
        let mut policy = AqReplacementModule::new();

        for address in [0x1000, 0x2000, 0x3000] {
            let index = policy.insert_position(&mut list);
            assert_eq!(index, 0);
            list.insert_at(
                index,
                ResidentPage {
                    address,
                    reference_metric: 0,
                },
            );
        }

        assert_eq!(list.addresses(), vec![0x3000, 0x2000, 0x1000]);
    }
}
