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

use super::{age_reference_metrics, PageReplacementModule};
use crate::{paging::PageTable, swap_manager::ResidentList};

/// Not frequently used, approximated by aging.
///
/// Evicts the page with the smallest reference metric. New pages start at 0.
pub struct NfuaReplacementModule;

impl PageReplacementModule for NfuaReplacementModule {
    const NAME: &'static str = "NFUA";

    fn new() -> Self {
        Self
    }

    fn select_victim(
        &mut self,
        list: &mut ResidentList,
        _page_table: &mut PageTable,
    ) -> Option<usize> {
        // min_by_key keeps the first minimum, so ties go to the lowest slot
        list.iter()
            .min_by_key(|(_, page)| page.reference_metric)
            .map(|(index, _)| index)
    }

    fn age(&mut self, list: &mut ResidentList, page_table: &mut PageTable) {
        age_reference_metrics(list, page_table);
    }
}

#[cfg(test)]
mod test {
    use super::NfuaReplacementModule;
    use crate::modules::page_replacement::{
        test::{list_with_metrics, set_accessed},
        PageReplacementModule,
    };

    #[test]
    fn test_lowest_metric_wins_ties_by_index() {
        let (mut list, mut table) = list_with_metrics(&[3, 3, 1, 3]);
        let mut policy = NfuaReplacementModule::new();
        assert_eq!(policy.select_victim(&mut list, &mut table), Some(2));

        let (mut list, mut table) = list_with_metrics(&[5, 2, 2, 9]);
        assert_eq!(policy.select_victim(&mut list, &mut table), Some(1));
    }

    #[test]
    fn test_unreferenced_page_is_evicted_after_aging() {
        let (mut list, mut table) = list_with_metrics(&[0, 0, 0]);
        let mut policy = NfuaReplacementModule::new();
        assert_eq!(policy.initial_metric(), 0);

        set_accessed(&mut table, 0);
        set_accessed(&mut table, 0x2000);
        policy.age(&mut list, &mut table);

        assert_eq!(policy.select_victim(&mut list, &mut table), Some(1));
    }

    #[test]
    fn test_skips_unused_slots() {
        let (mut list, mut table) = list_with_metrics(&[0, 4, 8]);
        list.take(0);

        let mut policy = NfuaReplacementModule::new();
        assert_eq!(policy.select_victim(&mut list, &mut table), Some(1));
    }
}
