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

/// Least accessed page with aging.
///
/// Same aging as [`super::NfuaReplacementModule`], but the page whose metric has the
/// fewest set bits is evicted. Ties go to the smaller metric, then to the lower slot.
/// New pages start with all bits set so they are not evicted right away.
pub struct LapaReplacementModule;

impl PageReplacementModule for LapaReplacementModule {
    const NAME: &'static str = "LAPA";

    fn new() -> Self {
        Self
    }

    fn initial_metric(&self) -> u32 {
        u32::MAX
    }

    fn select_victim(
        &mut self,
        list: &mut ResidentList,
        _page_table: &mut PageTable,
    ) -> Option<usize> {
        list.iter()
            .min_by_key(|(_, page)| {
                (
                    page.reference_metric.count_ones(),
                    page.reference_metric,
                )
            })
            .map(|(index, _)| index)
    }

    fn age(&mut self, list: &mut ResidentList, page_table: &mut PageTable) {
        age_reference_metrics(list, page_table);
    }
}
