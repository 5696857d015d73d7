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

use super::PageReplacementModule;
use crate::{paging::PageTable, swap_manager::ResidentList};

/// Paging disabled. Processes grow until physical memory runs out.
pub struct NoReplacementModule;

impl PageReplacementModule for NoReplacementModule {
    const NAME: &'static str = "NONE";
    const TRACKS_PAGES: bool = false;

    fn new() -> Self {
        Self
    }

    fn select_victim(
        &mut self,
        _list: &mut ResidentList,
        _page_table: &mut PageTable,
    ) -> Option<usize> {
        None
    }
}
