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

//! Page replacement policies.
//!
//! Exactly one policy is active per address space. It is chosen once through the
//! `P` type parameter of [`crate::AddressSpace`]; [`SelectedPolicy`] is the policy
//! picked by the cargo features of this build.

mod aq;
mod lapa;
mod nfua;
mod none;
mod scfifo;

pub use aq::AqReplacementModule;
pub use lapa::LapaReplacementModule;
pub use nfua::NfuaReplacementModule;
pub use none::NoReplacementModule;
pub use scfifo::ScFifoReplacementModule;

use crate::{
    fatal::{fatal, FatalError},
    paging::PageTable,
    swap_manager::ResidentList,
};

#[cfg(feature = "nfua")]
pub type SelectedPolicy = NfuaReplacementModule;

#[cfg(all(feature = "lapa", not(feature = "nfua")))]
pub type SelectedPolicy = LapaReplacementModule;

#[cfg(all(feature = "aq", not(any(feature = "nfua", feature = "lapa"))))]
pub type SelectedPolicy = AqReplacementModule;

#[cfg(all(
    feature = "none",
    not(any(feature = "nfua", feature = "lapa", feature = "aq"))
))]
pub type SelectedPolicy = NoReplacementModule;

#[cfg(not(any(
    feature = "nfua",
    feature = "lapa",
    feature = "aq",
    feature = "none"
)))]
pub type SelectedPolicy = ScFifoReplacementModule;

/// Decides which resident page is swapped out next.
pub trait PageReplacementModule {
    /// Name printed in logs and statistics
    const NAME: &'static str;

    /// If `false`, no page is ever tracked or swapped
    const TRACKS_PAGES: bool = true;

    fn new() -> Self;

    /// Reference metric of a page that just became resident
    fn initial_metric(&self) -> u32 {
        0
    }

    /// Returns the slot a new page is stored in. The list is never full when this is called.
    fn insert_position(&mut self, list: &mut ResidentList) -> usize {
        list.first_free()
            .expect("BUG: insert into full resident list")
    }

    /// One eviction call.
    ///
    /// Returns the slot of the victim or `None` if this call only changed the policy's
    /// state and should be repeated. Never called with an empty list.
    fn select_victim(&mut self, list: &mut ResidentList, page_table: &mut PageTable)
        -> Option<usize>;

    /// Called on every timer tick.
    fn age(&mut self, _list: &mut ResidentList, _page_table: &mut PageTable) {}
}

/// Is the accessed bit of the resident page `address` set?
pub(crate) fn is_accessed(page_table: &PageTable, address: u32) -> bool {
    match page_table.entry(address) {
        Some(entry) => entry.accessed(),
        None => fatal(FatalError::MissingPageTableEntry { address }),
    }
}

/// Clears the accessed bit of `address` and returns its previous value.
pub(crate) fn take_accessed(page_table: &mut PageTable, address: u32) -> bool {
    match page_table.entry_mut(address) {
        Some(entry) => {
            let accessed = entry.accessed();
            *entry = entry.with_accessed(false);
            accessed
        }
        None => fatal(FatalError::MissingPageTableEntry { address }),
    }
}

/// Shifts every reference metric right by one and moves the accessed bit into bit 31.
pub(crate) fn age_reference_metrics(list: &mut ResidentList, page_table: &mut PageTable) {
    for (_, page) in list.iter_mut() {
        page.reference_metric >>= 1;
        if take_accessed(page_table, page.address) {
            page.reference_metric |= 1 << 31;
        }
    }
}
