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

use crate::{
    modules::{
        frame_allocator::{FrameAllocatorModule, PhysicalMemory},
        page_replacement::PageReplacementModule,
        persistent_storage::{
            test::get_test_storage, FilePersistentStorageModule, PersistentStorageModule,
            RamStorageModule,
        },
    },
    vm_config::{MAX_RESIDENT_PAGES, SWAP_AREA_SIZE},
    AddressSpace,
};


/// Routes `log` output of the crate through the test harness, set `RUST_LOG` to see it.
fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) type TestSpace<'m, P> = AddressSpace<'m, P, RamStorageModule, PhysicalMemory>;

/// Address space with swapping enabled and an in memory backing store
pub(crate) fn get_test_space<P: PageReplacementModule>(
    pid: u32,
    memory: &PhysicalMemory,
) -> TestSpace<'_, P> {
    init_test_logger();
    let mut space = AddressSpace::new(pid, memory);
    space
        .enable_swapping(RamStorageModule::new(SWAP_AREA_SIZE))
        .unwrap();
    space
}

/// Address space with swapping enabled that swaps to `/tmp/<test_name>.tmp`
pub(crate) fn get_file_test_space<'m, P: PageReplacementModule>(
    test_name: &str,
    pid: u32,
    memory: &'m PhysicalMemory,
) -> AddressSpace<'m, P, FilePersistentStorageModule, PhysicalMemory> {
    init_test_logger();
    let mut space = AddressSpace::new(pid, memory);
    space
        .enable_swapping(get_test_storage(test_name, SWAP_AREA_SIZE))
        .unwrap();
    space
}

/// Checks that page table, resident list and swapped list agree.
pub(crate) fn check_invariants<P, S, F>(space: &AddressSpace<'_, P, S, F>)
where
    P: PageReplacementModule,
    S: PersistentStorageModule,
    F: FrameAllocatorModule,
{
    let table = space.page_table();

    for (address, entry) in table.iter() {
        assert!(
            !(entry.present() && entry.paged_out()),
            "page {:#x} is present and paged out",
            address
        );
    }

    let swap = match space.swap_manager() {
        Some(swap) => swap,
        None => {
            assert!(table.iter().all(|(_, entry)| !entry.paged_out()));
            return;
        }
    };

    let resident = swap.resident();
    let swapped = swap.swapped();
    assert!(resident.len() <= MAX_RESIDENT_PAGES);
    assert_eq!(space.stats().resident_count, resident.len());
    assert_eq!(space.stats().swapped_count, swapped.len());

    for (_, page) in resident.iter() {
        let entry = table.entry(page.address).unwrap();
        assert!(entry.present(), "resident page {:#x} not present", page.address);
        assert_eq!(swapped.find_slot(page.address), None);
    }

    for (slot, address) in swapped.iter() {
        let entry = table.entry(address).unwrap();
        assert!(entry.paged_out(), "slot {} holds mapped page {:#x}", slot, address);
        assert_eq!(resident.find(address), None);
    }

    for (address, entry) in table.iter() {
        if entry.paged_out() {
            assert!(swapped.find_slot(address).is_some());
        }
    }
}
