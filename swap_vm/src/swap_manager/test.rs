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

use rand::{rngs::SmallRng, RngCore, SeedableRng};

use crate::{
    modules::{
        frame_allocator::{FrameAllocatorModule, PhysicalMemory},
        page_replacement::{PageReplacementModule, ScFifoReplacementModule},
        persistent_storage::{
            test::BrokenReadStorageModule, PersistentStorageModule, RamStorageModule,
        },
    },
    paging::{PagePermissions, PageTable},
    vm_config::{MAX_RESIDENT_PAGES, MAX_SWAPPED_PAGES, PAGE_SIZE, SWAP_AREA_SIZE},
};

use super::{slot_offset, SwapManager};

const PID: u32 = 3;

type TestManager = SwapManager<ScFifoReplacementModule, RamStorageModule>;

fn get_test_manager() -> TestManager {
    SwapManager::new(PID, RamStorageModule::new(SWAP_AREA_SIZE))
}

fn map_tracked<P: PageReplacementModule, S: PersistentStorageModule>(
    manager: &mut SwapManager<P, S>,
    table: &mut PageTable,
    memory: &PhysicalMemory,
    address: u32,
) {
    manager.make_room(table, memory);
    let frame = memory.allocate_frame().unwrap();
    memory.zero_frame(frame);
    table.map(address, frame, PagePermissions::USER_RW);
    manager.track(address, table);
}

fn fill_page(memory: &PhysicalMemory, table: &PageTable, address: u32, seed: u64) -> Vec<u8> {
    let mut rand = SmallRng::seed_from_u64(seed);
    let mut data = vec![0u8; PAGE_SIZE];
    rand.fill_bytes(&mut data);

    memory.write_frame(table.translate(address).unwrap(), 0, &data);
    data
}

fn read_page(memory: &PhysicalMemory, table: &PageTable, address: u32) -> Vec<u8> {
    let mut data = vec![0u8; PAGE_SIZE];
    memory.read_frame(table.translate(address).unwrap(), 0, &mut data);
    data
}

#[test]
fn test_evict_writes_slot_and_frees_frame() {
    let memory = PhysicalMemory::new(64);
    let mut table = PageTable::new();
    let mut manager = get_test_manager();

    for i in 0..MAX_RESIDENT_PAGES as u32 {
        map_tracked(&mut manager, &mut table, &memory, i * PAGE_SIZE as u32);
    }
    let data = fill_page(&memory, &table, 0, 7);
    let free_frames = memory.free_frame_count();

    manager.evict(&mut table, &memory);

    let entry = table.entry(0).unwrap();
    assert!(!entry.present());
    assert!(entry.paged_out());
    assert_eq!(entry.frame_number(), 0);
    assert!(entry.writable());

    assert_eq!(manager.swapped().find_slot(0), Some(0));
    assert_eq!(manager.resident().find(0), None);
    assert_eq!(memory.free_frame_count(), free_frames + 1);

    let mut stored = vec![0u8; PAGE_SIZE];
    manager.storage.read(slot_offset(0), &mut stored).unwrap();
    assert_eq!(stored, data);

    let stats = manager.stats();
    assert_eq!(stats.resident_count, MAX_RESIDENT_PAGES - 1);
    assert_eq!(stats.swapped_count, 1);
    assert_eq!(stats.lifetime_swap_outs, 1);
    assert_eq!(stats.tlb_flushes, 1);
}

#[test]
fn test_swap_in_restores_content() {
    let memory = PhysicalMemory::new(64);
    let mut table = PageTable::new();
    let mut manager = get_test_manager();

    for i in 0..MAX_RESIDENT_PAGES as u32 {
        map_tracked(&mut manager, &mut table, &memory, i * PAGE_SIZE as u32);
    }
    let data = fill_page(&memory, &table, 0, 42);

    // page 0 is the head of the queue and gets evicted
    map_tracked(
        &mut manager,
        &mut table,
        &memory,
        MAX_RESIDENT_PAGES as u32 * PAGE_SIZE as u32,
    );
    assert!(table.entry(0).unwrap().paged_out());

    manager.swap_in(0, &mut table, &memory);

    let entry = table.entry(0).unwrap();
    assert!(entry.present());
    assert!(!entry.paged_out());
    assert!(!entry.accessed());
    assert_eq!(read_page(&memory, &table, 0), data);

    // page 1 had to make room
    assert!(table.entry(PAGE_SIZE as u32).unwrap().paged_out());
    assert_eq!(manager.swapped().find_slot(0), None);
    assert_eq!(manager.resident().len(), MAX_RESIDENT_PAGES);

    let stats = manager.stats();
    assert_eq!(stats.page_faults, 1);
    assert_eq!(stats.lifetime_swap_outs, 2);
    assert_eq!(stats.swapped_count, 1);
}

#[test]
fn test_swap_in_with_full_store() {
    let memory = PhysicalMemory::new(64);
    let mut table = PageTable::new();
    let mut manager = get_test_manager();
    let page = PAGE_SIZE as u32;

    map_tracked(&mut manager, &mut table, &memory, 0);
    let data = fill_page(&memory, &table, 0, 99);

    let total = (MAX_RESIDENT_PAGES + MAX_SWAPPED_PAGES) as u32;
    for i in 1..total {
        map_tracked(&mut manager, &mut table, &memory, i * page);
    }
    assert_eq!(manager.swapped().len(), MAX_SWAPPED_PAGES);
    assert_eq!(manager.swapped().find_slot(0), Some(0));

    // the victim takes over the slot page 0 just left
    manager.swap_in(0, &mut table, &memory);
    assert_eq!(read_page(&memory, &table, 0), data);

    let victim = MAX_RESIDENT_PAGES as u32 * page;
    assert!(table.entry(victim).unwrap().paged_out());
    assert_eq!(manager.swapped().find_slot(victim), Some(0));
    assert_eq!(manager.swapped().len(), MAX_SWAPPED_PAGES);
    assert_eq!(manager.resident().len(), MAX_RESIDENT_PAGES);
}

#[test]
fn test_forget_and_discard() {
    let memory = PhysicalMemory::new(64);
    let mut table = PageTable::new();
    let mut manager = get_test_manager();

    for i in 0..MAX_RESIDENT_PAGES as u32 + 1 {
        map_tracked(&mut manager, &mut table, &memory, i * PAGE_SIZE as u32);
    }

    manager.discard_swapped(0);
    assert!(manager.swapped().is_empty());

    manager.forget_resident(PAGE_SIZE as u32);
    assert_eq!(manager.resident().len(), MAX_RESIDENT_PAGES - 1);

    // untracked pages are fine
    manager.forget_resident(0x4000_0000);
    assert_eq!(manager.resident().len(), MAX_RESIDENT_PAGES - 1);
}

#[test]
#[should_panic(expected = "page 0x5000 of pid 3 not found")]
fn test_discard_unknown_slot() {
    let mut manager = get_test_manager();
    manager.discard_swapped(0x5000);
}

#[test]
#[should_panic(expected = "eviction with empty resident set (pid 3)")]
fn test_evict_empty() {
    let memory = PhysicalMemory::new(4);
    let mut table = PageTable::new();
    let mut manager = get_test_manager();

    manager.evict(&mut table, &memory);
}

#[test]
#[should_panic(expected = "swap_out: backing store of pid 3 is full")]
fn test_store_exhausted() {
    let memory = PhysicalMemory::new(64);
    let mut table = PageTable::new();
    let mut manager = get_test_manager();

    let total = MAX_RESIDENT_PAGES + MAX_SWAPPED_PAGES + 1;
    for i in 0..total as u32 {
        map_tracked(&mut manager, &mut table, &memory, i * PAGE_SIZE as u32);
    }
}

#[test]
#[should_panic(expected = "swap_in: could not read slot 0 of pid 3")]
fn test_swap_in_read_failure() {
    let memory = PhysicalMemory::new(64);
    let mut table = PageTable::new();
    let mut manager: SwapManager<ScFifoReplacementModule, _> = SwapManager::new(
        PID,
        BrokenReadStorageModule {
            inner: RamStorageModule::new(SWAP_AREA_SIZE),
        },
    );

    for i in 0..MAX_RESIDENT_PAGES as u32 + 1 {
        map_tracked(&mut manager, &mut table, &memory, i * PAGE_SIZE as u32);
    }

    manager.swap_in(0, &mut table, &memory);
}

#[test]
fn test_duplicate_copies_slots() {
    let memory = PhysicalMemory::new(64);
    let mut table = PageTable::new();
    let mut manager = get_test_manager();

    for i in 0..MAX_RESIDENT_PAGES as u32 {
        map_tracked(&mut manager, &mut table, &memory, i * PAGE_SIZE as u32);
    }
    let data = fill_page(&memory, &table, 0, 1234);
    manager.evict(&mut table, &memory);

    let mut child = manager
        .duplicate(4, RamStorageModule::new(SWAP_AREA_SIZE))
        .unwrap();

    assert_eq!(child.pid(), 4);
    assert_eq!(child.swapped().find_slot(0), Some(0));
    assert_eq!(child.resident().addresses(), manager.resident().addresses());

    let mut stored = vec![0u8; PAGE_SIZE];
    child.storage.read(slot_offset(0), &mut stored).unwrap();
    assert_eq!(stored, data);

    let stats = child.stats();
    assert_eq!(stats.lifetime_swap_outs, 0);
    assert_eq!(stats.page_faults, 0);
    assert_eq!(stats.swapped_count, 1);
}

#[test]
fn test_duplicate_read_failure() {
    let memory = PhysicalMemory::new(64);
    let mut table = PageTable::new();
    let mut manager: SwapManager<ScFifoReplacementModule, _> = SwapManager::new(
        PID,
        BrokenReadStorageModule {
            inner: RamStorageModule::new(SWAP_AREA_SIZE),
        },
    );

    for i in 0..MAX_RESIDENT_PAGES as u32 + 1 {
        map_tracked(&mut manager, &mut table, &memory, i * PAGE_SIZE as u32);
    }

    let child = manager.duplicate(
        4,
        BrokenReadStorageModule {
            inner: RamStorageModule::new(SWAP_AREA_SIZE),
        },
    );
    assert!(child.is_err());

    // parent is unchanged
    assert_eq!(manager.swapped().len(), 1);
    assert_eq!(manager.resident().len(), MAX_RESIDENT_PAGES);
}

#[test]
fn test_clear() {
    let memory = PhysicalMemory::new(64);
    let mut table = PageTable::new();
    let mut manager = get_test_manager();

    for i in 0..MAX_RESIDENT_PAGES as u32 + 2 {
        map_tracked(&mut manager, &mut table, &memory, i * PAGE_SIZE as u32);
    }

    assert_eq!(manager.clear(), 2);
    assert!(manager.resident().is_empty());
    assert!(manager.swapped().is_empty());
}
