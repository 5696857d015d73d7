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

use std::{env::temp_dir, io::stdout};

use env_logger::{Builder, Env};
use log::warn;
use serde::Serialize;
use swap_vm::{
    modules::{
        frame_allocator::{FrameAllocatorModule, PhysicalMemory},
        page_replacement::{PageReplacementModule, SelectedPolicy},
        persistent_storage::FilePersistentStorageModule,
    },
    vm_config::{MAX_RESIDENT_PAGES, PAGE_SIZE, SWAP_AREA_SIZE},
    AddressSpace, SwapStats,
};

type Space<'m> = AddressSpace<'m, SelectedPolicy, FilePersistentStorageModule, PhysicalMemory>;

const PAGE: u32 = PAGE_SIZE as u32;
const FRAME_COUNT: usize = 256;

#[derive(Serialize)]
struct RunSummary {
    policy: &'static str,
    parent: SwapStats,
    child: Option<SwapStats>,
    free_frames: usize,
}

fn swap_file(pid: u32) -> FilePersistentStorageModule {
    FilePersistentStorageModule::for_process(temp_dir(), pid, SWAP_AREA_SIZE).unwrap()
}

/// Creates a process like exec does: code page, guard page and stack page.
fn spawn(pid: u32, memory: &PhysicalMemory) -> Space<'_> {
    let mut space: Space<'_> = AddressSpace::new(pid, memory);
    if let Err(err) = space.enable_swapping(swap_file(pid)) {
        warn!("pid {}: {}", pid, err);
    }

    space.load_initial_image(b"\x6a\x00\xb8\x02\x00\x00\x00\xcd\x40").unwrap();
    space.sbrk(2 * PAGE as i32).unwrap();
    space.clear_user_access(PAGE).unwrap();
    space
}

fn step(space: &mut Space<'_>, text: &str) {
    space.tick();
    println!("{}", text);
    println!("  {}", space.stats());
}

fn touch(space: &mut Space<'_>, page: u32, offset: u32, value: u8) {
    space.store(page * PAGE + offset, &[value]).unwrap();
}

fn run(memory: &PhysicalMemory) -> RunSummary {
    let mut parent = spawn(3, memory);
    let max_pages = MAX_RESIDENT_PAGES as u32;

    for page in 3..max_pages {
        let address = parent.sbrk(PAGE as i32).unwrap();
        println!("Allocate new page {} (address: {:#x}).", page, address);
    }
    step(
        &mut parent,
        &format!("All {} physical pages have been allocated.", max_pages),
    );

    parent.sbrk(PAGE as i32).unwrap();
    step(&mut parent, &format!("Allocate page #{}", max_pages));

    touch(&mut parent, 3, 1, b'a');
    step(&mut parent, "Access page #3");

    parent.sbrk(PAGE as i32).unwrap();
    step(&mut parent, &format!("Allocate page #{}.", max_pages + 1));

    for page in 4..=11 {
        touch(&mut parent, page, 1, b'b');
    }
    step(&mut parent, "Access pages 4-11.");

    touch(&mut parent, 4, 1, b'c');
    step(&mut parent, "Access page #4.");

    parent.sbrk(PAGE as i32).unwrap();
    step(&mut parent, &format!("Allocate page #{}.", max_pages + 2));

    let mut child = parent.duplicate(4, swap_file(4)).unwrap();
    step(&mut child, "Calling fork.");

    touch(&mut child, 13, 0, b'd');
    step(&mut child, "Access page #13.");

    let child_stats = child.stats();
    let summary = child.destroy();
    println!(
        "pid 4 exited: {} frames and {} swap slots released",
        summary.frames_released, summary.slots_released
    );

    RunSummary {
        policy: SelectedPolicy::NAME,
        parent: parent.stats(),
        child: Some(child_stats),
        free_frames: memory.free_frame_count(),
    }
}

fn run_without_paging(memory: &PhysicalMemory) -> RunSummary {
    let mut space = spawn(3, memory);

    for page in 0..50 {
        let address = space.sbrk(PAGE as i32).unwrap();
        println!("Allocate new page {} (address: {:#x}).", page, address);
    }
    step(&mut space, "All pages allocated.");

    RunSummary {
        policy: SelectedPolicy::NAME,
        parent: space.stats(),
        child: None,
        free_frames: memory.free_frame_count(),
    }
}

fn main() {
    Builder::from_env(Env::default())
        .filter_level(log::LevelFilter::Warn)
        .format_module_path(false)
        .init();

    println!("Testing {}", SelectedPolicy::NAME);

    let memory = PhysicalMemory::new(FRAME_COUNT);
    let summary = if SelectedPolicy::TRACKS_PAGES {
        run(&memory)
    } else {
        run_without_paging(&memory)
    };

    serde_json::to_writer(stdout(), &summary).unwrap();
    println!();
}
