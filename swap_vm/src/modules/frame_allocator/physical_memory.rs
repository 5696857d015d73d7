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

use core::hint::spin_loop;

use bitbybit::bitfield;
use log::trace;
use try_lock::{Locked, TryLock};

use super::FrameAllocatorModule;
use crate::{paging::FrameNumber, vm_config::PAGE_SIZE};

#[bitfield(u8, default = 0)]
pub struct CoreMapEntry {
    #[bit(0, rw)]
    allocated: bool,
}

struct FrameArena {
    core_map: Box<[CoreMapEntry]>,
    frames: Box<[[u8; PAGE_SIZE]]>,

    /// The next frame number to start searching for free frames.
    position: usize,
    frames_allocated: usize,
}

/// Simulated physical memory: a fixed number of page frames plus a core map.
///
/// The arena is protected by a spin lock, so one instance can be shared between
/// all address spaces (and threads).
pub struct PhysicalMemory {
    arena: TryLock<FrameArena>,
    frame_count: usize,
}

impl PhysicalMemory {
    pub fn new(frame_count: usize) -> Self {
        assert!(frame_count > 0, "physical memory needs at least one frame");
        assert!(frame_count < (1 << 20), "frame numbers are limited to 20 bits");

        Self {
            arena: TryLock::new(FrameArena {
                core_map: vec![CoreMapEntry::default(); frame_count].into_boxed_slice(),
                frames: vec![[0u8; PAGE_SIZE]; frame_count].into_boxed_slice(),
                position: 0,
                frames_allocated: 0,
            }),
            frame_count,
        }
    }

    fn lock(&self) -> Locked<'_, FrameArena> {
        loop {
            if let Some(guard) = self.arena.try_lock() {
                return guard;
            }
            spin_loop();
        }
    }

    fn check_allocated(arena: &FrameArena, frame: FrameNumber) -> usize {
        let index = frame as usize;
        assert!(
            index < arena.core_map.len() && arena.core_map[index].allocated(),
            "BUG: access to unallocated frame {}",
            frame
        );
        index
    }
}

impl FrameAllocatorModule for PhysicalMemory {
    fn allocate_frame(&self) -> Result<FrameNumber, ()> {
        let mut arena = self.lock();
        let total_frames = arena.core_map.len();
        if arena.frames_allocated == total_frames {
            return Err(());
        }

        // next fit, there is at least one free frame
        let start = arena.position;
        let index = (0..total_frames)
            .map(|i| (start + i) % total_frames)
            .find(|&i| !arena.core_map[i].allocated())
            .ok_or(())?;

        arena.core_map[index] = arena.core_map[index].with_allocated(true);
        arena.position = (index + 1) % total_frames;
        arena.frames_allocated += 1;

        trace!("Allocate frame {} ({} in use)", index, arena.frames_allocated);
        Ok(index as FrameNumber)
    }

    fn free_frame(&self, frame: FrameNumber) {
        let mut arena = self.lock();
        let index = frame as usize;
        assert!(
            index < arena.core_map.len() && arena.core_map[index].allocated(),
            "BUG: double free of frame {}",
            frame
        );

        arena.core_map[index] = arena.core_map[index].with_allocated(false);
        arena.frames_allocated -= 1;

        trace!("Free frame {} ({} in use)", index, arena.frames_allocated);
    }

    fn read_frame(&self, frame: FrameNumber, offset: usize, dest: &mut [u8]) {
        let arena = self.lock();
        let index = Self::check_allocated(&arena, frame);
        dest.copy_from_slice(&arena.frames[index][offset..offset + dest.len()]);
    }

    fn write_frame(&self, frame: FrameNumber, offset: usize, src: &[u8]) {
        let mut arena = self.lock();
        let index = Self::check_allocated(&arena, frame);
        arena.frames[index][offset..offset + src.len()].copy_from_slice(src);
    }

    fn free_frame_count(&self) -> usize {
        let arena = self.lock();
        arena.core_map.len() - arena.frames_allocated
    }

    fn total_frame_count(&self) -> usize {
        self.frame_count
    }

    fn copy_frame(&self, src: FrameNumber, dst: FrameNumber) {
        let mut arena = self.lock();
        let src = Self::check_allocated(&arena, src);
        let dst = Self::check_allocated(&arena, dst);
        let content = arena.frames[src];
        arena.frames[dst] = content;
    }
}
