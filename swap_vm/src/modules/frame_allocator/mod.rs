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

mod physical_memory;

pub use physical_memory::{CoreMapEntry, PhysicalMemory};

use crate::{paging::FrameNumber, vm_config::PAGE_SIZE};

/// Physical frame allocator shared by all address spaces.
///
/// All methods take `&self`: implementations have to be safe against concurrent
/// allocate/free calls from multiple cores.
pub trait FrameAllocatorModule {
    /// Allocates a single frame. Its content is undefined.
    fn allocate_frame(&self) -> Result<FrameNumber, ()>;

    /// Gives `frame` back to the allocator.
    fn free_frame(&self, frame: FrameNumber);

    /// Reads `[offset, offset + dest.len())` of `frame` into `dest`.
    fn read_frame(&self, frame: FrameNumber, offset: usize, dest: &mut [u8]);

    /// Writes `src` to `[offset, offset + src.len())` of `frame`.
    fn write_frame(&self, frame: FrameNumber, offset: usize, src: &[u8]);

    /// Number of frames that can still be allocated
    fn free_frame_count(&self) -> usize;

    /// Number of frames managed by this allocator
    fn total_frame_count(&self) -> usize;

    fn zero_frame(&self, frame: FrameNumber) {
        self.write_frame(frame, 0, &[0u8; PAGE_SIZE]);
    }

    fn copy_frame(&self, src: FrameNumber, dst: FrameNumber) {
        let mut buffer = [0u8; PAGE_SIZE];
        self.read_frame(src, 0, &mut buffer);
        self.write_frame(dst, 0, &buffer);
    }
}
