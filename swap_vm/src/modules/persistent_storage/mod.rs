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

mod file_storage;
mod ram_storage;

pub use file_storage::FilePersistentStorageModule;
pub use ram_storage::RamStorageModule;

/// Backing store of a single process.
///
/// Swapped pages are stored at `slot * PAGE_SIZE`. The swap engine never reads or writes
/// across `get_max_size()`.
pub trait PersistentStorageModule {
    /// Reads a region `[offset, offset + dest.len())` to a storage location `dest` that is at least `dest.len()` bytes big.
    ///
    /// If this call fails, it could be that already some data was written to `dest`.
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> Result<(), ()>;

    /// Returns the maximum size in bytes of this storage
    ///
    /// **Although `read` and `write` won't throw any error, it is illegal to read/write across this border!**
    fn get_max_size(&self) -> usize;

    /// Writes the region `src` back to the underlying storage `[offset, offset + src.len()]`
    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), ()>;
}
