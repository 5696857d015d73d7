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
use std::{
    fs::{remove_file, File},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};

use super::PersistentStorageModule;

/// Swap file of a single process.
///
/// The file is created (and truncated) to its final size up front and removed again
/// once the storage is dropped.
pub struct FilePersistentStorageModule {
    /// `None` only while dropping
    file: Option<File>,
    path: PathBuf,
    size: usize,
}

impl FilePersistentStorageModule {
    pub fn new(path: impl Into<PathBuf>, size: usize) -> std::io::Result<Self> {
        let path = path.into();
        let file = File::options()
            .read(true)
            .write(true)
            .truncate(true)
            .create(true)
            .open(&path)?;

        file.set_len(size as u64)?;
        debug!("Created swap file {} with {} bytes", path.display(), size);

        Ok(Self {
            file: Some(file),
            path,
            size,
        })
    }

    /// Swap file of process `pid` inside `directory` (`<directory>/.swap<pid>`)
    pub fn for_process(
        directory: impl AsRef<Path>,
        pid: u32,
        size: usize,
    ) -> std::io::Result<Self> {
        Self::new(directory.as_ref().join(format!(".swap{}", pid)), size)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Positions the file at `offset` if `[offset, offset + len)` lies inside the swap area.
    fn seek_to(&mut self, offset: usize, len: usize) -> Result<&mut File, ()> {
        if offset.checked_add(len).map_or(true, |end| end > self.size) {
            warn!(
                "{}: access of {} bytes at {} is out of range",
                self.path.display(),
                len,
                offset
            );
            return Err(());
        }

        let file = self.file.as_mut().ok_or(())?;
        file.seek(SeekFrom::Start(offset as u64)).map_err(|_| ())?;
        Ok(file)
    }
}

impl PersistentStorageModule for FilePersistentStorageModule {
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> Result<(), ()> {
        self.seek_to(offset, dest.len())?
            .read_exact(dest)
            .map_err(|_| ())
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), ()> {
        self.seek_to(offset, src.len())?
            .write_all(src)
            .map_err(|_| ())
    }

    fn get_max_size(&self) -> usize {
        self.size
    }
}

impl Drop for FilePersistentStorageModule {
    fn drop(&mut self) {
        // close before removing
        drop(self.file.take());

        if let Err(err) = remove_file(&self.path) {
            warn!("could not remove swap file {}: {}", self.path.display(), err);
        }
    }
}
