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

use super::PersistentStorageModule;

/// Backing store kept in (host) memory
pub struct RamStorageModule {
    area: Box<[u8]>,
}

impl RamStorageModule {
    pub fn new(size: usize) -> Self {
        Self {
            area: vec![0u8; size].into_boxed_slice(),
        }
    }
}

impl PersistentStorageModule for RamStorageModule {
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> Result<(), ()> {
        let src = self.area.get(offset..offset + dest.len()).ok_or(())?;
        dest.copy_from_slice(src);
        Ok(())
    }

    fn get_max_size(&self) -> usize {
        self.area.len()
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), ()> {
        let dest = self.area.get_mut(offset..offset + src.len()).ok_or(())?;
        dest.copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::super::test::{
        test_persistent_storage_normal, test_persistent_storage_overwrite,
        PERSISTENT_STORAGE_NORMAL_TEST_SIZE,
    };
    use super::RamStorageModule;
    use crate::modules::persistent_storage::PersistentStorageModule;

    #[test]
    fn test_ram_storage_module_normal() {
        test_persistent_storage_normal(RamStorageModule::new(PERSISTENT_STORAGE_NORMAL_TEST_SIZE));
    }

    #[test]
    fn test_ram_storage_module_overwrite() {
        test_persistent_storage_overwrite(RamStorageModule::new(PERSISTENT_STORAGE_NORMAL_TEST_SIZE));
    }

    #[test]
    fn test_ram_storage_rejects_out_of_bounds() {
        let mut storage = RamStorageModule::new(16);
        assert!(storage.write(10, &[0u8; 8]).is_err());
        assert!(storage.read(16, &mut [0u8; 1]).is_err());
        assert!(storage.write(8, &[0u8; 8]).is_ok());
    }
}
