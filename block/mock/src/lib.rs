// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! An in-memory [`BlockDevice`] backed by a `Vec<u8>`, for tests only.

use std::cell::RefCell;

use nitrofat_block::BlockDevice;

pub struct MockBlockDevice {
    sector_size: u32,
    sectors: RefCell<Vec<u8>>,
    inserted: bool,
    fail_reads: bool,
    fail_writes: bool,
}

impl MockBlockDevice {
    /// A device of `sector_count` sectors, each `sector_size` bytes, zeroed.
    pub fn new(sector_size: u32, sector_count: u32) -> Self {
        Self {
            sector_size,
            sectors: RefCell::new(vec![0u8; sector_size as usize * sector_count as usize]),
            inserted: true,
            fail_reads: false,
            fail_writes: false,
        }
    }

    /// A device whose sector `s` is filled with the single byte value `s as u8`.
    ///
    /// Convenient for cache tests that need to tell which sector a byte came
    /// from just by looking at it.
    pub fn filled_by_sector_index(sector_size: u32, sector_count: u32) -> Self {
        let dev = Self::new(sector_size, sector_count);
        {
            let mut sectors = dev.sectors.borrow_mut();
            for s in 0..sector_count {
                let start = s as usize * sector_size as usize;
                sectors[start..start + sector_size as usize].fill(s as u8);
            }
        }
        dev
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Snapshot of the raw backing bytes, for assertions in tests.
    pub fn snapshot(&self) -> Vec<u8> {
        self.sectors.borrow().clone()
    }
}

impl BlockDevice for MockBlockDevice {
    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn read_sectors(&self, first_sector: u32, count: u32, out: &mut [u8]) -> bool {
        if self.fail_reads || !self.inserted {
            return false;
        }
        let sectors = self.sectors.borrow();
        let start = first_sector as usize * self.sector_size as usize;
        let len = count as usize * self.sector_size as usize;
        let Some(src) = sectors.get(start..start + len) else {
            return false;
        };
        out[..len].copy_from_slice(src);
        true
    }

    fn write_sectors(&self, first_sector: u32, count: u32, data: &[u8]) -> bool {
        if self.fail_writes || !self.inserted {
            return false;
        }
        let mut sectors = self.sectors.borrow_mut();
        let start = first_sector as usize * self.sector_size as usize;
        let len = count as usize * self.sector_size as usize;
        let Some(dst) = sectors.get_mut(start..start + len) else {
            return false;
        };
        dst.copy_from_slice(&data[..len]);
        true
    }

    fn is_inserted(&self) -> bool {
        self.inserted
    }

    fn startup(&mut self) -> bool {
        true
    }

    fn shutdown(&mut self) -> bool {
        true
    }

    fn clear_status(&mut self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_by_sector_index_matches_byte_value() {
        let dev = MockBlockDevice::filled_by_sector_index(512, 32);
        let mut buf = [0u8; 512];
        assert!(dev.read_sectors(17, 1, &mut buf));
        assert!(buf.iter().all(|&b| b == 17));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dev = MockBlockDevice::new(512, 4);
        let data = [0xABu8; 512];
        assert!(dev.write_sectors(2, 1, &data));
        let mut out = [0u8; 512];
        assert!(dev.read_sectors(2, 1, &mut out));
        assert_eq!(out, data);
    }

    #[test]
    fn read_out_of_range_fails() {
        let dev = MockBlockDevice::new(512, 4);
        let mut out = [0u8; 512];
        assert!(!dev.read_sectors(10, 1, &mut out));
    }

    #[test]
    fn forced_failure_is_observed() {
        let mut dev = MockBlockDevice::new(512, 4);
        dev.set_fail_writes(true);
        assert!(!dev.write_sectors(0, 1, &[0u8; 512]));
    }
}
