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

//! Little-endian multi-byte values at an arbitrary `(sector, offset)`,
//! layered on top of [`Cache::read_partial`]/[`Cache::write_partial`].

use nitrofat_block::BlockDevice;
use nitrofat_err::{Error, RequestError, Result};

use crate::Cache;

/// Read a 1/2/4-byte little-endian unsigned integer at `(sector, offset)`.
pub fn read_little<D: BlockDevice>(cache: &mut Cache<D>, sector: u32, offset: u32, width: u32) -> Result<u32> {
    let mut buf = [0u8; 4];
    match width {
        1 | 2 | 4 => cache.read_partial(sector, offset, width, &mut buf[..width as usize])?,
        _ => return Err(Error::InvalidRequest(RequestError::InvalidEndianWidth(width))),
    }
    Ok(u32::from_le_bytes(buf))
}

/// Write a 1/2/4-byte little-endian unsigned integer at `(sector, offset)`.
/// Bytes of the sector outside `[offset, offset+width)` are untouched.
pub fn write_little<D: BlockDevice>(
    cache: &mut Cache<D>,
    sector: u32,
    offset: u32,
    width: u32,
    value: u32,
) -> Result<()> {
    match width {
        1 | 2 | 4 => {}
        _ => return Err(Error::InvalidRequest(RequestError::InvalidEndianWidth(width))),
    }
    let staging = value.to_le_bytes();
    cache.write_partial(sector, offset, width, &staging[..width as usize])
}

pub fn read_u8<D: BlockDevice>(cache: &mut Cache<D>, sector: u32, offset: u32) -> Result<u8> {
    Ok(read_little(cache, sector, offset, 1)? as u8)
}

pub fn read_u16<D: BlockDevice>(cache: &mut Cache<D>, sector: u32, offset: u32) -> Result<u16> {
    Ok(read_little(cache, sector, offset, 2)? as u16)
}

pub fn read_u32<D: BlockDevice>(cache: &mut Cache<D>, sector: u32, offset: u32) -> Result<u32> {
    read_little(cache, sector, offset, 4)
}

pub fn write_u8<D: BlockDevice>(cache: &mut Cache<D>, sector: u32, offset: u32, value: u8) -> Result<()> {
    write_little(cache, sector, offset, 1, value as u32)
}

pub fn write_u16<D: BlockDevice>(cache: &mut Cache<D>, sector: u32, offset: u32, value: u16) -> Result<()> {
    write_little(cache, sector, offset, 2, value as u32)
}

pub fn write_u32<D: BlockDevice>(cache: &mut Cache<D>, sector: u32, offset: u32, value: u32) -> Result<()> {
    write_little(cache, sector, offset, 4, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheConfig;
    use nitrofat_block_mock::MockBlockDevice;

    fn cache() -> Cache<MockBlockDevice> {
        let dev = MockBlockDevice::new(512, 8);
        Cache::new(CacheConfig::default(), dev).unwrap()
    }

    #[test]
    fn round_trips_each_width() {
        let mut c = cache();
        write_u8(&mut c, 0, 10, 0xAB).unwrap();
        assert_eq!(read_u8(&mut c, 0, 10).unwrap(), 0xAB);

        write_u16(&mut c, 0, 20, 0xBEEF).unwrap();
        assert_eq!(read_u16(&mut c, 0, 20).unwrap(), 0xBEEF);

        write_u32(&mut c, 0, 30, 0xDEAD_BEEF).unwrap();
        assert_eq!(read_u32(&mut c, 0, 30).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn write_does_not_disturb_surrounding_bytes() {
        let mut c = cache();
        write_u32(&mut c, 0, 0, 0xFFFF_FFFF).unwrap();
        write_u16(&mut c, 0, 2, 0x0000).unwrap();
        let mut whole = [0u8; 512];
        c.get_sectors(0, 1, &mut whole).unwrap();
        assert_eq!(&whole[0..2], &[0xFF, 0xFF]);
        assert_eq!(&whole[2..4], &[0x00, 0x00]);
        assert_eq!(whole[4], 0);
    }

    #[test]
    fn invalid_width_is_rejected() {
        let mut c = cache();
        assert!(read_little(&mut c, 0, 0, 3).is_err());
        assert!(write_little(&mut c, 0, 0, 3, 1).is_err());
    }
}
