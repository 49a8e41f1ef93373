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

//! Write-back, least-recently-used page cache over a [`BlockDevice`].
//!
//! The cache absorbs small or misaligned accesses against a device that only
//! reads and writes whole sectors. It is not visible to callers above the
//! FAT/Nitro layers; it should be flushed whenever a caller needs the device
//! contents to reflect recent writes (closing a file, unmounting).

mod endian;

pub use endian::{read_little, read_u16, read_u32, read_u8, write_little, write_u16, write_u32, write_u8};

use log::{debug, error, trace, warn};
use nitrofat_block::BlockDevice;
use nitrofat_err::{Error, IoError, RequestError, Result};

/// Sentinel `start` value marking a page as holding no sectors.
pub const FREE: u32 = u32::MAX;

/// Minimum number of pages a cache will honor; smaller requests are raised.
pub const MIN_PAGES: u32 = 2;

/// Minimum sectors per page a cache will honor; smaller requests are raised.
pub const MIN_SECTORS_PER_PAGE: u32 = 8;

/// Sizing for a [`Cache`]. `pages` and `sectors_per_page` are silently
/// clamped up to [`MIN_PAGES`] and [`MIN_SECTORS_PER_PAGE`].
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub pages: u32,
    pub sectors_per_page: u32,
    pub sector_size: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pages: 8,
            sectors_per_page: MIN_SECTORS_PER_PAGE,
            sector_size: 512,
        }
    }
}

struct Page {
    start: u32,
    count: u32,
    last_access: u64,
    dirty: bool,
    buffer: Box<[u8]>,
}

impl Page {
    fn free(page_bytes: usize) -> Self {
        Self {
            start: FREE,
            count: 0,
            last_access: 0,
            dirty: false,
            buffer: vec![0u8; page_bytes].into_boxed_slice(),
        }
    }

    fn is_free(&self) -> bool {
        self.start == FREE
    }

    fn contains(&self, sector: u32) -> bool {
        !self.is_free() && sector >= self.start && sector < self.start + self.count
    }

    fn end(&self) -> u32 {
        self.start.wrapping_add(self.count)
    }
}

/// A write-back sector cache over a [`BlockDevice`] of `D`.
pub struct Cache<D: BlockDevice> {
    device: D,
    pages: Vec<Page>,
    sector_size: u32,
    sectors_per_page: u32,
    access_counter: u64,
}

impl<D: BlockDevice> Cache<D> {
    /// Construct a cache, clamping `config` up to the documented minimums.
    pub fn new(config: CacheConfig, device: D) -> Result<Self> {
        let pages_n = config.pages.max(MIN_PAGES);
        let sectors_per_page = config.sectors_per_page.max(MIN_SECTORS_PER_PAGE);
        if pages_n != config.pages || sectors_per_page != config.sectors_per_page {
            debug!(
                "cache sizing clamped to {pages_n} pages x {sectors_per_page} sectors/page \
                 (requested {} x {})",
                config.pages, config.sectors_per_page
            );
        }
        let page_bytes = sectors_per_page as usize * config.sector_size as usize;
        let pages = (0..pages_n).map(|_| Page::free(page_bytes)).collect();
        Ok(Self {
            device,
            pages,
            sector_size: config.sector_size,
            sectors_per_page,
            access_counter: 0,
        })
    }

    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    fn next_access(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    fn find_containing(&self, sector: u32) -> Option<usize> {
        self.pages.iter().position(|p| p.contains(sector))
    }

    /// FREE page with the lowest index if one exists, else the page with the
    /// smallest `last_access`.
    fn find_victim(&self) -> usize {
        if let Some(i) = self.pages.iter().position(Page::is_free) {
            trace!("victim page {i} (free)");
            return i;
        }
        let (i, page) = self
            .pages
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| p.last_access)
            .expect("cache always has at least MIN_PAGES pages");
        trace!("victim page {i} (lru, last_access {})", page.last_access);
        i
    }

    fn writeback(&mut self, idx: usize) -> Result<()> {
        let page = &self.pages[idx];
        if !page.dirty {
            return Ok(());
        }
        let len = page.count as usize * self.sector_size as usize;
        let ok = self.device.write_sectors(page.start, page.count, &page.buffer[..len]);
        if !ok {
            warn!("writeback failed: sector {} count {}", page.start, page.count);
            return Err(Error::Io(IoError::WriteFailed {
                sector: page.start,
                count: page.count,
            }));
        }
        debug!("wrote back page {idx} (sector {} count {})", page.start, page.count);
        self.pages[idx].dirty = false;
        Ok(())
    }

    /// Evict the victim page (writing it back first if dirty) and load a
    /// fresh page starting at `sector`. Returns the page's index.
    fn evict_and_read(&mut self, sector: u32) -> Result<usize> {
        trace!("miss: sector {sector} not present, loading fresh page");
        let idx = self.find_victim();
        self.writeback(idx)?;

        let spp = self.sectors_per_page;
        let len = spp as usize * self.sector_size as usize;
        let ok = self.device.read_sectors(sector, spp, &mut self.pages[idx].buffer[..len]);
        if !ok {
            warn!("fill failed: sector {sector} count {spp}");
            return Err(Error::Io(IoError::ReadFailed { sector, count: spp }));
        }

        let tag = self.next_access();
        let page = &mut self.pages[idx];
        page.start = sector;
        page.count = spp;
        page.last_access = tag;
        page.dirty = false;
        trace!("loaded page {idx} <- sector {sector} count {spp}");
        Ok(idx)
    }

    /// Ensure `sector` is present in some page, bumping its access tag.
    /// Returns the hosting page's index.
    fn ensure_present(&mut self, sector: u32) -> Result<usize> {
        if let Some(idx) = self.find_containing(sector) {
            trace!("hit: page {idx} contains sector {sector}");
            let tag = self.next_access();
            self.pages[idx].last_access = tag;
            Ok(idx)
        } else {
            self.evict_and_read(sector)
        }
    }

    fn check_partial_bounds(&self, offset: u32, len: u32) -> Result<()> {
        if offset + len > self.sector_size {
            return Err(Error::InvalidRequest(RequestError::PartialSectorOutOfRange {
                offset,
                len,
                sector_size: self.sector_size,
            }));
        }
        Ok(())
    }

    /// Fill `out` (`n * sector_size()` bytes) with sectors `[first, first+n)`.
    pub fn get_sectors(&mut self, first: u32, n: u32, out: &mut [u8]) -> Result<()> {
        let ss = self.sector_size as usize;
        assert_eq!(out.len(), n as usize * ss, "out buffer must hold exactly n sectors");

        let mut sector = first;
        let mut remaining = n;
        let mut out_off = 0usize;

        while remaining > 0 {
            if let Some(idx) = self.find_containing(sector) {
                trace!("hit: page {idx} contains sector {sector}");
                let tag = self.next_access();
                let page = &mut self.pages[idx];
                page.last_access = tag;

                let page_off = sector - page.start;
                let take = (page.count - page_off).min(remaining);
                let src_start = page_off as usize * ss;
                let src_end = src_start + take as usize * ss;
                out[out_off..out_off + take as usize * ss].copy_from_slice(&page.buffer[src_start..src_end]);

                out_off += take as usize * ss;
                sector += take;
                remaining -= take;
            } else {
                let idx = self.evict_and_read(sector)?;
                let page = &self.pages[idx];
                let take = page.count.min(remaining);
                out[out_off..out_off + take as usize * ss].copy_from_slice(&page.buffer[..take as usize * ss]);

                out_off += take as usize * ss;
                sector += take;
                remaining -= take;
            }
        }
        Ok(())
    }

    /// Update sectors `[first, first+n)` from `data` (`n * sector_size()` bytes).
    pub fn write_sectors(&mut self, first: u32, n: u32, data: &[u8]) -> Result<()> {
        let ss = self.sector_size as usize;
        assert_eq!(data.len(), n as usize * ss, "data buffer must hold exactly n sectors");

        let spp = self.sectors_per_page;
        let mut sector = first;
        let mut remaining = n;
        let mut in_off = 0usize;

        while remaining > 0 {
            let matched = self
                .pages
                .iter()
                .position(|p| p.contains(sector) || (sector == p.end() && p.count < spp));

            if let Some(idx) = matched {
                trace!("hit: page {idx} matches sector {sector} for write");
                let tag = self.next_access();
                let page = &mut self.pages[idx];
                let page_off = sector - page.start;
                let take = (spp - page_off).min(remaining);

                let dst_start = page_off as usize * ss;
                let dst_end = dst_start + take as usize * ss;
                page.buffer[dst_start..dst_end].copy_from_slice(&data[in_off..in_off + take as usize * ss]);
                page.last_access = tag;
                page.dirty = true;
                // Never shrink an already-valid range: an in-range overwrite
                // must not un-cover sectors that remain dirty from an earlier
                // write but aren't touched by this one.
                page.count = page.count.max(page_off + take);

                in_off += take as usize * ss;
                sector += take;
                remaining -= take;
            } else {
                trace!("miss: sector {sector} not present, loading fresh page for write");
                let idx = self.find_victim();
                self.writeback(idx)?;

                let take = spp.min(remaining);
                let tag = self.next_access();
                let page = &mut self.pages[idx];
                page.buffer[..take as usize * ss].copy_from_slice(&data[in_off..in_off + take as usize * ss]);
                page.start = sector;
                page.count = take;
                page.last_access = tag;
                page.dirty = true;

                in_off += take as usize * ss;
                sector += take;
                remaining -= take;
            }
        }
        Ok(())
    }

    /// Copy `len` bytes starting at byte `offset` of `sector` into `out`.
    pub fn read_partial(&mut self, sector: u32, offset: u32, len: u32, out: &mut [u8]) -> Result<()> {
        self.check_partial_bounds(offset, len)?;
        let ss = self.sector_size as usize;
        let idx = self.ensure_present(sector)?;
        let page = &self.pages[idx];
        let base = (sector - page.start) as usize * ss + offset as usize;
        out[..len as usize].copy_from_slice(&page.buffer[base..base + len as usize]);
        Ok(())
    }

    /// Merge `len` bytes from `data` into `sector` at byte `offset`, after
    /// ensuring the sector is present (reading it in if missing).
    pub fn write_partial(&mut self, sector: u32, offset: u32, len: u32, data: &[u8]) -> Result<()> {
        self.check_partial_bounds(offset, len)?;
        let ss = self.sector_size as usize;
        let idx = self.ensure_present(sector)?;

        let tag = self.next_access();
        let page = &mut self.pages[idx];
        let base = (sector - page.start) as usize * ss + offset as usize;
        page.buffer[base..base + len as usize].copy_from_slice(&data[..len as usize]);
        page.dirty = true;
        page.last_access = tag;
        Ok(())
    }

    /// As [`write_partial`](Self::write_partial), but the destination sector
    /// is zeroed in cache before the merge.
    pub fn erase_write_partial(&mut self, sector: u32, offset: u32, len: u32, data: &[u8]) -> Result<()> {
        self.check_partial_bounds(offset, len)?;
        let ss = self.sector_size as usize;
        let idx = self.ensure_present(sector)?;

        let tag = self.next_access();
        let page = &mut self.pages[idx];
        let sector_start = (sector - page.start) as usize * ss;
        page.buffer[sector_start..sector_start + ss].fill(0);
        let base = sector_start + offset as usize;
        page.buffer[base..base + len as usize].copy_from_slice(&data[..len as usize]);
        page.dirty = true;
        page.last_access = tag;
        Ok(())
    }

    /// Write every dirty page back to the device, then clear all dirty bits.
    pub fn flush(&mut self) -> Result<()> {
        for idx in 0..self.pages.len() {
            self.writeback(idx)?;
        }
        Ok(())
    }

    /// Flush, then mark every page FREE.
    pub fn invalidate(&mut self) -> Result<()> {
        self.flush()?;
        for page in &mut self.pages {
            page.start = FREE;
            page.count = 0;
            page.last_access = 0;
            page.dirty = false;
        }
        debug!("cache invalidated");
        Ok(())
    }
}

impl<D: BlockDevice> Drop for Cache<D> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("cache dropped with unflushed dirty pages: {e}");
        }
    }
}
