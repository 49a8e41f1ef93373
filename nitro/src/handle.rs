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

//! Open Nitro file handles: a raw reader clamped to a `[start, end)` byte
//! window resolved once at `open` time.

use nitrofat_err::Result;
#[cfg(not(feature = "legacy-seek-clamp"))]
use nitrofat_err::{Error, RequestError};

use crate::dir::DirIterator;
use crate::mount::NitroMount;
use crate::path::split_parent;
use crate::raw::{RawReader, Whence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
}

/// A read-only open file, there is no write/unlink/truncate because the
/// Nitro image is immutable (§4.6) — the absence is permanent, not a
/// runtime condition, so there is no method to call at all for them.
pub struct FileHandle {
    reader: RawReader,
    start: u32,
    end: u32,
}

impl FileHandle {
    pub fn open(mount: &NitroMount, path: &str) -> Result<Self> {
        let (dir_path, file_name) = split_parent(path);
        let it = DirIterator::open(mount, dir_path)?;
        let (mut reader, start, end) = it.into_reader_and_range(file_name)?;
        reader.seek(start as i64, Whence::Set);
        Ok(Self { reader, start, end })
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let pos = self.reader.pos();
        if pos >= self.end {
            return Ok(0);
        }
        let remaining = (self.end - pos) as usize;
        let n = remaining.min(buf.len());
        self.reader.read(&mut buf[..n])
    }

    /// `Set` is relative to the start of the file; `Cur` passes through to
    /// the raw reader. Returns the new file-relative position.
    pub fn seek(&mut self, off: i64, whence: Whence) -> Result<u32> {
        let target = match whence {
            Whence::Set => self.start as i64 + off,
            Whence::Cur => self.reader.pos() as i64 + off,
        };
        if target as u32 > self.end {
            #[cfg(feature = "legacy-seek-clamp")]
            {
                let _ = target;
                return Ok(0);
            }
            #[cfg(not(feature = "legacy-seek-clamp"))]
            {
                return Err(Error::InvalidRequest(RequestError::SeekPastEnd));
            }
        }
        self.reader.seek(target, Whence::Set);
        Ok(self.reader.pos() - self.start)
    }

    pub fn stat(&self) -> FileStat {
        FileStat {
            size: (self.end - self.start) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn golden_image() -> Rc<[u8]> {
        let mut bytes = vec![0u8; 0x1000];
        bytes[0xAC..0xB0].copy_from_slice(b"PASS");
        bytes[0x40..0x44].copy_from_slice(&0x100u32.to_le_bytes());
        bytes[0x48..0x4C].copy_from_slice(&0x200u32.to_le_bytes());

        bytes[0x100..0x104].copy_from_slice(&0x20u32.to_le_bytes());
        bytes[0x104..0x106].copy_from_slice(&0u16.to_le_bytes());
        bytes[0x106..0x108].copy_from_slice(&0xF000u16.to_le_bytes());

        bytes[0x108..0x10C].copy_from_slice(&0x40u32.to_le_bytes());
        bytes[0x10C..0x10E].copy_from_slice(&1u16.to_le_bytes());
        bytes[0x10E..0x110].copy_from_slice(&0xF000u16.to_le_bytes());

        let mut pos = 0x100 + 0x20;
        bytes[pos] = 6;
        pos += 1;
        bytes[pos..pos + 6].copy_from_slice(b"README");
        pos += 6;
        bytes[pos] = 0x80 | 3;
        pos += 1;
        bytes[pos..pos + 3].copy_from_slice(b"sub");
        pos += 3;
        bytes[pos..pos + 2].copy_from_slice(&0xF001u16.to_le_bytes());
        pos += 2;
        bytes[pos] = 0;

        let mut pos = 0x100 + 0x40;
        bytes[pos] = 9;
        pos += 1;
        bytes[pos..pos + 9].copy_from_slice(b"hello.txt");
        pos += 9;
        bytes[pos] = 0;

        bytes[0x200..0x204].copy_from_slice(&0x800u32.to_le_bytes());
        bytes[0x204..0x208].copy_from_slice(&0x804u32.to_le_bytes());
        bytes[0x208..0x20C].copy_from_slice(&0x900u32.to_le_bytes());
        bytes[0x20C..0x210].copy_from_slice(&0x90Bu32.to_le_bytes());

        bytes[0x800..0x804].copy_from_slice(b"RDME");
        bytes[0x900..0x90B].copy_from_slice(b"hello world");

        Rc::from(bytes)
    }

    #[test]
    fn reads_a_nested_file_fully_then_reports_eof() {
        let mount = crate::mount::NitroMount::mount_image(golden_image()).unwrap();
        let mut f = FileHandle::open(&mount, "nitro:/sub/hello.txt").unwrap();
        assert_eq!(f.stat().size, 11);
        let mut buf = [0u8; 11];
        assert_eq!(f.read(&mut buf).unwrap(), 11);
        assert_eq!(&buf, b"hello world");
        let mut extra = [0u8; 4];
        assert_eq!(f.read(&mut extra).unwrap(), 0);
    }

    #[test]
    fn reads_root_file() {
        let mount = crate::mount::NitroMount::mount_image(golden_image()).unwrap();
        let mut f = FileHandle::open(&mount, "nitro:README").unwrap();
        assert_eq!(f.stat().size, 4);
        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"RDME");
    }

    #[test]
    fn seek_set_is_relative_to_file_start() {
        let mount = crate::mount::NitroMount::mount_image(golden_image()).unwrap();
        let mut f = FileHandle::open(&mount, "nitro:/sub/hello.txt").unwrap();
        f.seek(6, Whence::Set).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(f.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");
    }

    #[cfg(feature = "legacy-seek-clamp")]
    #[test]
    fn seeking_past_end_reports_zero_under_legacy_clamp() {
        let mount = crate::mount::NitroMount::mount_image(golden_image()).unwrap();
        let mut f = FileHandle::open(&mount, "nitro:README").unwrap();
        assert_eq!(f.seek(100, Whence::Set).unwrap(), 0);
    }
}
