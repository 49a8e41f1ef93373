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

//! Nitro directory enumeration: walks the Filename Table (FNT) one entry at
//! a time, resolving a slash-separated path down to a starting directory id.

use std::mem::MaybeUninit;

use log::{debug, error};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use nitrofat_err::{Error, Result};

use crate::mount::NitroMount;
use crate::path::tokenize;
use crate::raw::{RawReader, Whence};

pub const ROOT_DIR_ID: u16 = 0xF000;
const DIR_ID_MASK: u16 = 0x0FFF;
const DIR_FLAG: u8 = 0x80;

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct FntDirHeader {
    entry_start: U32,
    entry_file_id: U16,
    parent_id: U16,
}

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct FatEntry {
    top: U32,
    bottom: U32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirEntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: DirEntryKind,
    pub size: u64,
}

/// A directory iterator open on a single level of the Nitro hierarchy.
///
/// Holds its own raw reader; independent of any other open iterator or file
/// handle, per the mount design (see [`NitroMount`]).
pub struct DirIterator<'m> {
    mount: &'m NitroMount,
    reader: RawReader,
    cur_dir_id: u16,
    namepos: u32,
    entry_id: u16,
    #[allow(dead_code)]
    parent_id: u16,
    /// Set by the last `next()` call when it yielded a directory entry.
    pub last_dir_id: Option<u16>,
    /// Set by the last `next()` call when it yielded a file entry.
    pub last_fat_range: Option<(u32, u32)>,
}

impl<'m> DirIterator<'m> {
    pub fn open(mount: &'m NitroMount, path: &str) -> Result<Self> {
        let reader = mount.open_reader()?;
        let mut it = Self {
            mount,
            reader,
            cur_dir_id: ROOT_DIR_ID,
            namepos: 0,
            entry_id: 0,
            parent_id: 0,
            last_dir_id: None,
            last_fat_range: None,
        };
        it.reset()?;

        for token in tokenize(path) {
            loop {
                match it.next()? {
                    Some(entry) if entry.name == token && entry.kind == DirEntryKind::Directory => {
                        let dir_id = it.last_dir_id.expect("directory entry sets last_dir_id");
                        it.cur_dir_id = dir_id;
                        it.reset()?;
                        break;
                    }
                    Some(_) => continue,
                    None => {
                        debug!("nitro: path token {token:?} not found while opening {path:?}");
                        return Err(Error::NoSuchPath);
                    }
                }
            }
        }
        Ok(it)
    }

    pub fn reset(&mut self) -> Result<()> {
        let header_offset = self.mount.fnt_offset + (self.cur_dir_id & DIR_ID_MASK) as u32 * 8;
        self.reader.seek(header_offset as i64, Whence::Set);
        let mut header: FntDirHeader = unsafe { MaybeUninit::uninit().assume_init() };
        if let Err(e) = self.reader.read_exact(header.as_mut_bytes()) {
            error!("nitro: no FNT directory header for dir id {:#x}: {e}", self.cur_dir_id);
            return Err(e);
        }
        self.namepos = header.entry_start.get();
        self.entry_id = header.entry_file_id.get();
        self.parent_id = header.parent_id.get();
        self.last_dir_id = None;
        self.last_fat_range = None;
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<DirEntry>> {
        self.reader
            .seek((self.mount.fnt_offset + self.namepos) as i64, Whence::Set);
        let mut tag = [0u8; 1];
        if let Err(e) = self.reader.read_exact(&mut tag) {
            error!("nitro: FNT entry stream truncated at namepos {}: {e}", self.namepos);
            return Err(e);
        }
        let tag = tag[0];
        if tag == 0 {
            return Ok(None);
        }

        if tag & DIR_FLAG != 0 {
            let len = (tag & !DIR_FLAG) as usize;
            let mut name_buf = vec![0u8; len];
            if let Err(e) = self.reader.read_exact(&mut name_buf) {
                error!("nitro: FNT subdirectory name truncated at namepos {}: {e}", self.namepos);
                return Err(e);
            }
            let mut dir_id_buf = [0u8; 2];
            if let Err(e) = self.reader.read_exact(&mut dir_id_buf) {
                error!("nitro: FNT subdirectory id truncated at namepos {}: {e}", self.namepos);
                return Err(e);
            }
            let dir_id = u16::from_le_bytes(dir_id_buf);

            self.namepos += len as u32 + 3;
            self.last_dir_id = Some(dir_id);
            self.last_fat_range = None;
            Ok(Some(DirEntry {
                name: String::from_utf8_lossy(&name_buf).into_owned(),
                kind: DirEntryKind::Directory,
                size: 0,
            }))
        } else {
            let len = tag as usize;
            let mut name_buf = vec![0u8; len];
            if let Err(e) = self.reader.read_exact(&mut name_buf) {
                error!("nitro: FNT file name truncated at namepos {}: {e}", self.namepos);
                return Err(e);
            }
            self.namepos += len as u32 + 1;

            let fat_offset = self.mount.fat_offset + self.entry_id as u32 * 8;
            self.reader.seek(fat_offset as i64, Whence::Set);
            let mut fat: FatEntry = unsafe { MaybeUninit::uninit().assume_init() };
            if let Err(e) = self.reader.read_exact(fat.as_mut_bytes()) {
                error!("nitro: no FAT entry for file id {}: {e}", self.entry_id);
                return Err(e);
            }
            let (top, bottom) = (fat.top.get(), fat.bottom.get());
            self.entry_id += 1;
            self.last_dir_id = None;
            self.last_fat_range = Some((top, bottom));

            Ok(Some(DirEntry {
                name: String::from_utf8_lossy(&name_buf).into_owned(),
                kind: DirEntryKind::File,
                size: (bottom - top) as u64,
            }))
        }
    }

    pub(crate) fn into_reader_and_range(mut self, name: &str) -> Result<(RawReader, u32, u32)> {
        loop {
            match self.next()? {
                Some(entry) if entry.kind == DirEntryKind::File && entry.name == name => {
                    let (start, end) = self.last_fat_range.expect("file entry sets last_fat_range");
                    return Ok((self.reader, start, end));
                }
                Some(_) => continue,
                None => return Err(Error::NoSuchPath),
            }
        }
    }
}
