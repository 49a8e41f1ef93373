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

//! Nitro image mounting: signature verification and header offset lookup.

use std::mem::MaybeUninit;
use std::rc::Rc;

use log::{info, warn};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use nitrofat_err::{Error, ImageError, Result};

use crate::raw::{RawReader, Whence};

const SIGNATURE_OFFSET: u32 = 0xAC;
const SIGNATURE: &[u8; 4] = b"PASS";
const FNT_OFFSET_OFFSET: u32 = 0x40;

/// Covers bytes 0x40..0x4C: FNT offset at 0x40, FAT offset at 0x48, four
/// bytes of unrelated header in between.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct Offsets {
    fnt_offset: U32,
    _between: [u8; 4],
    fat_offset: U32,
}

pub(crate) enum MountSource {
    Image(Rc<[u8]>),
    Host(String),
}

/// Mount metadata: where the FNT/FAT live in the image, and how to open a
/// fresh [`RawReader`] onto it. Replaces the original firmware's process-wide
/// globals — every directory iterator and file handle holds its own reader,
/// cloning only the cheap parts of this value (offsets by value, the image
/// source by `Rc` or a copied host path).
pub struct NitroMount {
    pub(crate) fnt_offset: u32,
    pub(crate) fat_offset: u32,
    pub(crate) source: MountSource,
}

impl NitroMount {
    /// Attempt to mount a memory-resident image window.
    pub fn mount_image(image: Rc<[u8]>) -> Result<Self> {
        let mut reader = RawReader::open_image(image.clone());
        let (fnt_offset, fat_offset) = read_header(&mut reader)?;
        info!("mounted nitro image (window) fnt={fnt_offset:#x} fat={fat_offset:#x}");
        Ok(Self {
            fnt_offset,
            fat_offset,
            source: MountSource::Image(image),
        })
    }

    /// Attempt to mount a host-filesystem `.nds` image.
    pub fn mount_host_file(path: &str) -> Result<Self> {
        let mut reader = RawReader::open_host(path)?;
        let (fnt_offset, fat_offset) = read_header(&mut reader)?;
        info!("mounted nitro image (host {path}) fnt={fnt_offset:#x} fat={fat_offset:#x}");
        Ok(Self {
            fnt_offset,
            fat_offset,
            source: MountSource::Host(path.to_string()),
        })
    }

    /// Try the image window first, falling back to a host path if given.
    /// Mirrors the original firmware's startup sequence (§4.4).
    pub fn mount(image: Option<Rc<[u8]>>, host_path: Option<&str>) -> Result<Self> {
        if let Some(image) = image {
            match Self::mount_image(image) {
                Ok(mount) => return Ok(mount),
                Err(e) => warn!("nitro image window mount failed: {e}"),
            }
        }
        match host_path {
            Some(path) => Self::mount_host_file(path),
            None => Err(Error::InvalidImage(ImageError::NoHostPath)),
        }
    }

    pub(crate) fn open_reader(&self) -> Result<RawReader> {
        match &self.source {
            MountSource::Image(bytes) => Ok(RawReader::open_image(bytes.clone())),
            MountSource::Host(path) => RawReader::open_host(path),
        }
    }
}

fn read_header(reader: &mut RawReader) -> Result<(u32, u32)> {
    reader.seek(SIGNATURE_OFFSET as i64, Whence::Set);
    let mut signature = [0u8; 4];
    reader.read_exact(&mut signature)?;
    if &signature != SIGNATURE {
        warn!("nitro signature mismatch: {signature:02x?}");
        return Err(Error::InvalidImage(ImageError::MissingSignature));
    }

    reader.seek(FNT_OFFSET_OFFSET as i64, Whence::Set);
    let mut offsets: Offsets = unsafe { MaybeUninit::uninit().assume_init() };
    reader.read_exact(offsets.as_mut_bytes())?;
    Ok((offsets.fnt_offset.get(), offsets.fat_offset.get()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn golden_image() -> Rc<[u8]> {
        let mut bytes = vec![0u8; 0x200];
        bytes[0xAC..0xB0].copy_from_slice(b"PASS");
        bytes[0x40..0x44].copy_from_slice(&0x100u32.to_le_bytes());
        bytes[0x48..0x4C].copy_from_slice(&0x180u32.to_le_bytes());
        Rc::from(bytes)
    }

    #[test]
    fn mounts_a_valid_image_window() {
        let mount = NitroMount::mount_image(golden_image()).unwrap();
        assert_eq!(mount.fnt_offset, 0x100);
        assert_eq!(mount.fat_offset, 0x180);
    }

    #[test]
    fn rejects_missing_signature() {
        let bytes: Rc<[u8]> = Rc::from(vec![0u8; 0x200]);
        assert!(NitroMount::mount_image(bytes).is_err());
    }

    #[test]
    fn falls_back_to_host_path_when_no_image_given() {
        let err = NitroMount::mount(None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidImage(ImageError::NoHostPath)));
    }
}
