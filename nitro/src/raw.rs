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

//! A small stateful positioned reader over either a memory-resident image
//! window or a host file, per the Nitro raw reader design.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::rc::Rc;

use nitrofat_err::{Error, ImageError, IoError, Result};

#[derive(Debug, Clone, Copy)]
pub enum Whence {
    Set,
    Cur,
}

enum Source {
    ImageWindow(Rc<[u8]>),
    HostFile(File),
}

/// A positioned reader into a Nitro image.
///
/// In `ImageWindow` mode, reads are plain memory copies and never fail;
/// requesting past the end of the image yields a short read rather than an
/// error (the higher layers are contractually responsible for not doing
/// that — see the crate-level docs). In `HostFile` mode, reads are
/// positioned host filesystem reads and can fail with [`Error::Io`].
pub struct RawReader {
    source: Source,
    pos: u32,
}

impl RawReader {
    pub(crate) fn open_image(image: Rc<[u8]>) -> Self {
        Self {
            source: Source::ImageWindow(image),
            pos: 0,
        }
    }

    pub(crate) fn open_host(path: &str) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::InvalidImage(ImageError::HostOpenFailed(e)))?;
        Ok(Self {
            source: Source::HostFile(file),
            pos: 0,
        })
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn seek(&mut self, pos: i64, whence: Whence) {
        self.pos = match whence {
            Whence::Set => pos as u32,
            Whence::Cur => (self.pos as i64 + pos) as u32,
        };
    }

    /// Read up to `buf.len()` bytes, advancing the position by however many
    /// were actually read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match &mut self.source {
            Source::ImageWindow(bytes) => {
                let start = self.pos as usize;
                let available = bytes.len().saturating_sub(start);
                let n = buf.len().min(available);
                buf[..n].copy_from_slice(&bytes[start..start + n]);
                n
            }
            Source::HostFile(file) => file
                .read_at(buf, self.pos as u64)
                .map_err(|e| Error::Io(IoError::Host(e)))?,
        };
        self.pos += n as u32;
        Ok(n)
    }

    /// Read exactly `buf.len()` bytes, failing with
    /// [`ImageError::Truncated`] if the source runs out first.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let at = self.pos;
        let n = self.read(buf)?;
        if n != buf.len() {
            return Err(Error::InvalidImage(ImageError::Truncated { at }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(bytes: &[u8]) -> Rc<[u8]> {
        Rc::from(bytes)
    }

    #[test]
    fn image_window_read_advances_position() {
        let img = image(&[1, 2, 3, 4, 5]);
        let mut r = RawReader::open_image(img);
        let mut buf = [0u8; 2];
        assert_eq!(r.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(r.pos(), 2);
        assert_eq!(r.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [3, 4]);
    }

    #[test]
    fn image_window_short_read_past_end_is_not_an_error() {
        let img = image(&[1, 2, 3]);
        let mut r = RawReader::open_image(img);
        r.seek(2, Whence::Set);
        let mut buf = [0xFFu8; 4];
        let n = r.read(&mut buf).unwrap();
        assert_eq!(n, 1);
        assert_eq!(buf[0], 3);
    }

    #[test]
    fn seek_cur_is_relative() {
        let img = image(&[0, 1, 2, 3, 4, 5]);
        let mut r = RawReader::open_image(img);
        r.seek(4, Whence::Set);
        r.seek(-2, Whence::Cur);
        let mut buf = [0u8; 1];
        r.read(&mut buf).unwrap();
        assert_eq!(buf[0], 2);
    }

    #[test]
    fn read_exact_fails_on_truncated_image() {
        let img = image(&[1, 2]);
        let mut r = RawReader::open_image(img);
        let mut buf = [0u8; 4];
        assert!(r.read_exact(&mut buf).is_err());
    }
}
