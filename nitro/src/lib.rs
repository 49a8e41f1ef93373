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

//! Read-only Nitro (cartridge embedded) filesystem.
//!
//! A Nitro image packs a hierarchical name table (FNT) and a flat file
//! allocation table (FAT) inside a single binary blob. This crate mounts
//! such an image — either as an in-memory window or a host `.nds` file —
//! and resolves POSIX-style paths into byte ranges of that image.
//!
//! There is no write path: the image is treated as immutable end to end.

mod dir;
mod handle;
mod mount;
mod path;
mod raw;

pub use dir::{DirEntry, DirEntryKind, DirIterator, ROOT_DIR_ID};
pub use handle::{FileHandle, FileStat};
pub use mount::NitroMount;
pub use raw::{RawReader, Whence};

/// The logical device name Nitro paths are prefixed with, e.g. `nitro:/sub/file.txt`.
pub const DEVICE_NAME: &str = "nitro";
