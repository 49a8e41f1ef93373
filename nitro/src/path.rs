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

//! Path tokenizing shared by the directory iterator and file handle.

/// Strip a leading `device:` prefix (e.g. `nitro:/sub/hello.txt` -> `/sub/hello.txt`).
/// A path with no colon is returned unchanged.
pub fn strip_device_prefix(path: &str) -> &str {
    match path.find(':') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Split off non-empty path components, collapsing runs of `/`.
pub fn tokenize(path: &str) -> impl Iterator<Item = &str> {
    strip_device_prefix(path).split('/').filter(|s| !s.is_empty())
}

/// Split `dir_path:file_name` at the last `/` (or, failing that, the last
/// `:`), returning `(dir_path, file_name)`. Used by [`crate::handle::FileHandle::open`].
pub fn split_parent(path: &str) -> (&str, &str) {
    let stripped = strip_device_prefix(path);
    match stripped.rfind('/') {
        Some(idx) => (&stripped[..idx], &stripped[idx + 1..]),
        None => ("", stripped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_device_prefix() {
        assert_eq!(strip_device_prefix("nitro:/sub/hello.txt"), "/sub/hello.txt");
        assert_eq!(strip_device_prefix("/sub/hello.txt"), "/sub/hello.txt");
    }

    #[test]
    fn tokenizes_collapsing_slashes() {
        let toks: Vec<&str> = tokenize("nitro://sub//hello.txt").collect();
        assert_eq!(toks, vec!["sub", "hello.txt"]);
    }

    #[test]
    fn tokenizes_root_as_empty() {
        assert_eq!(tokenize("nitro:/").count(), 0);
        assert_eq!(tokenize("").count(), 0);
    }

    #[test]
    fn splits_parent_and_name() {
        assert_eq!(split_parent("nitro:/sub/hello.txt"), ("/sub", "hello.txt"));
        assert_eq!(split_parent("nitro:README"), ("", "README"));
    }
}
