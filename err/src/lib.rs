//! Error taxonomy shared by the sector cache and the Nitro filesystem.
//!
//! Mirrors the kinds catalogued in the design: every fallible operation in
//! this workspace returns [`Result<T>`], never panics or retries silently.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("device I/O: {0}")]
    Io(#[from] IoError),
    #[error("no such path")]
    NoSuchPath,
    #[error("invalid image: {0}")]
    InvalidImage(#[from] ImageError),
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
    #[error("resource exhausted")]
    ResourceExhausted,
}

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error("read failed at sector {sector} ({count} sectors)")]
    ReadFailed { sector: u32, count: u32 },
    #[error("write failed at sector {sector} ({count} sectors)")]
    WriteFailed { sector: u32, count: u32 },
    #[error("host file error: {0}")]
    Host(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("missing \"PASS\" signature")]
    MissingSignature,
    #[error("no host image path provided")]
    NoHostPath,
    #[error("failed to open host image: {0}")]
    HostOpenFailed(std::io::Error),
    #[error("image truncated at byte offset {at}")]
    Truncated { at: u32 },
}

#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    #[error("partial sector access (offset {offset}, len {len}) exceeds sector size {sector_size}")]
    PartialSectorOutOfRange {
        offset: u32,
        len: u32,
        sector_size: u32,
    },
    #[error("unsupported little-endian width {0} (must be 1, 2, or 4)")]
    InvalidEndianWidth(u32),
    #[error("seek past end of file")]
    SeekPastEnd,
}

pub type Result<T> = core::result::Result<T, Error>;
