use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RaceError {
    #[error("Failed to open allocator device {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Allocation from heap mask 0x{mask:08x} failed: {source}")]
    AllocFailed {
        mask: u32,
        #[source]
        source: Errno,
    },

    #[error("Allocation failed for every region category")]
    AllocExhausted,

    #[error("Free of handle {handle} failed: {source}")]
    FreeFailed {
        handle: i32,
        #[source]
        source: Errno,
    },

    #[error("Map of handle {handle} failed: {source}")]
    MapFailed {
        handle: i32,
        #[source]
        source: Errno,
    },

    #[error("Close of allocator fd {fd} failed: {source}")]
    CloseFailed {
        fd: i32,
        #[source]
        source: Errno,
    },

    #[error("Failed to spawn release worker {index}")]
    ThreadSpawnFailed {
        index: usize,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RaceError>;
