//! Capability interface to the external allocator.
//!
//! The race loop only ever talks to these traits, so it runs the same way
//! against the ION device and against a recording fake.

use crate::error::Result;
use crate::models::{Handle, MapDescriptor};

/// Something that can open allocator sessions.
pub trait AllocatorDevice {
    type Session: AllocatorSession;

    fn open_session(&self) -> Result<Self::Session>;
}

/// One open session on the allocator.
///
/// All request methods take `&self` and the session is shared across the
/// release workers. Implementations must not serialize `release` or `map`
/// internally.
pub trait AllocatorSession: Sync {
    /// Allocates `size` bytes aligned to `size` from the heaps in `mask`.
    fn allocate(&self, size: usize, mask: u32, flags: u32) -> Result<Handle>;

    fn release(&self, handle: Handle) -> Result<()>;

    fn map(&self, handle: Handle) -> Result<MapDescriptor>;

    fn close(self) -> Result<()>
    where
        Self: Sized;
}
