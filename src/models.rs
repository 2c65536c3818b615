use std::fmt;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

/// Opaque allocation handle returned by the allocator.
///
/// Copyable on purpose: both release workers and the coordinator hold the
/// same value, and nothing stops it from being used after it was freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Handle(pub i32);

impl Handle {
    /// Handle value the allocator never hands out.
    pub const INVALID: Handle = Handle(0);

    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a successful map request.
///
/// The real device hands back a dma-buf fd which is closed on drop. Fakes
/// return a descriptor without an fd.
#[derive(Debug)]
pub struct MapDescriptor {
    fd: Option<OwnedFd>,
}

impl MapDescriptor {
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self { fd: Some(fd) }
    }

    pub fn detached() -> Self {
        Self { fd: None }
    }

    pub fn raw_fd(&self) -> Option<RawFd> {
        self.fd.as_ref().map(|fd| fd.as_raw_fd())
    }
}

/// A named class of memory regions, selected by a single mask bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionCategory {
    pub name: &'static str,
    pub id: u32,
}

impl RegionCategory {
    pub const fn new(name: &'static str, id: u32) -> Self {
        Self { name, id }
    }

    pub const fn mask(&self) -> u32 {
        1 << self.id
    }
}

impl fmt::Display for RegionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id {})", self.name, self.id)
    }
}

/// Ordered allocation candidates, tried first to last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionTable {
    categories: Vec<RegionCategory>,
}

impl RegionTable {
    pub fn new(categories: impl Into<Vec<RegionCategory>>) -> Self {
        Self {
            categories: categories.into(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionCategory> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl From<&[RegionCategory]> for RegionTable {
    fn from(categories: &[RegionCategory]) -> Self {
        Self::new(categories.to_vec())
    }
}

/// How a single allocate → race → cleanup cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Both workers ran against the handle while it was being mapped.
    Raced {
        category: RegionCategory,
        handle: Handle,
        map_succeeded: bool,
    },
    /// No region category could serve the allocation.
    AllocationFailed,
    /// A release worker could not be spawned; started workers were aborted.
    SpawnFailed { index: usize },
}

impl IterationOutcome {
    pub fn raced(&self) -> bool {
        matches!(self, IterationOutcome::Raced { .. })
    }
}
