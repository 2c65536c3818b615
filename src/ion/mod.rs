//! Android ION allocator: kernel ABI and device session.

pub mod abi;
pub mod device;

pub use abi::{ION_FLAG_FORCE_CONTIGUOUS, ION_FLAG_SECURE, MSM_HEAP_TABLE, heap_id};
pub use device::{DEFAULT_ION_PATH, IonDevice, IonSession};
