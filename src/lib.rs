//! Reproduction harness for the ION free/map handle race.
//!
//! Each iteration opens the allocator, allocates one page, lets two threads
//! free the handle while the main thread maps it, then cleans up and starts
//! over. A crash or hang of the device is the signal that the race hit.

pub use config::{HarnessConfig, HarnessConfigBuilder, PAGE_SIZE};
pub use driver::{IterationPhase, RetryDriver, RunSummary, StopRequest, request_stop};
pub use error::{RaceError, Result};
pub use ion::{IonDevice, IonSession};
pub use models::{Handle, IterationOutcome, MapDescriptor, RegionCategory, RegionTable};
pub use race::{RaceSignal, RaceState, ThreadLauncher, WorkerLauncher, WorkerStatus};
pub use session::{AllocatorDevice, AllocatorSession};

pub mod config;
pub mod driver;
pub mod error;
pub mod ion;
pub mod models;
pub mod race;
pub mod session;
pub mod utils;
