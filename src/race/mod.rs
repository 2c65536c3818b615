//! Two release workers racing a map call over one shared handle.

pub mod coordinator;
pub mod state;
pub mod worker;

pub use coordinator::{RaceCoordinator, RaceRun};
pub use state::{RaceSignal, RaceState, WORKER_COUNT, WorkerStatus};
pub use worker::{RaceContext, ThreadLauncher, WorkerLauncher, run_release_worker};
