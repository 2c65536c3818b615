use std::io;
use std::thread;

use log::trace;

use super::state::{RaceSignal, RaceState, WORKER_COUNT, WorkerStatus};
use super::worker::{RaceContext, WorkerLauncher, run_release_worker};
use crate::config::HarnessConfig;
use crate::error::{RaceError, Result};
use crate::models::{Handle, RegionCategory};
use crate::session::AllocatorSession;
use crate::utils::spin_until;

/// How the race section of an iteration ended.
#[derive(Debug)]
pub enum RaceRun {
    /// Both workers ran and the map call went out after go.
    Completed { map_succeeded: bool },
    /// Worker `index` could not be spawned. Any worker already running was
    /// told to abort and has reached done.
    Aborted { index: usize, source: io::Error },
}

/// Drives one allocate → race sequence against an open session.
pub struct RaceCoordinator<'a, L> {
    config: &'a HarnessConfig,
    state: &'a RaceState,
    launcher: &'a L,
}

impl<'a, L: WorkerLauncher> RaceCoordinator<'a, L> {
    pub fn new(config: &'a HarnessConfig, state: &'a RaceState, launcher: &'a L) -> Self {
        Self {
            config,
            state,
            launcher,
        }
    }

    /// Tries each region category in table order and stops at the first
    /// allocation that succeeds.
    pub fn allocate<S: AllocatorSession>(&self, session: &S) -> Result<(RegionCategory, Handle)> {
        for category in self.config.regions.iter() {
            match session.allocate(
                self.config.alloc_size,
                category.mask(),
                self.config.alloc_flags,
            ) {
                Ok(handle) => {
                    trace!("allocated handle {} from {}", handle, category);
                    return Ok((*category, handle));
                }
                Err(e) => trace!("{}: {}", category, e),
            }
        }
        Err(RaceError::AllocExhausted)
    }

    /// Spawns both release workers, releases them together and maps `handle`
    /// while they free it.
    ///
    /// Returns once every started worker has reached done.
    pub fn race<S: AllocatorSession>(&self, session: &S, handle: Handle) -> RaceRun {
        let state = self.state;
        let poll = self.config.coordinator_poll;
        let ctx = RaceContext {
            session,
            handle,
            state,
            poll: self.config.worker_poll,
            release_delay: self.config.release_delay,
        };

        thread::scope(|scope| {
            let mut started = Vec::with_capacity(WORKER_COUNT);
            for index in 0..WORKER_COUNT {
                let ctx = &ctx;
                match self
                    .launcher
                    .launch(scope, index, move || run_release_worker(index, ctx))
                {
                    Ok(_) => started.push(index),
                    Err(source) => {
                        state.set_signal(RaceSignal::Abort);
                        spin_until(poll, || {
                            state.all_at(started.iter().copied(), WorkerStatus::Done)
                        });
                        return RaceRun::Aborted { index, source };
                    }
                }
            }

            spin_until(poll, || state.all_at(0..WORKER_COUNT, WorkerStatus::Ready));
            state.set_signal(RaceSignal::Go);
            // Races both releases. The result is only inspected afterwards.
            let mapped = session.map(handle);

            spin_until(poll, || state.all_at(0..WORKER_COUNT, WorkerStatus::Done));
            trace!("map of {} during race: {:?}", handle, mapped.as_ref().map(|d| d.raw_fd()));
            RaceRun::Completed {
                map_succeeded: mapped.is_ok(),
            }
        })
    }
}
