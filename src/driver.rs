//! The allocate → race → cleanup retry loop.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, trace, warn};

use crate::config::HarnessConfig;
use crate::error::{RaceError, Result};
use crate::models::{Handle, IterationOutcome};
use crate::race::{RaceCoordinator, RaceRun, RaceState, ThreadLauncher, WorkerLauncher};
use crate::session::{AllocatorDevice, AllocatorSession};

/// Phases of a single iteration.
///
/// `Start → SessionOpen → Allocated → Racing → Cleanup → Restart`, with
/// `SessionOpen → Cleanup` when no region could serve the allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationPhase {
    Start,
    SessionOpen,
    Allocated,
    Racing,
    Cleanup,
    Restart,
}

impl IterationPhase {
    pub fn can_advance_to(self, next: IterationPhase) -> bool {
        use IterationPhase::*;
        matches!(
            (self, next),
            (Start, SessionOpen)
                | (SessionOpen, Allocated)
                | (SessionOpen, Cleanup)
                | (Allocated, Racing)
                | (Racing, Cleanup)
                | (Cleanup, Restart)
        )
    }

    fn advance(&mut self, next: IterationPhase) {
        debug_assert!(
            self.can_advance_to(next),
            "invalid transition {} -> {}",
            self,
            next
        );
        trace!("{} -> {}", self, next);
        *self = next;
    }
}

impl fmt::Display for IterationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IterationPhase::Start => "start",
            IterationPhase::SessionOpen => "session-open",
            IterationPhase::Allocated => "allocated",
            IterationPhase::Racing => "racing",
            IterationPhase::Cleanup => "cleanup",
            IterationPhase::Restart => "restart",
        };
        f.write_str(name)
    }
}

/// Counters over every iteration the driver has run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub raced: u64,
    pub maps_succeeded: u64,
    pub allocation_failures: u64,
    pub spawn_failures: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &IterationOutcome) {
        self.iterations += 1;
        match outcome {
            IterationOutcome::Raced { map_succeeded, .. } => {
                self.raced += 1;
                if *map_succeeded {
                    self.maps_succeeded += 1;
                }
            }
            IterationOutcome::AllocationFailed => self.allocation_failures += 1,
            IterationOutcome::SpawnFailed { .. } => self.spawn_failures += 1,
        }
    }
}

/// What an interrupt asked the driver to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// Finish the current iteration, then stop.
    Graceful,
    /// A stop was already pending; the iteration is likely hung.
    Forced,
}

/// Clears `running`. A second call while the first is still pending is
/// reported as [`StopRequest::Forced`].
pub fn request_stop(running: &AtomicBool) -> StopRequest {
    if running.swap(false, Ordering::SeqCst) {
        StopRequest::Graceful
    } else {
        StopRequest::Forced
    }
}

/// Repeats the race against fresh sessions until stopped.
pub struct RetryDriver<D, L = ThreadLauncher> {
    device: D,
    config: HarnessConfig,
    state: Arc<RaceState>,
    launcher: L,
    running: Arc<AtomicBool>,
}

impl<D: AllocatorDevice> RetryDriver<D> {
    pub fn new(device: D, config: HarnessConfig) -> Self {
        Self {
            device,
            config,
            state: Arc::new(RaceState::new()),
            launcher: ThreadLauncher,
            running: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl<D: AllocatorDevice, L: WorkerLauncher> RetryDriver<D, L> {
    pub fn with_launcher<M: WorkerLauncher>(self, launcher: M) -> RetryDriver<D, M> {
        RetryDriver {
            device: self.device,
            config: self.config,
            state: self.state,
            launcher,
            running: self.running,
        }
    }

    /// Shares `state` with the driver instead of a private one.
    pub fn with_state(mut self, state: Arc<RaceState>) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &Arc<RaceState> {
        &self.state
    }

    /// Flag checked between iterations. Clearing it stops [`run`](Self::run)
    /// after the current iteration has cleaned up.
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Runs iterations until the running flag is cleared or the configured
    /// limit is reached. Without either it never returns `Ok`.
    ///
    /// Fails only when a session cannot be opened.
    pub fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        info!(
            "racing {}-byte allocations over {} region categories",
            self.config.alloc_size,
            self.config.regions.len()
        );

        while self.running.load(Ordering::SeqCst) {
            if let Some(limit) = self.config.max_iterations
                && summary.iterations >= limit
            {
                break;
            }

            let outcome = self.run_iteration()?;
            summary.record(&outcome);

            let every = self.config.progress_interval;
            if every > 0 && summary.iterations % every == 0 {
                info!(
                    "{} iterations, {} raced, {} maps succeeded, {} allocation failures",
                    summary.iterations,
                    summary.raced,
                    summary.maps_succeeded,
                    summary.allocation_failures
                );
            }
        }

        info!("race loop stopped after {} iterations", summary.iterations);
        Ok(summary)
    }

    /// One full allocate → race → cleanup cycle on a fresh session.
    pub fn run_iteration(&self) -> Result<IterationOutcome> {
        let mut phase = IterationPhase::Start;
        self.state.reset();

        let session = self.device.open_session()?;
        phase.advance(IterationPhase::SessionOpen);

        let coordinator = RaceCoordinator::new(&self.config, &self.state, &self.launcher);
        let (outcome, handle) = match coordinator.allocate(&session) {
            Ok((category, handle)) => {
                phase.advance(IterationPhase::Allocated);
                phase.advance(IterationPhase::Racing);
                let outcome = match coordinator.race(&session, handle) {
                    RaceRun::Completed { map_succeeded } => IterationOutcome::Raced {
                        category,
                        handle,
                        map_succeeded,
                    },
                    RaceRun::Aborted { index, source } => {
                        warn!("{}", RaceError::ThreadSpawnFailed { index, source });
                        IterationOutcome::SpawnFailed { index }
                    }
                };
                (outcome, handle)
            }
            Err(e) => {
                debug!("{}", e);
                (IterationOutcome::AllocationFailed, Handle::INVALID)
            }
        };

        phase.advance(IterationPhase::Cleanup);
        self.cleanup(session, handle);
        phase.advance(IterationPhase::Restart);

        debug!("iteration finished: {:?}", outcome);
        Ok(outcome)
    }

    fn cleanup(&self, session: D::Session, handle: Handle) {
        if let Err(e) = session.release(handle) {
            trace!("cleanup release: {}", e);
        }
        if let Err(e) = session.close() {
            warn!("failed to close session: {}", e);
        }
    }
}
