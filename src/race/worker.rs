use std::io;
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::Duration;

use log::trace;

use super::state::{RaceSignal, RaceState, WorkerStatus};
use crate::models::Handle;
use crate::session::AllocatorSession;
use crate::utils::spin_until;

/// Everything a release worker looks at during one iteration.
///
/// Shared by reference between the coordinator and both workers; none of it
/// is locked.
pub struct RaceContext<'a, S> {
    pub session: &'a S,
    pub handle: Handle,
    pub state: &'a RaceState,
    pub poll: Duration,
    pub release_delay: Duration,
}

/// Body of release worker `index`.
///
/// `not-started → ready → (wait for go) → released or skipped → done`
pub fn run_release_worker<S: AllocatorSession>(index: usize, ctx: &RaceContext<'_, S>) {
    let state = ctx.state;
    state.set_status(index, WorkerStatus::Ready);

    let mut signal = RaceSignal::Idle;
    spin_until(ctx.poll, || {
        signal = state.signal();
        signal != RaceSignal::Idle
    });

    if signal == RaceSignal::Go {
        thread::sleep(ctx.release_delay);
        // Losing the race is expected; the other worker may have freed it.
        let result = ctx.session.release(ctx.handle);
        trace!("worker {} released {}: ok={}", index, ctx.handle, result.is_ok());
    } else {
        trace!("worker {} aborted", index);
    }

    state.set_status(index, WorkerStatus::Done);
}

/// Starts release workers inside a thread scope.
pub trait WorkerLauncher {
    fn launch<'scope, 'env, F>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        index: usize,
        body: F,
    ) -> io::Result<ScopedJoinHandle<'scope, ()>>
    where
        F: FnOnce() + Send + 'scope;
}

/// Launches each worker on its own named OS thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadLauncher;

impl WorkerLauncher for ThreadLauncher {
    fn launch<'scope, 'env, F>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        index: usize,
        body: F,
    ) -> io::Result<ScopedJoinHandle<'scope, ()>>
    where
        F: FnOnce() + Send + 'scope,
    {
        thread::Builder::new()
            .name(format!("ion-free-{}", index))
            .spawn_scoped(scope, body)
    }
}
