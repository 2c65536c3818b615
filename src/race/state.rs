//! Polled signal and status slots shared between the coordinator and the
//! release workers.
//!
//! Everything is a plain atomic. Waiters spin on these with short sleeps;
//! there is deliberately no condvar or mutex here.

use std::sync::atomic::{AtomicU8, Ordering};

pub const WORKER_COUNT: usize = 2;

/// Command broadcast by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RaceSignal {
    Idle = 0,
    Go = 1,
    Abort = 2,
}

impl RaceSignal {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => RaceSignal::Go,
            2 => RaceSignal::Abort,
            _ => RaceSignal::Idle,
        }
    }
}

/// Progress of one release worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WorkerStatus {
    NotStarted = 0,
    Ready = 1,
    Done = 2,
}

impl WorkerStatus {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => WorkerStatus::Ready,
            2 => WorkerStatus::Done,
            _ => WorkerStatus::NotStarted,
        }
    }
}

#[derive(Debug)]
pub struct RaceState {
    signal: AtomicU8,
    status: [AtomicU8; WORKER_COUNT],
}

impl RaceState {
    pub const fn new() -> Self {
        Self {
            signal: AtomicU8::new(RaceSignal::Idle as u8),
            status: [
                AtomicU8::new(WorkerStatus::NotStarted as u8),
                AtomicU8::new(WorkerStatus::NotStarted as u8),
            ],
        }
    }

    /// Puts both slots back to not-started and the signal back to idle.
    ///
    /// Only valid while no worker of the previous iteration is alive.
    pub fn reset(&self) {
        for slot in &self.status {
            slot.store(WorkerStatus::NotStarted as u8, Ordering::SeqCst);
        }
        self.signal.store(RaceSignal::Idle as u8, Ordering::SeqCst);
    }

    pub fn signal(&self) -> RaceSignal {
        RaceSignal::from_raw(self.signal.load(Ordering::SeqCst))
    }

    pub fn set_signal(&self, signal: RaceSignal) {
        self.signal.store(signal as u8, Ordering::SeqCst);
    }

    pub fn status(&self, index: usize) -> WorkerStatus {
        WorkerStatus::from_raw(self.status[index].load(Ordering::SeqCst))
    }

    pub fn set_status(&self, index: usize, status: WorkerStatus) {
        self.status[index].store(status as u8, Ordering::SeqCst);
    }

    pub fn statuses(&self) -> [WorkerStatus; WORKER_COUNT] {
        std::array::from_fn(|index| self.status(index))
    }

    /// True once every worker in `workers` has reached `status`.
    pub fn all_at(&self, workers: impl IntoIterator<Item = usize>, status: WorkerStatus) -> bool {
        workers.into_iter().all(|index| self.status(index) == status)
    }
}

impl Default for RaceState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_idle() {
        let state = RaceState::new();
        assert_eq!(state.signal(), RaceSignal::Idle);
        assert_eq!(state.statuses(), [WorkerStatus::NotStarted; WORKER_COUNT]);
    }

    #[test]
    fn test_statuses_follow_slots() {
        let state = RaceState::new();
        state.set_status(1, WorkerStatus::Done);
        let statuses = state.statuses();
        assert_eq!(statuses.len(), WORKER_COUNT);
        assert_eq!(statuses[0], WorkerStatus::NotStarted);
        assert_eq!(statuses[1], WorkerStatus::Done);
    }

    #[test]
    fn test_reset_clears_everything() {
        let state = RaceState::new();
        state.set_signal(RaceSignal::Abort);
        state.set_status(0, WorkerStatus::Done);
        state.set_status(1, WorkerStatus::Ready);

        state.reset();

        assert_eq!(state.signal(), RaceSignal::Idle);
        assert_eq!(state.statuses(), [WorkerStatus::NotStarted; 2]);
    }

    #[test]
    fn test_all_at() {
        let state = RaceState::new();
        state.set_status(0, WorkerStatus::Ready);
        assert!(state.all_at([0], WorkerStatus::Ready));
        assert!(!state.all_at(0..WORKER_COUNT, WorkerStatus::Ready));
        state.set_status(1, WorkerStatus::Ready);
        assert!(state.all_at(0..WORKER_COUNT, WorkerStatus::Ready));
        // empty set is trivially reached
        assert!(state.all_at(std::iter::empty(), WorkerStatus::Done));
    }

    #[test]
    fn test_raw_round_trip() {
        for signal in [RaceSignal::Idle, RaceSignal::Go, RaceSignal::Abort] {
            assert_eq!(RaceSignal::from_raw(signal as u8), signal);
        }
        assert_eq!(WorkerStatus::from_raw(7), WorkerStatus::NotStarted);
    }
}
