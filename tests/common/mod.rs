#![allow(dead_code)]

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::Duration;

use ionrace::{
    AllocatorDevice, AllocatorSession, Handle, MapDescriptor, RaceError, RaceSignal, RaceState,
    Result, ThreadLauncher, WorkerLauncher, WorkerStatus,
};
use nix::errno::Errno;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open,
    Allocate {
        mask: u32,
        statuses: [WorkerStatus; 2],
    },
    Release {
        handle: Handle,
        ok: bool,
        signal: RaceSignal,
    },
    Map {
        handle: Handle,
        statuses: [WorkerStatus; 2],
        signal: RaceSignal,
    },
    Close,
}

/// Everything the fake observed, shared by the device and its sessions.
#[derive(Default)]
pub struct FakeLog {
    calls: Mutex<Vec<Call>>,
    live: Mutex<HashSet<Handle>>,
    open_sessions: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    next_handle: AtomicUsize,
}

impl FakeLog {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn live_handles(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn allocate_masks(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Allocate { mask, .. } => Some(mask),
                _ => None,
            })
            .collect()
    }

    /// Signal value seen by each release, in call order.
    pub fn release_signals(&self) -> Vec<RaceSignal> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Release { signal, .. } => Some(signal),
                _ => None,
            })
            .collect()
    }

    pub fn releases(&self) -> Vec<Handle> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Release { handle, .. } => Some(handle),
                _ => None,
            })
            .collect()
    }
}

/// In-memory allocator that records calls and can fail on demand.
#[derive(Clone)]
pub struct FakeDevice {
    pub log: Arc<FakeLog>,
    state: Arc<RaceState>,
    fail_masks: Vec<u32>,
    release_hold: Duration,
}

impl FakeDevice {
    pub fn new(state: Arc<RaceState>) -> Self {
        Self {
            log: Arc::new(FakeLog::default()),
            state,
            fail_masks: Vec::new(),
            release_hold: Duration::ZERO,
        }
    }

    /// Allocations from any of `masks` fail with ENOMEM.
    pub fn failing(mut self, masks: impl IntoIterator<Item = u32>) -> Self {
        self.fail_masks.extend(masks);
        self
    }

    /// Each release stays in flight for `hold`.
    pub fn release_hold(mut self, hold: Duration) -> Self {
        self.release_hold = hold;
        self
    }
}

impl AllocatorDevice for FakeDevice {
    type Session = FakeSession;

    fn open_session(&self) -> Result<FakeSession> {
        self.log.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.log.push(Call::Open);
        Ok(FakeSession {
            device: self.clone(),
        })
    }
}

pub struct FakeSession {
    device: FakeDevice,
}

impl AllocatorSession for FakeSession {
    fn allocate(&self, size: usize, mask: u32, _flags: u32) -> Result<Handle> {
        let log = &self.device.log;
        assert_eq!(size, 4096);
        log.push(Call::Allocate {
            mask,
            statuses: self.device.state.statuses(),
        });
        if self.device.fail_masks.contains(&mask) {
            return Err(RaceError::AllocFailed {
                mask,
                source: Errno::ENOMEM,
            });
        }
        let handle = Handle(log.next_handle.fetch_add(1, Ordering::SeqCst) as i32 + 1);
        log.live.lock().unwrap().insert(handle);
        Ok(handle)
    }

    fn release(&self, handle: Handle) -> Result<()> {
        let log = &self.device.log;
        let signal = self.device.state.signal();
        let now = log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        log.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.device.release_hold.is_zero() {
            thread::sleep(self.device.release_hold);
        }
        let ok = log.live.lock().unwrap().remove(&handle);
        log.in_flight.fetch_sub(1, Ordering::SeqCst);
        log.push(Call::Release { handle, ok, signal });
        if ok {
            Ok(())
        } else {
            Err(RaceError::FreeFailed {
                handle: handle.raw(),
                source: Errno::EINVAL,
            })
        }
    }

    fn map(&self, handle: Handle) -> Result<MapDescriptor> {
        let log = &self.device.log;
        log.push(Call::Map {
            handle,
            statuses: self.device.state.statuses(),
            signal: self.device.state.signal(),
        });
        if log.live.lock().unwrap().contains(&handle) {
            Ok(MapDescriptor::detached())
        } else {
            Err(RaceError::MapFailed {
                handle: handle.raw(),
                source: Errno::EINVAL,
            })
        }
    }

    fn close(self) -> Result<()> {
        self.device.log.push(Call::Close);
        self.device.log.open_sessions.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher that refuses to start worker `fail_index`.
pub struct FailingLauncher {
    pub fail_index: usize,
}

impl WorkerLauncher for FailingLauncher {
    fn launch<'scope, 'env, F>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        index: usize,
        body: F,
    ) -> io::Result<ScopedJoinHandle<'scope, ()>>
    where
        F: FnOnce() + Send + 'scope,
    {
        if index == self.fail_index {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "thread limit reached",
            ));
        }
        ThreadLauncher.launch(scope, index, body)
    }
}
