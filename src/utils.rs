use std::thread;
use std::time::Duration;

/// Spins until `done` returns true, sleeping `interval` between checks.
///
/// Returns the number of sleeps taken. No timeout.
pub fn spin_until(interval: Duration, mut done: impl FnMut() -> bool) -> u64 {
    let mut spins = 0;
    while !done() {
        thread::sleep(interval);
        spins += 1;
    }
    spins
}
