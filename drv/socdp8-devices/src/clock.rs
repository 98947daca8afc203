// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device callbacks gate byte delivery/acceptance on "has enough wall-clock
//! time passed since last time". [`Clock`] lets tests swap wall time for a
//! manually-advanced virtual one (spec.md §2's test tooling notes, carried
//! into SPEC_FULL.md) instead of sleeping in real time to hit a 100 ms or
//! 3 ms window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time since the clock was constructed, in whole milliseconds.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// A clock whose value only moves when a test calls [`VirtualClock::advance_ms`]
/// or [`VirtualClock::set_ms`]; lets S2-style scenarios assert delivery at
/// exact simulated timestamps without real sleeps.
#[derive(Default)]
pub struct VirtualClock(AtomicU64);

impl VirtualClock {
    pub fn new() -> Self {
        VirtualClock(AtomicU64::new(0))
    }

    pub fn set_ms(&self, ms: u64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
