// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Owns an [`IoController`] and a [`Platform`], and runs the worker task
//! of spec.md §4.1/§5: a dedicated thread that blocks on a bounded wake
//! notification and performs one `check_devices` sweep on every wake or
//! timeout.
//!
//! The fabric ISR protocol is a single-slot, lossless wake: multiple
//! interrupts arriving before the worker gets around to waking collapse
//! into one pending wake, which is fine because a sweep rescans every
//! device's flag regardless of which one changed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use ringbuf::ringbuf;
use socdp8_hal_api::Platform;
use socdp8_io::IoController;

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Trace {
    Interrupt,
    Sweep,
}

ringbuf!(SWEEPS, Trace, 32, Trace::Sweep);

/// Snapshot of the worker's interrupt/sweep trace, oldest first. Backs the
/// shell's `debug ringbuf` command.
pub fn sweeps_snapshot() -> Vec<ringbuf::RingbufEntry<Trace>> {
    SWEEPS.snapshot()
}

/// A bounded, lossless one-slot wake signal. `notify` can be called from
/// an ISR context (here, a closure fired by [`MemPlatform::raise_interrupt`]
/// or an equivalent real handler) any number of times between waits; the
/// waiter observes at most one pending wake per `wait_timeout` call.
#[derive(Default)]
struct WakeSignal {
    pending: Mutex<bool>,
    condvar: Condvar,
}

impl WakeSignal {
    fn notify(&self) {
        let mut pending = self.pending.lock().unwrap();
        *pending = true;
        self.condvar.notify_one();
    }

    /// Blocks until woken or `timeout` elapses, whichever first. Returns
    /// whether a wake was actually pending (vs. a bare timeout); the
    /// worker treats both the same way, but tests find this useful.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let pending = self.pending.lock().unwrap();
        let (mut pending, _) = self
            .condvar
            .wait_timeout_while(pending, timeout, |p| !*p)
            .unwrap();
        let was_pending = *pending;
        *pending = false;
        was_pending
    }
}

/// The worker task plus its platform/controller. Dropping or calling
/// [`IoServer::teardown`] stops the thread and restores the platform to
/// having no installed interrupt handler's side effects running.
pub struct IoServer<P: Platform + 'static> {
    controller: Arc<Mutex<IoController<P>>>,
    wake: Arc<WakeSignal>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<P: Platform + 'static> IoServer<P> {
    /// Wraps `platform` in a fresh [`IoController`]. The worker thread is
    /// not started yet; register every device first via
    /// [`IoServer::controller`], then call [`IoServer::start`].
    pub fn new(platform: P) -> Self {
        IoServer {
            controller: Arc::new(Mutex::new(IoController::new(platform))),
            wake: Arc::new(WakeSignal::default()),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Locks the controller for device registration or direct register
    /// I/O (e.g. the shell's `dump`/`state` commands reaching through to
    /// the platform).
    pub fn controller(&self) -> MutexGuard<'_, IoController<P>> {
        self.controller.lock().unwrap()
    }

    pub fn controller_handle(&self) -> Arc<Mutex<IoController<P>>> {
        self.controller.clone()
    }

    /// Installs the fabric interrupt handler (a wake-only ISR, per
    /// spec.md §4.1: "the ISR performs no device work") and spawns the
    /// worker thread. Idempotent only in the sense that calling it twice
    /// spawns a second thread; callers should call it once after every
    /// device is registered.
    pub fn start(&mut self) {
        let wake = self.wake.clone();
        self.controller
            .lock()
            .unwrap()
            .platform_mut()
            .set_io_interrupt_handler(Box::new(move || {
                ringbuf::ringbuf_entry!(SWEEPS, Trace::Interrupt);
                wake.notify();
            }));

        self.running.store(true, Ordering::SeqCst);
        let controller = self.controller.clone();
        let wake = self.wake.clone();
        let running = self.running.clone();
        self.worker = Some(std::thread::spawn(move || {
            let timeout = Duration::from_millis(IoController::<P>::TASK_DELAY_MS);
            while running.load(Ordering::SeqCst) {
                wake.wait_timeout(timeout);
                ringbuf::ringbuf_entry!(SWEEPS, Trace::Sweep);
                controller.lock().unwrap().check_devices();
            }
        }));
    }

    /// Stops the worker thread and joins it. Safe to call even if
    /// [`IoServer::start`] was never called.
    pub fn teardown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    /// Runs exactly one sweep on the calling thread, bypassing the
    /// worker. Used by tests that drive a virtual clock and want
    /// deterministic control over when a sweep happens.
    pub fn sweep_once(&self) {
        self.controller.lock().unwrap().check_devices();
    }
}

impl<P: Platform + 'static> Drop for IoServer<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}
