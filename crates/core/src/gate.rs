//! Pause gate and cancellation token shared by one runner and its worker.
//!
//! The worker passes through the gate for every screen/input primitive and
//! at every loop boundary. The controller closes the gate to pause, opens it
//! to resume, and cancels it to stop. Closing waits (bounded) for the one
//! primitive that may be in flight, so once `close` succeeds nothing touches
//! the screen until `open` or `cancel`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{Result, RunError};

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    in_flight: bool,
    cancelled: bool,
}

#[derive(Debug)]
pub struct RunGate {
    state: Mutex<GateState>,
    changed: Condvar,
    epoch: Instant,
    last_beat_ms: AtomicU64,
}

/// Held for the duration of one primitive.
#[must_use]
pub struct InFlight<'a> {
    gate: &'a RunGate,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut st = self.gate.lock();
        st.in_flight = false;
        drop(st);
        self.gate.changed.notify_all();
    }
}

impl Default for RunGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RunGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            changed: Condvar::new(),
            epoch: Instant::now(),
            last_beat_ms: AtomicU64::new(0),
        }
    }

    // The state is three flags, so a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn beat(&self) {
        self.last_beat_ms.store(self.epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    /// Time since the worker last passed through the gate.
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_beat_ms.load(Ordering::Relaxed));
        self.epoch.elapsed().saturating_sub(last)
    }

    fn wait_open(&self) -> Result<MutexGuard<'_, GateState>> {
        let st = self.lock();
        let st = self
            .changed
            .wait_while(st, |s| s.paused && !s.cancelled)
            .unwrap_or_else(|e| e.into_inner());
        if st.cancelled {
            return Err(RunError::Cancelled);
        }
        Ok(st)
    }

    /// Worker side: block while paused, then mark one primitive in flight.
    pub fn enter(&self) -> Result<InFlight<'_>> {
        let mut st = self.wait_open()?;
        st.in_flight = true;
        drop(st);
        self.beat();
        Ok(InFlight { gate: self })
    }

    /// Worker side: a safe point between primitives.
    pub fn checkpoint(&self) -> Result<()> {
        drop(self.wait_open()?);
        self.beat();
        Ok(())
    }

    /// Worker side: sleep up to `duration`, returning early with `Cancelled`
    /// if the run is stopped meanwhile. A pause does not shorten the sleep.
    pub fn idle(&self, duration: Duration) -> Result<()> {
        let st = self.lock();
        let (st, _) = self
            .changed
            .wait_timeout_while(st, duration, |s| !s.cancelled)
            .unwrap_or_else(|e| e.into_inner());
        if st.cancelled {
            return Err(RunError::Cancelled);
        }
        drop(st);
        self.beat();
        Ok(())
    }

    /// Controller side: stop new primitives and wait for the current one.
    /// Returns false (gate reopened) if it is still running after `timeout`.
    pub fn close(&self, timeout: Duration) -> bool {
        let mut st = self.lock();
        st.paused = true;
        let (mut st, _) = self
            .changed
            .wait_timeout_while(st, timeout, |s| s.in_flight)
            .unwrap_or_else(|e| e.into_inner());
        if st.in_flight {
            st.paused = false;
            drop(st);
            self.changed.notify_all();
            return false;
        }
        true
    }

    pub fn open(&self) {
        self.lock().paused = false;
        self.changed.notify_all();
    }

    /// Controller side: permanent. Wakes a paused or idling worker.
    pub fn cancel(&self) {
        let mut st = self.lock();
        st.cancelled = true;
        st.paused = false;
        drop(st);
        self.changed.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// True while the controller holds the gate closed or a primitive runs.
    pub fn is_held(&self) -> bool {
        let st = self.lock();
        st.paused || st.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn enter_marks_in_flight() {
        let gate = RunGate::new();
        let guard = gate.enter().unwrap();
        assert!(gate.is_held());
        drop(guard);
        assert!(!gate.is_held());
    }

    #[test]
    fn close_blocks_next_enter_until_open() {
        let gate = Arc::new(RunGate::new());
        assert!(gate.close(Duration::from_millis(100)));

        let (tx, rx) = mpsc::channel();
        let worker = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let _g = gate.enter().unwrap();
                tx.send(()).unwrap();
            })
        };
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        gate.open();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn close_times_out_while_primitive_runs() {
        let gate = RunGate::new();
        let guard = gate.enter().unwrap();
        assert!(!gate.close(Duration::from_millis(50)));
        assert!(!gate.is_paused());
        drop(guard);
        assert!(gate.close(Duration::from_millis(50)));
    }

    #[test]
    fn close_waits_for_in_flight_primitive() {
        let gate = Arc::new(RunGate::new());
        let (tx, rx) = mpsc::channel();
        let worker = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let _g = gate.enter().unwrap();
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(100));
            })
        };
        rx.recv().unwrap();
        assert!(gate.close(Duration::from_secs(5)));
        assert!(gate.is_paused());
        worker.join().unwrap();
    }

    #[test]
    fn cancel_wakes_paused_worker() {
        let gate = Arc::new(RunGate::new());
        assert!(gate.close(Duration::from_millis(10)));
        let worker = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.checkpoint())
        };
        thread::sleep(Duration::from_millis(50));
        gate.cancel();
        assert!(matches!(worker.join().unwrap(), Err(RunError::Cancelled)));
        assert!(!gate.is_held());
    }

    #[test]
    fn idle_returns_early_on_cancel() {
        let gate = Arc::new(RunGate::new());
        let started = Instant::now();
        let worker = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.idle(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(50));
        gate.cancel();
        assert!(matches!(worker.join().unwrap(), Err(RunError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(gate.idle(Duration::ZERO).is_err());
    }
}
