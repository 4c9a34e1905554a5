//! Cancellable, re-armable single-shot timer.
//!
//! A [`Debouncer`] owns one task and at most one pending deadline. Every
//! [`Debouncer::schedule`] moves the deadline to `now + delay`, so a burst of
//! calls inside the window results in a single execution once the burst has
//! been quiet for `delay`. The task reads whatever state it needs when it
//! runs, not when it was scheduled.
//!
//! Two drivers exist:
//!
//! - [`Debouncer::spawn`] starts a worker thread that sleeps on a condition
//!   variable until the deadline passes.
//! - [`Debouncer::manual`] has no thread at all. The deadline is recorded but
//!   only [`Debouncer::fire_now`] runs the task, which lets tests trigger the
//!   timer deterministically.
//!
//! Executions are serialized: the task never runs twice concurrently, even
//! when the worker and `fire_now` race.

use anyhow::{Context, Result};
use log::{debug, trace};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type Task = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Default)]
struct TimerState {
    deadline: Option<Instant>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
    run_guard: Mutex<()>,
    delay: Duration,
    task: Task,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self) {
        let _guard = self.run_guard.lock().unwrap_or_else(PoisonError::into_inner);
        trace!("Running debounced task");
        (self.task)();
    }
}

pub struct Debouncer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.shared.delay)
            .field("deadline", &self.shared.state().deadline)
            .field("threaded", &self.worker.is_some())
            .finish()
    }
}

impl Debouncer {
    /// Debouncer driven by a background worker thread.
    pub fn spawn<F>(delay: Duration, task: F) -> Result<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared::new(delay, Box::new(task)));
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("encore-debounce".to_string())
            .spawn(move || run_worker(&worker_shared))
            .context("Failed to spawn debounce worker thread")?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Debouncer without a thread; only [`Debouncer::fire_now`] runs the task.
    pub fn manual<F>(delay: Duration, task: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared::new(delay, Box::new(task))),
            worker: None,
        }
    }

    /// Arm the timer, replacing any pending deadline.
    pub fn schedule(&self) {
        let mut state = self.shared.state();
        if state.shutdown {
            return;
        }
        let deadline = Instant::now() + self.shared.delay;
        state.deadline = Some(deadline);
        drop(state);
        debug!("Debounced task scheduled in {:?}", self.shared.delay);
        self.shared.wake.notify_all();
    }

    /// Disarm the timer. Returns whether something was pending.
    pub fn cancel(&self) -> bool {
        let was_pending = self.shared.state().deadline.take().is_some();
        self.shared.wake.notify_all();
        was_pending
    }

    /// Run the task now if it is pending. Returns whether it ran.
    pub fn fire_now(&self) -> bool {
        let pending = self.shared.state().deadline.take().is_some();
        if pending {
            self.shared.wake.notify_all();
            self.shared.run();
        }
        pending
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.state().deadline.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.shared.state().deadline
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.shared.delay
    }

    /// Stop the worker thread. A pending deadline is dropped, not run;
    /// call [`Debouncer::fire_now`] first to flush it.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.state();
            state.shutdown = true;
            state.deadline = None;
        }
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Debounce worker panicked");
            }
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn new(delay: Duration, task: Task) -> Self {
        Self {
            state: Mutex::new(TimerState::default()),
            wake: Condvar::new(),
            run_guard: Mutex::new(()),
            delay,
            task,
        }
    }
}

fn run_worker(shared: &Shared) {
    let mut state = shared.state();
    loop {
        if state.shutdown {
            break;
        }
        match state.deadline {
            None => {
                state = shared.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    state.deadline = None;
                    drop(state);
                    shared.run();
                    state = shared.state();
                } else {
                    state = shared
                        .wake
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
    debug!("Debounce worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = Arc::clone(&count);
        (count, move || {
            task_count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_manual_coalesces_bursts() {
        let (count, task) = counter();
        let debouncer = Debouncer::manual(Duration::from_secs(5), task);

        for _ in 0..10 {
            debouncer.schedule();
        }
        assert!(debouncer.is_pending());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert!(debouncer.fire_now());
        assert!(!debouncer.fire_now());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_disarms() {
        let (count, task) = counter();
        let debouncer = Debouncer::manual(Duration::from_secs(5), task);

        debouncer.schedule();
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());
        assert!(!debouncer.fire_now());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_schedule_moves_deadline_forward() {
        let (_count, task) = counter();
        let debouncer = Debouncer::manual(Duration::from_secs(5), task);

        debouncer.schedule();
        let first = debouncer.deadline().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        debouncer.schedule();
        let second = debouncer.deadline().unwrap();

        assert!(second > first);
    }

    #[test]
    fn test_worker_fires_once_after_quiet_period() {
        let (count, task) = counter();
        let debouncer = Debouncer::spawn(Duration::from_millis(40), task).unwrap();

        for _ in 0..5 {
            debouncer.schedule();
            std::thread::sleep(Duration::from_millis(5));
        }
        std::thread::sleep(Duration::from_millis(300));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_shutdown_drops_pending_and_ignores_schedule() {
        let (count, task) = counter();
        let mut debouncer = Debouncer::spawn(Duration::from_secs(60), task).unwrap();

        debouncer.schedule();
        debouncer.shutdown();
        debouncer.schedule();

        assert!(!debouncer.is_pending());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
