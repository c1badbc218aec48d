//! Virtual-user worker threads

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::aggregator::CycleAggregator;
use crate::signals::CycleSignals;
use crate::types::{Outcome, WorkerIdentity};
use crate::workload::{Workload, WorkloadResult};

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Terminated = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            _ => WorkerState::Terminated,
        }
    }
}

/// State shared between the worker thread and its handle
#[derive(Debug, Clone, Default)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// What a worker did over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub iterations: u64,
    pub recorded: u64,
}

/// One virtual user: a workload instance driven by the cycle's signals
pub struct Worker {
    identity: WorkerIdentity,
    workload: Box<dyn Workload>,
    signals: Arc<CycleSignals>,
    aggregator: Arc<CycleAggregator>,
    pacing: Duration,
    state: SharedState,
}

impl Worker {
    pub fn new(
        identity: WorkerIdentity,
        workload: Box<dyn Workload>,
        signals: Arc<CycleSignals>,
        aggregator: Arc<CycleAggregator>,
        pacing: Duration,
    ) -> Self {
        Self {
            identity,
            workload,
            signals,
            aggregator,
            pacing,
            state: SharedState::default(),
        }
    }

    pub fn identity(&self) -> WorkerIdentity {
        self.identity
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Start the worker on its own named thread
    pub fn spawn(self) -> io::Result<WorkerHandle> {
        let identity = self.identity;
        let state = self.state.clone();
        let handle = thread::Builder::new()
            .name(identity.thread_name())
            .spawn(move || self.run())?;
        Ok(WorkerHandle {
            identity,
            handle,
            state,
        })
    }

    /// Iterate until the running flag is observed low
    pub fn run(mut self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        self.state.set(WorkerState::Running);

        while self.signals.is_running() {
            let outcome = self.iterate();
            stats.iterations += 1;

            if self.signals.is_recording() {
                self.aggregator.record(&outcome);
                stats.recorded += 1;
            }

            match outcome {
                Outcome::Success => debug!(worker = %self.identity, "Success"),
                Outcome::Failure(ref msg) => debug!(worker = %self.identity, "Failure: {}", msg),
                Outcome::Error(ref msg) => debug!(worker = %self.identity, "Error: {}", msg),
            }

            if !self.pacing.is_zero() {
                thread::sleep(self.pacing);
            }
        }

        self.state.set(WorkerState::Stopping);
        trace!(
            worker = %self.identity,
            iterations = stats.iterations,
            recorded = stats.recorded,
            "Worker stopping"
        );
        self.state.set(WorkerState::Terminated);
        stats
    }

    /// One execution; workload faults and panics both become `Outcome::Error`
    fn iterate(&mut self) -> Outcome {
        let workload = &mut self.workload;
        match guarded(|| {
            workload.clear_context();
            workload.run()
        }) {
            Ok(outcome) => outcome,
            Err(message) => Outcome::Error(message),
        }
    }
}

/// Handle on a spawned worker thread
pub struct WorkerHandle {
    identity: WorkerIdentity,
    handle: JoinHandle<WorkerStats>,
    state: SharedState,
}

impl WorkerHandle {
    pub fn identity(&self) -> WorkerIdentity {
        self.identity
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Last lifecycle state published by the worker thread
    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Wait up to `timeout` for the thread to exit.
    ///
    /// Returns `None` when the deadline passes; the thread is then detached.
    pub fn join_within(self, timeout: Duration) -> Option<WorkerStats> {
        // No deadline when the timeout does not fit in an Instant
        let deadline = Instant::now().checked_add(timeout);
        while !self.handle.is_finished() {
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    JOIN_POLL.min(deadline - now)
                }
                None => JOIN_POLL,
            };
            thread::sleep(wait);
        }
        // The loop body never unwinds, so a join error means the thread died
        // outside of it; report it as empty.
        Some(self.handle.join().unwrap_or_default())
    }
}

/// Run a workload call, turning both `Err` and panics into a message
pub(crate) fn guarded<T>(f: impl FnOnce() -> WorkloadResult<T>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkloadError;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Scripted {
        calls: Arc<AtomicU64>,
        outcome: fn(u64) -> WorkloadResult<Outcome>,
    }

    impl Workload for Scripted {
        fn run(&mut self) -> WorkloadResult<Outcome> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)(n)
        }
    }

    fn worker(
        outcome: fn(u64) -> WorkloadResult<Outcome>,
    ) -> (Worker, Arc<CycleSignals>, Arc<CycleAggregator>, Arc<AtomicU64>) {
        let signals = Arc::new(CycleSignals::new());
        let aggregator = Arc::new(CycleAggregator::new());
        let calls = Arc::new(AtomicU64::new(0));
        let workload = Scripted {
            calls: Arc::clone(&calls),
            outcome,
        };
        let worker = Worker::new(
            WorkerIdentity::new(0, 1, 0),
            Box::new(workload),
            Arc::clone(&signals),
            Arc::clone(&aggregator),
            Duration::from_millis(1),
        );
        (worker, signals, aggregator, calls)
    }

    fn wait_for_calls(calls: &AtomicU64, n: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) < n {
            assert!(Instant::now() < deadline, "workload never reached {} calls", n);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_not_running_exits_immediately() {
        let (worker, _signals, aggregator, calls) = worker(|_| Ok(Outcome::Success));
        assert_eq!(worker.state(), WorkerState::Idle);

        let stats = worker.run();
        assert_eq!(stats, WorkerStats::default());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(aggregator.counts().total(), 0);
    }

    #[test]
    fn test_outcomes_outside_recording_are_not_counted() {
        let (worker, signals, aggregator, calls) = worker(|_| Ok(Outcome::Success));
        signals.start_running();
        let handle = worker.spawn().unwrap();

        wait_for_calls(&calls, 5);
        assert_eq!(aggregator.counts().total(), 0);

        signals.stop_running();
        let stats = handle.join_within(Duration::from_secs(5)).unwrap();
        assert!(stats.iterations >= 5);
        assert_eq!(stats.recorded, 0);
        assert_eq!(aggregator.counts().total(), 0);
    }

    #[test]
    fn test_errors_and_panics_are_classified() {
        let (worker, signals, aggregator, calls) = worker(|n| match n % 3 {
            0 => Ok(Outcome::failure("assertion")),
            1 => Err(WorkloadError::Run("connection reset".to_string())),
            _ => panic!("workload bug"),
        });
        signals.start_running();
        signals.start_recording();
        let handle = worker.spawn().unwrap();

        wait_for_calls(&calls, 6);
        signals.stop_running();
        let stats = handle.join_within(Duration::from_secs(5)).unwrap();

        let counts = aggregator.counts();
        assert_eq!(counts.success, 0);
        assert!(counts.failure >= 1);
        assert!(counts.error >= 2);
        assert_eq!(counts.total(), stats.recorded);
    }

    #[test]
    fn test_join_within_detaches_slow_worker() {
        let signals = Arc::new(CycleSignals::new());
        let worker = Worker::new(
            WorkerIdentity::new(0, 1, 0),
            Box::new(Scripted {
                calls: Arc::new(AtomicU64::new(0)),
                outcome: |_| {
                    thread::sleep(Duration::from_millis(300));
                    Ok(Outcome::Success)
                },
            }),
            Arc::clone(&signals),
            Arc::new(CycleAggregator::new()),
            Duration::ZERO,
        );
        signals.start_running();
        let handle = worker.spawn().unwrap();
        assert_eq!(handle.identity().thread_name(), "vu-0-1-0");

        signals.stop_running();
        assert!(handle.join_within(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_handle_reports_lifecycle() {
        let (worker, signals, _aggregator, calls) = worker(|_| Ok(Outcome::Success));
        signals.start_running();
        let handle = worker.spawn().unwrap();

        wait_for_calls(&calls, 1);
        assert_eq!(handle.state(), WorkerState::Running);

        signals.stop_running();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() {
            assert!(Instant::now() < deadline, "worker never exited");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(handle.state(), WorkerState::Terminated);

        // An unbounded timeout must not overflow the deadline
        assert!(handle.join_within(Duration::MAX).is_some());
    }

    #[test]
    fn test_guarded_catches_panic_message() {
        let result: Result<(), String> = guarded(|| panic!("boom"));
        assert_eq!(result.unwrap_err(), "panicked: boom");

        let result = guarded(|| Err::<(), _>(WorkloadError::Setup("no fixtures".to_string())));
        assert_eq!(result.unwrap_err(), "setup failed: no fixtures");
    }
}
