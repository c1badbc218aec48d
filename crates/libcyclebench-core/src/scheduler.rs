//! Cycle scheduler
//!
//! Drives the run: for each concurrency level it ramps workers up, opens the
//! recording window for the configured duration, winds the workers down and
//! logs the cycle before moving to the next level.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use libcyclebench_monitor::{record_key, MonitorClient};
use tracing::{debug, info, warn};

use crate::aggregator::CycleAggregator;
use crate::config::{format_cycles, BenchConfig};
use crate::error::{BenchError, Result};
use crate::logger::ResultLogger;
use crate::signals::CycleSignals;
use crate::types::{BenchReport, CycleResult, WorkerIdentity};
use crate::worker::{guarded, Worker, WorkerHandle};
use crate::workload::{Workload, WorkloadContext, WorkloadFactory};

/// Longest uninterrupted sleep of the scheduler thread
const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// Cancels a run from another thread
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns one run from the first cycle to the closed run log
pub struct CycleScheduler {
    config: BenchConfig,
    factory: Arc<dyn WorkloadFactory>,
    monitors: MonitorClient,
    logger: ResultLogger,
    abort: AbortHandle,
}

impl CycleScheduler {
    pub fn new(
        config: BenchConfig,
        factory: Arc<dyn WorkloadFactory>,
        monitors: MonitorClient,
        logger: ResultLogger,
    ) -> Self {
        Self {
            config,
            factory,
            monitors,
            logger,
            abort: AbortHandle::new(),
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Handle that ends the run after the current cycle winds down
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Execute every cycle in order and return the report
    pub fn run(&mut self) -> Result<BenchReport> {
        let started = Instant::now();
        let mut report = BenchReport::new(self.config.test_id.clone());
        let context = self.config.workload_context();

        let mut shared = self
            .factory
            .create(WorkerIdentity::new(0, 0, 0), &context)?;

        self.logger.open(&self.config.log_entries())?;
        info!(
            test_id = %self.config.test_id,
            run_id = %report.run_id,
            cycles = %format_cycles(&self.config.cycles),
            duration = ?self.config.duration,
            monitors = self.monitors.len(),
            "Benching"
        );

        let levels = self.config.cycles.clone();
        for (index, &concurrency) in levels.iter().enumerate() {
            if self.abort.is_aborted() {
                report.interrupted = true;
                break;
            }

            let cycle = match self.run_cycle(index, concurrency, &mut *shared, &context) {
                Ok(cycle) => cycle,
                Err(e) => {
                    // Leave a well-formed log behind before bailing out
                    let _ = self.logger.close();
                    return Err(e);
                }
            };

            info!(
                cycle = cycle.index,
                cvus = cycle.concurrency,
                success = cycle.success,
                failure = cycle.failure,
                error = cycle.error,
                status = %cycle.status,
                "Cycle done"
            );
            self.logger.write_cycle(&cycle)?;
            report.push_cycle(cycle);

            if self.abort.is_aborted() {
                report.interrupted = true;
                break;
            }
            self.pause(self.config.cycle_time);
        }

        self.logger.close()?;
        report.elapsed = started.elapsed();

        if report.interrupted {
            warn!(
                completed = report.cycles.len(),
                planned = levels.len(),
                "Run interrupted"
            );
        }
        info!(
            status = %report.status,
            success = report.success,
            failure = report.failure,
            error = report.error,
            elapsed = ?report.elapsed,
            "Bench finished"
        );
        Ok(report)
    }

    fn run_cycle(
        &mut self,
        index: usize,
        concurrency: usize,
        shared: &mut dyn Workload,
        context: &WorkloadContext,
    ) -> Result<CycleResult> {
        let cycle_start = Instant::now();
        let aggregator = Arc::new(CycleAggregator::new());
        let signals = Arc::new(CycleSignals::new());

        if let Err(message) = guarded(|| shared.set_up_cycle()) {
            warn!(cycle = index, "Cycle setup failed: {}", message);
            aggregator.increment_error();
        }

        let key = record_key(&self.config.test_id, index, concurrency);
        self.monitors.start(&key);

        info!(cycle = index, cvus = concurrency, "Starting cycle");
        signals.start_running();

        let handles = match self.ramp_up(index, concurrency, &signals, &aggregator, context) {
            Ok(handles) => handles,
            Err(e) => {
                // Started workers are not joined; lowering the flags lets them exit
                signals.stop_running();
                for payload in self.monitors.stop(&key) {
                    let _ = self.logger.write_payload(&payload.xml);
                }
                return Err(e);
            }
        };

        if !self.abort.is_aborted() && signals.start_recording() {
            debug!(cycle = index, duration = ?self.config.duration, "Recording");
            self.pause(self.config.duration);
        }
        signals.stop_recording();
        signals.stop_running();

        let workers_detached = self.join_workers(handles);

        for payload in self.monitors.stop(&key) {
            self.logger.write_payload(&payload.xml)?;
        }

        if let Err(message) = guarded(|| shared.tear_down_cycle()) {
            warn!(cycle = index, "Cycle teardown failed: {}", message);
            aggregator.increment_error();
        }

        let counts = aggregator.counts();
        Ok(CycleResult {
            index,
            concurrency,
            success: counts.success,
            failure: counts.failure,
            error: counts.error,
            status: counts.status(),
            elapsed: cycle_start.elapsed(),
            workers_detached,
        })
    }

    /// Spawn `concurrency` workers, `startup_delay` apart
    fn ramp_up(
        &self,
        index: usize,
        concurrency: usize,
        signals: &Arc<CycleSignals>,
        aggregator: &Arc<CycleAggregator>,
        context: &WorkloadContext,
    ) -> Result<Vec<WorkerHandle>> {
        let mut handles = Vec::new();

        for worker in 0..concurrency {
            let identity = WorkerIdentity::new(index, concurrency, worker);
            let workload = self.factory.create(identity, context)?;
            let handle = Worker::new(
                identity,
                workload,
                Arc::clone(signals),
                Arc::clone(aggregator),
                self.config.sleep_time,
            )
            .spawn()
            .map_err(|source| BenchError::Spawn { worker, source })?;
            handles.push(handle);

            if worker + 1 < concurrency {
                if self.abort.is_aborted() {
                    break;
                }
                thread::sleep(self.config.startup_delay);
            }
        }

        debug!(cycle = index, started = handles.len(), "Ramp-up complete");
        Ok(handles)
    }

    /// Join every worker against one shared deadline; returns how many were
    /// left behind
    fn join_workers(&self, handles: Vec<WorkerHandle>) -> usize {
        let timeout = self.config.join_timeout();
        let deadline = Instant::now().checked_add(timeout);
        let mut detached = 0;

        for handle in handles {
            let identity = handle.identity();
            let state = handle.state();
            let remaining =
                deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
            if handle.join_within(remaining).is_none() {
                warn!(worker = %identity, ?state, "Worker still busy after stop, detaching it");
                detached += 1;
            }
        }
        detached
    }

    /// Sleep in slices so an abort is noticed within one slice
    fn pause(&self, duration: Duration) {
        let end = Instant::now().checked_add(duration);
        loop {
            if self.abort.is_aborted() {
                return;
            }
            let slice = match end {
                Some(end) => {
                    let now = Instant::now();
                    if now >= end {
                        return;
                    }
                    SLEEP_SLICE.min(end - now)
                }
                None => SLEEP_SLICE,
            };
            thread::sleep(slice);
        }
    }
}
