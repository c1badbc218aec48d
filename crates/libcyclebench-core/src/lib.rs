//! Cycle-based load generation engine
//!
//! A run is a list of cycles, each at a fixed number of virtual users. Every
//! virtual user is a thread repeating one [`Workload`]; outcomes are counted
//! only inside the recording window of the cycle that spawned the thread.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod logger;
pub mod scheduler;
pub mod signals;
pub mod types;
pub mod worker;
pub mod workload;

pub use aggregator::{CycleAggregator, CycleCounts};
pub use config::{BenchConfig, ConfigOverrides, SuiteFile};
pub use error::{BenchError, Result, WorkloadError};
pub use logger::ResultLogger;
pub use scheduler::{AbortHandle, CycleScheduler};
pub use signals::CycleSignals;
pub use types::{BenchReport, CycleResult, Outcome, Status, WorkerIdentity};
pub use worker::{Worker, WorkerHandle, WorkerState, WorkerStats};
pub use workload::{
    workload_fn, Workload, WorkloadContext, WorkloadFactory, WorkloadName, WorkloadRegistry,
    WorkloadResult,
};
