//! Outcome, status and report types

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one workload execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Expected, assertion-style violation
    Failure(String),
    /// Unexpected fault inside the workload
    Error(String),
}

impl Outcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Outcome::Error(message.into())
    }
}

/// Status of a cycle or a whole run.
///
/// Precedence is Error > Failure > Successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Successful,
    Failure,
    Error,
}

impl Status {
    /// Classify a set of counters
    pub fn from_counts(_success: u64, failure: u64, error: u64) -> Self {
        if error > 0 {
            Status::Error
        } else if failure > 0 {
            Status::Failure
        } else {
            Status::Successful
        }
    }

    /// Process exit code for this status
    pub fn exit_code(&self) -> i32 {
        match self {
            Status::Successful => 0,
            Status::Failure => 1,
            Status::Error => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Successful => "SUCCESSFUL",
            Status::Failure => "FAILURE",
            Status::Error => "ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one virtual user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerIdentity {
    pub cycle: usize,
    pub concurrency: usize,
    pub index: usize,
}

impl WorkerIdentity {
    pub fn new(cycle: usize, concurrency: usize, index: usize) -> Self {
        Self {
            cycle,
            concurrency,
            index,
        }
    }

    /// Thread name for this virtual user
    pub fn thread_name(&self) -> String {
        format!("vu-{}-{}-{}", self.cycle, self.concurrency, self.index)
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle {} vu {}/{}", self.cycle, self.index, self.concurrency)
    }
}

/// Counters and status of one finished cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    pub index: usize,
    pub concurrency: usize,
    pub success: u64,
    pub failure: u64,
    pub error: u64,
    pub status: Status,
    #[serde(with = "serde_duration")]
    pub elapsed: Duration,
    /// Workers that missed the join deadline and were left running
    pub workers_detached: usize,
}

impl CycleResult {
    pub fn total(&self) -> u64 {
        self.success + self.failure + self.error
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.success as f64 / total as f64) * 100.0
        }
    }
}

/// Ordered per-cycle results plus the overall status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub run_id: String,
    pub test_id: String,
    pub started_at: DateTime<Utc>,
    pub cycles: Vec<CycleResult>,
    pub success: u64,
    pub failure: u64,
    pub error: u64,
    pub status: Status,
    /// The run was cancelled before every cycle ran
    pub interrupted: bool,
    #[serde(with = "serde_duration")]
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn new(test_id: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            test_id: test_id.into(),
            started_at: Utc::now(),
            cycles: Vec::new(),
            success: 0,
            failure: 0,
            error: 0,
            status: Status::Successful,
            interrupted: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Append a cycle and fold its counters into the run totals
    pub fn push_cycle(&mut self, cycle: CycleResult) {
        self.success += cycle.success;
        self.failure += cycle.failure;
        self.error += cycle.error;
        self.status = Status::from_counts(self.success, self.failure, self.error);
        self.cycles.push(cycle);
    }

    /// Process exit code of the run
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

mod serde_duration {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}
