//! Workload contract and registry
//!
//! A workload is the unit of work a virtual user repeats. Each virtual user
//! owns its own instance; one extra shared instance receives the per-cycle
//! setup and teardown hooks.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BenchError, Result, WorkloadError};
use crate::types::{Outcome, WorkerIdentity};

pub type WorkloadResult<T> = std::result::Result<T, WorkloadError>;

/// A pluggable unit of work
pub trait Workload: Send {
    /// Execute the work once
    fn run(&mut self) -> WorkloadResult<Outcome>;

    /// Called once per cycle on the shared instance, before ramp-up
    fn set_up_cycle(&mut self) -> WorkloadResult<()> {
        Ok(())
    }

    /// Called once per cycle on the shared instance, after workers stop
    fn tear_down_cycle(&mut self) -> WorkloadResult<()> {
        Ok(())
    }

    /// Called before every `run` on the virtual user's own instance
    fn clear_context(&mut self) {}
}

/// Settings a workload may read when it is constructed
#[derive(Debug, Clone, Default)]
pub struct WorkloadContext {
    pub test_id: String,
    /// Base URL under test
    pub url: Option<String>,
    /// Bounds of the think time between requests inside one run
    pub sleep_time_min: Duration,
    pub sleep_time_max: Duration,
}

/// Constructor capability for one workload kind
pub trait WorkloadFactory: Send + Sync {
    fn create(
        &self,
        identity: WorkerIdentity,
        context: &WorkloadContext,
    ) -> WorkloadResult<Box<dyn Workload>>;
}

impl<F> WorkloadFactory for F
where
    F: Fn(WorkerIdentity, &WorkloadContext) -> WorkloadResult<Box<dyn Workload>>
        + Send
        + Sync,
{
    fn create(
        &self,
        identity: WorkerIdentity,
        context: &WorkloadContext,
    ) -> WorkloadResult<Box<dyn Workload>> {
        self(identity, context)
    }
}

/// Wrap a constructor closure as a shared factory
pub fn workload_fn<F>(constructor: F) -> Arc<dyn WorkloadFactory>
where
    F: Fn(WorkerIdentity, &WorkloadContext) -> WorkloadResult<Box<dyn Workload>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(constructor)
}

/// Workload identifier in `<Class>.<method>` form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkloadName {
    pub class: String,
    pub method: String,
}

impl WorkloadName {
    /// Parse `Class.method`
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((class, method))
                if !class.is_empty() && !method.is_empty() && !method.contains('.') =>
            {
                Ok(Self {
                    class: class.to_string(),
                    method: method.to_string(),
                })
            }
            _ => Err(BenchError::InvalidConfig(format!(
                "invalid workload '{}', expected <Class>.<method>",
                s
            ))),
        }
    }
}

impl fmt::Display for WorkloadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.method)
    }
}

/// Maps workload names to their constructors
#[derive(Default, Clone)]
pub struct WorkloadRegistry {
    factories: BTreeMap<WorkloadName, Arc<dyn WorkloadFactory>>,
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor closure under `Class.method`
    pub fn register<F>(&mut self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn(WorkerIdentity, &WorkloadContext) -> WorkloadResult<Box<dyn Workload>>
            + Send
            + Sync
            + 'static,
    {
        self.register_factory(name, constructor)
    }

    /// Register a factory under `Class.method`, replacing any previous one
    pub fn register_factory<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: WorkloadFactory + 'static,
    {
        let name = WorkloadName::parse(name)?;
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Look up a factory
    pub fn resolve(&self, name: &WorkloadName) -> Result<Arc<dyn WorkloadFactory>> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| BenchError::UnknownWorkload(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().map(|n| n.to_string()).collect()
    }
}
