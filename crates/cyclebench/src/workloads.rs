//! Built-in workloads

use std::io;
use std::time::Duration;

use libcyclebench_core::{
    Outcome, Result, WorkerIdentity, Workload, WorkloadContext, WorkloadError, WorkloadRegistry,
    WorkloadResult,
};
use rand::Rng;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry holding every workload shipped with the binary
pub fn builtin_registry() -> Result<WorkloadRegistry> {
    let mut registry = WorkloadRegistry::new();
    registry.register("Http.get", |identity, context| {
        HttpGet::new(identity, context).map(|w| Box::new(w) as Box<dyn Workload>)
    })?;
    registry.register("Noop.pass", |_, _| Ok(Box::new(Noop::Pass) as Box<dyn Workload>))?;
    registry.register("Noop.fail", |_, _| Ok(Box::new(Noop::Fail) as Box<dyn Workload>))?;
    registry.register("Noop.fault", |_, _| Ok(Box::new(Noop::Fault) as Box<dyn Workload>))?;
    Ok(registry)
}

/// GET the base URL, then think for a random time within the sleep bounds
pub struct HttpGet {
    agent: ureq::Agent,
    url: String,
    think_min: Duration,
    think_max: Duration,
}

impl HttpGet {
    pub fn new(_identity: WorkerIdentity, context: &WorkloadContext) -> WorkloadResult<Self> {
        let url = context.url.clone().ok_or_else(|| {
            WorkloadError::Setup("no URL to bench; set [main] url or pass --url".to_string())
        })?;
        Ok(Self {
            agent: ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build(),
            url,
            think_min: context.sleep_time_min,
            think_max: context.sleep_time_max,
        })
    }

    fn think(&self) {
        let pause = if self.think_max > self.think_min {
            rand::thread_rng().gen_range(self.think_min..=self.think_max)
        } else {
            self.think_min
        };
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }
}

impl Workload for HttpGet {
    fn run(&mut self) -> WorkloadResult<Outcome> {
        let outcome = match self.agent.get(&self.url).call() {
            Ok(response) => {
                // Drain the body so the connection can be reused
                io::copy(&mut response.into_reader(), &mut io::sink())?;
                Outcome::Success
            }
            Err(ureq::Error::Status(code, _)) => {
                Outcome::failure(format!("GET {} returned HTTP {}", self.url, code))
            }
            Err(ureq::Error::Transport(e)) => {
                return Err(WorkloadError::Run(format!("GET {}: {}", self.url, e)));
            }
        };
        self.think();
        Ok(outcome)
    }
}

/// Fixed-outcome workloads for smoke runs
#[derive(Debug, Clone, Copy)]
pub enum Noop {
    Pass,
    Fail,
    Fault,
}

impl Workload for Noop {
    fn run(&mut self) -> WorkloadResult<Outcome> {
        match self {
            Noop::Pass => Ok(Outcome::Success),
            Noop::Fail => Ok(Outcome::failure("Noop.fail always fails")),
            Noop::Fault => Err(WorkloadError::Run("Noop.fault always faults".to_string())),
        }
    }
}
