//! Bench configuration
//!
//! A suite file is TOML with a `[main]` and a `[bench]` section, an optional
//! `[monitor]` section listing agent hosts, one table per monitored host and
//! an optional table named after the test method:
//!
//! ```toml
//! [main]
//! title = "Simple site"
//! url = "http://localhost:8080"
//!
//! [bench]
//! cycles = [10, 20]
//! duration = 30
//!
//! [monitor]
//! hosts = ["db01"]
//!
//! [db01]
//! port = 8008
//! description = "database server"
//!
//! [get]
//! description = "Fetch the home page"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use libcyclebench_monitor::{MonitorTarget, DEFAULT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::workload::WorkloadContext;

/// Default run log file name
pub const DEFAULT_LOG_XML: &str = "cyclebench.xml";

/// Raw suite file as found on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteFile {
    #[serde(default)]
    pub main: MainSection,
    #[serde(default)]
    pub bench: BenchSection,
    #[serde(default)]
    pub monitor: MonitorSection,
    /// Per-host and per-test tables
    #[serde(flatten)]
    pub sections: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MainSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_xml: Option<PathBuf>,
}

/// Durations are in seconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_delay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_time_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_time_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_grace: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSection {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct HostSection {
    port: u16,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TestSection {
    description: Option<String>,
}

impl SuiteFile {
    /// Load a suite file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn monitor_targets(&self) -> Result<Vec<MonitorTarget>> {
        let mut targets = Vec::with_capacity(self.monitor.hosts.len());
        for host in &self.monitor.hosts {
            let host = host.trim();
            let section: HostSection = self
                .sections
                .get(host)
                .cloned()
                .ok_or_else(|| {
                    BenchError::InvalidConfig(format!("monitor host '{}' has no [{}] section", host, host))
                })?
                .try_into()
                .map_err(|e: toml::de::Error| {
                    BenchError::InvalidConfig(format!("monitor host '{}': {}", host, e))
                })?;
            targets.push(MonitorTarget::new(host, section.port, section.description));
        }
        Ok(targets)
    }

    fn test_description(&self, test_id: &str) -> Option<String> {
        self.sections
            .get(test_id)
            .cloned()
            .and_then(|v| v.try_into::<TestSection>().ok())
            .and_then(|s| s.description)
    }
}

/// Resolved configuration of one run
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Test method being benched; prefix of every monitor key
    pub test_id: String,
    pub description: String,
    pub title: String,
    pub url: Option<String>,
    /// Concurrency of each cycle, in run order
    pub cycles: Vec<usize>,
    /// Length of the recording window
    pub duration: Duration,
    /// Pause between two worker spawns
    pub startup_delay: Duration,
    /// Pause between two cycles
    pub cycle_time: Duration,
    /// Pacing interval of each worker between two runs
    pub sleep_time: Duration,
    pub sleep_time_min: Duration,
    pub sleep_time_max: Duration,
    /// Longest single workload execution the scheduler waits for at join
    pub join_grace: Duration,
    pub log_xml: PathBuf,
    pub config_path: Option<PathBuf>,
    pub monitors: Vec<MonitorTarget>,
    pub monitor_timeout: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            test_id: "bench".to_string(),
            description: "No test description".to_string(),
            title: String::new(),
            url: None,
            cycles: vec![1],
            duration: Duration::from_secs(10),
            startup_delay: Duration::from_millis(200),
            cycle_time: Duration::from_secs(1),
            sleep_time: Duration::ZERO,
            sleep_time_min: Duration::ZERO,
            sleep_time_max: Duration::ZERO,
            join_grace: Duration::from_secs(30),
            log_xml: PathBuf::from(DEFAULT_LOG_XML),
            config_path: None,
            monitors: Vec::new(),
            monitor_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Command-line values that take precedence over the suite file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub cycles: Option<Vec<usize>>,
    pub duration: Option<f64>,
    pub sleep_time_min: Option<f64>,
    pub sleep_time_max: Option<f64>,
    pub startup_delay: Option<f64>,
    pub log_xml: Option<PathBuf>,
}

impl BenchConfig {
    /// Resolve the configuration of `test_id` from a suite file
    pub fn from_suite(suite: &SuiteFile, test_id: &str, config_path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let bench = &suite.bench;

        let config = Self {
            test_id: test_id.to_string(),
            description: suite
                .test_description(test_id)
                .or_else(|| suite.main.description.clone())
                .unwrap_or(defaults.description),
            title: suite.main.title.clone().unwrap_or_default(),
            url: suite.main.url.clone(),
            cycles: bench.cycles.clone().unwrap_or(defaults.cycles),
            duration: seconds_or("duration", bench.duration, defaults.duration)?,
            startup_delay: seconds_or("startup_delay", bench.startup_delay, defaults.startup_delay)?,
            cycle_time: seconds_or("cycle_time", bench.cycle_time, defaults.cycle_time)?,
            sleep_time: seconds_or("sleep_time", bench.sleep_time, defaults.sleep_time)?,
            sleep_time_min: seconds_or("sleep_time_min", bench.sleep_time_min, defaults.sleep_time_min)?,
            sleep_time_max: seconds_or("sleep_time_max", bench.sleep_time_max, defaults.sleep_time_max)?,
            join_grace: seconds_or("join_grace", bench.join_grace, defaults.join_grace)?,
            log_xml: suite.main.log_xml.clone().unwrap_or(defaults.log_xml),
            config_path: config_path.map(Path::to_path_buf),
            monitors: suite.monitor_targets()?,
            monitor_timeout: seconds_or("monitor.timeout", suite.monitor.timeout, defaults.monitor_timeout)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides and re-validate
    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(url) = overrides.url {
            self.url = Some(url);
        }
        if let Some(cycles) = overrides.cycles {
            self.cycles = cycles;
        }
        if let Some(v) = overrides.duration {
            self.duration = seconds("duration", v)?;
        }
        if let Some(v) = overrides.sleep_time_min {
            self.sleep_time_min = seconds("sleep_time_min", v)?;
        }
        if let Some(v) = overrides.sleep_time_max {
            self.sleep_time_max = seconds("sleep_time_max", v)?;
        }
        if let Some(v) = overrides.startup_delay {
            self.startup_delay = seconds("startup_delay", v)?;
        }
        if let Some(path) = overrides.log_xml {
            self.log_xml = path;
        }
        self.validate()
    }

    /// Check the invariants the scheduler relies on
    pub fn validate(&self) -> Result<()> {
        if self.test_id.trim().is_empty() {
            return Err(BenchError::InvalidConfig("test id is empty".to_string()));
        }
        if self.cycles.is_empty() {
            return Err(BenchError::InvalidConfig("no cycles configured".to_string()));
        }
        if let Some(pos) = self.cycles.iter().position(|&c| c == 0) {
            return Err(BenchError::InvalidConfig(format!(
                "cycle #{} has zero virtual users",
                pos
            )));
        }
        if self.sleep_time_min > self.sleep_time_max {
            return Err(BenchError::InvalidConfig(format!(
                "sleep_time_min ({:?}) is greater than sleep_time_max ({:?})",
                self.sleep_time_min, self.sleep_time_max
            )));
        }
        Ok(())
    }

    /// Bound on joining one worker: one pending execution plus its pacing
    pub fn join_timeout(&self) -> Duration {
        self.join_grace.saturating_add(self.sleep_time)
    }

    /// Settings handed to every workload instance
    pub fn workload_context(&self) -> WorkloadContext {
        WorkloadContext {
            test_id: self.test_id.clone(),
            url: self.url.clone(),
            sleep_time_min: self.sleep_time_min,
            sleep_time_max: self.sleep_time_max,
        }
    }

    /// Key/value pairs recorded in the run log's root element
    pub fn log_entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            ("id".to_string(), self.test_id.clone()),
            ("description".to_string(), self.description.clone()),
            ("title".to_string(), self.title.clone()),
            ("cycles".to_string(), format_cycles(&self.cycles)),
            ("duration".to_string(), format_secs(self.duration)),
            ("startup_delay".to_string(), format_secs(self.startup_delay)),
            ("cycle_time".to_string(), format_secs(self.cycle_time)),
            ("sleep_time".to_string(), format_secs(self.sleep_time)),
            ("sleep_time_min".to_string(), format_secs(self.sleep_time_min)),
            ("sleep_time_max".to_string(), format_secs(self.sleep_time_max)),
            ("server_url".to_string(), self.url.clone().unwrap_or_default()),
            ("log_xml".to_string(), self.log_xml.display().to_string()),
        ];
        if let Some(ref path) = self.config_path {
            entries.push(("configuration_file".to_string(), path.display().to_string()));
        }
        for target in &self.monitors {
            entries.push((target.host.clone(), target.description.clone()));
        }
        entries
    }
}

/// Parse a cycle list such as `10:20:40`
pub fn parse_cycles(s: &str) -> Result<Vec<usize>> {
    s.split(':')
        .map(|part| {
            part.trim().parse::<usize>().map_err(|_| {
                BenchError::InvalidConfig(format!("invalid cycle '{}' in '{}'", part, s))
            })
        })
        .collect()
}

/// Format a cycle list as `10:20:40`
pub fn format_cycles(cycles: &[usize]) -> String {
    cycles
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

fn format_secs(d: Duration) -> String {
    format!("{}", d.as_secs_f64())
}

fn seconds(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        BenchError::InvalidConfig(format!(
            "{} must be a non-negative number of seconds, got {}",
            field, value
        ))
    })
}

fn seconds_or(field: &str, value: Option<f64>, default: Duration) -> Result<Duration> {
    value.map_or(Ok(default), |v| seconds(field, v))
}
