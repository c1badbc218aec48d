//! Client for cyclebench monitoring agents
//!
//! This crate provides:
//! - The `MonitorRpc` trait, one remote agent's recording protocol
//! - An XML-RPC over HTTP implementation of it (`XmlRpcMonitor`)
//! - `MonitorClient`, which drives every configured agent and drops the
//!   ones that stop answering

pub mod client;
pub mod error;
pub mod target;
pub mod xmlrpc;

pub use client::{MonitorClient, MonitorPayload};
pub use error::MonitorError;
pub use target::MonitorTarget;
pub use xmlrpc::XmlRpcMonitor;

/// Default per-call timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Recording protocol spoken by a monitoring agent
pub trait MonitorRpc: Send {
    /// Begin sampling under `key`
    fn start_record(&self, key: &str) -> Result<(), MonitorError>;

    /// Stop sampling under `key`
    fn stop_record(&self, key: &str) -> Result<(), MonitorError>;

    /// Fetch the samples recorded under `key` as an XML fragment
    fn get_xml_result(&self, key: &str) -> Result<String, MonitorError>;
}

/// Build the recording key for one cycle: `<testId>:<cycleIndex>:<concurrency>`
pub fn record_key(test_id: &str, cycle: usize, concurrency: usize) -> String {
    format!("{}:{}:{}", test_id, cycle, concurrency)
}
