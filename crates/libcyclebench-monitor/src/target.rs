//! Monitor target description

use std::fmt;

use serde::{Deserialize, Serialize};

/// A monitoring agent reachable over XML-RPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorTarget {
    pub host: String,
    pub port: u16,
    /// Human label written to the run log
    #[serde(default)]
    pub description: String,
}

impl MonitorTarget {
    pub fn new(host: impl Into<String>, port: u16, description: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            description: description.into(),
        }
    }

    /// URL the XML-RPC calls are posted to
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

impl fmt::Display for MonitorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
