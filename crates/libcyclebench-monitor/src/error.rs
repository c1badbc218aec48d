//! Monitor error types

use thiserror::Error;

/// Errors that can occur while talking to a monitoring agent
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The agent could not be reached
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// The agent answered with a non-success HTTP status
    #[error("HTTP status {status}")]
    Http { status: u16 },

    /// The agent answered with an XML-RPC fault
    #[error("Monitor fault [{code}]: {message}")]
    Fault { code: i64, message: String },

    /// The response body was not a usable methodResponse
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// XML parse error
    #[error("XML error: {0}")]
    Xml(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    /// Whether the error means the agent is down rather than misbehaving
    pub fn is_unreachable(&self) -> bool {
        matches!(self, MonitorError::ConnectionFailed(_) | MonitorError::Timeout(_))
    }
}

impl From<quick_xml::Error> for MonitorError {
    fn from(e: quick_xml::Error) -> Self {
        MonitorError::Xml(e.to_string())
    }
}
