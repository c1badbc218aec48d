use thiserror::Error;

/// Main error type for cyclebench operations
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown workload '{0}'")]
    UnknownWorkload(String),

    #[error("cannot start virtual user #{worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("result log error: {0}")]
    Log(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workload error: {0}")]
    Workload(#[from] WorkloadError),
}

impl BenchError {
    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::InvalidConfig(_) => 2,
            BenchError::UnknownWorkload(_) => 2,
            BenchError::TomlParse(_) => 2,
            _ => 3,
        }
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            BenchError::Spawn { .. } => vec![
                "Lower the concurrency of the largest cycle",
                "Or raise the thread limit ('ulimit -u') and retry",
            ],
            BenchError::UnknownWorkload(_) => vec![
                "Workloads are named '<Class>.<method>', e.g. 'Http.get'",
            ],
            BenchError::TomlParse(_) => vec![
                "Check the [main] and [bench] sections of the configuration file",
            ],
            _ => vec![],
        }
    }
}

/// Error raised by a workload
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("setup failed: {0}")]
    Setup(String),

    #[error("{0}")]
    Run(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
