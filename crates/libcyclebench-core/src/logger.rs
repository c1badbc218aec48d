//! Append-only XML run log
//!
//! One `<cyclebench>` root element per run, opened with the run configuration
//! and closed once at the end. Cycle records and monitor payloads go in
//! between. Every record is flushed so an aborted run still leaves a readable
//! prefix.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use quick_xml::escape::escape;
use tracing::debug;

use crate::error::{BenchError, Result};
use crate::types::CycleResult;

const ROOT: &str = "cyclebench";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogState {
    Pending,
    Open,
    Closed,
}

/// Structured sink for run metadata and monitor payloads
pub struct ResultLogger {
    writer: Box<dyn Write + Send>,
    path: Option<PathBuf>,
    state: LogState,
}

impl ResultLogger {
    /// Create (truncate) the log file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: Box::new(BufWriter::new(file)),
            path: Some(path.to_path_buf()),
            state: LogState::Pending,
        })
    }

    /// Log into an arbitrary writer
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
            path: None,
            state: LogState::Pending,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.state == LogState::Open
    }

    /// Write the XML declaration and the root element with one `<config>`
    /// child per entry
    pub fn open(&mut self, entries: &[(String, String)]) -> Result<()> {
        if self.state != LogState::Pending {
            return Err(BenchError::Log("run log already opened".to_string()));
        }

        writeln!(self.writer, "<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
        writeln!(
            self.writer,
            "<{} version=\"{}\" time=\"{}\">",
            ROOT,
            env!("CARGO_PKG_VERSION"),
            Utc::now().to_rfc3339()
        )?;
        for (key, value) in entries {
            writeln!(
                self.writer,
                "<config key=\"{}\" value=\"{}\"/>",
                escape(key.as_str()),
                escape(value.as_str())
            )?;
        }
        self.writer.flush()?;
        self.state = LogState::Open;
        debug!(path = ?self.path, entries = entries.len(), "Run log opened");
        Ok(())
    }

    /// Append the record of one finished cycle
    pub fn write_cycle(&mut self, cycle: &CycleResult) -> Result<()> {
        self.ensure_open("write a cycle")?;
        writeln!(
            self.writer,
            "<cycle index=\"{}\" cvus=\"{}\" success=\"{}\" failure=\"{}\" error=\"{}\" status=\"{}\" elapsed=\"{:.3}\" detached=\"{}\"/>",
            cycle.index,
            cycle.concurrency,
            cycle.success,
            cycle.failure,
            cycle.error,
            cycle.status,
            cycle.elapsed.as_secs_f64(),
            cycle.workers_detached
        )?;
        self.writer.flush()?;
        Ok(())
    }

    /// Append an opaque fragment verbatim
    pub fn write_payload(&mut self, fragment: &str) -> Result<()> {
        self.ensure_open("write a payload")?;
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Ok(());
        }
        writeln!(self.writer, "{}", fragment)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Close the root element. Only valid once, after `open`.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open("close")?;
        writeln!(self.writer, "</{}>", ROOT)?;
        self.writer.flush()?;
        self.state = LogState::Closed;
        debug!(path = ?self.path, "Run log closed");
        Ok(())
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        match self.state {
            LogState::Open => Ok(()),
            LogState::Pending => Err(BenchError::Log(format!(
                "cannot {}: run log is not open",
                action
            ))),
            LogState::Closed => Err(BenchError::Log(format!(
                "cannot {}: run log is already closed",
                action
            ))),
        }
    }
}
