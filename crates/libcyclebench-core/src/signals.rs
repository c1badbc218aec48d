//! Running/recording flags shared between the scheduler and its workers
//!
//! The scheduler is the only writer. Workers read both flags once per
//! iteration and may observe a transition one iteration late.

use std::sync::atomic::{AtomicBool, Ordering};

/// The RunningFlag/RecordingFlag pair of one cycle.
///
/// Recording is only ever raised while running is set, and lowering running
/// lowers recording first, so `is_recording()` implies `is_running()`.
#[derive(Debug, Default)]
pub struct CycleSignals {
    running: AtomicBool,
    recording: AtomicBool,
}

impl CycleSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let workers iterate, without counting
    pub fn start_running(&self) {
        self.recording.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    /// Open the recording window. Ignored unless running.
    pub fn start_recording(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.recording.store(true, Ordering::SeqCst);
        true
    }

    /// Close the recording window
    pub fn stop_recording(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }

    /// Ask workers to exit
    pub fn stop_running(&self) {
        self.recording.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }
}
