//! Serialized progress reporting
//!
//! Workers finish files in arbitrary order; the counter and the sink sit
//! behind one mutex so every `progress:<done>/<total>` line reaches the
//! sink atomically and in counting order.

use std::io::Write;
use std::sync::Mutex;

/// Shared progress counter writing one line per completed entry.
pub struct ProgressTracker {
    total: usize,
    state: Mutex<TrackerState>,
}

struct TrackerState {
    done: usize,
    sink: Option<Box<dyn Write + Send>>,
}

impl ProgressTracker {
    pub fn new(total: usize, sink: Option<Box<dyn Write + Send>>) -> Self {
        Self {
            total,
            state: Mutex::new(TrackerState { done: 0, sink }),
        }
    }

    /// Record one completed entry and emit its progress line.
    pub fn tick(&self) -> usize {
        let mut state = self.state.lock().expect("progress mutex poisoned");
        state.done += 1;
        let done = state.done;
        if let Some(sink) = state.sink.as_mut() {
            let _ = writeln!(sink, "progress:{done}/{}", self.total);
        }
        done
    }
}
