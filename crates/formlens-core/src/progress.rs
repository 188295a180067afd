//! Progress reporting for a single extraction.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Reading and normalizing the input.
pub const STEP_ACQUIRE: u32 = 1;
/// Waiting on the analysis back-end.
pub const STEP_ANALYZE: u32 = 2;
/// Parsing and summarizing.
pub const STEP_FINALIZE: u32 = 3;
/// Number of steps in every extraction.
pub const TOTAL_STEPS: u32 = 3;

/// One progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub step: u32,
    pub total_steps: u32,
    pub message: String,
    /// 0 - 100, non-decreasing within one extraction.
    pub percent: u8,
}

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Per-extraction reporter that keeps `percent` monotonic.
///
/// Reporting without a sink only updates the internal state.
pub struct ProgressReporter<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last_percent: u8,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self {
            sink,
            last_percent: 0,
        }
    }

    /// Reporter that drops every update.
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Emit an update; `percent` is clamped to `[last, 100]`.
    pub fn report(&mut self, step: u32, message: impl Into<String>, percent: u32) {
        let percent = (percent.min(100) as u8).max(self.last_percent);
        self.last_percent = percent;

        let update = ProgressUpdate {
            step,
            total_steps: TOTAL_STEPS,
            message: message.into(),
            percent,
        };
        trace!("progress {}% (step {}/{}): {}", update.percent, step, TOTAL_STEPS, update.message);

        if let Some(sink) = self.sink {
            sink.on_progress(&update);
        }
    }

    /// Last percent emitted.
    pub fn percent(&self) -> u8 {
        self.last_percent
    }
}

/// Percent for polling attempt `attempt` of `max_attempts`, within 30 - 80.
pub fn poll_percent(attempt: u32, max_attempts: u32) -> u32 {
    if max_attempts == 0 {
        return 30;
    }
    let share = (attempt as f64 / max_attempts as f64 * 50.0).round() as u32;
    (30 + share).min(80)
}

/// Percent after converting `done` of `total` pages, within 0 - 30.
pub fn conversion_percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 30;
    }
    ((done as f64 / total as f64) * 30.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_poll_percent_band() {
        assert_eq!(poll_percent(0, 60), 30);
        assert_eq!(poll_percent(1, 60), 31);
        assert_eq!(poll_percent(30, 60), 55);
        assert_eq!(poll_percent(60, 60), 80);
        assert_eq!(poll_percent(90, 60), 80);
    }

    #[test]
    fn test_poll_percent_monotonic() {
        let mut last = 0;
        for attempt in 1..=60 {
            let p = poll_percent(attempt, 60);
            assert!(p >= last);
            last = p;
        }
    }

    #[test]
    fn test_conversion_percent() {
        assert_eq!(conversion_percent(1, 3), 10);
        assert_eq!(conversion_percent(3, 3), 30);
        assert_eq!(conversion_percent(0, 0), 30);
    }

    #[test]
    fn test_reporter_never_goes_backwards() {
        let seen = Mutex::new(Vec::new());
        let sink = |u: &ProgressUpdate| seen.lock().unwrap().push(u.percent);
        let mut reporter = ProgressReporter::new(Some(&sink));

        reporter.report(STEP_ACQUIRE, "a", 30);
        reporter.report(STEP_ACQUIRE, "b", 10);
        reporter.report(STEP_FINALIZE, "c", 250);

        assert_eq!(*seen.lock().unwrap(), vec![30, 30, 100]);
    }

    #[test]
    fn test_silent_reporter_tracks_state() {
        let mut reporter = ProgressReporter::silent();
        reporter.report(STEP_ANALYZE, "x", 42);
        assert_eq!(reporter.percent(), 42);
    }
}
