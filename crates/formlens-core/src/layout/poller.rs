//! Bounded fixed-interval polling of a layout-analysis operation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{LayoutService, OperationHandle};
use crate::error::{FormlensError, Result};
use crate::models::config::LayoutConfig;
use crate::models::layout::AnalyzeResult;
use crate::progress::{ProgressReporter, STEP_ANALYZE, poll_percent};

/// Interval and attempt cap for polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

impl From<&LayoutConfig> for PollPolicy {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_attempts,
        }
    }
}

/// Polls one operation until it reaches a terminal state.
///
/// All loop state is local to [`JobPoller::wait`], so one poller may serve
/// overlapping extractions.
pub struct JobPoller<'a, S: ?Sized> {
    service: &'a S,
    policy: PollPolicy,
}

impl<'a, S> JobPoller<'a, S>
where
    S: LayoutService + ?Sized,
{
    pub fn new(service: &'a S, policy: PollPolicy) -> Self {
        Self { service, policy }
    }

    /// Wait for the operation to succeed and return its payload.
    ///
    /// Each attempt sleeps for the interval, then queries the status once.
    pub async fn wait(
        &self,
        handle: &OperationHandle,
        progress: &mut ProgressReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<AnalyzeResult> {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Polling cancelled after {} attempts", attempt - 1);
                    return Err(FormlensError::Cancelled);
                }
                _ = tokio::time::sleep(self.policy.interval) => {}
            }

            let status = self.service.status(handle).await?;
            debug!("Poll attempt {}/{}: status={}", attempt, max_attempts, status.status);

            match status.status.as_str() {
                "succeeded" => {
                    info!(
                        "Analysis succeeded after {} attempts ({:?})",
                        attempt,
                        started.elapsed()
                    );
                    return Ok(status.analyze_result.unwrap_or_default());
                }
                "failed" => {
                    let message = status
                        .error
                        .map(|e| e.message)
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "unknown error".to_string());
                    return Err(FormlensError::AnalysisFailed(message));
                }
                _ => {
                    progress.report(
                        STEP_ANALYZE,
                        format!("Analyzing document (attempt {}/{})", attempt, max_attempts),
                        poll_percent(attempt, max_attempts),
                    );
                }
            }
        }

        warn!("Analysis did not finish within {} attempts", max_attempts);
        Err(FormlensError::AnalysisTimeout {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::layout::{OperationError, OperationStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays scripted statuses, then repeats the last one.
    struct ScriptedService {
        script: Vec<&'static str>,
        queries: Mutex<Vec<Instant>>,
    }

    impl ScriptedService {
        fn new(script: Vec<&'static str>) -> Self {
            Self {
                script,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn query_count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LayoutService for ScriptedService {
        async fn submit(&self, _bytes: &[u8], _content_type: &str) -> Result<OperationHandle> {
            Ok(OperationHandle::new("op"))
        }

        async fn status(&self, _handle: &OperationHandle) -> Result<OperationStatus> {
            let mut queries = self.queries.lock().unwrap();
            queries.push(Instant::now());
            let idx = (queries.len() - 1).min(self.script.len() - 1);
            let status = self.script[idx];

            Ok(OperationStatus {
                status: status.to_string(),
                analyze_result: (status == "succeeded").then(AnalyzeResult::default),
                error: (status == "failed").then(|| OperationError {
                    code: "Bad".to_string(),
                    message: "corrupt page".to_string(),
                }),
            })
        }
    }

    fn handle() -> OperationHandle {
        OperationHandle::new("op")
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_attempt_cap() {
        let service = ScriptedService::new(vec!["running"]);
        let poller = JobPoller::new(&service, PollPolicy::default());
        let start = Instant::now();

        let result = poller
            .wait(&handle(), &mut ProgressReporter::silent(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(FormlensError::AnalysisTimeout { attempts: 60 })));
        assert_eq!(service.query_count(), 60);
        assert_eq!(start.elapsed(), Duration::from_secs(120));

        let queries = service.queries.lock().unwrap();
        for pair in queries.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_last_attempt() {
        let mut script = vec!["running"; 59];
        script.push("succeeded");
        let service = ScriptedService::new(script);
        let poller = JobPoller::new(&service, PollPolicy::default());

        let result = poller
            .wait(&handle(), &mut ProgressReporter::silent(), &CancellationToken::new())
            .await;

        assert!(result.is_ok());
        assert_eq!(service.query_count(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_is_fatal() {
        let service = ScriptedService::new(vec!["notStarted", "running", "failed"]);
        let poller = JobPoller::new(&service, PollPolicy::default());

        let result = poller
            .wait(&handle(), &mut ProgressReporter::silent(), &CancellationToken::new())
            .await;

        match result {
            Err(FormlensError::AnalysisFailed(message)) => assert_eq!(message, "corrupt page"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(service.query_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let service = ScriptedService::new(vec!["running"]);
        let poller = JobPoller::new(&service, PollPolicy::default());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let result = poller.wait(&handle(), &mut ProgressReporter::silent(), &cancel).await;

        assert!(matches!(result, Err(FormlensError::Cancelled)));
        assert_eq!(service.query_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_stays_in_polling_band() {
        let service = ScriptedService::new(vec!["running", "running", "succeeded"]);
        let poller = JobPoller::new(&service, PollPolicy::default());
        let seen = Mutex::new(Vec::new());
        let sink = |u: &crate::progress::ProgressUpdate| seen.lock().unwrap().push(u.percent);
        let mut progress = ProgressReporter::new(Some(&sink));

        poller
            .wait(&handle(), &mut progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![31, 32]);
    }
}
