//! Single-retry policy for cold backends.
//!
//! A backend that is still waking up tends to answer through its platform
//! edge with a 502. When the first attempt fails that way the policy waits a
//! fixed delay and runs the attempt exactly once more. There is no backoff
//! curve and no second retry; the retry's own outcome is what callers get.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::RetryConfig;
use crate::error::GatewayResult;
use crate::upstream::UpstreamOutcome;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retry_on_status: Vec<u16>,
    retry_on_transport_error: bool,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            retry_on_status: config.retry_on_status.clone(),
            retry_on_transport_error: config.retry_on_transport_error,
            delay: Duration::from_millis(config.delay_ms),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether an outcome of the first attempt earns the retry
    pub fn should_retry(&self, outcome: &UpstreamOutcome) -> bool {
        match outcome {
            UpstreamOutcome::Success { .. } => false,
            UpstreamOutcome::Failure {
                status: Some(status),
                ..
            } => self.retry_on_status.contains(status),
            UpstreamOutcome::Failure { status: None, .. } => self.retry_on_transport_error,
        }
    }

    /// Run `attempt` once, and once more after the delay if the policy says so
    ///
    /// The closure receives the attempt number (1 or 2) and must build its
    /// upstream call from scratch each time.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> GatewayResult<UpstreamOutcome>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = GatewayResult<UpstreamOutcome>>,
    {
        let first = attempt(1).await?;
        if !self.should_retry(&first) {
            return Ok(first);
        }

        warn!(
            status = ?first.status(),
            delay_ms = self.delay.as_millis() as u64,
            "Upstream looks cold, retrying once"
        );
        tokio::time::sleep(self.delay).await;

        let second = attempt(2).await?;
        if second.is_success() {
            info!("Retry succeeded with status {:?}", second.status());
        } else {
            warn!("Retry failed with status {:?}", second.status());
        }
        Ok(second)
    }
}
