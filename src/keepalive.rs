use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{KeepAliveConfig, RouteConfig};
use crate::prober::Prober;

/// A backend the scheduler keeps warm
#[derive(Debug, Clone, PartialEq)]
pub struct KeepAliveTarget {
    pub name: String,
    pub url: String,
}

impl From<&RouteConfig> for KeepAliveTarget {
    fn from(route: &RouteConfig) -> Self {
        Self {
            name: route.name.clone(),
            url: route.upstream.clone(),
        }
    }
}

/// Periodic pings that keep every backend from idling
///
/// Owned by the server and shared with the health endpoint. `running` is
/// written once, by the first successful `start`, and only read afterwards.
pub struct KeepAliveScheduler {
    interval: Duration,
    initial_delay: Duration,
    targets: Vec<KeepAliveTarget>,
    prober: Prober,
    running: AtomicBool,
    shutdown: CancellationToken,
}

impl KeepAliveScheduler {
    pub fn new(
        config: &KeepAliveConfig,
        targets: Vec<KeepAliveTarget>,
        prober: Prober,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            targets,
            prober,
            running: AtomicBool::new(false),
            shutdown,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn targets(&self) -> &[KeepAliveTarget] {
        &self.targets
    }

    /// Start the ping loop unless it is already running
    ///
    /// Returns `true` only for the call that actually spawned the loop.
    pub fn start(self: &Arc<Self>) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Keep-alive already running, ignoring start");
            return false;
        }

        info!(
            interval_secs = self.interval.as_secs(),
            backends = self.targets.len(),
            "Keep-alive activado"
        );

        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run().await });
        true
    }

    /// Activate the loop once the initial delay has passed
    pub fn start_after_initial_delay(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(scheduler.initial_delay) => {
                    scheduler.start();
                }
                _ = scheduler.shutdown.cancelled() => {
                    debug!("Shutdown before keep-alive activation");
                }
            }
        })
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // A round in flight is dropped on shutdown; its JoinSet aborts the pings
            tokio::select! {
                _ = async {
                    ticker.tick().await;
                    self.ping_all().await;
                } => {}
                _ = self.shutdown.cancelled() => {
                    info!("Keep-alive loop shutting down");
                    break;
                }
            }
        }
    }

    /// Ping every target in parallel and return how many answered
    ///
    /// Each ping runs in its own task, so one slow or failing backend does
    /// not hold up or break the others.
    #[instrument(skip(self), fields(backends = self.targets.len()))]
    pub async fn ping_all(&self) -> usize {
        let mut pings = JoinSet::new();
        for target in &self.targets {
            let prober = self.prober.clone();
            let target = target.clone();
            pings.spawn(async move { prober.probe(&target.name, &target.url).await });
        }

        let mut awake = 0;
        while let Some(result) = pings.join_next().await {
            match result {
                Ok(true) => awake += 1,
                Ok(false) => {}
                Err(e) => warn!("Keep-alive ping task failed: {}", e),
            }
        }

        debug!("Keep-alive round finished: {}/{} awake", awake, self.targets.len());
        awake
    }
}
