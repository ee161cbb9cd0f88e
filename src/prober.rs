use std::time::Duration;
use tracing::{debug, info, warn};

/// Best-effort wake-up ping against a backend base URL
///
/// Any HTTP answer, whatever its status, means an instance is up. A timeout
/// or connection error means it is still warming. The result is informative
/// only; nothing in the request path branches on it.
#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
    timeout: Duration,
}

impl Prober {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ping `base_url` and report whether anything answered in time
    pub async fn probe(&self, name: &str, base_url: &str) -> bool {
        debug!("Probing {} at {}", name, base_url);

        match self.client.get(base_url).timeout(self.timeout).send().await {
            Ok(response) => {
                info!(
                    backend = name,
                    status = response.status().as_u16(),
                    "Microservicio {} activo",
                    name
                );
                true
            }
            Err(e) => {
                warn!(
                    backend = name,
                    error = %e,
                    "Microservicio {} todavía despertando",
                    name
                );
                false
            }
        }
    }

    /// Probe in a task of its own and wait for it
    ///
    /// A panic inside the probe ends that task only; the caller carries on.
    pub async fn wake(&self, name: &str, base_url: &str) -> bool {
        let prober = self.clone();
        let name = name.to_string();
        let base_url = base_url.to_string();

        match tokio::spawn(async move { prober.probe(&name, &base_url).await }).await {
            Ok(awake) => awake,
            Err(e) => {
                warn!("Cold-start probe task failed: {}", e);
                false
            }
        }
    }
}
