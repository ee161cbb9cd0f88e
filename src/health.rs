use axum::{extract::State, response::Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

use crate::config::GatewayConfig;
use crate::constants::*;
use crate::keepalive::KeepAliveScheduler;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub mensaje: &'static str,
    pub timestamp: String,
    pub microservicios: BTreeMap<String, String>,
    #[serde(rename = "keepAlive")]
    pub keep_alive: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct SystemInfoResponse {
    pub mensaje: &'static str,
    pub version: &'static str,
    pub arquitectura: &'static str,
    pub endpoints: BTreeMap<String, String>,
}

/// Read-only view of the gateway for its own endpoints
#[derive(Clone)]
pub struct HealthState {
    startup_time: Instant,
    backends: Arc<BTreeMap<String, String>>,
    endpoints: Arc<BTreeMap<String, String>>,
    keep_alive: Arc<KeepAliveScheduler>,
}

impl HealthState {
    pub fn new(config: &GatewayConfig, keep_alive: Arc<KeepAliveScheduler>) -> Self {
        let backends = config
            .routes
            .iter()
            .map(|route| (route.name.clone(), route.upstream.clone()))
            .collect();

        let mut endpoints: BTreeMap<String, String> = config
            .routes
            .iter()
            .map(|route| (route.name.clone(), route.prefix.clone()))
            .collect();
        endpoints.insert(HEALTH_ENDPOINT_KEY.to_string(), HEALTH_ENDPOINT.to_string());

        Self {
            startup_time: Instant::now(),
            backends: Arc::new(backends),
            endpoints: Arc::new(endpoints),
            keep_alive,
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.startup_time.elapsed().as_secs()
    }

    pub fn keep_alive(&self) -> &Arc<KeepAliveScheduler> {
        &self.keep_alive
    }

    /// Current configuration and keep-alive state, without side effects
    pub fn snapshot(&self) -> HealthResponse {
        HealthResponse {
            mensaje: MSG_HEALTHY,
            timestamp: now_iso8601(),
            microservicios: (*self.backends).clone(),
            keep_alive: if self.keep_alive.is_running() {
                KEEP_ALIVE_ACTIVE
            } else {
                KEEP_ALIVE_INACTIVE
            },
        }
    }

    pub fn system_info(&self) -> SystemInfoResponse {
        SystemInfoResponse {
            mensaje: SYSTEM_NAME,
            version: SYSTEM_VERSION,
            arquitectura: SYSTEM_ARCHITECTURE,
            endpoints: (*self.endpoints).clone(),
        }
    }
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// Health endpoint - configuration plus keep-alive activity
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    debug!("Health endpoint accessed");
    Json(state.snapshot())
}

// Liveness endpoint - indicates if the process is serving at all
#[instrument(skip(state))]
pub async fn liveness_handler(State(state): State<HealthState>) -> Json<LivenessResponse> {
    debug!("Liveness endpoint accessed");
    Json(LivenessResponse {
        status: "alive",
        timestamp: now_iso8601(),
        uptime_seconds: state.get_uptime_seconds(),
    })
}

// Root endpoint - static description of the system
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<HealthState>) -> Json<SystemInfoResponse> {
    debug!("Root endpoint accessed");
    Json(state.system_info())
}
