use axum::{
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::constants::*;
use crate::error::{ErrorEnvelope, GatewayError, GatewayResult};

/// Build the pooled HTTP client shared by the dispatcher, the prober and
/// the keep-alive scheduler. Timeouts are applied per request.
pub fn build_client() -> GatewayResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(CLIENT_POOL_IDLE_TIMEOUT_SECS))
        .pool_max_idle_per_host(CLIENT_POOL_MAX_IDLE_PER_HOST)
        .user_agent(CLIENT_USER_AGENT)
        .build()?;
    Ok(client)
}

/// A request as handed over by the HTTP layer, already read into memory
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    /// The raw inbound `Authorization` bytes, empty when the header is absent
    pub fn authorization(&self) -> &[u8] {
        self.headers
            .get(header::AUTHORIZATION)
            .map(HeaderValue::as_bytes)
            .unwrap_or_default()
    }
}

/// Everything needed for one outbound attempt
///
/// Built fresh for every attempt and consumed by `Dispatcher::dispatch`.
#[derive(Debug)]
pub struct UpstreamCallSpec {
    pub method: reqwest::Method,
    pub url: String,
    pub authorization: reqwest::header::HeaderValue,
    pub body: Bytes,
    pub timeout: Duration,
}

impl UpstreamCallSpec {
    pub fn new(url: String, inbound: &InboundRequest, timeout: Duration) -> GatewayResult<Self> {
        let method = reqwest::Method::from_bytes(inbound.method.as_str().as_bytes())
            .map_err(|_| {
                GatewayError::invalid_request(format!("Unsupported method: {}", inbound.method))
            })?;
        // Byte-for-byte copy, including obs-text that is not valid UTF-8
        let authorization = reqwest::header::HeaderValue::from_bytes(inbound.authorization())
            .map_err(|e| {
                GatewayError::invalid_request(format!("Invalid Authorization header: {}", e))
            })?;

        Ok(Self {
            method,
            url,
            authorization,
            body: inbound.body.clone(),
            timeout,
        })
    }
}

/// Result of one upstream attempt
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamOutcome {
    Success {
        status: u16,
        body: Bytes,
        content_type: Option<String>,
    },
    Failure {
        /// Absent when no response was received at all
        status: Option<u16>,
        message: String,
    },
}

impl UpstreamOutcome {
    pub fn transport_failure<S: Into<String>>(message: S) -> Self {
        Self::Failure {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. } => Some(*status),
            Self::Failure { status, .. } => *status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl IntoResponse for UpstreamOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Success {
                status,
                body,
                content_type,
            } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
                let content_type = content_type
                    .and_then(|value| HeaderValue::from_str(&value).ok())
                    .unwrap_or_else(|| HeaderValue::from_static(UPSTREAM_CONTENT_TYPE));
                (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
            }
            Self::Failure { status, message } => {
                let status = status
                    .and_then(|code| StatusCode::from_u16(code).ok())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, Json(ErrorEnvelope::new(MSG_UPSTREAM_ERROR, message))).into_response()
            }
        }
    }
}

/// Issues upstream calls and maps whatever comes back into an outcome
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Send one attempt
    ///
    /// Only `Content-Type: application/json` and `Authorization` are sent;
    /// every other inbound header is dropped.
    #[instrument(skip(self, spec), fields(method = %spec.method, url = %spec.url))]
    pub async fn dispatch(&self, spec: UpstreamCallSpec) -> UpstreamOutcome {
        debug!("Dispatching {} {}", spec.method, spec.url);

        let request = self
            .client
            .request(spec.method, &spec.url)
            .header(reqwest::header::CONTENT_TYPE, UPSTREAM_CONTENT_TYPE)
            .header(reqwest::header::AUTHORIZATION, spec.authorization)
            .timeout(spec.timeout)
            .body(spec.body);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Error en proxy hacia {}: {}", spec.url, e);
                return UpstreamOutcome::transport_failure(e.to_string());
            }
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to read upstream body from {}: {}", spec.url, e);
                return UpstreamOutcome::transport_failure(e.to_string());
            }
        };

        if status.is_success() {
            debug!(
                "Respuesta exitosa de {} ({}, {} bytes)",
                spec.url,
                status,
                body.len()
            );
            return UpstreamOutcome::Success {
                status: status.as_u16(),
                body,
                content_type,
            };
        }

        let message = upstream_error_message(&body)
            .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
        error!("Upstream {} answered {}: {}", spec.url, status, message);

        UpstreamOutcome::Failure {
            status: Some(status.as_u16()),
            message,
        }
    }
}

/// The `error` field of a JSON error body
///
/// Strings are taken as is and other values are rendered as JSON. Empty,
/// `null`, `false` and zero count as absent.
fn upstream_error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("error")? {
        serde_json::Value::Null | serde_json::Value::Bool(false) => None,
        serde_json::Value::String(text) if text.is_empty() => None,
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
