use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{GatewayConfig, RouteConfig};
use crate::constants::MAX_PROXY_BODY_BYTES;
use crate::error::{GatewayError, GatewayResult};
use crate::prober::Prober;
use crate::retry::RetryPolicy;
use crate::upstream::{build_client, Dispatcher, InboundRequest, UpstreamCallSpec, UpstreamOutcome};

/// State shared across all proxy handlers
///
/// Holds the route table plus the three collaborators of a forward: the
/// prober, the dispatcher and the retry policy. Cloning is cheap.
#[derive(Clone)]
pub struct ProxyState {
    /// Gateway configuration (wrapped in Arc for shared ownership)
    pub config: Arc<GatewayConfig>,
    /// Routes ordered longest prefix first
    routes: Arc<Vec<RouteConfig>>,
    dispatcher: Dispatcher,
    prober: Prober,
    retry: RetryPolicy,
}

impl ProxyState {
    /// Create a new ProxyState with the given configuration
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let client = build_client()?;

        let mut routes = config.routes.clone();
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Ok(Self {
            dispatcher: Dispatcher::new(client.clone()),
            prober: Prober::new(client, config.probe_timeout()),
            retry: RetryPolicy::new(&config.cold_start.retry),
            routes: Arc::new(routes),
            config: Arc::new(config),
        })
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    pub fn routes(&self) -> &[RouteConfig] {
        &self.routes
    }

    /// Find the route for `path` and compute the upstream path
    ///
    /// The most specific prefix wins when prefixes nest.
    pub fn resolve(&self, path: &str) -> GatewayResult<(&RouteConfig, String)> {
        self.routes
            .iter()
            .find(|route| route.matches_path(path))
            .map(|route| (route, route.transform_path(path)))
            .ok_or_else(|| GatewayError::route_not_found(path))
    }

    /// Build a brand-new call spec for one attempt
    pub fn build_call(&self, inbound: &InboundRequest) -> GatewayResult<UpstreamCallSpec> {
        let (route, rewritten) = self.resolve(&inbound.path)?;

        let mut url = route.upstream_url(&rewritten);
        if let Some(query) = inbound.query.as_deref().filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }

        UpstreamCallSpec::new(url, inbound, self.config.dispatch_timeout())
    }

    /// Run the full forward: probe, dispatch, and the optional single retry
    pub async fn forward(&self, inbound: &InboundRequest) -> GatewayResult<UpstreamOutcome> {
        let (route, _) = self.resolve(&inbound.path)?;

        if self.config.cold_start.probe_before_dispatch {
            self.prober.wake(&route.name, &route.upstream).await;
        }

        self.retry
            .run(|attempt| async move {
                let spec = self.build_call(inbound)?;
                info!("Enviando {} a {} (intento {})", spec.method, spec.url, attempt);
                Ok(self.dispatcher.dispatch(spec).await)
            })
            .await
    }
}

/// Main proxy handler for incoming requests
///
/// Every path not served by the gateway itself lands here. Failures of any
/// kind leave as a JSON error envelope, never as a dropped connection.
#[instrument(skip(state, headers, body), fields(method = %method, uri = %uri))]
pub async fn proxy_handler(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let path = uri.path().to_string();

    match state.resolve(&path) {
        Ok((route, rewritten)) => info!(
            "Proxy: {} {} -> {}",
            method,
            path,
            route.upstream_url(&rewritten)
        ),
        Err(e) => {
            warn!("No matching route found for: {} {}", method, path);
            return e.into_response();
        }
    }

    let body = match read_request_body(body, MAX_PROXY_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => return e.into_response(),
    };

    let inbound = InboundRequest {
        method,
        path,
        query: uri.query().map(str::to_string),
        headers,
        body,
    };

    match state.forward(&inbound).await {
        Ok(outcome) => {
            debug!("Upstream outcome status: {:?}", outcome.status());
            outcome.into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Read the request body from the incoming request, up to `limit` bytes
async fn read_request_body(body: Body, limit: usize) -> GatewayResult<Bytes> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!("Request body larger than {} bytes rejected", limit);
            Err(GatewayError::PayloadTooLarge { limit })
        }
        Err(e) => {
            error!("Failed to read request body: {}", e);
            Err(GatewayError::invalid_request(format!(
                "Failed to read request body: {}",
                e
            )))
        }
    }
}
