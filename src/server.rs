use axum::{
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::constants::*;
use crate::error::{GatewayError, GatewayResult};
use crate::health::{health_handler, liveness_handler, root_handler, HealthState};
use crate::keepalive::{KeepAliveScheduler, KeepAliveTarget};
use crate::proxy::{proxy_handler, ProxyState};

async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal, shutting down gracefully..."),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down gracefully...");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown_token.cancelled() => {},
    }
}

/// Build the process-wide keep-alive scheduler for `config`
pub fn create_keep_alive(
    config: &GatewayConfig,
    proxy_state: &ProxyState,
    shutdown_token: CancellationToken,
) -> Arc<KeepAliveScheduler> {
    let targets = config.routes.iter().map(KeepAliveTarget::from).collect();
    Arc::new(KeepAliveScheduler::new(
        &config.keep_alive,
        targets,
        proxy_state.prober().clone(),
        shutdown_token,
    ))
}

pub async fn start_server(config: GatewayConfig) -> GatewayResult<()> {
    info!("{}", LOG_SERVER_STARTING);

    let shutdown_token = CancellationToken::new();

    let proxy_state = ProxyState::new(config.clone())?;
    let keep_alive = create_keep_alive(&config, &proxy_state, shutdown_token.child_token());
    let health_state = HealthState::new(&config, Arc::clone(&keep_alive));

    info!("Application state initialized");

    if config.keep_alive.enabled {
        info!(
            "Keep-alive will activate in {} ms, then ping every {} ms",
            config.keep_alive.initial_delay_ms, config.keep_alive.interval_ms
        );
        keep_alive.start_after_initial_delay();
    } else {
        warn!("Keep-alive disabled by configuration");
    }

    let app = create_router(proxy_state, health_state);

    let listener = match bind_listener(&config.server.host, config.server.port).await {
        Ok(listener) => listener,
        Err(e) => {
            shutdown_token.cancel();
            return Err(e);
        }
    };
    let addr = listener.local_addr()?;

    info!("API Gateway ejecutándose en http://{}", addr);
    log_routes_info(&config);
    log_endpoints(&addr);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await;

    shutdown_token.cancel();

    if let Err(e) = result {
        error!("HTTP Server error: {}", e);
        return Err(e.into());
    }

    info!("{}", LOG_SERVER_SHUTDOWN);
    Ok(())
}

/// Bind `host:port`, resolving host names; never falls back to another address
async fn bind_listener(host: &str, port: u16) -> GatewayResult<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| GatewayError::server(format!("Failed to bind {}:{}: {}", host, port, e)))
}

/// Assemble the gateway's router
///
/// The gateway's own endpoints are matched first; everything else falls
/// through to the proxy, which answers 404 itself when no route matches.
pub fn create_router(proxy_state: ProxyState, health_state: HealthState) -> Router {
    let own_endpoints = Router::new()
        .route(ROOT_ENDPOINT, get(root_handler))
        .route(HEALTH_ENDPOINT, get(health_handler))
        .route(LIVENESS_ENDPOINT, get(liveness_handler))
        .with_state(health_state);

    let proxied = Router::new()
        .fallback(proxy_handler)
        .with_state(proxy_state);

    own_endpoints
        .merge(proxied)
        // Request tracing
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(handle_panic))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    };

    GatewayError::internal(detail).into_response()
}

fn log_routes_info(config: &GatewayConfig) {
    info!("Redirigiendo peticiones a {} microservicios:", config.routes.len());
    for route in &config.routes {
        info!("   - {}: {} -> {}", route.name, route.prefix, route.upstream);
    }
}

fn log_endpoints(addr: &SocketAddr) {
    info!("Gateway endpoints:");
    info!("   - Info: http://{}{}", addr, ROOT_ENDPOINT);
    info!("   - Health: http://{}{}", addr, HEALTH_ENDPOINT);
    info!("   - Liveness: http://{}{}", addr, LIVENESS_ENDPOINT);
}
