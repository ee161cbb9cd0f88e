use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::*;
use crate::error::{GatewayError, GatewayResult};

/// Main gateway configuration structure
///
/// This represents the complete configuration for the gateway: where it listens,
/// which backends it fronts, and how it compensates for their cold starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration (host, port, dispatch timeout)
    #[serde(default)]
    pub server: ServerConfig,
    /// Backend routes, one per fronted service
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,
    /// Per-request cold-start mitigation (probe and retry)
    #[serde(default)]
    pub cold_start: ColdStartConfig,
    /// Background keep-alive pings
    #[serde(default)]
    pub keep_alive: KeepAliveConfig,
}

/// Server configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upstream dispatch timeout in milliseconds (default: 30000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Route configuration structure
///
/// Maps every request under `prefix` to the backend at `upstream`. The rewrite
/// rule is data, not code: `strip_prefix` forwards only the remainder, otherwise
/// the remainder is re-prefixed with `upstream_prefix` (or the route prefix).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteConfig {
    /// Backend name, used in health output and for the `<NAME>_URL` override
    pub name: String,
    /// URL path prefix to match (e.g., "/api/pagos")
    pub prefix: String,
    /// Backend base URL (e.g., "https://pagos.example")
    pub upstream: String,
    /// Whether to drop the matched prefix before forwarding
    #[serde(default)]
    pub strip_prefix: bool,
    /// Segment the backend expects in place of the prefix when not stripping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_prefix: Option<String>,
}

/// Cold-start mitigation applied to each proxied request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColdStartConfig {
    /// Ping the backend base URL before dispatching (result is only logged)
    #[serde(default = "default_true")]
    pub probe_before_dispatch: bool,
    /// Probe timeout in milliseconds (default: 20000)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Single-retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ColdStartConfig {
    fn default() -> Self {
        Self {
            probe_before_dispatch: true,
            probe_timeout_ms: default_probe_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

/// Which failures earn exactly one extra attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Upstream statuses that trigger the retry (default: [502])
    #[serde(default = "default_retry_statuses")]
    pub retry_on_status: Vec<u16>,
    /// Whether a transport failure (no response) triggers the retry
    #[serde(default)]
    pub retry_on_transport_error: bool,
    /// Fixed wait before the retry in milliseconds (default: 2000)
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_on_status: default_retry_statuses(),
            retry_on_transport_error: false,
            delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Background keep-alive schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    /// Whether the server activates the scheduler at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay between server start and scheduler activation in milliseconds
    #[serde(default = "default_keep_alive_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Period between ping rounds in milliseconds
    #[serde(default = "default_keep_alive_interval_ms")]
    pub interval_ms: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: default_keep_alive_initial_delay_ms(),
            interval_ms: default_keep_alive_interval_ms(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

fn default_retry_statuses() -> Vec<u16> {
    vec![DEFAULT_RETRY_STATUS]
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_keep_alive_initial_delay_ms() -> u64 {
    DEFAULT_KEEP_ALIVE_INITIAL_DELAY_MS
}

fn default_keep_alive_interval_ms() -> u64 {
    DEFAULT_KEEP_ALIVE_INTERVAL_MS
}

fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            name: USUARIOS_ROUTE.to_string(),
            prefix: USUARIOS_PREFIX.to_string(),
            upstream: DEFAULT_USUARIOS_URL.to_string(),
            strip_prefix: false,
            upstream_prefix: Some(USUARIOS_UPSTREAM_PREFIX.to_string()),
        },
        RouteConfig {
            name: PAGOS_ROUTE.to_string(),
            prefix: PAGOS_PREFIX.to_string(),
            upstream: DEFAULT_PAGOS_URL.to_string(),
            strip_prefix: true,
            upstream_prefix: None,
        },
    ]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    ///
    /// Reads and parses a TOML configuration file, validates the configuration,
    /// and returns a GatewayConfig instance.
    pub fn from_file(path: &str) -> GatewayResult<Self> {
        info!("Loading configuration from: {}", path);

        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!("Failed to read config file '{}': {}", path, e))
        })?;

        let config: GatewayConfig = toml::from_str(&content).map_err(|e| {
            GatewayError::config(format!("Failed to parse config file '{}': {}", path, e))
        })?;

        info!("{} from: {}", LOG_CONFIG_LOADED, path);
        debug!("Loaded config: {:#?}", config);

        config.validate()?;

        Ok(config)
    }

    /// Build the effective configuration for a server start
    ///
    /// Uses the TOML file when one is given (defaults otherwise), then applies
    /// the process environment on top and validates the result.
    pub fn load(path: Option<&Path>) -> GatewayResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(&path.to_string_lossy())?,
            None => {
                info!("No configuration file given, using built-in defaults");
                Self::default_config()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Apply environment-style overrides
    ///
    /// `PORT` replaces the listen port and `<ROUTE NAME>_URL` (upper-cased)
    /// replaces that route's upstream. The lookup is injected so callers
    /// other than `load` can supply their own source.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            match port.trim().parse::<u16>() {
                Ok(port) => {
                    info!("Overriding port from {}: {}", ENV_PORT, port);
                    self.server.port = port;
                }
                Err(e) => warn!("Ignoring invalid {} value '{}': {}", ENV_PORT, port, e),
            }
        }

        for route in &mut self.routes {
            let key = route.upstream_env_var();
            if let Some(upstream) = lookup(&key) {
                info!("Overriding upstream of '{}' from {}: {}", route.name, key, upstream);
                route.upstream = upstream;
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> GatewayResult<()> {
        if self.routes.is_empty() {
            warn!("No routes configured - gateway will only serve its own endpoints");
        }

        let mut names = HashSet::new();
        let mut prefixes = HashSet::new();
        for (i, route) in self.routes.iter().enumerate() {
            route
                .validate()
                .map_err(|e| GatewayError::config(format!("Route {}: {}", i, e)))?;

            if !names.insert(route.name.as_str()) {
                return Err(GatewayError::config(format!(
                    "Duplicate route name: {}",
                    route.name
                )));
            }
            if !prefixes.insert(route.prefix.as_str()) {
                return Err(GatewayError::config(format!(
                    "Duplicate route prefix: {}",
                    route.prefix
                )));
            }
        }

        if self.server.timeout_ms == 0 {
            return Err(GatewayError::validation("Dispatch timeout must be positive"));
        }
        if self.cold_start.probe_timeout_ms == 0 {
            return Err(GatewayError::validation("Probe timeout must be positive"));
        }
        if self.cold_start.probe_timeout_ms > self.server.timeout_ms {
            return Err(GatewayError::validation(format!(
                "Probe timeout ({} ms) must not exceed the dispatch timeout ({} ms)",
                self.cold_start.probe_timeout_ms, self.server.timeout_ms
            )));
        }
        for status in &self.cold_start.retry.retry_on_status {
            if !(100..=599).contains(status) {
                return Err(GatewayError::validation(format!(
                    "Invalid retry status code: {}",
                    status
                )));
            }
        }
        if self.keep_alive.enabled && self.keep_alive.interval_ms == 0 {
            return Err(GatewayError::validation(
                "Keep-alive interval must be positive",
            ));
        }

        info!("Configuration validation completed successfully");
        Ok(())
    }

    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            routes: default_routes(),
            cold_start: ColdStartConfig::default(),
            keep_alive: KeepAliveConfig::default(),
        }
    }

    pub fn save_example(path: &str) -> GatewayResult<()> {
        let config = Self::default_config();
        let content = toml::to_string_pretty(&config)?;

        fs::write(path, &content)?;

        info!("Example configuration saved to: {}", path);
        Ok(())
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.server.timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.cold_start.probe_timeout_ms)
    }
}

impl RouteConfig {
    /// Check if this route matches the given path
    ///
    /// Matching is on whole segments: "/api/pagos" matches "/api/pagos" and
    /// "/api/pagos/x" but not "/api/pagosx".
    pub fn matches_path(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Transform the original request path for upstream forwarding
    ///
    /// Callers must only pass paths accepted by `matches_path`.
    pub fn transform_path(&self, original_path: &str) -> String {
        let remainder = original_path
            .strip_prefix(self.prefix.as_str())
            .unwrap_or(original_path);

        let rewritten = if self.strip_prefix {
            remainder.to_string()
        } else {
            let base = self.upstream_prefix.as_deref().unwrap_or(&self.prefix);
            format!("{}{}", base.trim_end_matches('/'), remainder)
        };

        if rewritten.is_empty() {
            "/".to_string()
        } else {
            rewritten
        }
    }

    /// Join the backend base URL with an already rewritten path
    pub fn upstream_url(&self, rewritten_path: &str) -> String {
        format!("{}{}", self.upstream.trim_end_matches('/'), rewritten_path)
    }

    /// Environment variable that overrides this route's upstream
    pub fn upstream_env_var(&self) -> String {
        format!(
            "{}{}",
            self.name.to_uppercase().replace('-', "_"),
            ENV_UPSTREAM_SUFFIX
        )
    }

    /// Validate this route configuration
    pub fn validate(&self) -> GatewayResult<()> {
        if self.name.trim().is_empty() {
            return Err(GatewayError::validation("Route name cannot be empty"));
        }

        if !self.prefix.starts_with('/') || self.prefix.len() < 2 || self.prefix.ends_with('/') {
            return Err(GatewayError::validation(format!(
                "Route prefix must start with '/', not end with '/', and not be the root: '{}'",
                self.prefix
            )));
        }

        if let Some(upstream_prefix) = &self.upstream_prefix {
            if !upstream_prefix.is_empty() && !upstream_prefix.starts_with('/') {
                return Err(GatewayError::validation(format!(
                    "Upstream prefix must start with '/': '{}'",
                    upstream_prefix
                )));
            }
        }

        let url = url::Url::parse(&self.upstream).map_err(|e| {
            GatewayError::validation(format!("Invalid upstream URL '{}': {}", self.upstream, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::validation(format!(
                "Upstream URL must use http or https: '{}'",
                self.upstream
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn route(prefix: &str, strip_prefix: bool, upstream_prefix: Option<&str>) -> RouteConfig {
        RouteConfig {
            name: "svc".to_string(),
            prefix: prefix.to_string(),
            upstream: "http://example.com".to_string(),
            strip_prefix,
            upstream_prefix: upstream_prefix.map(str::to_string),
        }
    }

    #[test]
    fn test_route_matching_on_segments() {
        let route = route("/api/pagos", true, None);

        assert!(route.matches_path("/api/pagos"));
        assert!(route.matches_path("/api/pagos/"));
        assert!(route.matches_path("/api/pagos/checkout"));
        assert!(!route.matches_path("/api/pagosx"));
        assert!(!route.matches_path("/api/usuarios/1"));
        assert!(!route.matches_path("/health"));
    }

    #[test]
    fn test_strip_prefix_transformation() {
        let route = route("/api/pagos", true, None);

        assert_eq!(route.transform_path("/api/pagos/checkout"), "/checkout");
        assert_eq!(route.transform_path("/api/pagos/a/b"), "/a/b");
        assert_eq!(route.transform_path("/api/pagos/"), "/");
        assert_eq!(route.transform_path("/api/pagos"), "/");
    }

    #[test]
    fn test_preserved_segment_transformation() {
        let route = route("/api/usuarios", false, Some("/api"));

        assert_eq!(route.transform_path("/api/usuarios/42"), "/api/42");
        assert_eq!(route.transform_path("/api/usuarios/login/x"), "/api/login/x");
        assert_eq!(route.transform_path("/api/usuarios/"), "/api/");
        assert_eq!(route.transform_path("/api/usuarios"), "/api");
    }

    #[test]
    fn test_preserve_without_upstream_prefix_keeps_path() {
        let route = route("/api/usuarios", false, None);
        assert_eq!(route.transform_path("/api/usuarios/42"), "/api/usuarios/42");
    }

    #[test]
    fn test_upstream_url_joins_without_double_slash() {
        let mut route = route("/api/pagos", true, None);
        route.upstream = "https://pay.example/".to_string();
        assert_eq!(route.upstream_url("/checkout"), "https://pay.example/checkout");
    }

    #[test]
    fn test_upstream_env_var() {
        let mut route = route("/api/pagos", true, None);
        route.name = "pagos".to_string();
        assert_eq!(route.upstream_env_var(), "PAGOS_URL");

        route.name = "user-profiles".to_string();
        assert_eq!(route.upstream_env_var(), "USER_PROFILES_URL");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = GatewayConfig::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.cold_start.retry.retry_on_status, vec![502]);
        assert!(!config.cold_start.retry.retry_on_transport_error);
        assert!(config.probe_timeout() < config.dispatch_timeout());
    }

    #[test]
    fn test_default_routes_rewrite_rules() {
        let config = GatewayConfig::default_config();
        let usuarios = config.routes.iter().find(|r| r.name == "usuarios").unwrap();
        let pagos = config.routes.iter().find(|r| r.name == "pagos").unwrap();

        assert_eq!(usuarios.transform_path("/api/usuarios/perfil"), "/api/perfil");
        assert_eq!(pagos.transform_path("/api/pagos/checkout"), "/checkout");
    }

    #[test]
    fn test_overrides_apply_port_and_upstreams() {
        let mut config = GatewayConfig::default_config();
        let env: HashMap<&str, &str> = [
            ("PORT", "8081"),
            ("USUARIOS_URL", "http://users.local"),
            ("PAGOS_URL", "http://pay.local"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.routes[0].upstream, "http://users.local");
        assert_eq!(config.routes[1].upstream, "http://pay.local");
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let mut config = GatewayConfig::default_config();
        config.apply_overrides(|key| (key == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, DEFAULT_HTTP_PORT);
    }

    #[test]
    fn test_validation_rejects_bad_routes() {
        let mut config = GatewayConfig::default_config();
        config.routes[0].upstream = "invalid-url".to_string();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default_config();
        config.routes[0].upstream = "ftp://files.example".to_string();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default_config();
        config.routes[0].prefix = "/api/usuarios/".to_string();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default_config();
        config.routes[1].prefix = config.routes[0].prefix.clone();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default_config();
        config.routes[1].name = config.routes[0].name.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_timing() {
        let mut config = GatewayConfig::default_config();
        config.cold_start.probe_timeout_ms = config.server.timeout_ms + 1;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default_config();
        config.keep_alive.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default_config();
        config.keep_alive.enabled = false;
        config.keep_alive.interval_ms = 0;
        assert!(config.validate().is_ok());

        let mut config = GatewayConfig::default_config();
        config.cold_start.retry.retry_on_status = vec![999];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_with_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gateway.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 4000

[[routes]]
name = "pagos"
prefix = "/api/pagos"
upstream = "http://localhost:5001"
strip_prefix = true

[cold_start.retry]
retry_on_status = [502, 503]
delay_ms = 10
"#,
        )
        .unwrap();

        let config = GatewayConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.routes.len(), 1);
        assert!(config.routes[0].strip_prefix);
        assert_eq!(config.cold_start.retry.retry_on_status, vec![502, 503]);
        assert_eq!(config.cold_start.retry.delay_ms, 10);
        assert!(config.cold_start.probe_before_dispatch);
        assert!(config.keep_alive.enabled);
    }

    #[test]
    fn test_from_file_missing() {
        let result = GatewayConfig::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(GatewayError::Config { .. })));
    }

    #[test]
    fn test_save_example_round_trips_through_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("example.toml");
        let path = path.to_str().unwrap();

        GatewayConfig::save_example(path).unwrap();
        let loaded = GatewayConfig::from_file(path).unwrap();

        assert_eq!(loaded.routes, GatewayConfig::default_config().routes);
    }
}
