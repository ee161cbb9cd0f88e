/// Application constants for the Warmgate API gateway
///
/// Default values, timing policy and the JSON wire strings shared by the
/// handlers live here so the rest of the crate never hard-codes them.
// Default server configuration
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Default backends
pub const USUARIOS_ROUTE: &str = "usuarios";
pub const USUARIOS_PREFIX: &str = "/api/usuarios";
pub const USUARIOS_UPSTREAM_PREFIX: &str = "/api";
pub const DEFAULT_USUARIOS_URL: &str =
    "https://usuarios-a454-b9hi0wtfc-ofs-projects-1419b589.vercel.app";
pub const PAGOS_ROUTE: &str = "pagos";
pub const PAGOS_PREFIX: &str = "/api/pagos";
pub const DEFAULT_PAGOS_URL: &str =
    "https://pagos-mtuf-mnyaeva09-ofs-projects-1419b589.vercel.app";

// Environment variables
pub const ENV_PORT: &str = "PORT";
pub const ENV_UPSTREAM_SUFFIX: &str = "_URL";

// Cold-start policy
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;
pub const DEFAULT_RETRY_STATUS: u16 = 502;
pub const DEFAULT_KEEP_ALIVE_INITIAL_DELAY_MS: u64 = 30_000;
pub const DEFAULT_KEEP_ALIVE_INTERVAL_MS: u64 = 600_000;

// Client configuration
pub const CLIENT_USER_AGENT: &str = concat!("warmgate/", env!("CARGO_PKG_VERSION"));
pub const CLIENT_POOL_IDLE_TIMEOUT_SECS: u64 = 60;
pub const CLIENT_POOL_MAX_IDLE_PER_HOST: usize = 10;
pub const UPSTREAM_CONTENT_TYPE: &str = "application/json";
/// Largest inbound body the proxy buffers (100 KiB)
pub const MAX_PROXY_BODY_BYTES: usize = 100 * 1024;

// Gateway endpoints
pub const ROOT_ENDPOINT: &str = "/";
pub const HEALTH_ENDPOINT: &str = "/health";
pub const LIVENESS_ENDPOINT: &str = "/health/live";

// File paths
pub const DEFAULT_CONFIG_FILE: &str = "gateway.toml";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE_PREFIX: &str = "warmgate";

// System description served on the root endpoint
pub const SYSTEM_NAME: &str = "Sistema de Gestión de Inscripciones y Pagos";
pub const SYSTEM_VERSION: &str = "1.0.0";
pub const SYSTEM_ARCHITECTURE: &str = "Microservicios con Firebase";
pub const HEALTH_ENDPOINT_KEY: &str = "salud";

// Response messages
pub const MSG_HEALTHY: &str = "API Gateway funcionando correctamente";
pub const MSG_UPSTREAM_ERROR: &str = "Error en comunicación con microservicio";
pub const MSG_INTERNAL_ERROR: &str = "Error interno del servidor";
pub const MSG_ROUTE_NOT_FOUND: &str = "Ruta no encontrada";
pub const MSG_INVALID_REQUEST: &str = "Solicitud inválida";
pub const MSG_PAYLOAD_TOO_LARGE: &str = "Cuerpo de la petición demasiado grande";
pub const KEEP_ALIVE_ACTIVE: &str = "activo";
pub const KEEP_ALIVE_INACTIVE: &str = "inactivo";

// Log messages
pub const LOG_SERVER_STARTING: &str = "Starting Warmgate API gateway";
pub const LOG_SERVER_SHUTDOWN: &str = "Shutting down Warmgate API gateway";
pub const LOG_CONFIG_LOADED: &str = "Configuration loaded successfully";
