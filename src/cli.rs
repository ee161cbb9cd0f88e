use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::constants::*;
use crate::error::{GatewayError, GatewayResult};

/// Warmgate API gateway CLI
///
/// Routes requests to backend services by URL prefix and keeps those
/// backends warm. Runs `start` when no command is given.
#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the gateway server
    Start {
        /// Configuration file path (defaults apply when omitted and gateway.toml is absent)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override server host address
        #[arg(long, help = "Override the host address from config")]
        host: Option<String>,

        /// Override server port
        #[arg(short, long, help = "Override the port from config and PORT")]
        port: Option<u16>,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// Generate example configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long, help = "Overwrite the file if it already exists")]
        force: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Execute the CLI command
    pub async fn execute(self) -> GatewayResult<()> {
        let command = self.command.unwrap_or(Commands::Start {
            config: None,
            host: None,
            port: None,
        });

        match command {
            Commands::Start { config, host, port } => start_server(config, host, port).await,
            Commands::Validate { config } => validate_config(config),
            Commands::Init { output, force } => init_config(output, force),
        }
    }
}

/// Pick the configuration file a start should read, if any
///
/// An explicit path always wins; otherwise `gateway.toml` is used when it
/// exists in the working directory.
fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    })
}

/// Build the configuration a `start` would run with
pub fn effective_config(
    config_path: Option<PathBuf>,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> GatewayResult<GatewayConfig> {
    let config_path = resolve_config_path(config_path);
    let mut config = GatewayConfig::load(config_path.as_deref())?;

    // Apply CLI overrides
    if let Some(host) = host_override {
        info!("Overriding host from CLI: {}", host);
        config.server.host = host;
    }

    if let Some(port) = port_override {
        info!("Overriding port from CLI: {}", port);
        config.server.port = port;
    }

    Ok(config)
}

async fn start_server(
    config_path: Option<PathBuf>,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> GatewayResult<()> {
    info!("Starting Warmgate server...");

    let config = effective_config(config_path, host_override, port_override)?;

    crate::server::start_server(config).await
}

fn validate_config(config_path: PathBuf) -> GatewayResult<()> {
    info!("Validating configuration...");

    let config = GatewayConfig::from_file(&path_str(&config_path))?;

    info!("Configuration is valid!");
    info!("Server: {}:{}", config.server.host, config.server.port);
    info!("Routes configured: {}", config.routes.len());

    for route in &config.routes {
        info!(
            "  {}: {} -> {} (strip_prefix: {})",
            route.name, route.prefix, route.upstream, route.strip_prefix
        );
    }

    Ok(())
}

fn init_config(output_path: PathBuf, force: bool) -> GatewayResult<()> {
    let path_str = path_str(&output_path);

    if output_path.exists() && !force {
        error!("Configuration file already exists: {}", path_str);
        error!("Use --force to overwrite the existing file");
        return Err(GatewayError::validation("File already exists"));
    }

    info!("Generating example configuration...");
    GatewayConfig::save_example(&path_str)?;
    info!("Example configuration saved to: {}", path_str);
    info!("Edit the file and run 'warmgate start --config {}' to begin", path_str);

    Ok(())
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["warmgate"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_start_arguments() {
        let cli = Cli::try_parse_from([
            "warmgate", "start", "--config", "custom.toml", "--host", "127.0.0.1", "-p", "8080",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Some(Commands::Start {
                config: Some(PathBuf::from("custom.toml")),
                host: Some("127.0.0.1".to_string()),
                port: Some(8080),
            })
        );
    }

    #[test]
    fn test_validate_defaults_to_gateway_toml() {
        let cli = Cli::try_parse_from(["warmgate", "validate"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Validate {
                config: PathBuf::from(DEFAULT_CONFIG_FILE)
            })
        );
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Cli::try_parse_from(["warmgate", "start", "--port", "99999"]).is_err());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let explicit = PathBuf::from("somewhere/else.toml");
        assert_eq!(resolve_config_path(Some(explicit.clone())), Some(explicit));
    }

    #[test]
    #[serial_test::serial]
    fn test_effective_config_applies_cli_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gateway.toml");
        GatewayConfig::save_example(path.to_str().unwrap()).unwrap();

        let config =
            effective_config(Some(path), Some("127.0.0.1".to_string()), Some(9090)).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_init_config_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gateway.toml");

        assert!(init_config(path.clone(), false).is_ok());
        assert!(path.exists());
        assert!(matches!(
            init_config(path.clone(), false),
            Err(GatewayError::Validation { .. })
        ));
        assert!(init_config(path.clone(), true).is_ok());
        assert!(validate_config(path).is_ok());
    }

    #[test]
    fn test_validate_missing_file() {
        assert!(validate_config(PathBuf::from("/no/such/gateway.toml")).is_err());
    }
}
