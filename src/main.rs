use tracing::error;
use warmgate::cli::Cli;
use warmgate::logging::init_default_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the file writer guard alive until exit
    let _log_guard = match init_default_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return Err(e);
        }
    };

    let cli = Cli::parse_args();

    if let Err(e) = cli.execute().await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
