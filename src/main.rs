use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mystery_suspense::cli::{execute_command, Cli};
use mystery_suspense::config::{LogFormat, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging needs no API key, so commands that never call the generator still run
    let logging = LoggingConfig::from_env();
    init_logging(&logging);

    info!(version = env!("CARGO_PKG_VERSION"), command = ?cli.command, "mystery-suspense starting");

    let result = execute_command(cli.command).await;
    if result.exit_code == 0 {
        println!("{}", result.message);
    } else {
        error!(exit_code = result.exit_code, "Command failed");
        eprintln!("{}", result.message);
        std::process::exit(result.exit_code);
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
