//! Sample SOAP service binary.
//!
//! Run with: `soap-sample-service --config config.yaml`

use anyhow::{Context, Result};
use clap::Parser;
use soap_sample_service::{server, SampleService, ServiceConfig, SoapEndpoint};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Sample SOAP service exposing Test, XmlMethod and EchoModel.
///
/// Serves SOAP 1.1 and 1.2 requests on the configured path and the
/// service WSDL on GET requests to the same path.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Listen address, overriding `server.listen` (e.g. "127.0.0.1:5000")
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Starting sample SOAP service v{}", env!("CARGO_PKG_VERSION"));
    info!("Config file: {}", args.config.display());

    let mut config = if args.config.exists() {
        let content = tokio::fs::read_to_string(&args.config)
            .await
            .context("Failed to read config file")?;
        serde_yaml::from_str(&content).context("Failed to parse config file")?
    } else {
        info!("Config file not found, using defaults");
        ServiceConfig::default()
    };

    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }

    info!(
        listen = %config.server.listen,
        path = %config.server.path,
        contract = %config.contract.name,
        namespace = %config.contract.namespace,
        max_body_size = config.settings.max_body_size,
        "Configuration loaded"
    );

    let endpoint = Arc::new(SoapEndpoint::new(config, SampleService));

    server::serve(endpoint, shutdown_signal())
        .await
        .context("SOAP server error")?;

    info!("Sample SOAP service stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
