#![cfg(not(tarpaulin_include))]

use dashboard::app;
use dashboard::config::ServerConfig;

/// Main entry point for the dashboard web server
///
/// Reads the server settings from the environment (see [`ServerConfig`])
/// and serves the dashboard until the process is stopped.
///
/// # Arguments
/// * An optional listen address, e.g. `0.0.0.0:8080`
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env(std::env::args().skip(1))?;
    log::info!(
        "charts {}x{}, uploads up to {} bytes, sessions idle out after {:?}",
        config.graph.width,
        config.graph.height,
        config.max_upload_bytes,
        config.session_ttl
    );

    app::run(config).await
}
