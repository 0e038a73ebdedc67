//! Pingwatch liveness server binary

use liveness_server::{Config, LivenessServer, setup_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tracing depends on the config, so config errors go to stderr
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Using default configuration");
            Config::default()
        }
    };

    let _telemetry_guard = setup_tracing(&config.logging, &config.telemetry)?;

    match Config::find_config_file() {
        Some(path) => tracing::info!(path = %path.display(), "Configuration file found"),
        None => tracing::info!("No configuration file found, using defaults"),
    }

    let server = LivenessServer::new(config.to_server_config())?;
    server.run().await?;

    Ok(())
}
