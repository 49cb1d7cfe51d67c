use std::net::TcpListener;

use staybook::configuration::get_configuration;
use staybook::startup::{build_repositories, run, AppState};
use staybook::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, message: &str) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(startup_error(std::io::ErrorKind::InvalidInput, "Configuration error"));
        }
    };

    // Lifetimes are parsed per login; a bad value only surfaces there.
    if let Err(e) = configuration.jwt.token_lifetimes() {
        tracing::warn!("Token lifetimes will fail at login: {}", e);
    }

    let repositories = build_repositories(&configuration).await.map_err(|e| {
        tracing::error!("Failed to set up storage: {}", e);
        startup_error(std::io::ErrorKind::ConnectionRefused, "Storage error")
    })?;

    let state = AppState::new(&configuration, repositories).map_err(|e| {
        tracing::error!("Invalid JWT configuration: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "JWT configuration error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, state)?;
    server.await
}
