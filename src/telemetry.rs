use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the JSON subscriber. `RUST_LOG` overrides the default `info`
/// level. Records emitted through the `log` facade are forwarded as well.
pub fn init_telemetry() {
    let _ = try_init_telemetry();
}

/// Like `init_telemetry` but reports a second initialisation instead of
/// ignoring it, so tests can call it from several places.
pub fn try_init_telemetry() -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
}
