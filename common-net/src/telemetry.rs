use std::sync::Once;

use tracing::info;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub const DEFAULT_FILTER: &str = "info";

/// Knobs for the global subscriber. `RUST_LOG` always wins over `default_filter`.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    pub default_filter: String,
    pub ansi: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            ansi: true,
        }
    }
}

pub fn init(service_name: &str) {
    init_with(service_name, TelemetryOptions::default());
}

/// Installs the fmt subscriber once per process; later calls only log.
pub fn init_with(service_name: &str, options: TelemetryOptions) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&options.default_filter));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_ansi(options.ansi)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    });

    info!(service = service_name, "telemetry initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init("telemetry-test");
        init_with(
            "telemetry-test",
            TelemetryOptions {
                default_filter: "debug".into(),
                ansi: false,
            },
        );
    }
}
