use tracing_subscriber::EnvFilter;

/// `SWAP_LOG_FORMAT=pretty` switches to human-readable output for local runs.
const LOG_FORMAT_ENV: &str = "SWAP_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn from_env() -> Self {
        match crate::config::optional_env(LOG_FORMAT_ENV).as_deref() {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

pub fn init(service_name: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    let format = LogFormat::from_env();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    // Keep an already-installed subscriber.
    let installed = match format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
    };

    if installed {
        tracing::info!(
            service = service_name,
            version = env!("CARGO_PKG_VERSION"),
            ?format,
            "logging initialized"
        );
    }
}
