use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when RUST_LOG is unset
pub const DEFAULT_FILTER: &str = "info,davisx=debug";

/// Initialize logging
/// - RUST_LOG respected; default to "info,davisx=debug"
/// - `json` selects JSON lines, otherwise human readable output
///
/// A second call is a no-op.
pub fn init(service_name: &str, json: bool) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    let installed = tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = %service_name, json, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init("davisx-test", false);
        init("davisx-test", true);
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }
}
