use crate::config::ObservabilityConfig;
use crate::errors::{PecanError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging for the diagnostic binary
///
/// Without `RUST_LOG`, the configured level applies to this crate only and
/// dependencies such as reqwest stay at `warn`. Library consumers usually
/// install their own subscriber; this fails rather than panics when one is
/// already set.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&config.log_level)))
        .map_err(|e| PecanError::Configuration(format!("Invalid log level '{}': {}", config.log_level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format.as_str() {
        "json" => registry
            .with(fmt::layer().json().flatten_event(true))
            .try_init(),
        "compact" => registry.with(fmt::layer().compact()).try_init(),
        _ => registry.with(fmt::layer().pretty()).try_init(),
    };
    installed.map_err(|e| PecanError::Configuration(format!("Tracing already initialized: {}", e)))?;

    tracing::info!(
        package = crate::PACKAGE_NAME,
        version = crate::VERSION,
        level = %config.log_level,
        format = %config.log_format,
        "Tracing initialized"
    );
    Ok(())
}

fn default_directives(level: &str) -> String {
    format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_the_crate() {
        assert_eq!(default_directives(" debug "), "warn,pecanhq=debug");
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }
}
