//! Tracing Subscriber Initialization
//!
//! Structured logging through `tracing-subscriber`, filtered by `RUST_LOG`
//! and written either as JSON lines or human-readable text.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "cometa_api=debug,cometa_storage=debug,tower_http=debug,info";

/// Telemetry configuration.
///
/// Built from [`ApiConfig::telemetry_config`](crate::ApiConfig::telemetry_config)
/// at startup.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Emit JSON lines instead of text
    pub log_json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("COMETA_SERVICE_NAME")
                .unwrap_or_else(|_| "cometa-api".to_string()),
            service_version: std::env::var("COMETA_SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            environment: "development".to_string(),
            log_json: false,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup, before anything logs. A second call fails because
/// a global subscriber is already installed.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (json_layer, text_layer) = if config.log_json {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        environment = config.environment,
        log_json = config.log_json,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_telemetry_config_default() {
        let _name = EnvVarGuard::set("COMETA_SERVICE_NAME", None);
        let _json = EnvVarGuard::set("COMETA_LOG_JSON", Some("1"));
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "cometa-api");
        // The JSON switch is owned by ApiConfig.
        assert!(!config.log_json);
    }

    #[test]
    fn test_init_twice_fails() {
        let config = TelemetryConfig {
            log_json: true,
            ..Default::default()
        };
        // Whichever call comes first may win; the second must not panic.
        let first = init_tracer(&config);
        let second = init_tracer(&config);
        assert!(first.is_err() || second.is_err());
    }
}
