//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, latency bounds ordered)
//! - Check the backend URL can carry the `method` query parameter
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {:?}", config.listener.bind_address),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        for (field, path) in [
            ("listener.tls.ca_cert_path", &tls.ca_cert_path),
            ("listener.tls.cert_path", &tls.cert_path),
            ("listener.tls.key_path", &tls.key_path),
        ] {
            if path.trim().is_empty() {
                errors.push(ValidationError::new(field, "must not be empty"));
            }
        }
    }

    match Url::parse(&config.backend.url) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                errors.push(ValidationError::new(
                    "backend.url",
                    format!("unsupported scheme {:?}", url.scheme()),
                ));
            }
            if url.query_pairs().any(|(k, _)| k == "method") {
                errors.push(ValidationError::new(
                    "backend.url",
                    "must not already carry a `method` query parameter",
                ));
            }
        }
        Err(e) => errors.push(ValidationError::new("backend.url", e.to_string())),
    }

    if config.backend.max_idle_connections == 0 {
        errors.push(ValidationError::new("backend.max_idle_connections", "must be > 0"));
    }
    if config.backend.request_timeout_secs == Some(0) {
        errors.push(ValidationError::new("backend.request_timeout_secs", "must be > 0 when set"));
    }

    if config.dispatch.max_message_bytes == Some(0) {
        errors.push(ValidationError::new("dispatch.max_message_bytes", "must be > 0 when set"));
    }

    let stats = &config.stats;
    if stats.report_interval_ms == 0 {
        errors.push(ValidationError::new("stats.report_interval_ms", "must be > 0"));
    }
    if stats.min_latency_us == 0 {
        errors.push(ValidationError::new("stats.min_latency_us", "must be >= 1"));
    }
    if stats.max_latency_us < stats.min_latency_us.saturating_mul(2) {
        errors.push(ValidationError::new(
            "stats.max_latency_us",
            "must be at least twice stats.min_latency_us",
        ));
    }
    if stats.goal_latency_us == 0 {
        errors.push(ValidationError::new("stats.goal_latency_us", "must be > 0"));
    }
    if !(1..=3).contains(&stats.significant_figures) {
        errors.push(ValidationError::new("stats.significant_figures", "must be 1..=3"));
    }
    if stats.max_tracked_methods == Some(0) {
        errors.push(ValidationError::new("stats.max_tracked_methods", "must be > 0 when set"));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {:?}", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.backend.url = "ftp://legacy/rpc".into();
        config.stats.report_interval_ms = 0;
        config.stats.significant_figures = 4;
        config.listener.tls = Some(TlsConfig {
            ca_cert_path: "".into(),
            ..TlsConfig::default()
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "listener.tls.ca_cert_path",
                "backend.url",
                "stats.report_interval_ms",
                "stats.significant_figures",
            ]
        );
    }

    #[test]
    fn rejects_backend_url_with_method_query() {
        let mut config = GatewayConfig::default();
        config.backend.url = "http://legacy:8080/grpc?method=x".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "backend.url");
    }

    #[test]
    fn latency_bounds_must_leave_room() {
        let mut config = GatewayConfig::default();
        config.stats.min_latency_us = 1_000;
        config.stats.max_latency_us = 1_500;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "stats.max_latency_us");
    }

    #[test]
    fn message_cap_is_optional_but_not_zero() {
        let mut config = GatewayConfig::default();
        assert_eq!(config.dispatch.max_message_bytes, None);

        config.dispatch.max_message_bytes = Some(0);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "dispatch.max_message_bytes");

        config.dispatch.max_message_bytes = Some(1024);
        assert_eq!(validate_config(&config), Ok(()));
    }
}
