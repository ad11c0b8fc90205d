//! Configuration validation
//!
//! Rejects configurations that would otherwise fail later at runtime:
//! - Report intervals and timeouts must be non-zero
//! - Transport reports need a destination
//! - Queue length routes need at least one non-empty address

use crate::error::{ConfigError, Result};
use crate::metrics::ReportConfig;
use crate::Config;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_metrics(config)?;
    validate_reports(config)?;
    validate_routes(config)?;
    Ok(())
}

fn validate_metrics(config: &Config) -> Result<()> {
    let metrics = &config.metrics;

    if metrics.endpoint_name.trim().is_empty() {
        return Err(ConfigError::missing_field(
            "metrics",
            "metrics",
            "endpoint_name",
        ));
    }

    if metrics.delivery_timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "metrics",
            "metrics",
            "delivery_timeout",
            "must be greater than zero",
        ));
    }

    Ok(())
}

fn validate_reports(config: &Config) -> Result<()> {
    for report in &config.metrics.reports {
        if report.interval().is_zero() {
            return Err(ConfigError::invalid_value(
                "report",
                report.kind(),
                "interval",
                "must be greater than zero",
            ));
        }

        if let ReportConfig::Transport { destination, .. } = report
            && destination.trim().is_empty()
        {
            return Err(ConfigError::missing_field(
                "report",
                report.kind(),
                "destination",
            ));
        }
    }

    Ok(())
}

fn validate_routes(config: &Config) -> Result<()> {
    for (message_type, addresses) in &config.queue_length.routes {
        if addresses.is_empty() {
            return Err(ConfigError::invalid_value(
                "route",
                message_type.as_str(),
                "addresses",
                "at least one address is required",
            ));
        }

        if addresses.iter().any(|a| a.trim().is_empty()) {
            return Err(ConfigError::invalid_value(
                "route",
                message_type.as_str(),
                "addresses",
                "addresses must not be empty",
            ));
        }
    }

    Ok(())
}
