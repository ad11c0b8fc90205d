//! Metrics reporting configuration
//!
//! Controls which reports receive metric snapshots and how often.
//!
//! # Defaults
//!
//! - `enabled`: true
//! - `format`: json
//! - `delivery_timeout`: 30s
//! - `shutdown_timeout`: 5s
//! - no reports, all probes enabled
//!
//! Each `[[metrics.reports]]` entry gets its own schedule; intervals are not
//! synchronized across reports.

use crate::logging::LogLevel;
use serde::Deserialize;
use std::time::Duration;

/// Payload format used by log and trace reports
///
/// Transport reports always send JSON.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsFormat {
    /// JSON report document (default)
    #[default]
    Json,
    /// Human-readable multi-line output
    Human,
}

/// A single report registration
///
/// # Example
///
/// ```toml
/// [[metrics.reports]]
/// type = "transport"
/// destination = "Particular.Monitoring"
/// interval = "10s"
///
/// [[metrics.reports]]
/// type = "log"
/// interval = "1m"
/// level = "info"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReportConfig {
    /// Send the report as a message to a transport address
    Transport {
        /// Destination queue/address
        destination: String,
        /// Reporting interval
        #[serde(with = "humantime_serde")]
        interval: Duration,
    },

    /// Write the report to the application log
    Log {
        /// Reporting interval
        #[serde(with = "humantime_serde")]
        interval: Duration,
        /// Level of the emitted log lines (default: debug)
        #[serde(default = "default_report_level")]
        level: LogLevel,
    },

    /// Write the report to the trace output
    Trace {
        /// Reporting interval
        #[serde(with = "humantime_serde")]
        interval: Duration,
    },
}

fn default_report_level() -> LogLevel {
    LogLevel::Debug
}

impl ReportConfig {
    /// Short name of the report kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Log { .. } => "log",
            Self::Trace { .. } => "trace",
        }
    }

    /// Reporting interval
    pub fn interval(&self) -> Duration {
        match self {
            Self::Transport { interval, .. }
            | Self::Log { interval, .. }
            | Self::Trace { interval } => *interval,
        }
    }
}

/// Probe enablement
///
/// ```toml
/// [metrics.probes]
/// disabled = ["nservicebus_retries_total"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProbesConfig {
    /// Probe ids that should not be wired up
    pub disabled: Vec<String>,
}

impl ProbesConfig {
    /// Whether the probe with the given id is enabled
    pub fn is_enabled(&self, probe_id: &str) -> bool {
        !self.disabled.iter().any(|id| id == probe_id)
    }
}

/// Metrics configuration
///
/// # Example
///
/// ```toml
/// [metrics]
/// enabled = true
/// endpoint_name = "Sales"
/// format = "json"
/// delivery_timeout = "30s"
/// shutdown_timeout = "5s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection and reporting
    /// Default: true
    pub enabled: bool,

    /// Name of the root metrics context, used as the originating endpoint
    /// Default: "endpoint"
    pub endpoint_name: String,

    /// Payload format for log and trace reports
    /// Default: json
    pub format: MetricsFormat,

    /// Upper bound for a single report delivery
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub delivery_timeout: Duration,

    /// How long `stop` waits for in-flight deliveries
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Report registrations
    pub reports: Vec<ReportConfig>,

    /// Probe enablement
    pub probes: ProbesConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint_name: "endpoint".to_string(),
            format: MetricsFormat::Json,
            delivery_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
            reports: Vec::new(),
            probes: ProbesConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.format, MetricsFormat::Json);
        assert_eq!(config.delivery_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.reports.is_empty());
    }

    #[test]
    fn test_deserialize_empty() {
        let config: MetricsConfig = toml::from_str("").unwrap();
        assert!(config.enabled);
        assert_eq!(config.endpoint_name, "endpoint");
    }

    #[test]
    fn test_deserialize_reports() {
        let toml = r#"
endpoint_name = "Sales"

[[reports]]
type = "transport"
destination = "Particular.Monitoring"
interval = "10s"

[[reports]]
type = "log"
interval = "1m"

[[reports]]
type = "trace"
interval = "500ms"
"#;
        let config: MetricsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint_name, "Sales");
        assert_eq!(config.reports.len(), 3);
        assert_eq!(
            config.reports[0],
            ReportConfig::Transport {
                destination: "Particular.Monitoring".into(),
                interval: Duration::from_secs(10),
            }
        );
        assert_eq!(
            config.reports[1],
            ReportConfig::Log {
                interval: Duration::from_secs(60),
                level: LogLevel::Debug,
            }
        );
        assert_eq!(config.reports[2].interval(), Duration::from_millis(500));
        assert_eq!(config.reports[2].kind(), "trace");
    }

    #[test]
    fn test_log_report_level() {
        let toml = r#"
[[reports]]
type = "log"
interval = "5s"
level = "warn"
"#;
        let config: MetricsConfig = toml::from_str(toml).unwrap();
        assert!(matches!(
            config.reports[0],
            ReportConfig::Log {
                level: LogLevel::Warn,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_report_type_rejected() {
        let toml = r#"
[[reports]]
type = "carrier_pigeon"
interval = "5s"
"#;
        assert!(toml::from_str::<MetricsConfig>(toml).is_err());
    }

    #[test]
    fn test_probes_disabled() {
        let toml = r#"
[probes]
disabled = ["nservicebus_retries_total"]
"#;
        let config: MetricsConfig = toml::from_str(toml).unwrap();
        assert!(!config.probes.is_enabled("nservicebus_retries_total"));
        assert!(config.probes.is_enabled("nservicebus_fetched_total"));
    }
}
