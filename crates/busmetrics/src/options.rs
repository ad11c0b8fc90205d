//! Code configuration surface of the metrics feature
//!
//! Every method validates its arguments when called, so a bad option fails
//! at configuration time rather than on the first report tick.
//!
//! Reports are additive: every call registers one more report. A transport
//! report is unique per address.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use busmetrics_config::{LogLevel, MetricsConfig, MetricsFormat, ReportConfig};
use busmetrics_reporting::{CustomSink, DEFAULT_DELIVERY_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT};

use crate::error::{MetricsError, Result};
use crate::probes;
use crate::queue_length::{DestinationResolver, StaticRoutes};

const DEFAULT_ENDPOINT_NAME: &str = "endpoint";

/// Where a configured report goes
#[derive(Debug, Clone)]
pub enum ReportTarget {
    /// A message to a monitoring queue
    Transport { destination: String },
    /// The application log at `level`
    Log { level: LogLevel },
    /// Trace output
    Trace,
    /// A user callback
    Custom(CustomSink),
}

impl ReportTarget {
    fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Log { .. } => "log",
            Self::Trace => "trace",
            Self::Custom(_) => "custom",
        }
    }
}

/// A configured report and its interval
#[derive(Debug, Clone)]
pub struct ReportRegistration {
    pub target: ReportTarget,
    pub interval: Duration,
    name: String,
}

impl ReportRegistration {
    /// Name the report is scheduled under
    ///
    /// `transport:{address}` for transport reports. Other kinds are named by
    /// kind, with `:{n}` appended from the second report of that kind on.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Metrics options
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use busmetrics::MetricsOptions;
/// use busmetrics_config::LogLevel;
///
/// let mut options = MetricsOptions::new();
/// options
///     .send_metric_data_to("Particular.Monitoring", Duration::from_secs(10))
///     .unwrap()
///     .enable_log_tracing(Duration::from_secs(60), LogLevel::Info)
///     .unwrap();
/// assert_eq!(options.reports().len(), 2);
/// ```
#[derive(Clone)]
pub struct MetricsOptions {
    endpoint_name: String,
    host_id: String,
    reports: Vec<ReportRegistration>,
    disabled_probes: BTreeSet<String>,
    format: MetricsFormat,
    delivery_timeout: Duration,
    shutdown_timeout: Duration,
    queue_length: bool,
    resolver: Arc<dyn DestinationResolver>,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            endpoint_name: DEFAULT_ENDPOINT_NAME.to_string(),
            host_id: uuid::Uuid::new_v4().to_string(),
            reports: Vec::new(),
            disabled_probes: BTreeSet::new(),
            format: MetricsFormat::Json,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            queue_length: true,
            resolver: Arc::new(StaticRoutes::new()),
        }
    }
}

impl std::fmt::Debug for MetricsOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsOptions")
            .field("endpoint_name", &self.endpoint_name)
            .field("reports", &self.reports)
            .field("disabled_probes", &self.disabled_probes)
            .field("format", &self.format)
            .field("queue_length", &self.queue_length)
            .finish_non_exhaustive()
    }
}

impl MetricsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from the `[metrics]` configuration section
    pub fn from_config(config: &MetricsConfig) -> Result<Self> {
        let mut options = Self::new();
        options.set_endpoint_name(&config.endpoint_name)?;
        options.set_format(config.format);
        options.set_delivery_timeout(config.delivery_timeout)?;
        options.set_shutdown_timeout(config.shutdown_timeout)?;

        for report in &config.reports {
            match report {
                ReportConfig::Transport {
                    destination,
                    interval,
                } => options.send_metric_data_to(destination, *interval)?,
                ReportConfig::Log { interval, level } => {
                    options.enable_log_tracing(*interval, *level)?
                }
                ReportConfig::Trace { interval } => options.enable_metric_tracing(*interval)?,
            };
        }

        for probe_id in &config.probes.disabled {
            options.disable_probe(probe_id)?;
        }

        Ok(options)
    }

    /// Send reports as messages to a monitoring queue
    pub fn send_metric_data_to(
        &mut self,
        address: impl Into<String>,
        interval: Duration,
    ) -> Result<&mut Self> {
        let destination = address.into();
        if destination.trim().is_empty() {
            return Err(MetricsError::invalid_option(
                "address",
                "must not be empty",
            ));
        }
        self.add_report(ReportTarget::Transport { destination }, interval)
    }

    /// Write reports to trace output
    pub fn enable_metric_tracing(&mut self, interval: Duration) -> Result<&mut Self> {
        self.add_report(ReportTarget::Trace, interval)
    }

    /// Write reports to the application log at `level`
    pub fn enable_log_tracing(&mut self, interval: Duration, level: LogLevel) -> Result<&mut Self> {
        self.add_report(ReportTarget::Log { level }, interval)
    }

    /// Hand each JSON report to `callback`
    pub fn enable_custom_report<F, Fut>(&mut self, callback: F, interval: Duration) -> Result<&mut Self>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_report(ReportTarget::Custom(CustomSink::new(callback)), interval)
    }

    /// Leave a probe unwired
    pub fn disable_probe(&mut self, probe_id: &str) -> Result<&mut Self> {
        if !probes::is_known(probe_id) {
            return Err(MetricsError::UnknownProbe(probe_id.to_string()));
        }
        self.disabled_probes.insert(probe_id.to_string());
        Ok(self)
    }

    /// Name of the metrics context, also sent as the originating endpoint
    pub fn set_endpoint_name(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MetricsError::invalid_option(
                "endpoint name",
                "must not be empty",
            ));
        }
        self.endpoint_name = name;
        Ok(self)
    }

    /// Identifier of this host instance in report messages
    pub fn set_host_id(&mut self, host_id: impl Into<String>) -> &mut Self {
        self.host_id = host_id.into();
        self
    }

    /// Resolver used to duplicate outbound operations per destination
    pub fn set_destination_resolver(&mut self, resolver: Arc<dyn DestinationResolver>) -> &mut Self {
        self.resolver = resolver;
        self
    }

    /// Leave the queue length stages out of the pipeline
    pub fn disable_queue_length(&mut self) -> &mut Self {
        self.queue_length = false;
        self
    }

    /// Payload format of log and trace reports
    pub fn set_format(&mut self, format: MetricsFormat) -> &mut Self {
        self.format = format;
        self
    }

    /// Upper bound for a single report delivery
    pub fn set_delivery_timeout(&mut self, timeout: Duration) -> Result<&mut Self> {
        if timeout.is_zero() {
            return Err(MetricsError::invalid_option(
                "delivery timeout",
                "must be greater than zero",
            ));
        }
        self.delivery_timeout = timeout;
        Ok(self)
    }

    /// How long stopping waits for in-flight deliveries
    pub fn set_shutdown_timeout(&mut self, timeout: Duration) -> Result<&mut Self> {
        self.shutdown_timeout = timeout;
        Ok(self)
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn is_queue_length_enabled(&self) -> bool {
        self.queue_length
    }

    pub fn destination_resolver(&self) -> &Arc<dyn DestinationResolver> {
        &self.resolver
    }

    pub fn reports(&self) -> &[ReportRegistration] {
        &self.reports
    }

    pub fn is_probe_enabled(&self, probe_id: &str) -> bool {
        !self.disabled_probes.contains(probe_id)
    }

    pub fn format(&self) -> MetricsFormat {
        self.format
    }

    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    fn add_report(&mut self, target: ReportTarget, interval: Duration) -> Result<&mut Self> {
        if interval.is_zero() {
            return Err(MetricsError::invalid_option(
                "interval",
                "must be greater than zero",
            ));
        }

        let name = match &target {
            ReportTarget::Transport { destination } => format!("transport:{destination}"),
            target => {
                let kind = target.kind();
                match self.reports.iter().filter(|r| r.target.kind() == kind).count() {
                    0 => kind.to_string(),
                    n => format!("{kind}:{}", n + 1),
                }
            }
        };
        if self.reports.iter().any(|r| r.name == name) {
            return Err(MetricsError::invalid_option(
                "address",
                format!("a report to '{name}' is already configured"),
            ));
        }

        self.reports.push(ReportRegistration {
            target,
            interval,
            name,
        });
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busmetrics_config::ProbesConfig;

    #[test]
    fn test_zero_interval_rejected() {
        let mut options = MetricsOptions::new();
        assert!(matches!(
            options.enable_metric_tracing(Duration::ZERO),
            Err(MetricsError::InvalidOption { option: "interval", .. })
        ));
        assert!(
            options
                .send_metric_data_to("Particular.Monitoring", Duration::ZERO)
                .is_err()
        );
        assert!(
            options
                .enable_custom_report(|_| async { Ok(()) }, Duration::ZERO)
                .is_err()
        );
        assert!(options.reports().is_empty());
    }

    #[test]
    fn test_empty_address_rejected() {
        let mut options = MetricsOptions::new();
        let err = options
            .send_metric_data_to("  ", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, MetricsError::InvalidOption { option: "address", .. }));
    }

    #[test]
    fn test_reports_are_additive() {
        let mut options = MetricsOptions::new();
        options
            .enable_custom_report(|_| async { Ok(()) }, Duration::from_secs(1))
            .unwrap()
            .enable_custom_report(|_| async { Ok(()) }, Duration::from_secs(1))
            .unwrap()
            .send_metric_data_to("MonitoringA", Duration::from_secs(1))
            .unwrap()
            .send_metric_data_to("MonitoringB", Duration::from_secs(2))
            .unwrap()
            .enable_metric_tracing(Duration::from_secs(3))
            .unwrap();

        let names: Vec<_> = options.reports().iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            [
                "custom",
                "custom:2",
                "transport:MonitoringA",
                "transport:MonitoringB",
                "trace"
            ]
        );
        assert_eq!(options.reports()[3].interval, Duration::from_secs(2));
    }

    #[test]
    fn test_same_transport_address_rejected() {
        let mut options = MetricsOptions::new();
        options
            .send_metric_data_to("Monitoring", Duration::from_secs(1))
            .unwrap();
        let err = options
            .send_metric_data_to("Monitoring", Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, MetricsError::InvalidOption { option: "address", .. }));
        assert_eq!(options.reports().len(), 1);
    }

    #[test]
    fn test_unknown_probe_rejected() {
        let mut options = MetricsOptions::new();
        assert!(matches!(
            options.disable_probe("nservicebus_bogus"),
            Err(MetricsError::UnknownProbe(_))
        ));
        options.disable_probe(probes::RETRIES).unwrap();
        assert!(!options.is_probe_enabled(probes::RETRIES));
        assert!(options.is_probe_enabled(probes::SUCCESS));
    }

    #[test]
    fn test_from_config() {
        let config = MetricsConfig {
            endpoint_name: "Sales".into(),
            format: MetricsFormat::Human,
            shutdown_timeout: Duration::from_secs(1),
            reports: vec![
                ReportConfig::Transport {
                    destination: "Particular.Monitoring".into(),
                    interval: Duration::from_secs(10),
                },
                ReportConfig::Log {
                    interval: Duration::from_secs(30),
                    level: LogLevel::Info,
                },
            ],
            probes: ProbesConfig {
                disabled: vec![probes::FAILURE.to_string()],
            },
            ..MetricsConfig::default()
        };

        let options = MetricsOptions::from_config(&config).unwrap();
        assert_eq!(options.endpoint_name(), "Sales");
        assert_eq!(options.format(), MetricsFormat::Human);
        assert_eq!(options.shutdown_timeout(), Duration::from_secs(1));
        assert_eq!(options.reports().len(), 2);
        assert!(matches!(
            options.reports()[1].target,
            ReportTarget::Log { level: LogLevel::Info }
        ));
        assert!(!options.is_probe_enabled(probes::FAILURE));
    }
}
