//! The metrics feature
//!
//! Setup happens once while the endpoint's pipeline is being built: the
//! metrics context is created, probes are wired to the receive events and the
//! queue length stages are placed. Reports only run between `start` and
//! `stop`, since the transport sink needs a running transport.

use std::sync::Arc;

use busmetrics_config::Config;
use busmetrics_metrics::{MetricsContext, MetricsFormatter, formatter_for};
use busmetrics_pipeline::{PipelineBuilder, PipelineEvents, Transport};
use busmetrics_reporting::{
    LogSink, ReportError, ReportScheduler, ReportSink, TraceSink, TransportSink,
};
use tracing::{debug, info};

use crate::error::Result;
use crate::options::{MetricsOptions, ReportTarget};
use crate::probes::ProbeRegistry;
use crate::queue_length::{QueueLengthInstrumentation, StaticRoutes};

/// Metrics collection and reporting for one endpoint
#[derive(Debug)]
pub struct MetricsFeature {
    options: MetricsOptions,
    context: Arc<MetricsContext>,
    probes: ProbeRegistry,
    queue_length: Option<QueueLengthInstrumentation>,
    scheduler: Option<ReportScheduler>,
}

impl MetricsFeature {
    /// Wire probes to `events` and place the queue length stages in `builder`
    pub fn setup(
        options: MetricsOptions,
        builder: &mut PipelineBuilder,
        events: &PipelineEvents,
    ) -> Result<Self> {
        let context = Arc::new(MetricsContext::new(options.endpoint_name()));
        let probes = ProbeRegistry::build(&context, events, |id| options.is_probe_enabled(id));

        let queue_length = options.is_queue_length_enabled().then(|| {
            let instrumentation = QueueLengthInstrumentation::new(
                Arc::clone(options.destination_resolver()),
                Arc::clone(&context),
            );
            instrumentation.install(builder);
            instrumentation
        });

        info!(
            endpoint = options.endpoint_name(),
            probes = probes.descriptors().len(),
            reports = options.reports().len(),
            queue_length = queue_length.is_some(),
            "metrics feature set up"
        );

        Ok(Self {
            options,
            context,
            probes,
            queue_length,
            scheduler: None,
        })
    }

    /// Set up from configuration; `None` when metrics are disabled
    pub fn setup_from_config(
        config: &Config,
        builder: &mut PipelineBuilder,
        events: &PipelineEvents,
    ) -> Result<Option<Self>> {
        if !config.metrics.enabled {
            debug!("metrics disabled by configuration");
            return Ok(None);
        }

        let mut options = MetricsOptions::from_config(&config.metrics)?;
        if config.queue_length.enabled {
            options.set_destination_resolver(Arc::new(StaticRoutes::from_config(
                &config.queue_length,
            )));
        } else {
            options.disable_queue_length();
        }

        Self::setup(options, builder, events).map(Some)
    }

    /// Start every configured report
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, transport: Arc<dyn Transport>) -> Result<()> {
        if self.scheduler.is_some() {
            return Err(ReportError::AlreadyStarted.into());
        }

        let mut scheduler = ReportScheduler::new(Arc::clone(&self.context))
            .with_delivery_timeout(self.options.delivery_timeout())
            .with_shutdown_timeout(self.options.shutdown_timeout());
        let formatter: Arc<dyn MetricsFormatter> = Arc::from(formatter_for(self.options.format()));

        for registration in self.options.reports() {
            let name = registration.name();
            let interval = registration.interval;
            match &registration.target {
                ReportTarget::Transport { destination } => {
                    let sink = TransportSink::new(
                        destination,
                        Arc::clone(&transport),
                        self.options.endpoint_name(),
                        self.options.host_id(),
                    );
                    scheduler.register(name, Arc::new(sink), interval)?;
                }
                ReportTarget::Log { level } => {
                    let sink: Arc<dyn ReportSink> = Arc::new(LogSink::new(*level));
                    scheduler.register_with_formatter(name, sink, interval, Arc::clone(&formatter))?;
                }
                ReportTarget::Trace => {
                    let sink: Arc<dyn ReportSink> = Arc::new(TraceSink::new());
                    scheduler.register_with_formatter(name, sink, interval, Arc::clone(&formatter))?;
                }
                ReportTarget::Custom(sink) => {
                    scheduler.register(name, Arc::new(sink.clone()), interval)?;
                }
            }
        }

        scheduler.start()?;
        self.scheduler = Some(scheduler);
        Ok(())
    }

    /// Stop reporting, waiting for in-flight deliveries
    pub async fn stop(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.as_ref().is_some_and(ReportScheduler::is_running)
    }

    /// Live metrics of this endpoint
    pub fn context(&self) -> &Arc<MetricsContext> {
        &self.context
    }

    pub fn probes(&self) -> &ProbeRegistry {
        &self.probes
    }

    pub fn options(&self) -> &MetricsOptions {
        &self.options
    }

    pub fn queue_length(&self) -> Option<&QueueLengthInstrumentation> {
        self.queue_length.as_ref()
    }

    /// Session id stamped into queue length headers
    pub fn session_id(&self) -> Option<&str> {
        self.queue_length
            .as_ref()
            .map(QueueLengthInstrumentation::session_id)
    }
}
