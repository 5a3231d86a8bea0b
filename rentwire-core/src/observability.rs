//! Logging, tracing and metrics bootstrap
//!
//! The channel itself only emits `tracing` events and records
//! OpenTelemetry instruments through the global meter. Nothing is exported
//! until the host application installs a subscriber and providers, which is
//! what [`init_observability`] does:
//!
//! - a `tracing-subscriber` registry with an `EnvFilter` and a JSON fmt layer
//! - optionally a `tracing-opentelemetry` layer exporting spans over OTLP
//! - optionally a global meter provider exporting metrics over OTLP
//!
//! Call it once at startup, before building any channel.
//!
//! ```rust,no_run
//! use rentwire_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("tenant-portal")
//!         .with_log_level("rentwire_client=debug,info")
//!         .with_metrics(false);
//!
//!     rentwire_core::init_observability(config).expect("observability");
//!     // ... run the session ...
//!     rentwire_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint
//! - `RUST_LOG`: log filter; takes precedence over `log_level`

use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::Resource;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default service name reported to telemetry backends
pub const DEFAULT_SERVICE_NAME: &str = "rentwire";

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Observability configuration
///
/// # Defaults
///
/// - Service name: `"rentwire"`
/// - Service version: this crate's version
/// - OTLP endpoint: `$OTEL_EXPORTER_OTLP_ENDPOINT` or `http://localhost:4317`
/// - Traces and metrics exported, log level `$RUST_LOG` or `"info"`
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Identifies the process in every span, metric and log record
    pub service_name: String,
    /// Reported alongside the service name
    pub service_version: String,
    /// gRPC endpoint of the OTLP collector
    pub otlp_endpoint: String,
    /// Export spans over OTLP
    pub enable_traces: bool,
    /// Export metrics over OTLP
    pub enable_metrics: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string()),
            enable_traces: true,
            enable_metrics: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Defaults with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the fallback log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Override the reported service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Toggle span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Toggle metrics export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the global subscriber and, if enabled, the OTLP providers
///
/// # Errors
///
/// Fails if an exporter cannot be built, the log filter does not parse, or a
/// global subscriber is already installed.
pub fn init_observability(
    config: ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .json();

    // Option<Layer> is itself a layer, so one registry covers both cases
    let telemetry_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer(
    config: &ObservabilityConfig,
) -> Result<opentelemetry_sdk::trace::Tracer, Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig as _;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider);

    Ok(tracer)
}

fn init_metrics(
    config: &ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry_otlp::WithExportConfig as _;

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();

    let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider);
    Ok(())
}

/// Flush and release telemetry
///
/// SDK providers flush on drop; this only marks the end of the session in the
/// log stream.
pub fn shutdown_observability() {
    tracing::info!("Observability shut down");
}
