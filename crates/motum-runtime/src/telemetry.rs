//! Logging and OpenTelemetry initialisation for motum processes.
//!
//! Call [`init_tracing`] once at process startup.  Control-loop logs are
//! emitted through `tracing` with structured fields (`tick`, `time`,
//! `monitor`, `code`, …); every episode runs inside an `episode` span.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP/HTTP collector base URL; enables span export. |
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `MOTUM_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Example
//!
//! ```rust,no_run
//! // Hold the guard for the entire lifetime of the process.
//! let _guard = motum_runtime::telemetry::init_tracing("motum");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Set to `json` for newline-delimited JSON logs.
pub const LOG_FORMAT_VAR: &str = "MOTUM_LOG_FORMAT";
pub const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const DEFAULT_FILTER: &str = "info";
const TRACER_NAME: &str = "motum";

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Resolved logging setup for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    pub service_name: String,
    /// `RUST_LOG`-style directives.
    pub filter: String,
    pub format: LogFormat,
    /// OTLP collector; spans are only exported when set.
    pub otlp_endpoint: Option<String>,
}

impl TelemetrySettings {
    /// Settings from the process environment.
    pub fn from_env(service_name: &str) -> Self {
        Self::resolve(service_name, |key| std::env::var(key).ok())
    }

    /// Settings from an arbitrary variable lookup.  Empty values count as unset.
    pub fn resolve(service_name: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let format = match var(LOG_FORMAT_VAR) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };
        Self {
            service_name: service_name.to_string(),
            filter: var("RUST_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            format,
            otlp_endpoint: var(OTLP_ENDPOINT_VAR),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber from the environment.
///
/// The returned [`TracerProviderGuard`] **must** be held for the lifetime of
/// the process; dropping it flushes pending spans.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    init_with(&TelemetrySettings::from_env(service_name))
}

/// Initialise the global `tracing` subscriber from explicit settings.
///
/// An invalid filter falls back to `info`.  When the OTLP exporter cannot be
/// built the error goes to stderr and logging continues without export.
pub fn init_with(settings: &TelemetrySettings) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let provider = settings
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| build_provider(&settings.service_name, endpoint));
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(TRACER_NAME)));

    // A second initialisation (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(format_layer(&settings.format))
        .try_init();

    TracerProviderGuard(provider)
}

fn format_layer<S>(format: &LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_current_span(true).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().with_target(true).boxed(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RAII guard
// ─────────────────────────────────────────────────────────────────────────────

/// Shuts the OTel [`SdkTracerProvider`] down on drop, flushing pending spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[motum] span export shutdown failed: {e}");
        }
    }
}

fn build_provider(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[motum] OTLP exporter for {endpoint} failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // Tracing starts before any Tokio runtime exists.
            .with_simple_exporter(exporter)
            .build(),
    )
}
