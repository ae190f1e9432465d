//! OpenTelemetry metrics export module
//!
//! Exports probe outcomes to an OpenTelemetry Collector. Export is enabled
//! only when an OTLP endpoint is configured (`OTEL_EXPORTER_OTLP_ENDPOINT`);
//! otherwise every `record_*` helper is a no-op.

use anyhow::{Context, Result};
use log::info;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

/// Metric export interval in seconds
const METRIC_EXPORT_INTERVAL_SECS: u64 = 30;

static METRICS: OnceLock<ProbeMetrics> = OnceLock::new();

static METER_PROVIDER: OnceLock<SdkMeterProvider> = OnceLock::new();

/// Active probes count (for ObservableGauge callback)
static ACTIVE_PROBES: OnceLock<RwLock<HashMap<String, u64>>> = OnceLock::new();

fn active_probes_map() -> &'static RwLock<HashMap<String, u64>> {
    ACTIVE_PROBES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Note: Do NOT add _total suffix to Counter names (Prometheus adds it automatically)
pub struct ProbeMetrics {
    pub dns_lookup_events: Counter<u64>,
    pub dns_lookup_latency_ns: Histogram<u64>,
    pub http_probe_events: Counter<u64>,
    pub http_probe_latency_ns: Histogram<u64>,
}

impl ProbeMetrics {
    fn new(meter: &Meter) -> Self {
        Self {
            dns_lookup_events: meter
                .u64_counter("dns_lookup_events")
                .with_description("Number of hostname resolutions attempted")
                .with_unit("events")
                .build(),
            dns_lookup_latency_ns: meter
                .u64_histogram("dns_lookup_latency_ns")
                .with_description("Hostname resolution latency")
                .with_unit("ns")
                .build(),
            http_probe_events: meter
                .u64_counter("http_probe_events")
                .with_description("Number of HTTP GET probes issued")
                .with_unit("events")
                .build(),
            http_probe_latency_ns: meter
                .u64_histogram("http_probe_latency_ns")
                .with_description("Time from connect to response head, including body drain")
                .with_unit("ns")
                .build(),
        }
    }
}

/// Normalise a configured OTLP endpoint.
///
/// Empty or missing means export is disabled. A bare `host:port` gets an
/// `http://` scheme.
fn otlp_endpoint(configured: Option<&str>) -> Option<String> {
    let endpoint = configured?.trim();
    if endpoint.is_empty() {
        return None;
    }

    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        Some(format!("http://{}", endpoint))
    } else {
        Some(endpoint.to_string())
    }
}

/// Initialize OpenTelemetry metrics provider
///
/// Configures metrics export to OTLP Collector via gRPC.
/// Skips initialization if no endpoint is configured.
pub fn init_metrics(configured_endpoint: Option<&str>) -> Result<()> {
    let endpoint = match otlp_endpoint(configured_endpoint) {
        Some(ep) => ep,
        None => {
            info!("OTEL_EXPORTER_OTLP_ENDPOINT not set. Metrics export disabled.");
            return Ok(());
        }
    };

    info!("Initializing OpenTelemetry metrics exporter");
    info!("OTLP endpoint: {}", endpoint);

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .with_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to create OTLP metric exporter")?;

    let reader = PeriodicReader::builder(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_interval(Duration::from_secs(METRIC_EXPORT_INTERVAL_SECS))
        .build();

    let resource = Resource::default().merge(&Resource::new(vec![
        KeyValue::new("service.name", "netprobe"),
        KeyValue::new("telemetry.sdk.language", "rust"),
    ]));

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build();

    global::set_meter_provider(provider.clone());
    let _ = METER_PROVIDER.set(provider);

    let meter = global::meter("netprobe");

    let _active_probes_gauge = meter
        .u64_observable_gauge("active_probes")
        .with_description("Number of probes currently running")
        .with_unit("probes")
        .with_callback(|observer| {
            if let Ok(probes) = active_probes_map().read() {
                for (probe_name, count) in probes.iter() {
                    observer.observe(*count, &[KeyValue::new("probe", probe_name.clone())]);
                }
            }
        })
        .build();

    let _ = METRICS.set(ProbeMetrics::new(&meter));

    info!("OpenTelemetry metrics initialized successfully");
    Ok(())
}

/// Last recorded active count for `probe_name`.
pub fn active_probe_count(probe_name: &str) -> Option<u64> {
    active_probes_map().read().ok()?.get(probe_name).copied()
}

pub fn metrics() -> Option<&'static ProbeMetrics> {
    METRICS.get()
}

/// Record active probe count
pub fn record_active_probe(probe_name: &str, count: u64) {
    if let Ok(mut probes) = active_probes_map().write() {
        probes.insert(probe_name.to_string(), count);
    }
}

fn outcome_label(success: bool) -> &'static str {
    if success { "success" } else { "failure" }
}

/// `family` is `None` when the lookup failed.
pub fn record_dns_lookup_event(query_name: &str, family: Option<u8>, latency_ns: u64) {
    if let Some(m) = metrics() {
        let mut attrs = vec![
            KeyValue::new("query_name", query_name.to_string()),
            KeyValue::new("outcome", outcome_label(family.is_some())),
        ];
        if let Some(family) = family {
            attrs.push(KeyValue::new("family", family as i64));
        }
        m.dns_lookup_events.add(1, &attrs);
        m.dns_lookup_latency_ns.record(latency_ns, &attrs);
    }
}

/// `status_code` is `None` when no response head was received.
pub fn record_http_probe_event(url: &str, status_code: Option<u16>, latency_ns: u64) {
    if let Some(m) = metrics() {
        let mut attrs = vec![
            KeyValue::new("url", url.to_string()),
            KeyValue::new("outcome", outcome_label(status_code.is_some())),
        ];
        if let Some(code) = status_code {
            attrs.push(KeyValue::new("status_code", code as i64));
        }
        m.http_probe_events.add(1, &attrs);
        m.http_probe_latency_ns.record(latency_ns, &attrs);
    }
}

/// Shutdown OpenTelemetry (graceful shutdown)
/// Flushes pending metrics and shuts down the MeterProvider
pub fn shutdown_metrics() {
    if let Some(provider) = METER_PROVIDER.get() {
        info!("Shutting down OpenTelemetry metrics...");
        if let Err(e) = provider.shutdown() {
            log::warn!("Failed to shutdown MeterProvider: {}", e);
        } else {
            info!("OpenTelemetry metrics shutdown complete");
        }
    }
}
