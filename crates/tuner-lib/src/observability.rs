//! Observability infrastructure for the tuner
//!
//! Provides:
//! - Prometheus metrics (detection latency, source fallbacks, effective resources, warnings)
//! - Structured logging with tracing, JSON or compact, on stderr

use crate::models::{ResourceSnapshot, TunedParameters, TuningConfig};
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Encoder, Histogram,
    IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Histogram buckets for detection latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<TunerMetricsInner> = OnceLock::new();

struct TunerMetricsInner {
    detection_latency_seconds: Histogram,
    detection_fallbacks: IntCounterVec,
    effective_cpus: IntGauge,
    effective_memory_bytes: IntGauge,
    tuning_warnings: IntGauge,
}

impl TunerMetricsInner {
    fn new() -> Self {
        Self {
            detection_latency_seconds: register_histogram!(
                "pgtune_detection_latency_seconds",
                "Time spent probing host and container resources",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register detection_latency_seconds"),

            detection_fallbacks: register_int_counter_vec!(
                "pgtune_detection_fallbacks_total",
                "Sources that produced no signal and fell back to a default",
                &["source"]
            )
            .expect("Failed to register detection_fallbacks_total"),

            effective_cpus: register_int_gauge!(
                "pgtune_effective_cpus",
                "CPUs used as the basis for tuning"
            )
            .expect("Failed to register effective_cpus"),

            effective_memory_bytes: register_int_gauge!(
                "pgtune_effective_memory_bytes",
                "Memory used as the basis for tuning"
            )
            .expect("Failed to register effective_memory_bytes"),

            tuning_warnings: register_int_gauge!(
                "pgtune_tuning_warnings",
                "Advisories attached to the last calculated parameter set"
            )
            .expect("Failed to register tuning_warnings"),
        }
    }
}

/// Handle to the global tuner metrics
///
/// Multiple handles share the same underlying metrics.
#[derive(Clone)]
pub struct TunerMetrics {
    _private: (),
}

impl Default for TunerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TunerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(TunerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &TunerMetricsInner {
        GLOBAL_METRICS.get_or_init(TunerMetricsInner::new)
    }

    pub fn observe_detection_latency(&self, duration_secs: f64) {
        self.inner().detection_latency_seconds.observe(duration_secs);
    }

    /// Count a source that fell back to its default
    pub fn inc_detection_fallback(&self, source: &str) {
        self.inner()
            .detection_fallbacks
            .with_label_values(&[source])
            .inc();
    }

    pub fn detection_fallbacks(&self, source: &str) -> u64 {
        self.inner()
            .detection_fallbacks
            .with_label_values(&[source])
            .get()
    }

    pub fn set_effective_resources(&self, cpus: u32, memory: u64) {
        self.inner().effective_cpus.set(i64::from(cpus));
        self.inner()
            .effective_memory_bytes
            .set(i64::try_from(memory).unwrap_or(i64::MAX));
    }

    pub fn set_tuning_warnings(&self, count: usize) {
        self.inner()
            .tuning_warnings
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Every registered metric in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides `default_level`. Output goes to stderr so that
/// stdout stays machine-readable. Calling this twice is harmless.
pub fn init_logging(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let compact_layer = (!json).then(|| {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(compact_layer)
        .try_init();
}

/// Structured logger for tuning events
///
/// Gives every significant event a stable `event` field so logs can be
/// filtered by machine.
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_detection(&self, snapshot: &ResourceSnapshot) {
        info!(
            event = "resources_detected",
            component = %self.component,
            host_cpus = snapshot.host.cpus,
            host_memory_bytes = snapshot.host.memory,
            container_cpu_millis = snapshot.container.millis,
            container_memory_bytes = snapshot.container.memory,
            effective_cpus = snapshot.effective_cpus(),
            effective_memory_bytes = snapshot.effective_memory(),
            in_container = snapshot.in_container,
            disk_type = %snapshot.disk_type,
            os = %snapshot.os,
            "Resource snapshot ready"
        );
    }

    pub fn log_tuning(&self, config: &TuningConfig, params: &TunedParameters) {
        TunerMetrics::new().set_tuning_warnings(params.warnings.len());

        info!(
            event = "parameters_calculated",
            component = %self.component,
            workload = %config.workload,
            pg_version = config.pg_version,
            memory_bytes = config.memory,
            cpus = config.cpus,
            max_connections = params.max_connections,
            shared_buffers_bytes = params.shared_buffers,
            work_mem_bytes = params.work_mem,
            warnings = params.warnings.len(),
            "Calculated tuning parameters"
        );

        for warning in &params.warnings {
            warn!(
                event = "tuning_advisory",
                component = %self.component,
                advisory = %warning,
                "Tuning advisory"
            );
        }
    }
}
