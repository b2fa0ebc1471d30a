use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Default, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub operations: BTreeMap<String, OperationMetrics>,
}

#[derive(Debug, Default, Serialize, Clone, PartialEq)]
pub struct OperationMetrics {
    pub calls: u64,
    pub failures: u64,
    pub total_duration_ms: f64,
    pub max_duration_ms: f64,
}

/// Per-operation invocation counters. Clones share the same storage.
#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl MetricsCollector {
    pub fn global() -> &'static MetricsCollector {
        static INSTANCE: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);
        &INSTANCE
    }

    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsSnapshot::default())),
        }
    }

    /// Records one finished child process. A nonzero exit counts as a failure
    /// whether or not the caller asked for checking.
    pub fn record(&self, operation: &str, code: i32, duration_ms: f64) {
        if let Ok(mut guard) = self.inner.lock() {
            let metrics = guard.operations.entry(operation.to_string()).or_default();
            metrics.calls += 1;
            if code != 0 {
                metrics.failures += 1;
            }
            metrics.total_duration_ms += duration_ms;
            if duration_ms > metrics.max_duration_ms {
                metrics.max_duration_ms = duration_ms;
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = MetricsSnapshot::default();
        }
    }
}

pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        operation_count = snapshot.operations.len(),
        "bunker-convert invocation summary"
    );
    for (operation, metrics) in &snapshot.operations {
        info!(
            operation = operation.as_str(),
            calls = metrics.calls,
            failures = metrics.failures,
            total_ms = metrics.total_duration_ms,
            max_ms = metrics.max_duration_ms,
            "Operation metrics"
        );
    }
}

impl MetricsSnapshot {
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        output.push_str("# HELP bunker_sdk_calls_total bunker-convert invocations per operation\n");
        output.push_str("# TYPE bunker_sdk_calls_total counter\n");
        output.push_str(
            "# HELP bunker_sdk_failures_total bunker-convert invocations that exited nonzero\n",
        );
        output.push_str("# TYPE bunker_sdk_failures_total counter\n");
        output.push_str(
            "# HELP bunker_sdk_duration_seconds_total Accumulated invocation time in seconds\n",
        );
        output.push_str("# TYPE bunker_sdk_duration_seconds_total counter\n");
        output.push_str("# HELP bunker_sdk_duration_seconds_max Longest invocation in seconds\n");
        output.push_str("# TYPE bunker_sdk_duration_seconds_max gauge\n");
        for (operation, metrics) in &self.operations {
            output.push_str(&format!(
                "bunker_sdk_calls_total{{operation=\"{}\"}} {}\n",
                operation, metrics.calls
            ));
            output.push_str(&format!(
                "bunker_sdk_failures_total{{operation=\"{}\"}} {}\n",
                operation, metrics.failures
            ));
            output.push_str(&format!(
                "bunker_sdk_duration_seconds_total{{operation=\"{}\"}} {:.6}\n",
                operation,
                metrics.total_duration_ms / 1_000.0
            ));
            output.push_str(&format!(
                "bunker_sdk_duration_seconds_max{{operation=\"{}\"}} {:.6}\n",
                operation,
                metrics.max_duration_ms / 1_000.0
            ));
        }
        output
    }
}
