//! Prometheus text exposition of the latest probe results.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::state::ProbeResult;

/// Probe latency gauge, milliseconds, 0 when the target is down.
pub const LATENCY_GAUGE: &str = "db_take_time_ms";
/// Status gauge, 0 - up, 1 - down.
pub const STATUS_GAUGE: &str = "db_status";

/// Renders probe results through a process-local Prometheus recorder.
///
/// The recorder is not installed globally; gauges are refreshed from the
/// snapshot on every render, so what a scrape sees is exactly the snapshot.
pub struct Exporter {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    // Held from the first gauge write until the payload is rendered, so
    // concurrent scrapes cannot mix gauges from different snapshots.
    render_lock: Mutex<()>,
}

impl Exporter {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            metrics::describe_gauge!(LATENCY_GAUGE, "Time elapsed probing the database (ms)");
            metrics::describe_gauge!(STATUS_GAUGE, "Database status: 0 - up, 1 - down");
        });

        Self {
            recorder,
            handle,
            render_lock: Mutex::new(()),
        }
    }

    /// Render `snapshot` in the Prometheus text format.
    pub fn render(&self, snapshot: &BTreeMap<String, ProbeResult>) -> String {
        let _guard = self.render_lock.lock().unwrap_or_else(PoisonError::into_inner);

        metrics::with_local_recorder(&self.recorder, || {
            for (host, result) in snapshot {
                metrics::gauge!(LATENCY_GAUGE, "host" => host.clone()).set(result.latency_ms as f64);
                metrics::gauge!(STATUS_GAUGE, "host" => host.clone()).set(result.status.gauge_value());
            }
        });

        self.handle.render()
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}
