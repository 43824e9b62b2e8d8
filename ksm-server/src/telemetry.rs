use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::registry::Registry;
use crate::scrape::RegistryHandle;

/// Installs the global `metrics` recorder once and renders it for the
/// telemetry port (spec 4.J). Kept distinct from the primary `/metrics`
/// registry assembled by `ksm_metrics::KindCache`: this one only ever sees
/// self-observability gauges/counters, recorded by name through the
/// `metrics` facade from anywhere in the process (the watch driver's error
/// counter, the custom-resource engine's per-family error counter, and the
/// gauges recorded here).
pub struct Telemetry {
    handle: PrometheusHandle,
}

impl Telemetry {
    pub fn install() -> anyhow::Result<Telemetry> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        Ok(Telemetry { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Records current shard placement (spec 4.I, 4.J "current shard index and
/// count"). Called once at startup and again after every reload.
pub fn record_shard(index: i32, count: i32) {
    metrics::gauge!("ksm_shard_index").set(index as f64);
    metrics::gauge!("ksm_shard_count").set(count as f64);
}

/// Snapshots per-kind object counts into gauges (spec 4.J "per-kind object
/// count"). Called on a timer or right before a telemetry scrape; reading
/// `object_count()` is cheap (a read-lock over a `HashMap::len`).
pub fn record_object_counts(registry: &Registry) {
    for store in registry.stores() {
        metrics::gauge!("ksm_store_object_count", "kind" => store.kind_name().to_string()).set(store.object_count() as f64);
    }
}

/// RAII guard recording one scrape's in-flight gauge and duration histogram
/// (spec 4.J "per-scrape duration, in-flight scrapes"). Dropped at the end of
/// the scrape handler regardless of success or early return.
pub struct ScrapeGuard {
    start: Instant,
}

impl ScrapeGuard {
    pub fn start() -> ScrapeGuard {
        metrics::gauge!("ksm_scrapes_in_flight").increment(1.0);
        ScrapeGuard { start: Instant::now() }
    }
}

impl Drop for ScrapeGuard {
    fn drop(&mut self) {
        metrics::gauge!("ksm_scrapes_in_flight").decrement(1.0);
        metrics::histogram!("ksm_scrape_duration_seconds").record(self.start.elapsed().as_secs_f64());
    }
}

#[rocket::get("/metrics")]
pub fn telemetry_metrics(telemetry: &rocket::State<Arc<Telemetry>>, registry: &rocket::State<Arc<RegistryHandle>>) -> (rocket::http::Status, String) {
    record_object_counts(&registry.load());
    (rocket::http::Status::Ok, telemetry.render())
}

/// `/debug/pprof/*` is a Go-ecosystem concept with no Rust equivalent; every
/// path under it returns 404 rather than being silently unmounted, so a
/// client probing for it gets an explicit answer instead of a connection
/// refusal that looks like the telemetry server is down.
#[rocket::get("/debug/pprof/<_path..>")]
pub fn pprof_disabled(_path: std::path::PathBuf) -> rocket::http::Status {
    rocket::http::Status::NotFound
}
