use std::io::Write;
use std::sync::Arc;

use arc_swap::ArcSwap;
use flate2::Compression;
use flate2::write::GzEncoder;
use ksm_metrics::NameFilter;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::{self, Responder, Response};

use crate::errors::ScrapeError;
use crate::registry::Registry;
use crate::telemetry::ScrapeGuard;

/// Content-type for the Prometheus text exposition format (spec 6 "HTTP surface").
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Swapped wholesale on config reload (spec 4.K): the scrape handler reads
/// through this pointer once per request, so a reload mid-scrape never mixes
/// old and new stores within a single response.
pub struct RegistryHandle(pub ArcSwap<Registry>);

impl RegistryHandle {
    pub fn new(registry: Registry) -> RegistryHandle {
        RegistryHandle(ArcSwap::new(Arc::new(registry)))
    }

    pub fn swap(&self, registry: Registry) {
        self.0.store(Arc::new(registry));
    }

    pub(crate) fn load(&self) -> Arc<Registry> {
        self.0.load_full()
    }
}

/// Whether `--enable-gzip-encoding` was passed at startup (spec 4.H step 3:
/// gzip is opt-in, never applied unless the operator asked for it).
pub struct GzipEnabled(pub bool);

/// Whether the client's `Accept-Encoding` header mentions gzip (spec 4.H step 3).
pub struct AcceptsGzip(bool);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AcceptsGzip {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let accepts = req.headers().get("Accept-Encoding").any(|v| v.contains("gzip"));
        Outcome::Success(AcceptsGzip(accepts))
    }
}

pub struct MetricsBody {
    bytes: Vec<u8>,
    gzipped: bool,
}

impl<'r> Responder<'r, 'static> for MetricsBody {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'static> {
        let mut builder = Response::build();
        builder.raw_header("Content-Type", PROMETHEUS_CONTENT_TYPE);
        if self.gzipped {
            builder.raw_header("Content-Encoding", "gzip");
        }
        builder.sized_body(self.bytes.len(), std::io::Cursor::new(self.bytes));
        builder.ok()
    }
}

/// Renders the current registry's full exposition (spec 4.H): kinds in
/// ascending name order (already guaranteed by `Registry::new`), families in
/// declaration order, `# HELP`/`# TYPE` once per family, then every non-empty
/// per-object blob. Gzips the result when the client asked for it. An
/// optional `name` query parameter (spec 6 "per-request family name filter")
/// restricts the response to matching families without touching the stored
/// allow/deny-listed set.
#[rocket::get("/metrics?<name>")]
pub fn metrics(
    registry: &rocket::State<Arc<RegistryHandle>>,
    gzip_enabled: &rocket::State<GzipEnabled>,
    accepts_gzip: AcceptsGzip,
    name: Option<&str>,
) -> Result<MetricsBody, ScrapeError> {
    let _guard = ScrapeGuard::start();
    let request_filter = name.map(|n| NameFilter::new(&[n.to_string()], &[])).transpose()?;

    let snapshot = registry.load();
    let mut buf = Vec::new();
    for store in snapshot.stores() {
        for (i, family) in store.families().iter().enumerate() {
            if let Some(f) = &request_filter {
                if !f.passes(&family.name) {
                    continue;
                }
            }
            writeln!(buf, "# HELP {} {}", family.name, family.help).ok();
            writeln!(buf, "# TYPE {} {}", family.name, family.metric_type).ok();
            for blob in store.snapshot(i) {
                buf.extend_from_slice(&blob);
            }
        }
    }

    if gzip_enabled.0 && accepts_gzip.0 {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(&buf).is_ok() {
            if let Ok(gz) = encoder.finish() {
                return Ok(MetricsBody { bytes: gz, gzipped: true });
            }
        }
    }
    Ok(MetricsBody { bytes: buf, gzipped: false })
}

/// Tracks whether every watch driver spawned by the builder has completed its
/// first list (spec 6 "`GET /healthz`"). One send per (kind, namespace) pair is
/// expected; `/healthz` reports ready once that many have arrived.
pub struct Readiness {
    expected: usize,
    seen: std::sync::atomic::AtomicUsize,
}

impl Readiness {
    pub fn new(expected: usize) -> Readiness {
        Readiness { expected, seen: std::sync::atomic::AtomicUsize::new(0) }
    }

    pub fn mark_one_ready(&self) {
        self.seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.seen.load(std::sync::atomic::Ordering::SeqCst) >= self.expected
    }
}

#[rocket::get("/healthz")]
pub fn healthz(readiness: &rocket::State<Arc<Readiness>>) -> (Status, &'static str) {
    if readiness.is_ready() {
        (Status::Ok, "ok")
    } else {
        (Status::ServiceUnavailable, "not ready")
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::Pod;
    use ksm_metrics::{Family, KindCache, MetricType, Sample};
    use rstest::*;

    use super::*;
    use crate::registry::TypedStore;

    fn registry_with_one_pod() -> Registry {
        let family = Family::new("kube_pod_info", "pod info", MetricType::Info, vec![], |_: &Pod| vec![Sample::new(vec![], 1.0)]);
        let cache: Arc<KindCache<Pod>> = Arc::new(KindCache::new(vec![family], "pod"));
        cache.on_add(&Pod {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                uid: Some("u1".into()),
                namespace: Some("ns1".into()),
                name: Some("p1".into()),
                ..Default::default()
            },
            ..Default::default()
        });
        Registry::new(vec![Arc::new(TypedStore::new("pod", cache))])
    }

    #[rstest]
    fn test_readiness_not_ready_until_all_seen() {
        let readiness = Readiness::new(2);
        assert!(!readiness.is_ready());
        readiness.mark_one_ready();
        assert!(!readiness.is_ready());
        readiness.mark_one_ready();
        assert!(readiness.is_ready());
    }

    #[rstest]
    fn test_readiness_zero_expected_is_immediately_ready() {
        assert!(Readiness::new(0).is_ready());
    }

    #[rstest]
    fn test_registry_handle_swap_is_visible() {
        let handle = RegistryHandle::new(Registry::new(vec![]));
        assert_eq!(handle.load().stores().len(), 0);
        handle.swap(registry_with_one_pod());
        assert_eq!(handle.load().stores().len(), 1);
    }
}
