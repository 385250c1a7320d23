//! Metrics and tracing for janus.
//!
//! Push-based operation counters ([`OpMetrics`]) and gauges bridging the
//! MVCC store's pull-based [`StoreStats`] snapshots ([`StoreGauges`]),
//! both backed by the `prometheus` crate, plus a lightweight HTTP server
//! for Prometheus scraping.
//!
//! Every [`OpMetrics`] owns its own [`Registry`]: counters live with the
//! instance that produced them, so independent instances can coexist in
//! one process and tests never share state.

use janus_storage::StoreStats;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::net::SocketAddr;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

// ────────────────────────── Operation counters ──────────────────────────

/// Push-based operation counters.
///
/// Producers call the increment methods at the point of each operation;
/// nothing here is derived by scanning store state. Synchronisation is
/// internal to the prometheus counters, independent of any store lock.
pub struct OpMetrics {
    registry: Registry,
    reads: IntCounter,
    writes: IntCounter,
    storage_bytes: IntCounter,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for OpMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpMetrics").finish_non_exhaustive()
    }
}

impl OpMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let reads = IntCounter::with_opts(Opts::new(
            "janus_reads_total",
            "Read operations observed",
        ))
        .expect("reads counter");
        let writes = IntCounter::with_opts(Opts::new(
            "janus_writes_total",
            "Write operations observed",
        ))
        .expect("writes counter");
        let storage_bytes = IntCounter::with_opts(Opts::new(
            "janus_storage_bytes_total",
            "Bytes accounted to completed writes",
        ))
        .expect("storage_bytes counter");

        registry
            .register(Box::new(reads.clone()))
            .expect("register reads");
        registry
            .register(Box::new(writes.clone()))
            .expect("register writes");
        registry
            .register(Box::new(storage_bytes.clone()))
            .expect("register storage_bytes");

        Self {
            registry,
            reads,
            writes,
            storage_bytes,
        }
    }

    pub fn increment_reads(&self) {
        self.reads.inc();
    }

    pub fn increment_writes(&self) {
        self.writes.inc();
    }

    pub fn add_storage(&self, bytes: u64) {
        self.storage_bytes.inc_by(bytes);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> OpSnapshot {
        OpSnapshot {
            total_reads: self.reads.get(),
            total_writes: self.writes.get(),
            total_storage_bytes: self.storage_bytes.get(),
        }
    }

    /// Log the counters at info level.
    pub fn log_summary(&self) {
        let snap = self.snapshot();
        tracing::info!(
            total_reads = snap.total_reads,
            total_writes = snap.total_writes,
            total_storage_bytes = snap.total_storage_bytes,
            "operation counters"
        );
    }

    /// The registry holding these counters, for export or for attaching
    /// further collectors such as [`StoreGauges`].
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for OpMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpSnapshot {
    pub total_reads: u64,
    pub total_writes: u64,
    pub total_storage_bytes: u64,
}

// ────────────────────────── Store gauges ──────────────────────────

/// Gauges mirroring a [`StoreStats`] snapshot into a registry, so the
/// pull-based store view is scrapeable next to the push counters.
pub struct StoreGauges {
    keys: IntGauge,
    versions: IntGauge,
    approx_mem_bytes: IntGauge,
}

impl StoreGauges {
    /// Create the gauges and register them with `registry`.
    pub fn register(registry: &Registry) -> Self {
        let keys = IntGauge::with_opts(Opts::new(
            "janus_store_keys",
            "Distinct keys in the MVCC store",
        ))
        .expect("keys gauge");
        let versions = IntGauge::with_opts(Opts::new(
            "janus_store_versions",
            "Total versions across all keys",
        ))
        .expect("versions gauge");
        let approx_mem_bytes = IntGauge::with_opts(Opts::new(
            "janus_store_approx_mem_bytes",
            "Approximate memory footprint of the MVCC store",
        ))
        .expect("approx_mem_bytes gauge");

        registry
            .register(Box::new(keys.clone()))
            .expect("register keys gauge");
        registry
            .register(Box::new(versions.clone()))
            .expect("register versions gauge");
        registry
            .register(Box::new(approx_mem_bytes.clone()))
            .expect("register approx_mem_bytes gauge");

        Self {
            keys,
            versions,
            approx_mem_bytes,
        }
    }

    /// Publish one snapshot.
    pub fn set(&self, stats: &StoreStats) {
        self.keys.set(stats.total_keys as i64);
        self.versions.set(stats.total_versions as i64);
        self.approx_mem_bytes.set(stats.approx_mem_bytes as i64);
    }
}

/// Encode a registry's metrics in Prometheus text exposition format.
pub fn encode_metrics(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use tokio::net::TcpListener;

/// Serve a registry on the given address (`GET /metrics`).
///
/// This spawns a lightweight HTTP/1.1 server. Call from a `tokio::spawn`.
pub async fn serve_metrics(
    addr: SocketAddr,
    registry: Registry,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let registry = registry.clone();
        tokio::spawn(async move {
            let service = service_fn(move |_req: Request<hyper::body::Incoming>| {
                let body = encode_metrics(&registry);
                async move {
                    Ok::<_, Infallible>(
                        Response::builder()
                            .status(StatusCode::OK)
                            .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
                            .body(Full::new(Bytes::from(body)))
                            .expect("valid HTTP response"),
                    )
                }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

// ────────────────────────── Tests ──────────────────────────
