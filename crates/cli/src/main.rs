//! janus: demo driver for the MVCC and OCC stores.
//!
//! Loads config, initialises tracing, then runs three short harnesses:
//! an MVCC timeline walk, an OCC two-client conflict, and a concurrent
//! instrumented workload. Progress goes to the log; a JSON summary of
//! the workload goes to stdout.

use janus_config::DemoConfig;
use janus_metrics::{OpMetrics, StoreGauges};
use janus_storage::{MonotonicClock, OptimisticStore, VersionedStore};
use rand::Rng;
use std::sync::Arc;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    janus_metrics::init_tracing();

    // Load config: first CLI arg is the YAML config path
    let config = match std::env::args().nth(1) {
        Some(path) => {
            janus_config::load_from_file(std::path::Path::new(&path)).unwrap_or_else(|e| {
                tracing::warn!("failed to load config from {}: {}, using defaults", path, e);
                DemoConfig::default()
            })
        }
        None => DemoConfig::default(),
    };

    mvcc_timeline_demo().await;
    occ_conflict_demo().await;
    instrumented_workload(&config).await?;

    Ok(())
}

/// Walk one key through two writes and read it back at three points in
/// logical time.
async fn mvcc_timeline_demo() {
    let store = VersionedStore::new();
    let clock = MonotonicClock::new();

    let t1 = clock.now();
    store.write("user:1", "Alice", t1);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let t2 = clock.now();
    store.write("user:1", "Bob", t2);

    let between = store.read("user:1", t1 + 5);
    let latest = store.read("user:1", clock.now());
    let before = store.read("user:1", t1 - 1);

    tracing::info!(?between, ?latest, ?before, "mvcc timeline demo");
}

/// Two clients race an update against the same observed version; the
/// loser re-reads and retries.
async fn occ_conflict_demo() {
    let store = Arc::new(OptimisticStore::new());
    store.insert(1, "initial");

    let observed = store
        .get(1)
        .expect("record was just inserted")
        .version;

    let mut clients = Vec::new();
    for client in 1..=2u32 {
        let store = Arc::clone(&store);
        clients.push(tokio::spawn(async move {
            // Simulated think time between the shared read and the write.
            tokio::time::sleep(Duration::from_millis(5 * client as u64)).await;

            if store.update(1, &format!("client-{client}"), observed) {
                tracing::info!(client, "occ update applied");
                return;
            }

            tracing::info!(client, "occ update lost the version race, retrying");
            let fresh = store.get(1).expect("record exists");
            let retried = store.update(1, &format!("client-{client}-retry"), fresh.version);
            tracing::info!(client, retried, "occ retry outcome");
        }));
    }
    for client in clients {
        client.await.expect("client task panicked");
    }

    let record = store.get(1).expect("record exists");
    tracing::info!(
        value = %record.value,
        version = record.version,
        "occ conflict demo final state"
    );
}

/// Concurrent readers and writers over one store, instrumented through a
/// shared `OpMetrics` instance.
async fn instrumented_workload(config: &DemoConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(VersionedStore::new());
    let clock = Arc::new(MonotonicClock::new());
    let metrics = Arc::new(OpMetrics::new());
    let gauges = StoreGauges::register(metrics.registry());

    // Spawn the scrape endpoint if configured; it serves for as long as
    // the workload runs.
    if let Some(addr) = config.metrics_listen {
        let registry = metrics.registry().clone();
        tokio::spawn(async move {
            if let Err(e) = janus_metrics::serve_metrics(addr, registry).await {
                tracing::warn!("metrics server failed: {}", e);
            }
        });
    }

    let workload = config.workload.clone();
    let think = Duration::from_millis(workload.think_time_ms);
    tracing::info!(
        writers = workload.writers,
        readers = workload.readers,
        ops_per_task = workload.ops_per_task,
        "starting instrumented workload"
    );

    let mut tasks = Vec::new();
    for w in 0..workload.writers {
        let store = Arc::clone(&store);
        let clock = Arc::clone(&clock);
        let metrics = Arc::clone(&metrics);
        let workload = workload.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..workload.ops_per_task {
                let key_idx = rand::thread_rng().gen_range(0..workload.key_space);
                let key = format!("key:{key_idx}");
                let value = format!("writer-{w}-op-{i}");
                let bytes = (key.len() + value.len()) as u64;

                store.write(&key, &value, clock.now());
                metrics.increment_writes();
                metrics.add_storage(bytes);
                tokio::time::sleep(think).await;
            }
        }));
    }
    for _ in 0..workload.readers {
        let store = Arc::clone(&store);
        let clock = Arc::clone(&clock);
        let metrics = Arc::clone(&metrics);
        let workload = workload.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..workload.ops_per_task {
                let key_idx = rand::thread_rng().gen_range(0..workload.key_space);
                let _ = store.read(&format!("key:{key_idx}"), clock.now());
                metrics.increment_reads();
                tokio::time::sleep(think).await;
            }
        }));
    }

    for task in tasks {
        task.await?;
    }

    let stats = store.stats();
    gauges.set(&stats);
    metrics.log_summary();
    tracing::info!(
        total_keys = stats.total_keys,
        total_versions = stats.total_versions,
        approx_mem_bytes = stats.approx_mem_bytes,
        "store stats"
    );

    let ops = metrics.snapshot();
    let summary = serde_json::json!({
        "store": stats,
        "ops": {
            "total_reads": ops.total_reads,
            "total_writes": ops.total_writes,
            "total_storage_bytes": ops.total_storage_bytes,
        },
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
