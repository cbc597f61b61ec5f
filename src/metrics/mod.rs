use autometrics::prometheus_exporter::{self, PrometheusResponse};
use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, register_histogram_vec, GaugeVec, HistogramVec, IntCounterVec, IntGauge,
    Opts, Registry,
};
use tokio::sync::watch;
use warp::{Filter, Rejection, Reply};


lazy_static! {
    /// Depth of each per-application dispatch queue, sampled periodically.
    pub static ref SHARD_QUEUE_DEPTH_METRIC: GaugeVec = GaugeVec::new(
        Opts::new("crengine_shard_queue_depth", "Buffered events per application dispatch queue"),
        &["application"]
    )
    .expect("metric can not be created");

    /// Reconciliations currently holding a concurrency permit.
    pub static ref RECONCILE_PERMITS_METRIC: IntGauge = IntGauge::new(
        "crengine_reconcile_permits",
        "Reconciliations currently holding a concurrency permit"
    )
    .expect("metric can not be created");

    /// Events dropped because an application's dispatch queue was full.
    pub static ref IGNORED_EVENTS_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("crengine_ignored_events_total", "Events dropped on full per-application queues"),
        &["application"]
    )
    .expect("Should succeed to create metric");

    /// Events dropped because a subscriber queue was full, per subscriber class.
    pub static ref DROPPED_EVENTS_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("crengine_dropped_events_total", "Events dropped on full subscriber queues"),
        &["class"]
    )
    .expect("Should succeed to create metric");

    /// Watch events observed, per event kind.
    pub static ref WATCH_EVENTS_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("crengine_watch_events_total", "Watch events observed"),
        &["event_type"]
    )
    .expect("Should succeed to create metric");

    /// Change-revision patches written, per write target.
    pub static ref CHANGE_REVISION_PATCH_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("crengine_change_revision_patch_total", "Change-revision merge patches written"),
        &["target"]
    )
    .expect("Should succeed to create metric");

    pub static ref RECONCILE_DURATION_METRIC: HistogramVec = register_histogram_vec!(
        "crengine_reconcile_duration_ms",
        "Histogram of reconciliation duration in ms",
        &["outcome"],
        exponential_buckets(1.0, 2.0, 16).unwrap()
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: std::sync::Once = std::sync::Once::new();

/// Idempotent: the metrics server and tests may both trigger registration.
fn register_custom_metrics() {
    REGISTER.call_once(do_register);
}

fn do_register() {
    REGISTRY
        .register(Box::new(SHARD_QUEUE_DEPTH_METRIC.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(RECONCILE_PERMITS_METRIC.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(IGNORED_EVENTS_METRIC.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(DROPPED_EVENTS_METRIC.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(WATCH_EVENTS_METRIC.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(CHANGE_REVISION_PATCH_METRIC.clone()))
        .expect("collector can be registered");
}

/// Serve `/metrics` and `/healthz` until the shutdown signal fires.
pub async fn start_server(port: u16, mut shutdown_signal: watch::Receiver<()>) {
    register_custom_metrics();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);
    let healthz_route = warp::path!("healthz").map(|| "ok");

    let (_, server) = warp::serve(metrics_route.or(healthz_route)).bind_with_graceful_shutdown(
        ([0, 0, 0, 0], port),
        async move {
            let _ = shutdown_signal.changed().await;
        },
    );
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        eprintln!("could not encode custom metrics: {}", e);
    };
    let mut res = match String::from_utf8(buffer.clone()) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    };
    buffer.clear();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        eprintln!("could not encode prometheus metrics: {}", e);
    };
    let res_custom = match String::from_utf8(buffer.clone()) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("prometheus metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    };
    buffer.clear();

    let autometrics_metrics = get_metrics_body();
    res.push_str(&res_custom);
    res.push_str(&autometrics_metrics);
    Ok(res)
}

/// Export metrics for Prometheus to scrape
pub fn get_metrics_body() -> String {
    let autometrics_response = prometheus_exporter::encode_http_response();
    autometrics_response.into_body()
}

/// Export metrics for Prometheus to scrape
pub fn get_metrics() -> PrometheusResponse {
    prometheus_exporter::encode_http_response()
}
