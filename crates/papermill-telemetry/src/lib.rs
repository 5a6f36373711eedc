use once_cell::sync::Lazy;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use tracing_subscriber::{fmt, EnvFilter};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static API_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    let cv = CounterVec::new(Opts::new("papermill_api_requests_total", "API requests total"), &["path"]).unwrap();
    REGISTRY.register(Box::new(cv.clone())).ok();
    cv
});
static RUNS: Lazy<CounterVec> = Lazy::new(|| {
    let cv = CounterVec::new(Opts::new("papermill_runs_total", "Pipeline runs by status"), &["status"]).unwrap();
    REGISTRY.register(Box::new(cv.clone())).ok();
    cv
});
static STAGE_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let hv = HistogramVec::new(HistogramOpts::new("papermill_stage_seconds", "Pipeline stage wall-clock duration"), &["stage"]).unwrap();
    REGISTRY.register(Box::new(hv.clone())).ok();
    hv
});

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// filter; `PAPERMILL_LOG_JSON=1` switches to JSON lines.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = fmt().with_env_filter(filter).with_target(false);
    let res = if std::env::var("PAPERMILL_LOG_JSON").ok().as_deref() == Some("1") {
        fmt.json().try_init()
    } else {
        fmt.try_init()
    };
    // already installed (tests, embedding binaries)
    let _ = res;
}

pub fn inc_api_request(path: &str) { API_REQUESTS.with_label_values(&[path]).inc(); }
pub fn inc_run(status: &str) { RUNS.with_label_values(&[status]).inc(); }
pub fn observe_stage(stage: &str, seconds: f64) { STAGE_SECONDS.with_label_values(&[stage]).observe(seconds); }

pub fn gather_prometheus() -> String {
    // force registration so the families show up before their first sample
    Lazy::force(&API_REQUESTS);
    Lazy::force(&RUNS);
    Lazy::force(&STAGE_SECONDS);
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder.encode(&metric_families, &mut buffer).ok();
    String::from_utf8(buffer).unwrap_or_default()
}
