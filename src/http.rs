use crate::collectors::{Collector, CoreMetric, Snapshot};
use crate::metrics::Metrics;
use crate::pages::{self, Page, PageOptions};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub collector: Arc<Collector>,
    pub sample_window: Duration,
    pub page_options: PageOptions,
}

/// JSON view of a [`Snapshot`]: timestamps as Unix seconds, absent values as
/// `null`. Fields of a core table listed in `unavailable` are `null` as well.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiSnapshot {
    pub collected_at_unix: u64,
    pub os_name: String,
    pub kernel_version: Option<String>,
    pub host_name: Option<String>,
    pub processor: String,
    pub boot_time_unix: Option<u64>,
    pub uptime_seconds: Option<u64>,
    pub cpu_percent: Option<f64>,
    pub cpu_physical_cores: usize,
    pub cpu_logical_cores: usize,
    pub cpu_freq_current_mhz: Option<f64>,
    pub cpu_freq_max_mhz: Option<f64>,
    pub memory_total_bytes: Option<u64>,
    pub memory_used_bytes: Option<u64>,
    pub memory_available_bytes: Option<u64>,
    pub memory_percent: Option<f64>,
    pub swap_used_bytes: Option<u64>,
    pub swap_total_bytes: Option<u64>,
    pub disk_path: String,
    pub disk_total_bytes: Option<u64>,
    pub disk_used_bytes: Option<u64>,
    pub disk_free_bytes: Option<u64>,
    pub disk_percent: Option<f64>,
    pub network_bytes_sent: Option<u64>,
    pub network_bytes_received: Option<u64>,
    pub ip_address: Option<String>,
    pub battery_percent: Option<f64>,
    pub unavailable: Vec<CoreMetric>,
}

impl From<&Snapshot> for ApiSnapshot {
    fn from(value: &Snapshot) -> Self {
        let boot = value.available(CoreMetric::BootTime);
        let cpu = value.available(CoreMetric::CpuUsage);
        let memory = value.available(CoreMetric::Memory);
        let disk = value.available(CoreMetric::Disk);
        let network = value.available(CoreMetric::Network);

        Self {
            collected_at_unix: unix_seconds(value.collected_at),
            os_name: value.os_name.clone(),
            kernel_version: value.kernel_version.clone(),
            host_name: value.host_name.clone(),
            processor: value.processor.clone(),
            boot_time_unix: boot.then(|| unix_seconds(value.boot_time)),
            uptime_seconds: boot.then_some(value.uptime.as_secs()),
            cpu_percent: cpu.then_some(value.cpu_percent),
            cpu_physical_cores: value.cpu_physical_cores,
            cpu_logical_cores: value.cpu_logical_cores,
            cpu_freq_current_mhz: value.cpu_freq_current_mhz,
            cpu_freq_max_mhz: value.cpu_freq_max_mhz,
            memory_total_bytes: memory.then_some(value.memory_total_bytes),
            memory_used_bytes: memory.then_some(value.memory_used_bytes),
            memory_available_bytes: memory.then_some(value.memory_available_bytes),
            memory_percent: memory.then_some(value.memory_percent),
            swap_used_bytes: memory.then_some(value.swap_used_bytes),
            swap_total_bytes: memory.then_some(value.swap_total_bytes),
            disk_path: value.disk_path.display().to_string(),
            disk_total_bytes: disk.then_some(value.disk_total_bytes),
            disk_used_bytes: disk.then_some(value.disk_used_bytes),
            disk_free_bytes: disk.then_some(value.disk_free_bytes),
            disk_percent: disk.then_some(value.disk_percent),
            network_bytes_sent: network.then_some(value.network_bytes_sent),
            network_bytes_received: network.then_some(value.network_bytes_received),
            ip_address: value.ip_address.map(|ip| ip.to_string()),
            battery_percent: value.battery_percent,
            unavailable: value.unavailable.clone(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct ApiError {
    error: &'static str,
    message: String,
}

pub fn build_router(state: HttpAppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/cpu", get(cpu_handler))
        .route("/memory", get(memory_handler))
        .route("/disk", get(disk_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        )
            .into_response(),
    }
}

async fn home_handler(State(state): State<HttpAppState>) -> Response {
    page_response(&state, Page::Home).await
}

async fn cpu_handler(State(state): State<HttpAppState>) -> Response {
    page_response(&state, Page::Cpu).await
}

async fn memory_handler(State(state): State<HttpAppState>) -> Response {
    page_response(&state, Page::Memory).await
}

async fn disk_handler(State(state): State<HttpAppState>) -> Response {
    page_response(&state, Page::Disk).await
}

async fn snapshot_handler(State(state): State<HttpAppState>) -> Response {
    match collect_snapshot(&state).await {
        Ok(snapshot) => Json(ApiSnapshot::from(&snapshot)).into_response(),
        Err(failure) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                error: failure.reason,
                message: failure.message,
            }),
        )
            .into_response(),
    }
}

async fn page_response(state: &HttpAppState, page: Page) -> Response {
    state.metrics.inc_page_view(page.name());
    match collect_snapshot(state).await {
        Ok(snapshot) => Html(pages::render(page, &snapshot, &state.page_options)).into_response(),
        Err(failure) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(pages::render_error(
                failure.reason,
                &failure.message,
                &state.page_options,
            )),
        )
            .into_response(),
    }
}

struct CollectFailure {
    reason: &'static str,
    message: String,
}

/// Runs one collection off the async workers; the CPU sample blocks for the
/// whole window.
async fn collect_snapshot(state: &HttpAppState) -> Result<Snapshot, CollectFailure> {
    let collector = state.collector.clone();
    let window = state.sample_window;
    let started = Instant::now();

    let outcome = match tokio::task::spawn_blocking(move || collector.collect(window)).await {
        Ok(Ok(snapshot)) => Ok(snapshot),
        Ok(Err(err)) => Err(CollectFailure {
            reason: err.reason(),
            message: err.to_string(),
        }),
        Err(err) => Err(CollectFailure {
            reason: "internal",
            message: format!("collection task failed: {err}"),
        }),
    };

    let elapsed = started.elapsed();
    match &outcome {
        Ok(snapshot) => {
            state.metrics.observe_collection(elapsed, None);
            state.metrics.update_from_snapshot(snapshot);
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                unavailable = snapshot.unavailable.len(),
                "snapshot collected"
            );
        }
        Err(failure) => {
            state.metrics.observe_collection(elapsed, Some(failure.reason));
            error!(reason = failure.reason, error = %failure.message, "snapshot collection failed");
        }
    }
    outcome
}

fn unix_seconds(ts: SystemTime) -> u64 {
    ts.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::fake::FakeProbe;
    use crate::collectors::ProbeError;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app_with(probe: FakeProbe, disk_path: &str) -> (Router, Arc<Metrics>) {
        let metrics = Metrics::new().expect("metrics init");
        let state = HttpAppState {
            metrics: metrics.clone(),
            collector: Arc::new(Collector::new(Arc::new(probe), disk_path)),
            sample_window: Duration::from_millis(5),
            page_options: PageOptions::default(),
        };
        (build_router(state), metrics)
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (app, _) = app_with(FakeProbe::new(), "/");
        let (status, body) = get_text(app, "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn home_page_shows_usage_bars() {
        let (app, metrics) = app_with(FakeProbe::new(), "/");
        let (status, body) = get_text(app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("width: 42.5%"));
        assert!(body.contains("width: 68.0%"));
        assert!(body.contains("width: 55.3%"));

        let text = String::from_utf8(metrics.encode_metrics().unwrap()).unwrap();
        assert!(text.contains("hostdash_page_views_total{page=\"home\"} 1"));
        assert!(text.contains("hostdash_collections_total 1"));
    }

    #[tokio::test]
    async fn detail_pages_render() {
        for (uri, marker) in [
            ("/cpu", "CPU Details"),
            ("/memory", "Memory Details"),
            ("/disk", "Disk Details"),
        ] {
            let (app, _) = app_with(FakeProbe::new(), "/");
            let (status, body) = get_text(app, uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(body.contains(marker), "{uri}");
        }
    }

    #[tokio::test]
    async fn api_snapshot_returns_json() {
        let (app, _) = app_with(FakeProbe::new(), "/");
        let (status, body) = get_text(app, "/api/snapshot").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["cpu_percent"], 42.5);
        assert_eq!(json["memory_percent"], 68.0);
        assert_eq!(json["disk_percent"], 55.3);
        assert_eq!(json["ip_address"], "192.168.1.20");
        assert_eq!(json["uptime_seconds"], 3 * 3600 + 25 * 60 + 7);
        assert_eq!(json["boot_time_unix"], 1_700_000_000u64);
        assert!(json["battery_percent"].is_null());
        assert_eq!(json["unavailable"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn api_snapshot_lists_degraded_tables() {
        let probe = FakeProbe::new().with_memory(Err(ProbeError::PermissionDenied));
        let (app, _) = app_with(probe, "/");
        let (status, body) = get_text(app, "/api/snapshot").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["unavailable"], serde_json::json!(["memory"]));
        for field in [
            "memory_percent",
            "memory_total_bytes",
            "memory_used_bytes",
            "memory_available_bytes",
            "swap_used_bytes",
            "swap_total_bytes",
        ] {
            assert!(json[field].is_null(), "{field} should be null");
        }
        assert_eq!(json["cpu_percent"], 42.5);
        assert_eq!(json["disk_percent"], 55.3);
    }

    #[tokio::test]
    async fn api_snapshot_nulls_missing_boot_time() {
        let probe = FakeProbe::new().with_boot_time(Err(ProbeError::Unsupported));
        let (app, _) = app_with(probe, "/");
        let (status, body) = get_text(app, "/api/snapshot").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["boot_time_unix"].is_null());
        assert!(json["uptime_seconds"].is_null());
        assert_eq!(json["unavailable"], serde_json::json!(["boot_time"]));
    }

    #[tokio::test]
    async fn missing_disk_path_is_server_error() {
        let (app, metrics) = app_with(FakeProbe::new(), "/does/not/exist");
        let (status, body) = get_text(app.clone(), "/api/snapshot").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "path_not_found");

        let (status, body) = get_text(app, "/disk").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("path_not_found"));

        let text = String::from_utf8(metrics.encode_metrics().unwrap()).unwrap();
        assert!(text.contains("hostdash_collect_errors_total{reason=\"path_not_found\"} 2"));
    }

    #[tokio::test]
    async fn metrics_contains_uptime() {
        let (app, _) = app_with(FakeProbe::new(), "/");
        let (status, body) = get_text(app, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("hostdash_uptime_seconds"));
        assert!(body.contains("hostdash_scrape_count_total 1"));
    }
}
