use crate::collectors::{CoreMetric, Snapshot};
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters about the dashboard process itself. Host readings are exported
/// only as the last observed value; nothing is retained between collections.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    started_at: Instant,
    pub collections_total: Counter,
    pub collect_errors_total: CounterVec,
    pub collect_duration_seconds: Gauge,
    pub page_views_total: CounterVec,
    pub scrape_count_total: Counter,
    pub uptime_seconds: Gauge,
    pub host_cpu_usage_percent: Gauge,
    pub host_memory_usage_percent: Gauge,
    pub host_disk_usage_percent: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let collections_total = Counter::with_opts(opts!(
            "hostdash_collections_total",
            "Snapshot collections attempted"
        ))?;
        let collect_errors_total = CounterVec::new(
            opts!(
                "hostdash_collect_errors_total",
                "Failed snapshot collections by reason"
            ),
            &["reason"],
        )?;
        let collect_duration_seconds = Gauge::with_opts(opts!(
            "hostdash_collect_duration_seconds",
            "Wall time of the most recent collection, including the CPU sample window"
        ))?;
        let page_views_total = CounterVec::new(
            opts!("hostdash_page_views_total", "Dashboard page views by page"),
            &["page"],
        )?;
        let scrape_count_total = Counter::with_opts(opts!(
            "hostdash_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;
        let uptime_seconds = Gauge::with_opts(opts!(
            "hostdash_uptime_seconds",
            "Seconds since the dashboard process started"
        ))?;
        let host_cpu_usage_percent = Gauge::with_opts(opts!(
            "hostdash_host_cpu_usage_percent",
            "CPU usage from the most recent snapshot (0..100)"
        ))?;
        let host_memory_usage_percent = Gauge::with_opts(opts!(
            "hostdash_host_memory_usage_percent",
            "Memory usage from the most recent snapshot (0..100)"
        ))?;
        let host_disk_usage_percent = Gauge::with_opts(opts!(
            "hostdash_host_disk_usage_percent",
            "Disk usage of the configured mount point from the most recent snapshot (0..100)"
        ))?;

        register(&registry, &collections_total)?;
        register(&registry, &collect_errors_total)?;
        register(&registry, &collect_duration_seconds)?;
        register(&registry, &page_views_total)?;
        register(&registry, &scrape_count_total)?;
        register(&registry, &uptime_seconds)?;
        register(&registry, &host_cpu_usage_percent)?;
        register(&registry, &host_memory_usage_percent)?;
        register(&registry, &host_disk_usage_percent)?;

        Ok(Arc::new(Self {
            registry,
            started_at: Instant::now(),
            collections_total,
            collect_errors_total,
            collect_duration_seconds,
            page_views_total,
            scrape_count_total,
            uptime_seconds,
            host_cpu_usage_percent,
            host_memory_usage_percent,
            host_disk_usage_percent,
        }))
    }

    pub fn observe_collection(&self, elapsed: Duration, error_reason: Option<&str>) {
        self.collections_total.inc();
        self.collect_duration_seconds.set(elapsed.as_secs_f64());
        if let Some(reason) = error_reason {
            self.collect_errors_total
                .with_label_values(&[reason])
                .inc();
        }
    }

    pub fn update_from_snapshot(&self, snapshot: &Snapshot) {
        if snapshot.available(CoreMetric::CpuUsage) {
            self.host_cpu_usage_percent.set(snapshot.cpu_percent);
        }
        if snapshot.available(CoreMetric::Memory) {
            self.host_memory_usage_percent.set(snapshot.memory_percent);
        }
        if snapshot.available(CoreMetric::Disk) {
            self.host_disk_usage_percent.set(snapshot.disk_percent);
        }
    }

    pub fn inc_page_view(&self, page: &str) {
        self.page_views_total.with_label_values(&[page]).inc();
    }

    pub fn inc_scrape_count(&self) {
        self.scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        self.uptime_seconds
            .set(self.started_at.elapsed().as_secs_f64());

        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::fake::FakeProbe;
    use crate::collectors::{Collector as SnapshotCollector, ProbeError};

    fn encoded(metrics: &Metrics) -> String {
        String::from_utf8(metrics.encode_metrics().expect("encode")).expect("utf8")
    }

    #[test]
    fn failed_collections_are_labelled() {
        let metrics = Metrics::new().expect("metrics");
        metrics.observe_collection(Duration::from_millis(1_020), None);
        metrics.observe_collection(Duration::from_millis(3), Some("path_not_found"));

        let text = encoded(&metrics);
        assert!(text.contains("hostdash_collections_total 2"));
        assert!(text.contains("hostdash_collect_errors_total{reason=\"path_not_found\"} 1"));
        assert!(text.contains("hostdash_collect_duration_seconds 0.003"));
    }

    #[test]
    fn page_views_by_page() {
        let metrics = Metrics::new().expect("metrics");
        metrics.inc_page_view("cpu");
        metrics.inc_page_view("cpu");
        metrics.inc_page_view("home");

        let text = encoded(&metrics);
        assert!(text.contains("hostdash_page_views_total{page=\"cpu\"} 2"));
        assert!(text.contains("hostdash_page_views_total{page=\"home\"} 1"));
        assert!(text.contains("hostdash_uptime_seconds"));
    }

    #[test]
    fn degraded_table_keeps_last_gauge_value() {
        let metrics = Metrics::new().expect("metrics");
        let window = Duration::from_millis(1);

        let healthy = SnapshotCollector::new(Arc::new(FakeProbe::new()), "/")
            .collect(window)
            .expect("collection");
        metrics.update_from_snapshot(&healthy);
        assert_eq!(metrics.host_memory_usage_percent.get(), 68.0);

        let probe = FakeProbe::new()
            .with_memory(Err(ProbeError::PermissionDenied))
            .with_cpu_percent(Ok(10.0));
        let degraded = SnapshotCollector::new(Arc::new(probe), "/")
            .collect(window)
            .expect("collection");
        metrics.update_from_snapshot(&degraded);

        assert_eq!(metrics.host_memory_usage_percent.get(), 68.0);
        assert_eq!(metrics.host_cpu_usage_percent.get(), 10.0);
        assert_eq!(metrics.host_disk_usage_percent.get(), 55.3);

        let text = encoded(&metrics);
        assert!(text.contains("hostdash_host_memory_usage_percent 68"));
    }
}
