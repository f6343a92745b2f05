use crate::collectors::system::SysinfoProbe;
use crate::collectors::{
    CollectionError, CoreMetric, HostProbe, InterfaceAddress, ProbeError, Snapshot,
};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Builds [`Snapshot`]s from a [`HostProbe`].
///
/// Holds no mutable state, so one instance can serve concurrent callers.
#[derive(Clone)]
pub struct Collector {
    probe: Arc<dyn HostProbe>,
    disk_path: PathBuf,
}

impl Collector {
    pub fn new(probe: Arc<dyn HostProbe>, disk_path: impl Into<PathBuf>) -> Self {
        Self {
            probe,
            disk_path: disk_path.into(),
        }
    }

    pub fn system(disk_path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(SysinfoProbe), disk_path)
    }

    /// Takes one snapshot, blocking for `sample_window` while CPU usage is sampled.
    ///
    /// Missing battery, CPU frequency or IPv4 address leave the matching field
    /// empty. A single failed core table is listed in [`Snapshot::unavailable`].
    /// The call fails when the disk path is missing or every core table fails.
    pub fn collect(&self, sample_window: Duration) -> Result<Snapshot, CollectionError> {
        if sample_window.is_zero() {
            return Err(CollectionError::InvalidSampleWindow);
        }

        let mut failures: Vec<(CoreMetric, ProbeError)> = Vec::new();

        // Disk goes first so a misconfigured path fails before the CPU sample blocks.
        let disk = match self.probe.disk_usage(&self.disk_path) {
            Ok(disk) => Some(disk),
            Err(ProbeError::NotFound(_)) => {
                return Err(CollectionError::PathNotFound {
                    path: self.disk_path.clone(),
                });
            }
            Err(err) => {
                failures.push((CoreMetric::Disk, err));
                None
            }
        };

        let identity = self.probe.os_identity();
        let boot_time = record(CoreMetric::BootTime, self.probe.boot_time(), &mut failures);
        let cpu_percent = record(
            CoreMetric::CpuUsage,
            self.probe.cpu_percent(sample_window),
            &mut failures,
        );
        let topology = self.probe.cpu_topology();
        let memory = record(CoreMetric::Memory, self.probe.memory(), &mut failures);
        let network = record(
            CoreMetric::Network,
            self.probe.network_counters(),
            &mut failures,
        );

        if failures.len() == CoreMetric::ALL.len() {
            return Err(total_failure(&failures));
        }
        for (metric, err) in &failures {
            warn!(metric = %metric, error = %err, "core metric unavailable");
        }

        let ip_address = match self.probe.interface_addresses() {
            Ok(addresses) => {
                let ip = first_non_loopback_ipv4(&addresses);
                if let Some(entry) = addresses
                    .iter()
                    .find(|entry| ip.map(IpAddr::V4) == Some(entry.address))
                {
                    debug!(interface = %entry.interface, address = %entry.address, "ipv4 address selected");
                }
                ip
            }
            Err(err) => {
                debug!(error = %err, "interface enumeration failed");
                None
            }
        };

        let battery_percent = match self.probe.battery_percent() {
            Ok(value) => value.map(clamp_percent),
            Err(err) => {
                debug!(error = %err, "battery reading unavailable");
                None
            }
        };

        let collected_at = self.probe.now();
        let boot_time = boot_time.unwrap_or(collected_at);
        let uptime = collected_at
            .duration_since(boot_time)
            .map(|d| Duration::from_secs(d.as_secs()))
            .unwrap_or_default();

        let memory = memory.unwrap_or_default();
        let disk = disk.unwrap_or_default();
        let network = network.unwrap_or_default();

        let mut unavailable: Vec<CoreMetric> = failures.iter().map(|(m, _)| *m).collect();
        unavailable.sort();

        Ok(Snapshot {
            os_name: identity.os_name,
            kernel_version: identity.kernel_version,
            host_name: identity.host_name,
            processor: identity.processor,
            boot_time,
            uptime,
            cpu_percent: clamp_percent(cpu_percent.unwrap_or(0.0)),
            cpu_physical_cores: topology.physical_cores,
            cpu_logical_cores: topology.logical_cores,
            cpu_freq_current_mhz: topology.freq_current_mhz.filter(|f| usable_frequency(*f)),
            cpu_freq_max_mhz: topology.freq_max_mhz.filter(|f| usable_frequency(*f)),
            memory_total_bytes: memory.total_bytes,
            memory_used_bytes: memory.used_bytes,
            memory_available_bytes: memory.available_bytes,
            memory_percent: percent_of(
                memory.total_bytes.saturating_sub(memory.available_bytes),
                memory.total_bytes,
            ),
            swap_used_bytes: memory.swap_used_bytes.min(memory.swap_total_bytes),
            swap_total_bytes: memory.swap_total_bytes,
            disk_path: self.disk_path.clone(),
            disk_total_bytes: disk.total_bytes,
            disk_used_bytes: disk.used_bytes,
            disk_free_bytes: disk.free_bytes,
            disk_percent: percent_of(
                disk.used_bytes,
                disk.used_bytes.saturating_add(disk.free_bytes),
            ),
            network_bytes_sent: network.bytes_sent,
            network_bytes_received: network.bytes_received,
            ip_address,
            battery_percent,
            unavailable,
            collected_at,
        })
    }
}

fn record<T>(
    metric: CoreMetric,
    result: Result<T, ProbeError>,
    failures: &mut Vec<(CoreMetric, ProbeError)>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            failures.push((metric, err));
            None
        }
    }
}

fn total_failure(failures: &[(CoreMetric, ProbeError)]) -> CollectionError {
    failures
        .iter()
        .find(|(_, err)| matches!(err, ProbeError::PermissionDenied))
        .map(|(metric, _)| CollectionError::PermissionDenied { metric: *metric })
        .unwrap_or(CollectionError::OsUnavailable)
}

/// First IPv4 address that is not loopback, in enumeration order. The order
/// comes from the OS and differs across platforms.
pub fn first_non_loopback_ipv4(addresses: &[InterfaceAddress]) -> Option<Ipv4Addr> {
    addresses.iter().find_map(|entry| match entry.address {
        IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
        _ => None,
    })
}

pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    clamp_percent(part as f64 * 100.0 / whole as f64)
}

fn usable_frequency(mhz: f64) -> bool {
    mhz.is_finite() && mhz > 0.0
}
