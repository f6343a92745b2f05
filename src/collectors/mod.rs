pub mod collector;
#[cfg(test)]
pub mod fake;
pub mod system;

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

pub use collector::Collector;

/// One complete reading of the host, built in a single pass by [`Collector::collect`].
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub os_name: String,
    pub kernel_version: Option<String>,
    pub host_name: Option<String>,
    pub processor: String,
    pub boot_time: SystemTime,
    pub uptime: Duration,
    pub cpu_percent: f64,
    pub cpu_physical_cores: usize,
    pub cpu_logical_cores: usize,
    pub cpu_freq_current_mhz: Option<f64>,
    pub cpu_freq_max_mhz: Option<f64>,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub memory_available_bytes: u64,
    pub memory_percent: f64,
    pub swap_used_bytes: u64,
    pub swap_total_bytes: u64,
    pub disk_path: PathBuf,
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub disk_free_bytes: u64,
    pub disk_percent: f64,
    pub network_bytes_sent: u64,
    pub network_bytes_received: u64,
    pub ip_address: Option<Ipv4Addr>,
    pub battery_percent: Option<f64>,
    /// Core tables the OS refused on this pass. Their numeric fields read zero
    /// and must be shown as unavailable.
    pub unavailable: Vec<CoreMetric>,
    pub collected_at: SystemTime,
}

impl Snapshot {
    pub fn available(&self, metric: CoreMetric) -> bool {
        !self.unavailable.contains(&metric)
    }
}

/// OS tables every snapshot depends on. Losing one degrades the snapshot,
/// losing all of them fails the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreMetric {
    BootTime,
    CpuUsage,
    Memory,
    Disk,
    Network,
}

impl CoreMetric {
    pub const ALL: [CoreMetric; 5] = [
        CoreMetric::BootTime,
        CoreMetric::CpuUsage,
        CoreMetric::Memory,
        CoreMetric::Disk,
        CoreMetric::Network,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CoreMetric::BootTime => "boot_time",
            CoreMetric::CpuUsage => "cpu_usage",
            CoreMetric::Memory => "memory",
            CoreMetric::Disk => "disk",
            CoreMetric::Network => "network",
        }
    }
}

impl fmt::Display for CoreMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollectionError {
    #[error("disk path {} does not exist", path.display())]
    PathNotFound { path: PathBuf },
    #[error("permission denied while reading {metric}")]
    PermissionDenied { metric: CoreMetric },
    #[error("operating system did not answer any core metric query")]
    OsUnavailable,
    #[error("sample window must be greater than zero")]
    InvalidSampleWindow,
}

impl CollectionError {
    pub fn reason(&self) -> &'static str {
        match self {
            CollectionError::PathNotFound { .. } => "path_not_found",
            CollectionError::PermissionDenied { .. } => "permission_denied",
            CollectionError::OsUnavailable => "os_unavailable",
            CollectionError::InvalidSampleWindow => "invalid_sample_window",
        }
    }
}

/// Failure of a single OS query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("not supported on this platform")]
    Unsupported,
    #[error("permission denied")]
    PermissionDenied,
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("i/o error: {0}")]
    Io(String),
}

impl ProbeError {
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ProbeError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ProbeError::PermissionDenied,
            _ => ProbeError::Io(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OsIdentity {
    pub os_name: String,
    pub kernel_version: Option<String>,
    pub host_name: Option<String>,
    pub processor: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuTopology {
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub freq_current_mhz: Option<f64>,
    pub freq_max_mhz: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryReading {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
}

/// `free_bytes` is the space available to unprivileged users, so
/// `used + free` can be below `total` on filesystems with reserved blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskReading {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub interface: String,
    pub address: IpAddr,
}

impl InterfaceAddress {
    pub fn new(interface: impl Into<String>, address: impl Into<IpAddr>) -> Self {
        Self {
            interface: interface.into(),
            address: address.into(),
        }
    }
}

/// The OS-facing side of the collector. Each method is one independent query;
/// implementations must not share mutable state between calls.
pub trait HostProbe: Send + Sync {
    fn os_identity(&self) -> OsIdentity;

    fn boot_time(&self) -> Result<SystemTime, ProbeError>;

    /// Blocks the calling thread for `window`.
    fn cpu_percent(&self, window: Duration) -> Result<f64, ProbeError>;

    fn cpu_topology(&self) -> CpuTopology;

    fn memory(&self) -> Result<MemoryReading, ProbeError>;

    fn disk_usage(&self, path: &Path) -> Result<DiskReading, ProbeError>;

    fn network_counters(&self) -> Result<NetworkCounters, ProbeError>;

    /// Addresses in the order the OS enumerates interfaces.
    fn interface_addresses(&self) -> Result<Vec<InterfaceAddress>, ProbeError>;

    /// `Ok(None)` when the machine has no battery.
    fn battery_percent(&self) -> Result<Option<f64>, ProbeError>;

    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
