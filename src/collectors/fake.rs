use crate::collectors::{
    CpuTopology, DiskReading, HostProbe, InterfaceAddress, MemoryReading, NetworkCounters,
    OsIdentity, ProbeError,
};
use std::collections::VecDeque;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Scripted host used in tests in place of the real OS.
///
/// Network readings are consumed one per call; the last one keeps repeating.
/// The clock moves forward by `clock_step` after every read.
pub struct FakeProbe {
    pub identity: OsIdentity,
    pub boot_time: Result<SystemTime, ProbeError>,
    pub cpu_percent: Result<f64, ProbeError>,
    pub topology: CpuTopology,
    pub memory: Result<MemoryReading, ProbeError>,
    pub mounts: Vec<PathBuf>,
    pub disk: Result<DiskReading, ProbeError>,
    pub network: Mutex<VecDeque<Result<NetworkCounters, ProbeError>>>,
    pub interfaces: Result<Vec<InterfaceAddress>, ProbeError>,
    pub battery: Result<Option<f64>, ProbeError>,
    pub now: Mutex<SystemTime>,
    pub clock_step: Duration,
}

impl FakeProbe {
    /// A healthy desktop: 42.5% CPU, 68.0% memory, 55.3% disk, no battery.
    pub fn new() -> Self {
        let boot = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        Self {
            identity: OsIdentity {
                os_name: "Linux 6.8".to_string(),
                kernel_version: Some("6.8.0".to_string()),
                host_name: Some("bench".to_string()),
                processor: "x86_64".to_string(),
            },
            boot_time: Ok(boot),
            cpu_percent: Ok(42.5),
            topology: CpuTopology {
                physical_cores: 4,
                logical_cores: 8,
                freq_current_mhz: Some(2_400.0),
                freq_max_mhz: Some(4_800.0),
            },
            memory: Ok(MemoryReading {
                total_bytes: 16_000,
                used_bytes: 9_000,
                available_bytes: 5_120,
                swap_total_bytes: 4_000,
                swap_used_bytes: 1_000,
            }),
            mounts: vec![PathBuf::from("/")],
            disk: Ok(DiskReading {
                total_bytes: 1_100,
                used_bytes: 553,
                free_bytes: 447,
            }),
            network: Mutex::new(VecDeque::from([Ok(NetworkCounters {
                bytes_sent: 5 * 1024 * 1024,
                bytes_received: 12 * 1024 * 1024,
            })])),
            interfaces: Ok(vec![
                InterfaceAddress::new("lo", Ipv4Addr::LOCALHOST),
                InterfaceAddress::new("eth0", Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
                InterfaceAddress::new("eth0", Ipv4Addr::new(192, 168, 1, 20)),
            ]),
            battery: Ok(None),
            now: Mutex::new(boot + Duration::from_secs(3 * 3600 + 25 * 60 + 7)),
            clock_step: Duration::ZERO,
        }
    }

    pub fn with_boot_time(mut self, boot_time: Result<SystemTime, ProbeError>) -> Self {
        self.boot_time = boot_time;
        self
    }

    pub fn with_cpu_percent(mut self, cpu_percent: Result<f64, ProbeError>) -> Self {
        self.cpu_percent = cpu_percent;
        self
    }

    pub fn with_memory(mut self, memory: Result<MemoryReading, ProbeError>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_disk(mut self, disk: Result<DiskReading, ProbeError>) -> Self {
        self.disk = disk;
        self
    }

    pub fn with_network(mut self, script: Vec<Result<NetworkCounters, ProbeError>>) -> Self {
        self.network = Mutex::new(script.into());
        self
    }

    pub fn with_interfaces(mut self, interfaces: Result<Vec<InterfaceAddress>, ProbeError>) -> Self {
        self.interfaces = interfaces;
        self
    }

    pub fn with_battery(mut self, battery: Result<Option<f64>, ProbeError>) -> Self {
        self.battery = battery;
        self
    }

    pub fn with_now(mut self, now: SystemTime) -> Self {
        self.now = Mutex::new(now);
        self
    }

    pub fn with_clock_step(mut self, step: Duration) -> Self {
        self.clock_step = step;
        self
    }
}

impl HostProbe for FakeProbe {
    fn os_identity(&self) -> OsIdentity {
        self.identity.clone()
    }

    fn boot_time(&self) -> Result<SystemTime, ProbeError> {
        self.boot_time.clone()
    }

    fn cpu_percent(&self, window: Duration) -> Result<f64, ProbeError> {
        std::thread::sleep(window);
        self.cpu_percent.clone()
    }

    fn cpu_topology(&self) -> CpuTopology {
        self.topology.clone()
    }

    fn memory(&self) -> Result<MemoryReading, ProbeError> {
        self.memory.clone()
    }

    fn disk_usage(&self, path: &Path) -> Result<DiskReading, ProbeError> {
        if !self.mounts.iter().any(|m| m == path) {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }
        self.disk.clone()
    }

    fn network_counters(&self) -> Result<NetworkCounters, ProbeError> {
        let mut script = match self.network.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if script.len() > 1 {
            return script.pop_front().unwrap_or(Err(ProbeError::Unsupported));
        }
        script.front().cloned().unwrap_or(Err(ProbeError::Unsupported))
    }

    fn interface_addresses(&self) -> Result<Vec<InterfaceAddress>, ProbeError> {
        self.interfaces.clone()
    }

    fn battery_percent(&self) -> Result<Option<f64>, ProbeError> {
        self.battery.clone()
    }

    fn now(&self) -> SystemTime {
        let mut clock = match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = *clock;
        *clock = current + self.clock_step;
        current
    }
}
