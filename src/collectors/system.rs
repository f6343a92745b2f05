use crate::collectors::{
    CpuTopology, DiskReading, HostProbe, InterfaceAddress, MemoryReading, NetworkCounters,
    OsIdentity, ProbeError,
};
#[cfg(target_os = "linux")]
use std::fs;
use std::path::Path;
#[cfg(target_os = "macos")]
use std::process::Command;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sysinfo::{CpuExt, CpuRefreshKind, NetworkExt, NetworksExt, RefreshKind, System, SystemExt};
#[cfg(any(target_os = "linux", target_os = "macos"))]
use tracing::debug;

/// Reads the live host through `sysinfo`, `/sys` and platform tools.
///
/// Every query builds its own `System`, so calls never share OS handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoProbe;

impl HostProbe for SysinfoProbe {
    fn os_identity(&self) -> OsIdentity {
        let system =
            System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::new()));
        let os_name = system
            .long_os_version()
            .or_else(|| system.name())
            .unwrap_or_else(|| std::env::consts::OS.to_string());
        let processor = system
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| std::env::consts::ARCH.to_string());

        OsIdentity {
            os_name,
            kernel_version: system.kernel_version(),
            host_name: system.host_name(),
            processor,
        }
    }

    fn boot_time(&self) -> Result<SystemTime, ProbeError> {
        if !System::IS_SUPPORTED {
            return Err(ProbeError::Unsupported);
        }
        let system = System::new();
        match system.boot_time() {
            0 => Err(ProbeError::Unsupported),
            secs => Ok(UNIX_EPOCH + Duration::from_secs(secs)),
        }
    }

    fn cpu_percent(&self, window: Duration) -> Result<f64, ProbeError> {
        let usage = CpuRefreshKind::new().with_cpu_usage();
        let mut system = System::new_with_specifics(RefreshKind::new().with_cpu(usage));
        if system.cpus().is_empty() {
            return Err(ProbeError::Unsupported);
        }
        std::thread::sleep(window);
        system.refresh_cpu_specifics(usage);
        Ok(system.global_cpu_info().cpu_usage() as f64)
    }

    fn cpu_topology(&self) -> CpuTopology {
        let system = System::new_with_specifics(
            RefreshKind::new().with_cpu(CpuRefreshKind::new().with_frequency()),
        );
        let frequencies: Vec<u64> = system
            .cpus()
            .iter()
            .map(|c| c.frequency())
            .filter(|f| *f > 0)
            .collect();
        let freq_current_mhz = if frequencies.is_empty() {
            None
        } else {
            Some(frequencies.iter().sum::<u64>() as f64 / frequencies.len() as f64)
        };

        CpuTopology {
            physical_cores: system.physical_core_count().unwrap_or(0),
            logical_cores: system.cpus().len(),
            freq_current_mhz,
            freq_max_mhz: read_max_frequency_mhz(),
        }
    }

    fn memory(&self) -> Result<MemoryReading, ProbeError> {
        let mut system = System::new();
        system.refresh_memory();
        let total_bytes = system.total_memory();
        if total_bytes == 0 {
            return Err(ProbeError::Unsupported);
        }

        Ok(MemoryReading {
            total_bytes,
            used_bytes: system.used_memory(),
            available_bytes: system.available_memory(),
            swap_total_bytes: system.total_swap(),
            swap_used_bytes: system.used_swap(),
        })
    }

    fn disk_usage(&self, path: &Path) -> Result<DiskReading, ProbeError> {
        ensure_exists(path.try_exists(), path)?;
        filesystem_usage(path)
    }

    fn network_counters(&self) -> Result<NetworkCounters, ProbeError> {
        let mut system = System::new();
        system.refresh_networks_list();
        system.refresh_networks();

        let counters = system
            .networks()
            .iter()
            .fold(NetworkCounters::default(), |acc, (_iface, data)| {
                NetworkCounters {
                    bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                    bytes_received: acc.bytes_received.saturating_add(data.total_received()),
                }
            });
        Ok(counters)
    }

    fn interface_addresses(&self) -> Result<Vec<InterfaceAddress>, ProbeError> {
        let interfaces = local_ip_address::list_afinet_netifas()
            .map_err(|err| ProbeError::Io(err.to_string()))?;
        Ok(interfaces
            .into_iter()
            .map(|(name, address)| InterfaceAddress::new(name, address))
            .collect())
    }

    fn battery_percent(&self) -> Result<Option<f64>, ProbeError> {
        read_battery_percent()
    }
}

/// Only a definite "no such path" is `NotFound`; a path behind an unreadable
/// directory stays a permission failure.
fn ensure_exists(exists: std::io::Result<bool>, path: &Path) -> Result<(), ProbeError> {
    match exists {
        Ok(true) => Ok(()),
        Ok(false) => Err(ProbeError::NotFound(path.to_path_buf())),
        Err(err) => Err(ProbeError::from_io(err, path)),
    }
}

#[cfg(unix)]
fn filesystem_usage(path: &Path) -> Result<DiskReading, ProbeError> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| ProbeError::NotFound(path.to_path_buf()))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: `c_path` is NUL-terminated and `stat` outlives the call.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(ProbeError::from_io(std::io::Error::last_os_error(), path));
    }

    let fragment = stat.f_frsize as u64;
    let total_bytes = (stat.f_blocks as u64).saturating_mul(fragment);
    let free_for_root = (stat.f_bfree as u64).saturating_mul(fragment);
    let free_bytes = (stat.f_bavail as u64).saturating_mul(fragment);

    Ok(DiskReading {
        total_bytes,
        used_bytes: total_bytes.saturating_sub(free_for_root),
        free_bytes,
    })
}

#[cfg(not(unix))]
fn filesystem_usage(path: &Path) -> Result<DiskReading, ProbeError> {
    use sysinfo::DiskExt;

    let mut system = System::new();
    system.refresh_disks_list();
    system.refresh_disks();

    // Longest mount point containing the path owns it.
    let disk = system
        .disks()
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .ok_or(ProbeError::Unsupported)?;

    let total_bytes = disk.total_space();
    let free_bytes = disk.available_space();
    Ok(DiskReading {
        total_bytes,
        used_bytes: total_bytes.saturating_sub(free_bytes),
        free_bytes,
    })
}

#[cfg(target_os = "linux")]
fn read_max_frequency_mhz() -> Option<f64> {
    let raw = fs::read_to_string("/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq").ok()?;
    parse_khz_as_mhz(&raw)
}

#[cfg(not(target_os = "linux"))]
fn read_max_frequency_mhz() -> Option<f64> {
    None
}

#[cfg(target_os = "linux")]
fn read_battery_percent() -> Result<Option<f64>, ProbeError> {
    let root = Path::new("/sys/class/power_supply");
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ProbeError::from_io(err, root)),
    };

    let mut supplies: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    supplies.sort();

    for supply in supplies {
        let kind = fs::read_to_string(supply.join("type")).unwrap_or_default();
        if kind.trim() != "Battery" {
            continue;
        }
        // Wireless mice and keyboards report scope "Device".
        let scope = fs::read_to_string(supply.join("scope")).unwrap_or_default();
        if scope.trim().eq_ignore_ascii_case("device") {
            continue;
        }

        if let Some(pct) = fs::read_to_string(supply.join("capacity"))
            .ok()
            .and_then(|raw| parse_f64_loose(&raw))
        {
            return Ok(Some(pct));
        }

        let now = read_u64(&supply.join("energy_now"))
            .or_else(|| read_u64(&supply.join("charge_now")));
        let full = read_u64(&supply.join("energy_full"))
            .or_else(|| read_u64(&supply.join("charge_full")));
        if let (Some(now), Some(full)) = (now, full) {
            if full > 0 {
                return Ok(Some(now as f64 * 100.0 / full as f64));
            }
        }
        debug!(supply = %supply.display(), "battery without readable charge level");
    }

    Ok(None)
}

#[cfg(target_os = "linux")]
fn read_u64(path: &Path) -> Option<u64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(target_os = "macos")]
fn read_battery_percent() -> Result<Option<f64>, ProbeError> {
    let output = Command::new("pmset")
        .args(["-g", "batt"])
        .output()
        .map_err(|err| ProbeError::from_io(err, Path::new("pmset")))?;
    if !output.status.success() {
        debug!(status = %output.status, "pmset exited with failure");
        return Err(ProbeError::Unsupported);
    }
    Ok(parse_pmset_battery(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn read_battery_percent() -> Result<Option<f64>, ProbeError> {
    Err(ProbeError::Unsupported)
}

/// Parses `pmset -g batt`, e.g. `-InternalBattery-0 (id=123)\t72%; charging; 1:23 remaining`.
#[cfg(any(target_os = "macos", test))]
fn parse_pmset_battery(output: &str) -> Option<f64> {
    output
        .lines()
        .find(|l| l.contains("InternalBattery"))
        .and_then(|l| l.split('\t').nth(1))
        .and_then(|s| s.split('%').next())
        .and_then(parse_f64_loose)
}

#[cfg(any(target_os = "linux", test))]
fn parse_khz_as_mhz(raw: &str) -> Option<f64> {
    let khz = parse_f64_loose(raw)?;
    (khz > 0.0).then(|| khz / 1000.0)
}

#[cfg(any(target_os = "linux", target_os = "macos", test))]
fn parse_f64_loose(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }
    trimmed.replace(',', ".").parse::<f64>().ok()
}
