//! Host-wide sources: total memory, logical CPUs, disk type

use super::read_trimmed;
use crate::models::{DiskType, OsFamily};
use crate::units::GIB;
use std::fs;
use std::path::Path;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use tracing::{debug, trace};

/// Used whenever host memory cannot be determined
pub const DEFAULT_HOST_MEMORY: u64 = GIB;

/// Block device name prefixes that never back a data directory
const VIRTUAL_DEVICE_PREFIXES: &[&str] = &["loop", "ram", "zram", "sr", "fd", "dm-", "md", "nbd"];

/// Parse `MemTotal` out of /proc/meminfo content
///
/// Format: "MemTotal:       16384000 kB"
pub fn parse_meminfo(content: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb.saturating_mul(1024))
}

/// Total host memory in bytes, `None` if the platform gave no answer
///
/// Linux reads meminfo below the configured proc root; other families ask
/// the OS through sysinfo.
pub(super) fn read_host_memory(proc_root: &Path, os: OsFamily) -> Option<u64> {
    match os {
        OsFamily::Linux => {
            read_trimmed(&proc_root.join("meminfo")).and_then(|content| parse_meminfo(&content))
        }
        OsFamily::Mac | OsFamily::Windows => system_total_memory(),
    }
}

/// Total physical memory as reported by the OS (Linux, macOS, Windows)
pub fn system_total_memory() -> Option<u64> {
    let system = System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
    );
    let total = system.total_memory();
    (total > 0).then_some(total)
}

/// Logical processor count visible to this process
pub fn host_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

/// Whether a /sys/block entry is a real disk worth asking about
pub fn is_representative_device(name: &str) -> bool {
    !VIRTUAL_DEVICE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Map a `queue/rotational` flag to a disk type
pub fn parse_rotational(content: &str) -> Option<DiskType> {
    match content.trim() {
        "0" => Some(DiskType::Ssd),
        "1" => Some(DiskType::Hdd),
        _ => None,
    }
}

/// Disk type of the first real block device; ssd when unknown
pub(super) fn read_disk_type(sys_root: &Path, os: OsFamily) -> Option<DiskType> {
    if os != OsFamily::Linux {
        return None;
    }

    let mut devices: Vec<String> = fs::read_dir(sys_root.join("block"))
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| is_representative_device(name))
        .collect();
    devices.sort();

    let device = devices.first()?;
    let flag = read_trimmed(&sys_root.join("block").join(device).join("queue/rotational"))?;
    let disk_type = parse_rotational(&flag);
    trace!(device = %device, rotational = %flag, "Read rotational flag");
    debug!(device = %device, disk_type = ?disk_type, "Detected disk type");
    disk_type
}
