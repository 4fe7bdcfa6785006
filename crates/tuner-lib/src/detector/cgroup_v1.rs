//! cgroup v1 limit introspection (fallback)
//!
//! Reads limits from the legacy per-controller hierarchy:
//! - memory controller: memory.limit_in_bytes
//! - cpu controller: cpu.cfs_quota_us / cpu.cfs_period_us

use super::{read_trimmed, CgroupLimits};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// memory.limit_in_bytes at or above this value means "no limit".
///
/// The kernel reports PAGE_COUNTER_MAX rounded down to the page size
/// (0x7FFFFFFFFFFFF000 with 4K pages); some runtimes print slightly
/// different values, so anything at or above this threshold counts.
pub const V1_UNLIMITED_THRESHOLD: u64 = 0x7FFF_FFFF_FFFF_F000;

/// Mount directory names the cpu controller appears under
const CPU_CONTROLLER_DIRS: &[&str] = &["cpu", "cpu,cpuacct"];

/// Limits for the legacy cgroup v1 hierarchy
pub struct CgroupV1Limits {
    /// Root path for cgroup v1 controllers (typically /sys/fs/cgroup)
    cgroup_root: PathBuf,
    /// Map of controller -> cgroup path
    controllers: HashMap<String, String>,
}

impl CgroupV1Limits {
    pub fn new(cgroup_root: impl Into<PathBuf>, controllers: HashMap<String, String>) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            controllers,
        }
    }

    /// Build from `<proc_root>/self/cgroup`
    ///
    /// An unreadable descriptor still yields a source that only looks at
    /// the controller mount roots.
    pub fn from_proc(cgroup_root: &Path, proc_root: &Path) -> Self {
        let controllers = read_trimmed(&proc_root.join("self/cgroup"))
            .map(|content| Self::controller_paths_from(&content))
            .unwrap_or_default();
        Self::new(cgroup_root, controllers)
    }

    /// Parse /proc/<pid>/cgroup content (v1 format) into controller -> path
    ///
    /// v1 format: "hierarchy-ID:controller-list:cgroup-path",
    /// e.g. "4:memory:/docker/abc123..."
    pub fn controller_paths_from(content: &str) -> HashMap<String, String> {
        let mut paths = HashMap::new();

        for line in content.lines() {
            let parts: Vec<&str> = line.splitn(3, ':').collect();
            if parts.len() == 3 {
                let controllers = parts[1];
                let path = parts[2].trim();

                // Skip cgroup v2 unified hierarchy (empty controller list)
                if controllers.is_empty() {
                    continue;
                }

                // Handle comma-separated controllers (e.g., "cpu,cpuacct")
                for controller in controllers.split(',') {
                    paths.insert(controller.to_string(), path.to_string());
                }
            }
        }

        paths
    }

    /// Treat PAGE_COUNTER_MAX-like values as unlimited
    pub fn parse_memory_limit(content: &str) -> Option<u64> {
        let value: u64 = content.trim().parse().ok()?;
        if value == 0 || value >= V1_UNLIMITED_THRESHOLD {
            return None;
        }
        Some(value)
    }

    /// Quota/period in fractional cores; a quota of -1 means unlimited
    pub fn quota_to_cores(quota_us: i64, period_us: u64) -> Option<f64> {
        if quota_us <= 0 || period_us == 0 {
            return None;
        }
        Some(quota_us as f64 / period_us as f64)
    }

    /// Candidate directories for a controller: our own cgroup first, then
    /// the mount root (what a container with a private namespace sees)
    fn controller_dirs(&self, mount_dirs: &[&str], controller: &str) -> Vec<PathBuf> {
        let relative = self
            .controllers
            .get(controller)
            .map(|p| p.trim_start_matches('/').to_string())
            .unwrap_or_default();

        let mut dirs = Vec::new();
        if !relative.is_empty() {
            for mount in mount_dirs {
                dirs.push(self.cgroup_root.join(mount).join(&relative));
            }
        }
        for mount in mount_dirs {
            dirs.push(self.cgroup_root.join(mount));
        }
        dirs
    }
}

impl CgroupLimits for CgroupV1Limits {
    fn memory_limit(&self) -> Option<u64> {
        for dir in self.controller_dirs(&["memory"], "memory") {
            if let Some(content) = read_trimmed(&dir.join("memory.limit_in_bytes")) {
                let limit = Self::parse_memory_limit(&content);
                debug!(limit = ?limit, dir = %dir.display(), "cgroup v1 memory limit");
                return limit;
            }
        }

        None
    }

    fn cpu_quota(&self) -> Option<f64> {
        for dir in self.controller_dirs(CPU_CONTROLLER_DIRS, "cpu") {
            let Some(quota) = read_trimmed(&dir.join("cpu.cfs_quota_us")) else {
                continue;
            };
            let quota: i64 = quota.parse().ok()?;
            let period: u64 = read_trimmed(&dir.join("cpu.cfs_period_us"))
                .and_then(|p| p.parse().ok())
                .unwrap_or(100_000);

            let cores = Self::quota_to_cores(quota, period);
            debug!(quota_us = quota, period_us = period, cores = ?cores, "cgroup v1 cpu quota");
            return cores;
        }

        None
    }
}
