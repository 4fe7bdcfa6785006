//! cgroup v2 limit introspection
//!
//! Reads limits from the unified cgroup v2 hierarchy:
//! - memory.high / memory.max on every level from the root to our cgroup
//! - cpu.max on our own cgroup (falling back to the hierarchy root)

use super::{read_trimmed, CgroupLimits};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Limits for the cgroup v2 unified hierarchy
pub struct CgroupV2Limits {
    /// Mount point of the unified hierarchy (typically /sys/fs/cgroup)
    cgroup_root: PathBuf,
    /// Our cgroup relative to the mount point, e.g. `/kubepods.slice/pod1/abc`
    cgroup_path: String,
}

impl CgroupV2Limits {
    pub fn new(cgroup_root: impl Into<PathBuf>, cgroup_path: impl Into<String>) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            cgroup_path: cgroup_path.into(),
        }
    }

    /// Build from `<proc_root>/self/cgroup`
    ///
    /// Returns `None` when the descriptor is unreadable or has no unified
    /// (`0::`) entry.
    pub fn from_proc(cgroup_root: &Path, proc_root: &Path) -> Option<Self> {
        let cgroup_file = proc_root.join("self/cgroup");
        let content = read_trimmed(&cgroup_file)?;
        let cgroup_path = Self::cgroup_path_from(&content)?;
        trace!(path = %cgroup_path, "Found cgroup v2 path");
        Some(Self::new(cgroup_root, cgroup_path))
    }

    /// Extract the unified hierarchy path from /proc/<pid>/cgroup content
    ///
    /// cgroup v2 format: "0::/path/to/cgroup"
    pub fn cgroup_path_from(content: &str) -> Option<String> {
        content
            .lines()
            .find_map(|line| line.strip_prefix("0::"))
            .map(|path| path.trim().to_string())
    }

    /// Every directory from the hierarchy root down to our cgroup, root first
    pub fn walk_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.cgroup_root.clone()];
        let mut current = self.cgroup_root.clone();

        for component in self
            .cgroup_path
            .split('/')
            .filter(|c| !c.is_empty() && *c != "." && *c != "..")
        {
            current = current.join(component);
            dirs.push(current.clone());
        }

        dirs
    }

    /// Parse a memory.high / memory.max value; "max" means unlimited
    pub fn parse_limit(content: &str) -> Option<u64> {
        let trimmed = content.trim();
        if trimmed == "max" {
            return None;
        }
        trimmed.parse().ok()
    }

    /// Parse cpu.max ("<quota> <period>") into fractional cores
    pub fn parse_cpu_max(content: &str) -> Option<f64> {
        let mut parts = content.split_whitespace();
        let quota = parts.next()?;
        if quota == "max" {
            return None;
        }

        let quota: f64 = quota.parse().ok()?;
        let period: f64 = parts.next().unwrap_or("100000").parse().ok()?;
        if quota <= 0.0 || period <= 0.0 {
            return None;
        }

        Some(quota / period)
    }

    fn read_limit(dir: &Path, filename: &str) -> Option<u64> {
        read_trimmed(&dir.join(filename)).and_then(|content| Self::parse_limit(&content))
    }

    /// Limit imposed at a single level; memory.high wins over memory.max
    fn level_limit(dir: &Path) -> Option<u64> {
        Self::read_limit(dir, "memory.high").or_else(|| Self::read_limit(dir, "memory.max"))
    }
}

impl CgroupLimits for CgroupV2Limits {
    fn memory_limit(&self) -> Option<u64> {
        // Ancestors can be tighter than the leaf, so take the minimum
        let limit = self
            .walk_dirs()
            .iter()
            .filter_map(|dir| {
                let level = Self::level_limit(dir);
                if let Some(bytes) = level {
                    trace!(dir = %dir.display(), bytes, "cgroup v2 memory limit at level");
                }
                level
            })
            .min();

        debug!(limit = ?limit, path = %self.cgroup_path, "cgroup v2 memory limit");
        limit
    }

    fn cpu_quota(&self) -> Option<f64> {
        let leaf = self
            .walk_dirs()
            .pop()
            .unwrap_or_else(|| self.cgroup_root.clone());

        for dir in [leaf, self.cgroup_root.clone()] {
            if let Some(content) = read_trimmed(&dir.join("cpu.max")) {
                let quota = Self::parse_cpu_max(&content);
                debug!(quota = ?quota, dir = %dir.display(), "cgroup v2 cpu.max");
                return quota;
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cgroup_path_from_unified_line() {
        let content = "0::/kubepods.slice/kubepods-burstable.slice/cri-abc.scope\n";
        assert_eq!(
            CgroupV2Limits::cgroup_path_from(content),
            Some("/kubepods.slice/kubepods-burstable.slice/cri-abc.scope".to_string())
        );
    }

    #[test]
    fn test_cgroup_path_from_hybrid_content() {
        let content = "12:memory:/docker/abc\n11:cpu,cpuacct:/docker/abc\n0::/docker/abc\n";
        assert_eq!(
            CgroupV2Limits::cgroup_path_from(content),
            Some("/docker/abc".to_string())
        );
    }

    #[test]
    fn test_cgroup_path_from_v1_only_content() {
        let content = "4:memory:/docker/abc\n3:cpu,cpuacct:/docker/abc\n";
        assert_eq!(CgroupV2Limits::cgroup_path_from(content), None);
    }

    #[test]
    fn test_walk_dirs_root_first() {
        let limits = CgroupV2Limits::new("/sys/fs/cgroup", "/a/b");
        assert_eq!(
            limits.walk_dirs(),
            vec![
                PathBuf::from("/sys/fs/cgroup"),
                PathBuf::from("/sys/fs/cgroup/a"),
                PathBuf::from("/sys/fs/cgroup/a/b"),
            ]
        );
    }

    #[test]
    fn test_walk_dirs_namespaced_root() {
        let limits = CgroupV2Limits::new("/sys/fs/cgroup", "/");
        assert_eq!(limits.walk_dirs(), vec![PathBuf::from("/sys/fs/cgroup")]);
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(CgroupV2Limits::parse_limit("2147483648\n"), Some(2147483648));
        assert_eq!(CgroupV2Limits::parse_limit("max\n"), None);
        assert_eq!(CgroupV2Limits::parse_limit("garbage"), None);
    }

    #[test]
    fn test_parse_cpu_max() {
        assert_eq!(CgroupV2Limits::parse_cpu_max("150000 100000"), Some(1.5));
        assert_eq!(CgroupV2Limits::parse_cpu_max("max 100000"), None);
        assert_eq!(CgroupV2Limits::parse_cpu_max("50000 0"), None);
        assert_eq!(CgroupV2Limits::parse_cpu_max(""), None);
    }
}
