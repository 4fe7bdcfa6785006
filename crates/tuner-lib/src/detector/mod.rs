//! Host and container resource detection
//!
//! Produces a conservative, always-valid [`ResourceSnapshot`]. Every source is
//! best-effort: a missing or unreadable file only means "no signal from this
//! source" and detection moves on to the next fallback. Container limits are
//! read from cgroup v2 (unified hierarchy) first, then cgroup v1.

mod cgroup_v1;
mod cgroup_v2;
mod container;
mod host;


pub use cgroup_v1::{CgroupV1Limits, V1_UNLIMITED_THRESHOLD};
pub use cgroup_v2::CgroupV2Limits;
pub use container::mentions_container_runtime;
pub use host::{
    host_cpus, is_representative_device, parse_meminfo, parse_rotational, system_total_memory,
    DEFAULT_HOST_MEMORY,
};

use crate::models::{DiskType, OsFamily, ResourceSnapshot, Resources};
use crate::observability::{StructuredLogger, TunerMetrics};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Limits imposed by one cgroup hierarchy
pub trait CgroupLimits {
    /// Effective memory limit in bytes, `None` when unlimited or unknown
    fn memory_limit(&self) -> Option<u64>;

    /// CPU quota in fractional cores, `None` when unlimited or unknown
    fn cpu_quota(&self) -> Option<f64>;
}

/// Environment variable lookup, injectable for tests
pub type EnvLookup = fn(&str) -> Option<String>;

/// Reads from the real process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Filesystem locations the sources read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorPaths {
    pub proc_root: PathBuf,
    pub cgroup_root: PathBuf,
    pub sys_root: PathBuf,
    /// Root of the filesystem holding runtime marker files
    pub fs_root: PathBuf,
}

impl Default for DetectorPaths {
    fn default() -> Self {
        Self::under("/")
    }
}

impl DetectorPaths {
    /// Standard layout below `root` (useful for mock filesystems)
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            proc_root: root.join("proc"),
            cgroup_root: root.join("sys/fs/cgroup"),
            sys_root: root.join("sys"),
            fs_root: root.to_path_buf(),
        }
    }
}

/// Read a pseudo-file and trim it; `None` on any error
pub(crate) fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .map(|content| content.trim().to_string())
        .ok()
}

/// One-shot resource detector
#[derive(Clone)]
pub struct ResourceDetector {
    paths: DetectorPaths,
    os: OsFamily,
    env: EnvLookup,
}

impl Default for ResourceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceDetector {
    /// Detector for the running system
    pub fn new() -> Self {
        Self {
            paths: DetectorPaths::default(),
            os: OsFamily::current(),
            env: process_env,
        }
    }

    /// Create detector with custom filesystem roots (for testing)
    pub fn with_paths(paths: DetectorPaths) -> Self {
        Self {
            paths,
            ..Self::new()
        }
    }

    pub fn with_os(mut self, os: OsFamily) -> Self {
        self.os = os;
        self
    }

    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub fn paths(&self) -> &DetectorPaths {
        &self.paths
    }

    /// Total host memory in bytes; never zero
    pub fn host_memory(&self) -> u64 {
        match host::read_host_memory(&self.paths.proc_root, self.os) {
            Some(bytes) if bytes > 0 => bytes,
            _ => {
                debug!(
                    default = DEFAULT_HOST_MEMORY,
                    "Host memory unavailable, using default"
                );
                TunerMetrics::new().inc_detection_fallback("host_memory");
                DEFAULT_HOST_MEMORY
            }
        }
    }

    pub fn host_cpus(&self) -> u32 {
        host::host_cpus()
    }

    /// cgroup hierarchies to consult, in priority order (v2, then v1)
    ///
    /// Each call reads `/proc/self/cgroup` once.
    pub fn cgroup_sources(&self) -> Vec<Box<dyn CgroupLimits>> {
        let mut sources: Vec<Box<dyn CgroupLimits>> = Vec::with_capacity(2);
        if let Some(v2) =
            CgroupV2Limits::from_proc(&self.paths.cgroup_root, &self.paths.proc_root)
        {
            sources.push(Box::new(v2));
        }
        sources.push(Box::new(CgroupV1Limits::from_proc(
            &self.paths.cgroup_root,
            &self.paths.proc_root,
        )));
        sources
    }

    /// Container memory limit in bytes, 0 when unlimited
    pub fn container_memory_limit(&self) -> u64 {
        memory_limit_from(&self.cgroup_sources())
    }

    /// Container CPU quota in fractional cores, 0.0 when unlimited
    pub fn container_cpu_quota(&self) -> f64 {
        cpu_quota_from(&self.cgroup_sources())
    }

    pub fn is_container(&self) -> bool {
        container::detect_container(&self.paths, self.env)
    }

    /// Disk type of a representative block device; ssd when unknown
    pub fn disk_type(&self) -> DiskType {
        host::read_disk_type(&self.paths.sys_root, self.os).unwrap_or_else(|| {
            TunerMetrics::new().inc_detection_fallback("disk_type");
            DiskType::Ssd
        })
    }

    /// Run every source and compose the snapshot
    pub fn detect(&self) -> ResourceSnapshot {
        let started = Instant::now();

        let host_cpus = self.host_cpus();
        let host = Resources {
            cpus: host_cpus,
            memory: self.host_memory(),
            millis: u64::from(host_cpus) * 1000,
        };

        let sources = self.cgroup_sources();
        let quota = cpu_quota_from(&sources);
        let container = Resources {
            cpus: cores_from_quota(quota),
            memory: memory_limit_from(&sources),
            millis: if quota > 0.0 {
                (quota * 1000.0).round() as u64
            } else {
                0
            },
        };

        let snapshot = ResourceSnapshot {
            host,
            container,
            in_container: self.is_container(),
            disk_type: self.disk_type(),
            os: self.os,
            detected_at: chrono::Utc::now().timestamp(),
        };

        let metrics = TunerMetrics::new();
        metrics.observe_detection_latency(started.elapsed().as_secs_f64());
        metrics.set_effective_resources(snapshot.effective_cpus(), snapshot.effective_memory());

        StructuredLogger::new("detector").log_detection(&snapshot);

        snapshot
    }

    /// [`detect`](Self::detect) on the blocking pool, for async callers
    pub async fn detect_async(&self) -> ResourceSnapshot {
        let detector = self.clone();
        match tokio::task::spawn_blocking(move || detector.detect()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Detection task failed, using conservative defaults");
                self.conservative_snapshot()
            }
        }
    }

    fn conservative_snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            host: Resources {
                cpus: 1,
                memory: DEFAULT_HOST_MEMORY,
                millis: 1000,
            },
            container: Resources::default(),
            in_container: false,
            disk_type: DiskType::Ssd,
            os: self.os,
            detected_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// First memory limit any source reports, 0 when none does
pub fn memory_limit_from(sources: &[Box<dyn CgroupLimits>]) -> u64 {
    let limit = sources.iter().find_map(|source| source.memory_limit());
    if limit.is_none() {
        TunerMetrics::new().inc_detection_fallback("container_memory");
    }
    limit.unwrap_or(0)
}

/// First CPU quota any source reports, 0.0 when none does
pub fn cpu_quota_from(sources: &[Box<dyn CgroupLimits>]) -> f64 {
    let quota = sources.iter().find_map(|source| source.cpu_quota());
    if quota.is_none() {
        TunerMetrics::new().inc_detection_fallback("container_cpu");
    }
    quota.unwrap_or(0.0)
}

/// Whole cores granted by a fractional quota; 0 when unlimited
pub fn cores_from_quota(quota: f64) -> u32 {
    if quota > 0.0 {
        (quota.ceil() as u32).max(1)
    } else {
        0
    }
}
