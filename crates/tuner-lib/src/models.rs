//! Core data models for the tuning engine

use crate::error::TuneError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CPU and memory capacity, either host-wide or container-scoped.
///
/// For the container scope a zero field means "no limit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cpus: u32,
    /// Bytes
    pub memory: u64,
    /// CPU quota in thousandths of a core
    pub millis: u64,
}

/// Point-in-time view of the machine the server will run on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub host: Resources,
    pub container: Resources,
    pub in_container: bool,
    pub disk_type: DiskType,
    pub os: OsFamily,
    pub detected_at: i64,
}

impl ResourceSnapshot {
    fn container_cpus_bind(&self) -> bool {
        self.container.cpus > 0 && self.container.cpus < self.host.cpus
    }

    /// Container quota rounded up to whole cores when it is tighter than
    /// the host, else the host count
    pub fn effective_cpus(&self) -> u32 {
        if self.container_cpus_bind() {
            self.container.cpus
        } else {
            self.host.cpus
        }
    }

    /// Container limit when it is set and tighter than the host, else host memory
    pub fn effective_memory(&self) -> u64 {
        if self.container.memory > 0 && self.container.memory < self.host.memory {
            self.container.memory
        } else {
            self.host.memory
        }
    }

    pub fn effective(&self) -> Resources {
        let cpus = self.effective_cpus();
        let millis = if self.container_cpus_bind() && self.container.millis > 0 {
            self.container.millis
        } else {
            u64::from(cpus) * 1000
        };

        Resources {
            cpus,
            memory: self.effective_memory(),
            millis,
        }
    }
}

/// Calculator input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Effective memory in bytes
    pub memory: u64,
    pub cpus: u32,
    pub os: OsFamily,
    pub disk_type: DiskType,
    pub pg_version: u32,
    pub workload: WorkloadType,
    /// `None` resolves to the workload's default
    pub max_connections: Option<u32>,
}

impl TuningConfig {
    pub fn from_snapshot(
        snapshot: &ResourceSnapshot,
        workload: WorkloadType,
        pg_version: u32,
    ) -> Self {
        Self {
            memory: snapshot.effective_memory(),
            cpus: snapshot.effective_cpus(),
            os: snapshot.os,
            disk_type: snapshot.disk_type,
            pg_version,
            workload,
            max_connections: None,
        }
    }

    pub fn resolved_max_connections(&self) -> u32 {
        self.max_connections
            .unwrap_or_else(|| self.workload.default_max_connections())
    }
}

/// Calculator output. Byte quantities are raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunedParameters {
    pub shared_buffers: u64,
    pub effective_cache_size: u64,
    pub maintenance_work_mem: u64,
    pub work_mem: u64,
    pub wal_buffers: u64,
    pub min_wal_size: u64,
    pub max_wal_size: u64,
    pub checkpoint_completion_target: f64,
    pub random_page_cost: f64,
    pub effective_io_concurrency: Option<u32>,
    pub default_statistics_target: u32,
    pub max_worker_processes: u32,
    pub max_parallel_workers: u32,
    pub max_parallel_workers_per_gather: u32,
    pub max_connections: u32,
    pub max_parallel_maintenance_workers: Option<u32>,
    pub max_wal_senders: Option<u32>,
    pub wal_level: WalLevel,
    pub huge_pages: HugePages,
    pub warnings: Vec<String>,
}

/// Declares a closed, lowercase-named enum with `FromStr`/`Display`.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = TuneError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| TuneError::UnrecognizedEnum {
                        kind: $kind,
                        value: s.to_string(),
                        expected: concat!($($text, " "),+).trim_end(),
                    })
            }
        }
    };
}

named_enum! {
    /// Workload classification selecting among formula branches
    WorkloadType, "workload" {
        Web => "web",
        Oltp => "oltp",
        Dw => "dw",
        Desktop => "desktop",
        Mixed => "mixed",
    }
}

named_enum! {
    OsFamily, "os" {
        Linux => "linux",
        Windows => "windows",
        Mac => "mac",
    }
}

named_enum! {
    DiskType, "disk type" {
        Ssd => "ssd",
        Hdd => "hdd",
        San => "san",
    }
}

named_enum! {
    WalLevel, "wal level" {
        Minimal => "minimal",
        Replica => "replica",
    }
}

named_enum! {
    HugePages, "huge pages mode" {
        Off => "off",
        Try => "try",
    }
}

impl WorkloadType {
    /// Connection count used when the caller does not pin one
    pub fn default_max_connections(&self) -> u32 {
        match self {
            WorkloadType::Web => 200,
            WorkloadType::Oltp => 300,
            WorkloadType::Dw => 40,
            WorkloadType::Desktop => 20,
            WorkloadType::Mixed => 100,
        }
    }
}

impl Default for WorkloadType {
    fn default() -> Self {
        WorkloadType::Mixed
    }
}

impl OsFamily {
    /// Family of the running binary
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsFamily::Windows
        } else if cfg!(target_os = "macos") {
            OsFamily::Mac
        } else {
            OsFamily::Linux
        }
    }
}

impl Default for DiskType {
    fn default() -> Self {
        DiskType::Ssd
    }
}
