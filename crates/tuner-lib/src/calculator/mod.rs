//! PostgreSQL parameter calculation
//!
//! [`calculate`] is a pure function of its [`TuningConfig`]: no I/O, no
//! clock, no randomness. Two calls with the same input return identical
//! output, and the function is safe to call from any number of threads.
//!
//! All byte arithmetic is `u64`; subtraction saturates at zero.


use crate::models::{HugePages, OsFamily, TunedParameters, TuningConfig, WalLevel, WorkloadType};
use crate::units::{format_size, GIB, KIB, MIB};

pub const LOW_MEMORY_THRESHOLD: u64 = 256 * MIB;
pub const HIGH_MEMORY_THRESHOLD: u64 = 100 * GIB;

pub const MAINTENANCE_WORK_MEM_CEILING: u64 = 2 * GIB;
/// Windows rejects 2GB exactly for maintenance_work_mem
pub const WINDOWS_MAINTENANCE_WORK_MEM_CEILING: u64 = 2 * GIB - MIB;

pub const WORK_MEM_FLOOR: u64 = 512 * KIB;

pub const WAL_BUFFERS_FLOOR: u64 = MIB;
pub const WAL_BUFFERS_CEILING: u64 = 16 * MIB;
const WAL_BUFFERS_ROUND_UP_FROM: u64 = 14 * MIB;

pub const HUGE_PAGES_THRESHOLD: u64 = 32 * GIB;

pub const CHECKPOINT_COMPLETION_TARGET: f64 = 0.9;
pub const RANDOM_PAGE_COST: f64 = 4.0;
pub const EFFECTIVE_IO_CONCURRENCY: u32 = 200;

/// Parallelism used below this many CPUs is fixed
const PARALLEL_CPU_THRESHOLD: u32 = 4;
const PER_GATHER_CAP: u32 = 4;
const MAINTENANCE_WORKERS_CAP: u32 = 4;
/// First release with max_parallel_maintenance_workers
const PARALLEL_MAINTENANCE_MIN_VERSION: u32 = 11;

/// Compute a complete parameter set for `config`
pub fn calculate(config: &TuningConfig) -> TunedParameters {
    let memory = config.memory;
    let workload = config.workload;
    let max_connections = config.resolved_max_connections();

    let warnings = memory_warnings(memory);

    let shared_buffers = shared_buffers(memory);
    let (min_wal_size, max_wal_size) = wal_sizes(workload);
    let parallel = parallelism(config.cpus, workload, config.pg_version);
    let (wal_level, max_wal_senders) = wal_level(workload);

    TunedParameters {
        shared_buffers,
        effective_cache_size: effective_cache_size(memory, workload),
        maintenance_work_mem: maintenance_work_mem(memory, workload, config.os),
        work_mem: work_mem(
            memory,
            shared_buffers,
            max_connections,
            parallel.max_worker_processes,
            workload,
        ),
        wal_buffers: wal_buffers(shared_buffers),
        min_wal_size,
        max_wal_size,
        checkpoint_completion_target: CHECKPOINT_COMPLETION_TARGET,
        random_page_cost: RANDOM_PAGE_COST,
        effective_io_concurrency: Some(EFFECTIVE_IO_CONCURRENCY),
        default_statistics_target: default_statistics_target(workload),
        max_worker_processes: parallel.max_worker_processes,
        max_parallel_workers: parallel.max_parallel_workers,
        max_parallel_workers_per_gather: parallel.max_parallel_workers_per_gather,
        max_connections,
        max_parallel_maintenance_workers: parallel.max_parallel_maintenance_workers,
        max_wal_senders,
        wal_level,
        huge_pages: huge_pages(memory),
        warnings,
    }
}

/// Advisories for memory sizes the formulas were not designed for
pub fn memory_warnings(memory: u64) -> Vec<String> {
    let mut warnings = Vec::new();

    if memory < LOW_MEMORY_THRESHOLD {
        warnings.push(format!(
            "Low memory: {} is below the recommended minimum of {}; the server may perform poorly",
            format_size(memory),
            format_size(LOW_MEMORY_THRESHOLD)
        ));
    }

    if memory > HIGH_MEMORY_THRESHOLD {
        warnings.push(format!(
            "High memory: {} exceeds {}; review the computed values manually for this host",
            format_size(memory),
            format_size(HIGH_MEMORY_THRESHOLD)
        ));
    }

    warnings
}

/// A quarter of memory, truncating
pub fn shared_buffers(memory: u64) -> u64 {
    memory / 4
}

pub fn effective_cache_size(memory: u64, workload: WorkloadType) -> u64 {
    match workload {
        WorkloadType::Desktop => memory / 4,
        WorkloadType::Web | WorkloadType::Oltp | WorkloadType::Dw | WorkloadType::Mixed => {
            memory / 4 * 3 + (memory % 4) * 3 / 4
        }
    }
}

pub fn maintenance_work_mem(memory: u64, workload: WorkloadType, os: OsFamily) -> u64 {
    let raw = match workload {
        WorkloadType::Dw => memory / 8,
        WorkloadType::Web | WorkloadType::Oltp | WorkloadType::Desktop | WorkloadType::Mixed => {
            memory / 16
        }
    };

    let ceiling = match os {
        OsFamily::Windows => WINDOWS_MAINTENANCE_WORK_MEM_CEILING,
        OsFamily::Linux | OsFamily::Mac => MAINTENANCE_WORK_MEM_CEILING,
    };

    raw.min(ceiling)
}

/// 3% of shared_buffers, kept within [1MB, 16MB]
pub fn wal_buffers(shared_buffers: u64) -> u64 {
    let raw = shared_buffers / 100 * 3 + (shared_buffers % 100) * 3 / 100;

    if raw >= WAL_BUFFERS_ROUND_UP_FROM {
        WAL_BUFFERS_CEILING
    } else {
        raw.max(WAL_BUFFERS_FLOOR)
    }
}

/// (min_wal_size, max_wal_size)
pub fn wal_sizes(workload: WorkloadType) -> (u64, u64) {
    match workload {
        WorkloadType::Web => (GIB, 4 * GIB),
        WorkloadType::Oltp => (2 * GIB, 8 * GIB),
        WorkloadType::Dw => (GIB, 16 * GIB),
        WorkloadType::Desktop => (64 * MIB, 2 * GIB),
        WorkloadType::Mixed => (GIB, 4 * GIB),
    }
}

pub fn default_statistics_target(workload: WorkloadType) -> u32 {
    match workload {
        WorkloadType::Dw => 500,
        WorkloadType::Web | WorkloadType::Oltp | WorkloadType::Desktop | WorkloadType::Mixed => 100,
    }
}

/// Worker settings derived from the CPU count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parallelism {
    pub max_worker_processes: u32,
    pub max_parallel_workers: u32,
    pub max_parallel_workers_per_gather: u32,
    pub max_parallel_maintenance_workers: Option<u32>,
}

/// Worker counts for `cpus`
///
/// The result depends on `pg_version`: servers older than 11 have no
/// max_parallel_maintenance_workers, so it stays `None` there. Below the CPU threshold the server
/// defaults are kept and maintenance workers are unset on every version.
pub fn parallelism(cpus: u32, workload: WorkloadType, pg_version: u32) -> Parallelism {
    if cpus < PARALLEL_CPU_THRESHOLD {
        return Parallelism {
            max_worker_processes: 8,
            max_parallel_workers: 8,
            max_parallel_workers_per_gather: 2,
            max_parallel_maintenance_workers: None,
        };
    }

    let half = cpus.div_ceil(2);
    let per_gather = match workload {
        WorkloadType::Dw => half,
        WorkloadType::Web | WorkloadType::Oltp | WorkloadType::Desktop | WorkloadType::Mixed => {
            half.min(PER_GATHER_CAP)
        }
    };

    let maintenance = (pg_version >= PARALLEL_MAINTENANCE_MIN_VERSION)
        .then(|| half.min(MAINTENANCE_WORKERS_CAP));

    Parallelism {
        max_worker_processes: cpus,
        max_parallel_workers: cpus,
        max_parallel_workers_per_gather: per_gather,
        max_parallel_maintenance_workers: maintenance,
    }
}

/// Per-operation sort/hash memory, never below 512kB
pub fn work_mem(
    memory: u64,
    shared_buffers: u64,
    max_connections: u32,
    max_worker_processes: u32,
    workload: WorkloadType,
) -> u64 {
    let slots = (u64::from(max_connections) + u64::from(max_worker_processes)) * 3;
    let base = memory.saturating_sub(shared_buffers) / slots.max(1);

    let scaled = match workload {
        WorkloadType::Web | WorkloadType::Oltp => base,
        WorkloadType::Dw | WorkloadType::Mixed => base / 2,
        WorkloadType::Desktop => base / 6,
    };

    scaled.max(WORK_MEM_FLOOR)
}

/// (wal_level, max_wal_senders)
pub fn wal_level(workload: WorkloadType) -> (WalLevel, Option<u32>) {
    match workload {
        WorkloadType::Desktop => (WalLevel::Minimal, Some(0)),
        WorkloadType::Web | WorkloadType::Oltp | WorkloadType::Dw | WorkloadType::Mixed => {
            (WalLevel::Replica, None)
        }
    }
}

pub fn huge_pages(memory: u64) -> HugePages {
    if memory > HUGE_PAGES_THRESHOLD {
        HugePages::Try
    } else {
        HugePages::Off
    }
}
