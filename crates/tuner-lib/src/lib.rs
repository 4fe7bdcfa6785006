//! Resource-aware PostgreSQL tuning engine
//!
//! This crate provides the core functionality for:
//! - Host and container (cgroup v1/v2) resource detection
//! - Deterministic calculation of server parameters from resources and workload
//! - Explicit post-processing of calculated parameters
//! - A static parameter schema table
//! - Structured logging and metrics

pub mod calculator;
pub mod detector;
pub mod error;
pub mod models;
pub mod observability;
pub mod postprocess;
pub mod schema;
pub mod units;
pub mod version;

pub use calculator::calculate;
pub use detector::{DetectorPaths, ResourceDetector};
pub use error::TuneError;
pub use models::*;
pub use observability::{StructuredLogger, TunerMetrics};
pub use postprocess::PostProcessors;
