//! Target PostgreSQL major version resolution

use crate::detector::EnvLookup;
use tracing::debug;

/// Used when no environment variable names a version
pub const DEFAULT_PG_VERSION: u32 = 17;

/// Checked in this order; the first parseable value wins
pub const PG_VERSION_ENV_VARS: &[&str] =
    &["PGTUNE_PG_VERSION", "PG_MAJOR", "PG_VERSION", "POSTGRES_VERSION"];

/// Major version out of strings like "16", "16.2" or "9.6"
///
/// Pre-10 releases used two-part major versions; those map to their first
/// component since no formula distinguishes between them.
pub fn parse_major_version(text: &str) -> Option<u32> {
    let major: u32 = text.trim().split('.').next()?.parse().ok()?;
    (major > 0).then_some(major)
}

pub fn resolve_pg_version(env: EnvLookup) -> u32 {
    for var in PG_VERSION_ENV_VARS {
        if let Some(version) = env(var).as_deref().and_then(parse_major_version) {
            debug!(var = %var, version, "Resolved PostgreSQL version from environment");
            return version;
        }
    }

    DEFAULT_PG_VERSION
}
