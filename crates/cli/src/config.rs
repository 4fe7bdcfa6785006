//! Configuration management for the CLI
//!
//! Settings are layered, lowest precedence first: config file, `PGTUNE_*`
//! environment variables, command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tuner_lib::detector::EnvLookup;
use tuner_lib::units::parse_size;
use tuner_lib::version::{parse_major_version, resolve_pg_version};
use tuner_lib::{
    DiskType, OsFamily, ResourceSnapshot, TuneError, TuningConfig, WorkloadType,
};

/// Tuning inputs before validation; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Memory to tune for, e.g. "16GB"
    pub memory: Option<String>,
    pub cpus: Option<u32>,
    pub os: Option<String>,
    pub disk_type: Option<String>,
    pub pg_version: Option<String>,
    pub workload: Option<String>,
    pub max_connections: Option<u32>,
    pub cap_connections: Option<u32>,
    /// Parameter name -> pinned value
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl Settings {
    /// Load from a config file and the environment
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::config_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let config = builder
            .add_source(config::Environment::with_prefix("PGTUNE").try_parsing(true))
            .build()
            .context("Failed to load configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Default configuration file path
    pub fn config_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(home.join(".config").join("pgtune").join("config.toml"))
    }

    /// Overlay values given on the command line
    pub fn merge(mut self, flags: Settings) -> Self {
        macro_rules! overlay {
            ($($field:ident),+) => {
                $(if flags.$field.is_some() {
                    self.$field = flags.$field;
                })+
            };
        }
        overlay!(
            memory,
            cpus,
            os,
            disk_type,
            pg_version,
            workload,
            max_connections,
            cap_connections
        );
        self.overrides.extend(flags.overrides);
        self
    }

    /// Detection runs unless both memory and CPUs are pinned
    pub fn needs_detection(&self) -> bool {
        self.memory.is_none() || self.cpus.is_none()
    }

    /// Validate and combine with a detected snapshot into calculator input
    pub fn resolve(
        &self,
        snapshot: Option<&ResourceSnapshot>,
        env: EnvLookup,
    ) -> std::result::Result<TuningConfig, TuneError> {
        let memory = match &self.memory {
            Some(text) => {
                let bytes = parse_size(text)?;
                if bytes == 0 {
                    return Err(TuneError::invalid_override("memory", "must be greater than zero"));
                }
                bytes
            }
            None => snapshot.map(|s| s.effective_memory()).unwrap_or(0),
        };

        let cpus = match self.cpus {
            Some(0) => {
                return Err(TuneError::invalid_override("cpus", "must be at least 1"));
            }
            Some(n) => n,
            None => snapshot.map(|s| s.effective_cpus()).unwrap_or(1),
        };

        if memory == 0 {
            return Err(TuneError::invalid_override(
                "memory",
                "not given and could not be detected",
            ));
        }

        let os = match &self.os {
            Some(text) => text.parse::<OsFamily>()?,
            None => snapshot.map(|s| s.os).unwrap_or_else(OsFamily::current),
        };

        let disk_type = match &self.disk_type {
            Some(text) => text.parse::<DiskType>()?,
            None => snapshot.map(|s| s.disk_type).unwrap_or_default(),
        };

        let workload = match &self.workload {
            Some(text) => text.parse::<WorkloadType>()?,
            None => WorkloadType::default(),
        };

        let pg_version = match &self.pg_version {
            Some(text) => parse_major_version(text).ok_or_else(|| {
                TuneError::invalid_override("pg_version", format!("'{}' is not a major version", text))
            })?,
            None => resolve_pg_version(env),
        };

        if self.max_connections == Some(0) {
            return Err(TuneError::invalid_override(
                "max_connections",
                "must be at least 1",
            ));
        }

        if self.cap_connections == Some(0) {
            return Err(TuneError::invalid_override(
                "cap_connections",
                "must be at least 1",
            ));
        }

        Ok(TuningConfig {
            memory,
            cpus,
            os,
            disk_type,
            pg_version,
            workload,
            max_connections: self.max_connections,
        })
    }
}

/// Parse `name=value` pairs from repeated `--set` flags
pub fn parse_assignments(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected name=value, got '{}'", pair))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
