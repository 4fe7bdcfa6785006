//! Static description of every tuned parameter
//!
//! The table drives name-based access to [`TunedParameters`] (overrides,
//! table rendering) and JSON schema generation, without any runtime type
//! introspection.

use crate::error::{Result, TuneError};
use crate::models::{HugePages, TunedParameters, WalLevel};
use crate::units::{format_size, parse_size};
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Byte quantity, rendered with a unit suffix
    Bytes,
    Float,
    Integer,
    /// One of `ParameterSpec::values`
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    /// May be left unset by the calculator
    pub optional: bool,
    pub values: &'static [&'static str],
    pub description: &'static str,
}

const fn spec(name: &'static str, kind: ParamKind, description: &'static str) -> ParameterSpec {
    ParameterSpec {
        name,
        kind,
        optional: false,
        values: &[],
        description,
    }
}

const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> ParameterSpec {
    ParameterSpec {
        name,
        kind,
        optional: true,
        values: &[],
        description,
    }
}

pub static PARAMETERS: &[ParameterSpec] = &[
    spec("max_connections", ParamKind::Integer, "Maximum concurrent client connections"),
    spec("shared_buffers", ParamKind::Bytes, "Memory for the shared page cache"),
    spec("effective_cache_size", ParamKind::Bytes, "Planner estimate of memory available for caching"),
    spec("maintenance_work_mem", ParamKind::Bytes, "Memory for VACUUM, CREATE INDEX and similar"),
    spec("checkpoint_completion_target", ParamKind::Float, "Fraction of the checkpoint interval to spread writes over"),
    spec("wal_buffers", ParamKind::Bytes, "Shared memory for WAL not yet written to disk"),
    spec("default_statistics_target", ParamKind::Integer, "Default ANALYZE sample target"),
    spec("random_page_cost", ParamKind::Float, "Planner cost of a non-sequential page fetch"),
    optional("effective_io_concurrency", ParamKind::Integer, "Concurrent I/O requests the storage can handle"),
    spec("work_mem", ParamKind::Bytes, "Memory per sort or hash operation"),
    ParameterSpec {
        name: "huge_pages",
        kind: ParamKind::Enum,
        optional: false,
        values: &["off", "try"],
        description: "Whether to request huge pages for shared memory",
    },
    spec("min_wal_size", ParamKind::Bytes, "WAL size below which old segments are recycled"),
    spec("max_wal_size", ParamKind::Bytes, "WAL size that triggers a checkpoint"),
    spec("max_worker_processes", ParamKind::Integer, "Background worker process limit"),
    spec("max_parallel_workers_per_gather", ParamKind::Integer, "Workers a single Gather node may use"),
    spec("max_parallel_workers", ParamKind::Integer, "Workers available to parallel queries"),
    optional("max_parallel_maintenance_workers", ParamKind::Integer, "Workers a single utility command may use"),
    ParameterSpec {
        name: "wal_level",
        kind: ParamKind::Enum,
        optional: false,
        values: &["minimal", "replica"],
        description: "Amount of information written to WAL",
    },
    optional("max_wal_senders", ParamKind::Integer, "Concurrent replication connections"),
];

pub fn lookup(name: &str) -> Option<&'static ParameterSpec> {
    PARAMETERS.iter().find(|spec| spec.name == name)
}

/// A single parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bytes(u64),
    Float(f64),
    Integer(u32),
    Enum(String),
}

impl ParamValue {
    /// Parse `text` as a value for `spec`
    pub fn parse(spec: &ParameterSpec, text: &str) -> Result<Self> {
        let text = text.trim();
        let invalid = |reason: &str| TuneError::invalid_override(spec.name, reason);

        match spec.kind {
            ParamKind::Bytes => parse_size(text).map(ParamValue::Bytes),
            ParamKind::Float => text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(ParamValue::Float)
                .ok_or_else(|| invalid("expected a non-negative number")),
            ParamKind::Integer => text
                .parse::<u32>()
                .map(ParamValue::Integer)
                .map_err(|_| invalid("expected a non-negative integer")),
            ParamKind::Enum => parse_enum(spec.name, text)
                .map(ParamValue::Enum)
                .ok_or_else(|| invalid(&format!("expected one of {}", spec.values.join(", ")))),
        }
    }
}

/// Canonical name of an enum-valued parameter, parsed through the same
/// type `TunedParameters::set` stores
fn parse_enum(name: &str, text: &str) -> Option<String> {
    match name {
        "huge_pages" => text.parse::<HugePages>().ok().map(|v| v.to_string()),
        "wal_level" => text.parse::<WalLevel>().ok().map(|v| v.to_string()),
        _ => None,
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bytes(b) => f.write_str(&format_size(*b)),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Integer(v) => write!(f, "{}", v),
            ParamValue::Enum(s) => f.write_str(s),
        }
    }
}

impl TunedParameters {
    /// Current value of a parameter; `Ok(None)` when it is unset
    pub fn get(&self, name: &str) -> Result<Option<ParamValue>> {
        use ParamValue::*;

        let value = match name {
            "max_connections" => Integer(self.max_connections),
            "shared_buffers" => Bytes(self.shared_buffers),
            "effective_cache_size" => Bytes(self.effective_cache_size),
            "maintenance_work_mem" => Bytes(self.maintenance_work_mem),
            "checkpoint_completion_target" => Float(self.checkpoint_completion_target),
            "wal_buffers" => Bytes(self.wal_buffers),
            "default_statistics_target" => Integer(self.default_statistics_target),
            "random_page_cost" => Float(self.random_page_cost),
            "effective_io_concurrency" => return Ok(self.effective_io_concurrency.map(Integer)),
            "work_mem" => Bytes(self.work_mem),
            "huge_pages" => Enum(self.huge_pages.to_string()),
            "min_wal_size" => Bytes(self.min_wal_size),
            "max_wal_size" => Bytes(self.max_wal_size),
            "max_worker_processes" => Integer(self.max_worker_processes),
            "max_parallel_workers_per_gather" => Integer(self.max_parallel_workers_per_gather),
            "max_parallel_workers" => Integer(self.max_parallel_workers),
            "max_parallel_maintenance_workers" => {
                return Ok(self.max_parallel_maintenance_workers.map(Integer))
            }
            "wal_level" => Enum(self.wal_level.to_string()),
            "max_wal_senders" => return Ok(self.max_wal_senders.map(Integer)),
            _ => return Err(TuneError::UnknownParameter(name.to_string())),
        };

        Ok(Some(value))
    }

    /// Replace a parameter value; the value kind must match the table
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<()> {
        use ParamValue::*;

        let mismatch = || TuneError::invalid_override(name, format!("wrong value type {:?}", value));

        match (name, &value) {
            ("max_connections", Integer(v)) => self.max_connections = *v,
            ("shared_buffers", Bytes(v)) => self.shared_buffers = *v,
            ("effective_cache_size", Bytes(v)) => self.effective_cache_size = *v,
            ("maintenance_work_mem", Bytes(v)) => self.maintenance_work_mem = *v,
            ("checkpoint_completion_target", Float(v)) => self.checkpoint_completion_target = *v,
            ("wal_buffers", Bytes(v)) => self.wal_buffers = *v,
            ("default_statistics_target", Integer(v)) => self.default_statistics_target = *v,
            ("random_page_cost", Float(v)) => self.random_page_cost = *v,
            ("effective_io_concurrency", Integer(v)) => self.effective_io_concurrency = Some(*v),
            ("work_mem", Bytes(v)) => self.work_mem = *v,
            ("huge_pages", Enum(v)) => self.huge_pages = v.parse::<HugePages>()?,
            ("min_wal_size", Bytes(v)) => self.min_wal_size = *v,
            ("max_wal_size", Bytes(v)) => self.max_wal_size = *v,
            ("max_worker_processes", Integer(v)) => self.max_worker_processes = *v,
            ("max_parallel_workers_per_gather", Integer(v)) => {
                self.max_parallel_workers_per_gather = *v
            }
            ("max_parallel_workers", Integer(v)) => self.max_parallel_workers = *v,
            ("max_parallel_maintenance_workers", Integer(v)) => {
                self.max_parallel_maintenance_workers = Some(*v)
            }
            ("wal_level", Enum(v)) => self.wal_level = v.parse::<WalLevel>()?,
            ("max_wal_senders", Integer(v)) => self.max_wal_senders = Some(*v),
            _ if lookup(name).is_none() => {
                return Err(TuneError::UnknownParameter(name.to_string()))
            }
            _ => return Err(mismatch()),
        }

        Ok(())
    }

    /// Every parameter in table order, with unset ones omitted
    pub fn values(&self) -> Vec<(&'static ParameterSpec, ParamValue)> {
        PARAMETERS
            .iter()
            .filter_map(|spec| match self.get(spec.name) {
                Ok(Some(value)) => Some((spec, value)),
                _ => None,
            })
            .collect()
    }
}

/// JSON schema (draft-07) describing the serialized `TunedParameters`
pub fn json_schema() -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for spec in PARAMETERS {
        let base_type = match spec.kind {
            ParamKind::Bytes | ParamKind::Integer => "integer",
            ParamKind::Float => "number",
            ParamKind::Enum => "string",
        };

        let mut property = Map::new();
        if spec.optional {
            property.insert("type".into(), json!([base_type, "null"]));
        } else {
            property.insert("type".into(), json!(base_type));
            required.push(spec.name);
        }
        property.insert("description".into(), json!(spec.description));

        match spec.kind {
            ParamKind::Bytes => {
                property.insert("minimum".into(), json!(0));
                property.insert("unit".into(), json!("bytes"));
            }
            ParamKind::Integer | ParamKind::Float => {
                property.insert("minimum".into(), json!(0));
            }
            ParamKind::Enum => {
                property.insert("enum".into(), json!(spec.values));
            }
        }

        properties.insert(spec.name.into(), Value::Object(property));
    }

    properties.insert(
        "warnings".into(),
        json!({
            "type": "array",
            "items": { "type": "string" },
            "description": "Advisories about the inputs"
        }),
    );
    required.push("warnings");

    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "TunedParameters",
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
