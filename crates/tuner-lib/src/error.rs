//! Error types for caller-facing parsing and validation
//!
//! Detection and calculation never fail; these errors come from turning
//! user input (flags, env vars, config files) into a `TuningConfig`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TuneError {
    #[error("unrecognized {kind} '{value}' (expected one of: {expected})")]
    UnrecognizedEnum {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("invalid override for {field}: {reason}")]
    InvalidOverride { field: String, reason: String },
    #[error("invalid size '{0}' (expected a number with optional kB/MB/GB/TB suffix)")]
    InvalidSize(String),
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
}

impl TuneError {
    pub fn invalid_override(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOverride {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TuneError>;
