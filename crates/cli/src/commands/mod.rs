//! Subcommand implementations

pub mod detect;
pub mod schema;
pub mod tune;
