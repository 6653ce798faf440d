//! CLI subcommand implementations for the meterport binary.

pub mod doctor;
pub mod fetch_cmd;
