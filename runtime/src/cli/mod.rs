//! CLI subcommand implementations for the Coursevault binary.

pub mod archive_cmd;
pub mod doctor;
pub mod output;
