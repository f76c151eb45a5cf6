//! Output mode flags shared by every subcommand.
//!
//! `main` records `--json` and `--quiet` in the environment before any
//! subcommand runs.

use serde::Serialize;

pub fn is_json() -> bool {
    std::env::var("COURSEVAULT_JSON").is_ok()
}

pub fn is_quiet() -> bool {
    std::env::var("COURSEVAULT_QUIET").is_ok()
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}
