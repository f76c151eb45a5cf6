//! Environment readiness check.

use crate::config::ArchiveConfig;
use crate::renderer::chromium::find_chromium;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::process::Command;

use super::output;

#[derive(Debug, Serialize)]
struct DoctorReport {
    os: &'static str,
    arch: &'static str,
    chromium: Option<String>,
    lms_url: String,
    lms_url_valid: bool,
    archive_root: String,
    archive_root_writable: bool,
    available_memory_mb: Option<u64>,
    ready: bool,
}

/// Check Chromium availability, the configured LMS URL, the archive
/// directory and available memory.
pub async fn run(config: &ArchiveConfig) -> Result<()> {
    let chromium = config
        .chromium_path
        .clone()
        .filter(|p| p.exists())
        .or_else(find_chromium);
    let lms_url_valid = url::Url::parse(&config.lms_url).is_ok();
    let archive_root_writable = is_writable(&config.archive_root);
    let available_memory_mb = get_available_memory_mb();
    let ready = chromium.is_some() && lms_url_valid && archive_root_writable;

    let report = DoctorReport {
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        chromium: chromium.as_ref().map(|p| p.display().to_string()),
        lms_url: config.lms_url.clone(),
        lms_url_valid,
        archive_root: config.archive_root.display().to_string(),
        archive_root_writable,
        available_memory_mb,
        ready,
    };

    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }

    println!("Coursevault Doctor");
    println!("==================");
    println!();
    println!("OS:   {}", report.os);
    println!("Arch: {}", report.arch);
    println!();

    match &report.chromium {
        Some(path) => println!("[OK] Chromium found: {path}"),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome or set COURSEVAULT_CHROMIUM_PATH."
        ),
    }

    if lms_url_valid {
        println!("[OK] LMS URL: {}", report.lms_url);
    } else {
        println!("[!!] LMS URL is not a valid URL: {}", report.lms_url);
    }

    if archive_root_writable {
        println!("[OK] Archive directory {} is writable", report.archive_root);
    } else {
        println!("[!!] Archive directory {} is not writable", report.archive_root);
    }

    match available_memory_mb {
        Some(mb) => {
            if mb >= 512 {
                println!("[OK] Available memory: {mb}MB (>= 512MB recommended)");
            } else {
                println!("[!!] Available memory: {mb}MB (< 512MB, the browser may struggle)");
            }
        }
        None => println!("[??] Could not determine available memory"),
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}

/// Whether a file can be created in `dir` (or its nearest existing
/// ancestor, since the archive directory is created on first run).
fn is_writable(dir: &Path) -> bool {
    let mut candidate = Some(dir);
    while let Some(path) = candidate {
        if path.as_os_str().is_empty() {
            candidate = Some(Path::new("."));
            continue;
        }
        if path.is_dir() {
            let marker = path.join(".coursevault-doctor");
            let writable = std::fs::write(&marker, b"").is_ok();
            let _ = std::fs::remove_file(&marker);
            return writable;
        }
        candidate = path.parent();
    }
    false
}

/// Get available memory in MB (platform-specific).
fn get_available_memory_mb() -> Option<u64> {
    #[cfg(target_os = "macos")]
    {
        let output = Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        let bytes: u64 = s.trim().parse().ok()?;
        Some(bytes / 1_048_576)
    }
    #[cfg(target_os = "linux")]
    {
        let output = Command::new("free").args(["-m"]).output().ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        for line in s.lines() {
            if line.starts_with("Mem:") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 7 {
                    return parts[6].parse().ok();
                }
            }
        }
        None
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
