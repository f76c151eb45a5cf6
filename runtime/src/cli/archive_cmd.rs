//! `coursevault run`: launch the browser and archive every course.

use crate::cli::output;
use crate::config::ArchiveConfig;
use crate::course::runner::{ArchiveRunner, ArchiveSummary};
use crate::progress;
use crate::renderer::chromium::ChromiumSession;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub async fn run(config: ArchiveConfig) -> Result<()> {
    config.validate()?;
    std::fs::create_dir_all(&config.scratch_dir).with_context(|| {
        format!("failed to create scratch directory {}", config.scratch_dir.display())
    })?;

    if !output::is_quiet() && !output::is_json() {
        eprintln!("  Archiving {} into {}", config.lms_url, config.archive_root.display());
    }

    let authenticator = Arc::new(config.authenticator()?);
    let (tx, rx) = progress::channel();
    let mut runner = ArchiveRunner::new(&config, authenticator)?.with_progress(tx);
    let listener = tokio::spawn(follow_progress(rx, spinner()));

    let mut session = ChromiumSession::launch(&config.launch_options()).await?;
    let result = runner.run(&mut session).await;
    if let Err(e) = session.shutdown().await {
        tracing::warn!("browser shutdown failed: {e:#}");
    }

    // Dropping the runner closes the progress channel and ends the listener.
    drop(runner);
    if let Err(e) = listener.await {
        tracing::debug!("progress listener ended abnormally: {e}");
    }

    let summary = result?;
    if output::is_json() {
        output::print_json(&summary);
    } else if !output::is_quiet() {
        print_summary(&summary);
    }
    Ok(())
}

/// A spinner on stderr, or nothing in quiet/JSON mode.
fn spinner() -> Option<ProgressBar> {
    if output::is_quiet() || output::is_json() {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .template("  {spinner:.cyan} {msg}")
    {
        pb.set_style(style);
    }
    // No steady tick: sign-in may be waiting on the terminal.
    pb.set_message("signing in");
    Some(pb)
}

async fn follow_progress(mut rx: progress::ProgressReceiver, spinner: Option<ProgressBar>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                tracing::debug!(seq = event.seq, "{}", event.event);
                if let Some(pb) = &spinner {
                    pb.set_message(event.event.to_string());
                    pb.tick();
                }
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!("progress listener skipped {missed} event(s)");
            }
            Err(RecvError::Closed) => break,
        }
    }
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
}

fn print_summary(summary: &ArchiveSummary) {
    let elapsed = summary.finished_at - summary.started_at;
    eprintln!();
    for course in &summary.courses {
        eprintln!("  {} ({} file(s))", course.name, course.files());
        for category in &course.categories {
            if category.available {
                eprintln!(
                    "    {:<14} {:>4} file(s), {} download(s) triggered",
                    category.category.to_string(),
                    category.files,
                    category.downloads_triggered
                );
            } else {
                eprintln!("    {:<14} not available", category.category.to_string());
            }
        }
    }
    eprintln!();
    eprintln!(
        "  Archived {} course(s) in {}m {}s",
        summary.courses.len(),
        elapsed.num_minutes(),
        elapsed.num_seconds() % 60
    );
}
