// Copyright 2026 Coursevault Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for archive-run telemetry.
//!
//! The runner emits `ProgressEvent`s while it works, which flow through a
//! `tokio::sync::broadcast` channel to all subscribers (the CLI spinner,
//! tests). When no subscriber exists, events are silently dropped.

use crate::course::Category;
use serde::{Deserialize, Serialize};

/// A progress event emitted during an archive run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// Enrollment listing read.
    CoursesListed { count: usize },
    /// A course traversal began.
    CourseStarted {
        course: String,
        index: usize,
        total: usize,
    },
    /// A category page is being loaded.
    CategoryStarted { course: String, category: Category },
    /// The category page reported not-available; nothing was archived.
    CategorySkipped { course: String, category: Category },
    /// One module, announcement or assignment processed.
    ItemProcessed {
        course: String,
        category: Category,
        location: String,
        kind: String,
    },
    /// Downloads settled and the scratch area was moved into the archive.
    CategoryArchived {
        course: String,
        category: Category,
        files: usize,
        downloads_triggered: usize,
    },
    /// A course traversal finished.
    CourseCompleted { course: String, files: usize },
}

/// Sender handle for emitting progress events.
///
/// Backed by a `tokio::sync::broadcast` channel so multiple listeners can
/// subscribe independently. When no listeners exist, `send()` returns an error
/// which we silently ignore.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, ignoring send errors (no receivers listening).
pub fn emit(tx: &Option<ProgressSender>, seq: &mut u64, event: ProgressEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent { seq: *seq, event });
    }
}

impl std::fmt::Display for ProgressEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CoursesListed { count } => write!(f, "{count} course(s) enrolled"),
            Self::CourseStarted {
                course,
                index,
                total,
            } => write!(f, "[{index}/{total}] {course}"),
            Self::CategoryStarted { course, category } => write!(f, "{course}: {category}"),
            Self::CategorySkipped { course, category } => {
                write!(f, "{course}: {category} not available")
            }
            Self::ItemProcessed {
                course,
                category,
                location,
                kind,
            } => write!(f, "{course}: {category} {kind} {location}"),
            Self::CategoryArchived {
                course,
                category,
                files,
                ..
            } => write!(f, "{course}: {category} archived {files} file(s)"),
            Self::CourseCompleted { course, files } => {
                write!(f, "{course}: done, {files} file(s)")
            }
        }
    }
}
