//! Download de-duplication within one course.

use serde::Serialize;
use std::collections::HashSet;

/// Canonical key for a downloadable resource.
///
/// Derived from the location by dropping the final path segment and keeping
/// the segment before it, so `…/files/123/download?x=1` becomes `123`.
/// Different resources in folders of the same name collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    pub fn from_location(location: &str) -> Self {
        match location.rfind('/') {
            Some(cut) => {
                let parent = &location[..cut];
                let token = parent.rsplit('/').next().unwrap_or(parent);
                Self(token.to_string())
            }
            // No path at all; the whole location is the only key available.
            None => Self(location.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifiers already handed to a triggering action during this course.
///
/// Created once at course start and passed to every category that
/// downloads. Entries are never removed.
#[derive(Debug, Default)]
pub struct DownloadDeduplicator {
    seen: HashSet<ContentIdentifier>,
}

impl DownloadDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-insert. `true` means the caller owns the single trigger for
    /// this identifier and must fire it.
    pub fn claim(&mut self, id: &ContentIdentifier) -> bool {
        self.seen.insert(id.clone())
    }

    pub fn contains(&self, id: &ContentIdentifier) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
