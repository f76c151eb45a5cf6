//! Moves settled downloads from the scratch directory into the archive tree.
//!
//! Layout: `<archive_root>/<course_name>/<category_dir>/<file>`.

use crate::course::{Category, Course};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Owns the archive tree and the scratch directory feeding it.
#[derive(Debug, Clone)]
pub struct ArchiveOrganizer {
    archive_root: PathBuf,
    scratch_dir: PathBuf,
}

impl ArchiveOrganizer {
    pub fn new(archive_root: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn course_dir(&self, course: &Course) -> PathBuf {
        self.archive_root.join(course.name())
    }

    pub fn category_dir(&self, course: &Course, category: Category) -> PathBuf {
        self.course_dir(course).join(category.dir_name())
    }

    /// Create the archive root and scratch directory.
    pub fn prepare(&self) -> Result<()> {
        for dir in [&self.archive_root, &self.scratch_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// Create the course root.
    pub fn prepare_course(&self, course: &Course) -> Result<PathBuf> {
        let dir = self.course_dir(course);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create course directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Regular files currently waiting in the scratch directory.
    pub fn pending(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.scratch_dir).with_context(|| {
            format!("failed to read scratch directory {}", self.scratch_dir.display())
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Move every regular scratch file into the category directory.
    /// Returns the new paths.
    pub fn flush(&self, course: &Course, category: Category) -> Result<Vec<PathBuf>> {
        let target = self.category_dir(course, category);
        std::fs::create_dir_all(&target)
            .with_context(|| format!("failed to create {}", target.display()))?;

        let mut moved = Vec::new();
        for source in self.pending()? {
            let Some(name) = source.file_name() else {
                continue;
            };
            let destination = target.join(name);
            move_file(&source, &destination)?;
            moved.push(destination);
        }
        tracing::info!(
            "{}/{}: archived {} file(s)",
            course.name(),
            category.dir_name(),
            moved.len()
        );
        Ok(moved)
    }

    /// Remove everything under the archive root.
    pub fn clean(&self) -> Result<()> {
        if self.archive_root.exists() {
            std::fs::remove_dir_all(&self.archive_root).with_context(|| {
                format!("failed to clean {}", self.archive_root.display())
            })?;
        }
        self.prepare()
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(source: &Path, destination: &Path) -> Result<()> {
    if std::fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    std::fs::copy(source, destination).with_context(|| {
        format!(
            "failed to move {} to {}",
            source.display(),
            destination.display()
        )
    })?;
    std::fs::remove_file(source)
        .with_context(|| format!("failed to remove {}", source.display()))?;
    Ok(())
}
