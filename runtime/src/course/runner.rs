//! Archive-run orchestration.
//!
//! One course at a time, one category at a time. Every category that
//! reaches its page is followed by the download barrier and a flush, so the
//! scratch directory only ever holds the current category's files. Files and
//! assignments are waited on and flushed even when their page is missing.

use super::{list_courses, list_modules, Category, Course};
use crate::archive::{ArchiveOrganizer, DownloadDeduplicator, DownloadSyncBarrier};
use crate::auth::Authenticator;
use crate::config::ArchiveConfig;
use crate::extraction::{ContentExtractor, DirectoryCollector};
use crate::navigation::{Condition, NavigationOutcome, PageNavigator};
use crate::progress::{self, ProgressEventKind, ProgressSender};
use crate::renderer::{first_link_within, BrowserSession, Locator};
use crate::selectors;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    /// `false` when the LMS reported the page as not available.
    pub available: bool,
    pub downloads_triggered: usize,
    /// Files moved into the category directory.
    pub files: usize,
}

/// Outcome of one course.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    pub name: String,
    pub location: String,
    pub categories: Vec<CategorySummary>,
}

impl CourseSummary {
    pub fn files(&self) -> usize {
        self.categories.iter().map(|c| c.files).sum()
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub courses: Vec<CourseSummary>,
}

/// Drives a browser session through every enrolled course.
pub struct ArchiveRunner {
    courses_url: String,
    navigator: PageNavigator,
    extractor: ContentExtractor,
    authenticator: Arc<dyn Authenticator>,
    organizer: ArchiveOrganizer,
    barrier: DownloadSyncBarrier,
    clean: bool,
    progress: Option<ProgressSender>,
    seq: u64,
}

impl ArchiveRunner {
    pub fn new(config: &ArchiveConfig, authenticator: Arc<dyn Authenticator>) -> Result<Self> {
        let navigator = config.navigator();
        let extractor = ContentExtractor::new(
            navigator.clone(),
            Arc::clone(&authenticator),
            config.pacing.clone(),
            config.secondary_origin_url()?,
        );
        Ok(Self {
            courses_url: config.courses_url(),
            navigator,
            extractor,
            authenticator,
            organizer: ArchiveOrganizer::new(&config.archive_root, &config.scratch_dir),
            barrier: DownloadSyncBarrier::new(
                &config.scratch_dir,
                config.barrier_poll_interval,
                &config.partial_suffix,
            ),
            clean: config.clean,
            progress: None,
            seq: 0,
        })
    }

    /// Send progress events to `tx`.
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn organizer(&self) -> &ArchiveOrganizer {
        &self.organizer
    }

    fn emit(&mut self, event: ProgressEventKind) {
        progress::emit(&self.progress, &mut self.seq, event);
    }

    /// Sign in, list enrollments and archive every course.
    pub async fn run(&mut self, session: &mut dyn BrowserSession) -> Result<ArchiveSummary> {
        let started_at = Utc::now();
        if self.clean {
            tracing::warn!("removing everything under {}", self.organizer.archive_root().display());
            self.organizer.clean()?;
        } else {
            self.organizer.prepare()?;
        }
        let leftovers = self.organizer.pending()?;
        if !leftovers.is_empty() {
            tracing::warn!(
                "{} file(s) already in {}; they will be archived with the first category",
                leftovers.len(),
                self.organizer.scratch_dir().display()
            );
        }

        let courses_url = self.courses_url.clone();
        self.authenticator
            .authenticate(
                session,
                &self.navigator,
                &courses_url,
                &selectors::enrollments_ready(),
            )
            .await?;

        let courses = list_courses(session).await?;
        tracing::info!("{} course(s) enrolled", courses.len());
        self.emit(ProgressEventKind::CoursesListed {
            count: courses.len(),
        });

        let total = courses.len();
        let mut summaries = Vec::with_capacity(total);
        for (index, course) in courses.iter().enumerate() {
            self.emit(ProgressEventKind::CourseStarted {
                course: course.name().to_string(),
                index: index + 1,
                total,
            });
            summaries.push(self.archive_course(session, course).await?);
        }

        Ok(ArchiveSummary {
            started_at,
            finished_at: Utc::now(),
            courses: summaries,
        })
    }

    /// Archive every category of one course.
    pub async fn archive_course(
        &mut self,
        session: &mut dyn BrowserSession,
        course: &Course,
    ) -> Result<CourseSummary> {
        tracing::info!("archiving {} ({})", course.name(), course.location());
        self.organizer.prepare_course(course)?;

        // One identifier set per course, alive across all its categories.
        let mut seen = DownloadDeduplicator::new();
        let mut categories = Vec::with_capacity(course.categories().len());
        for &category in course.categories() {
            categories.push(
                self.archive_category(session, course, category, &mut seen)
                    .await?,
            );
        }

        let summary = CourseSummary {
            name: course.name().to_string(),
            location: course.location().to_string(),
            categories,
        };
        self.emit(ProgressEventKind::CourseCompleted {
            course: course.name().to_string(),
            files: summary.files(),
        });
        Ok(summary)
    }

    async fn archive_category(
        &mut self,
        session: &mut dyn BrowserSession,
        course: &Course,
        category: Category,
        seen: &mut DownloadDeduplicator,
    ) -> Result<CategorySummary> {
        self.emit(ProgressEventKind::CategoryStarted {
            course: course.name().to_string(),
            category,
        });

        let triggered = match category {
            Category::Modules => self.harvest_modules(session, course, seen).await?,
            Category::Announcements => self.harvest_announcements(session, course).await?,
            Category::Syllabus => self.harvest_syllabus(session, course, seen).await?,
            Category::Files => self.harvest_files(session, course, seen).await?,
            Category::Assignments => self.harvest_assignments(session, course, seen).await?,
        };

        let available = triggered.is_some();
        if !available {
            tracing::info!("{}: {category} not available", course.name());
            self.emit(ProgressEventKind::CategorySkipped {
                course: course.name().to_string(),
                category,
            });
            if !category.always_flushed() {
                return Ok(CategorySummary {
                    category,
                    available,
                    downloads_triggered: 0,
                    files: 0,
                });
            }
        }

        let downloads_triggered = triggered.unwrap_or(0);
        self.barrier.wait().await?;
        let files = self.organizer.flush(course, category)?.len();
        if available {
            self.emit(ProgressEventKind::CategoryArchived {
                course: course.name().to_string(),
                category,
                files,
                downloads_triggered,
            });
        }
        Ok(CategorySummary {
            category,
            available,
            downloads_triggered,
            files,
        })
    }

    /// Load a category page; `false` when the LMS says it is not available.
    async fn open_category(
        &self,
        session: &mut dyn BrowserSession,
        course: &Course,
        category: Category,
        ready: &Condition,
    ) -> Result<bool> {
        let outcome = self
            .navigator
            .navigate(
                session,
                &course.category_location(category),
                Some(ready),
                Some(&selectors::page_not_available()),
            )
            .await?;
        Ok(outcome != NavigationOutcome::Failed)
    }

    async fn harvest_modules(
        &mut self,
        session: &mut dyn BrowserSession,
        course: &Course,
        seen: &mut DownloadDeduplicator,
    ) -> Result<Option<usize>> {
        if !self
            .open_category(session, course, Category::Modules, &selectors::modules_ready())
            .await?
        {
            return Ok(None);
        }
        let modules = list_modules(session).await?;
        tracing::debug!("{}: {} module(s)", course.name(), modules.len());

        let mut triggered = 0;
        for module in &modules {
            triggered += self.extractor.extract(session, module, seen).await?;
            self.emit(ProgressEventKind::ItemProcessed {
                course: course.name().to_string(),
                category: Category::Modules,
                location: module.location.clone(),
                kind: module.content_type.to_string(),
            });
            tokio::time::sleep(self.extractor.pacing().module_delay).await;
        }
        Ok(Some(triggered))
    }

    async fn harvest_announcements(
        &mut self,
        session: &mut dyn BrowserSession,
        course: &Course,
    ) -> Result<Option<usize>> {
        if !self
            .open_category(
                session,
                course,
                Category::Announcements,
                &selectors::announcements_ready(),
            )
            .await?
        {
            return Ok(None);
        }
        let locations = links_of(session, selectors::ANNOUNCEMENT_ROW).await?;
        let ready = selectors::announcement_ready();
        for location in &locations {
            self.navigator
                .navigate(session, location, Some(&ready), None)
                .await?;
            session.print_page().await?;
            self.emit(ProgressEventKind::ItemProcessed {
                course: course.name().to_string(),
                category: Category::Announcements,
                location: location.clone(),
                kind: "announcement".to_string(),
            });
            tokio::time::sleep(self.extractor.pacing().module_delay).await;
        }
        Ok(Some(0))
    }

    async fn harvest_syllabus(
        &mut self,
        session: &mut dyn BrowserSession,
        course: &Course,
        seen: &mut DownloadDeduplicator,
    ) -> Result<Option<usize>> {
        if !self
            .open_category(session, course, Category::Syllabus, &selectors::syllabus_ready())
            .await?
        {
            return Ok(None);
        }
        let triggered = self.extractor.trigger_file_downloads(session, seen).await?;
        session.print_page().await?;
        Ok(Some(triggered))
    }

    async fn harvest_files(
        &mut self,
        session: &mut dyn BrowserSession,
        course: &Course,
        seen: &mut DownloadDeduplicator,
    ) -> Result<Option<usize>> {
        let collector = DirectoryCollector::new(
            &self.navigator,
            &course.folder_prefix(),
            self.extractor.pacing().download_delay,
        );
        let report = collector
            .collect(session, &course.category_location(Category::Files), seen)
            .await?;
        tracing::debug!(
            "{}: {} folder(s) walked, {} unavailable",
            course.name(),
            report.folders_visited,
            report.folders_unavailable
        );
        if report.folders_visited == 0 {
            return Ok(None);
        }
        Ok(Some(report.files_triggered))
    }

    async fn harvest_assignments(
        &mut self,
        session: &mut dyn BrowserSession,
        course: &Course,
        seen: &mut DownloadDeduplicator,
    ) -> Result<Option<usize>> {
        if !self
            .open_category(
                session,
                course,
                Category::Assignments,
                &selectors::assignments_ready(),
            )
            .await?
        {
            return Ok(None);
        }
        let locations = links_of(session, selectors::ASSIGNMENT_ENTRY).await?;
        let ready = selectors::content_ready();
        let mut triggered = 0;
        for location in &locations {
            triggered += self
                .extractor
                .harvest(session, location, &ready, seen)
                .await?;
            self.emit(ProgressEventKind::ItemProcessed {
                course: course.name().to_string(),
                category: Category::Assignments,
                location: location.clone(),
                kind: "assignment".to_string(),
            });
        }
        Ok(Some(triggered))
    }
}

/// First link of every element with `class`, collected before any of them
/// is visited.
async fn links_of(session: &mut dyn BrowserSession, class: &str) -> Result<Vec<String>> {
    let mut locations = Vec::new();
    for element in session.find_all(&Locator::class(class)).await? {
        if let Some(href) = first_link_within(session, element).await? {
            locations.push(href);
        }
    }
    Ok(locations)
}
