//! Depth-first walk of the course file browser.

use crate::archive::{ContentIdentifier, DownloadDeduplicator};
use crate::navigation::{NavigationOutcome, PageNavigator};
use crate::renderer::{BrowserSession, Locator};
use crate::selectors;
use anyhow::Result;
use std::time::Duration;

/// What a walk did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Folder pages that loaded.
    pub folders_visited: usize,
    /// Folder pages that reported not-found.
    pub folders_unavailable: usize,
    /// Files navigated to.
    pub files_triggered: usize,
}

/// Walks a folder hierarchy, downloading each new file by navigating to it.
///
/// All files of a folder are triggered before any of its sub-folders is
/// entered; sub-folders are entered in listing order. The hierarchy is
/// assumed acyclic.
pub struct DirectoryCollector<'a> {
    navigator: &'a PageNavigator,
    folder_prefix: String,
    download_delay: Duration,
}

impl<'a> DirectoryCollector<'a> {
    pub fn new(navigator: &'a PageNavigator, folder_prefix: &str, download_delay: Duration) -> Self {
        Self {
            navigator,
            folder_prefix: folder_prefix.to_string(),
            download_delay,
        }
    }

    /// Walk from `root`. The root page's availability is reported through
    /// `folders_visited`/`folders_unavailable`.
    pub async fn collect(
        &self,
        session: &mut dyn BrowserSession,
        root: &str,
        seen: &mut DownloadDeduplicator,
    ) -> Result<CollectionReport> {
        let mut report = CollectionReport::default();
        let ready = selectors::directory_ready();
        let not_found = selectors::page_not_available();

        // Sub-folders are pushed in reverse so they pop in listing order.
        let mut pending = vec![root.to_string()];
        while let Some(folder) = pending.pop() {
            let outcome = self
                .navigator
                .navigate(session, &folder, Some(&ready), Some(&not_found))
                .await?;
            if outcome == NavigationOutcome::Failed {
                tracing::warn!("folder {folder} not available, skipped");
                report.folders_unavailable += 1;
                continue;
            }
            report.folders_visited += 1;

            let (sub_folders, files) = self.list_entries(session).await?;
            tracing::debug!(
                "{folder}: {} file(s), {} folder(s)",
                files.len(),
                sub_folders.len()
            );

            for file in files {
                let id = ContentIdentifier::from_location(&file);
                if !seen.claim(&id) {
                    continue;
                }
                session.goto(&file).await?;
                report.files_triggered += 1;
                tracing::debug!("download {id} triggered from {folder}");
                tokio::time::sleep(self.download_delay).await;
            }

            pending.extend(sub_folders.into_iter().rev());
        }
        Ok(report)
    }

    /// Entries of the loaded folder page split into (sub-folders, files).
    async fn list_entries(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut sub_folders = Vec::new();
        let mut files = Vec::new();
        for link in session
            .find_all(&Locator::class(selectors::DIRECTORY_ENTRY_LINK))
            .await?
        {
            let Some(href) = session.attribute(link, "href").await? else {
                continue;
            };
            if href.starts_with(&self.folder_prefix) {
                sub_folders.push(href);
            } else {
                files.push(href);
            }
        }
        Ok((sub_folders, files))
    }
}
