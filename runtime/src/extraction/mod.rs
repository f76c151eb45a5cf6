//! Per-content-type extraction.
//!
//! Every module type has one behaviour: harvest embedded files and print the
//! page, download a single attachment, print an embedded tool, or follow an
//! external link and print its target. File triggers always go through the
//! course's [`DownloadDeduplicator`].

pub mod classify;
pub mod collector;

pub use classify::{classify, ContentType};
pub use collector::DirectoryCollector;

use crate::archive::{ContentIdentifier, DownloadDeduplicator};
use crate::auth::Authenticator;
use crate::course::Module;
use crate::error::ArchiveError;
use crate::navigation::{AttemptOutcome, Condition, PageNavigator};
use crate::renderer::{find_first, BrowserSession, ElementRef, Locator};
use crate::selectors;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Fixed delays between browser actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// Before each download trigger.
    pub download_delay: Duration,
    /// After each module or announcement.
    pub module_delay: Duration,
    /// After reaching an external target, before printing it.
    pub external_settle: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            download_delay: Duration::from_secs(1),
            module_delay: Duration::from_secs(1),
            external_settle: Duration::from_secs(3),
        }
    }
}

/// Dispatches modules to their extraction behaviour.
pub struct ContentExtractor {
    navigator: PageNavigator,
    authenticator: Arc<dyn Authenticator>,
    pacing: Pacing,
    /// External targets on this origin go through the authenticator.
    secondary_origin: Option<Url>,
}

impl ContentExtractor {
    pub fn new(
        navigator: PageNavigator,
        authenticator: Arc<dyn Authenticator>,
        pacing: Pacing,
        secondary_origin: Option<Url>,
    ) -> Self {
        Self {
            navigator,
            authenticator,
            pacing,
            secondary_origin,
        }
    }

    pub fn navigator(&self) -> &PageNavigator {
        &self.navigator
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Extract one module. Returns the number of downloads triggered.
    pub async fn extract(
        &self,
        session: &mut dyn BrowserSession,
        module: &Module,
        seen: &mut DownloadDeduplicator,
    ) -> Result<usize> {
        let location = module.location.as_str();
        tracing::info!("{} {location}", module.content_type);
        match &module.content_type {
            ContentType::Wiki => {
                self.harvest(session, location, &selectors::wiki_ready(), seen)
                    .await
            }
            ContentType::Assignment => {
                self.harvest(session, location, &selectors::assignment_ready(), seen)
                    .await
            }
            ContentType::Quiz => {
                self.harvest(session, location, &selectors::content_ready(), seen)
                    .await
            }
            ContentType::Attachment => self.download_attachment(session, location, seen).await,
            ContentType::ExternalTool => {
                self.print_tool(session, location).await?;
                Ok(0)
            }
            ContentType::ExternalUrl => {
                self.follow_external(session, location).await?;
                Ok(0)
            }
            ContentType::Unrecognized(markers) => Err(ArchiveError::UnrecognizedModule {
                location: location.to_string(),
                markers: markers.clone(),
            }
            .into()),
        }
    }

    /// Load a page, trigger every new embedded file, then print the page.
    pub async fn harvest(
        &self,
        session: &mut dyn BrowserSession,
        location: &str,
        ready: &Condition,
        seen: &mut DownloadDeduplicator,
    ) -> Result<usize> {
        self.navigator
            .navigate(session, location, Some(ready), None)
            .await?;
        self.await_tool_frame(session).await?;
        let triggered = self.trigger_file_downloads(session, seen).await?;
        session.print_page().await?;
        Ok(triggered)
    }

    /// Wait for an embedded tool frame to load if the page has one.
    /// Absence or a frame that never loads is not an error.
    pub async fn await_tool_frame(&self, session: &mut dyn BrowserSession) -> Result<bool> {
        if find_first(session, &selectors::tool_frame()).await?.is_none() {
            return Ok(false);
        }
        let here = session.current_url().await?;
        let outcome = self
            .navigator
            .wait_for(session, Some(&selectors::tool_frame_ready()), None)
            .await?;
        session.leave_frame().await?;
        let loaded = matches!(outcome, AttemptOutcome::Matched(_));
        if !loaded {
            tracing::debug!("{here}: embedded tool frame never became available");
        }
        Ok(loaded)
    }

    /// Trigger every file-download control on the current page whose
    /// identifier is new to this course.
    pub async fn trigger_file_downloads(
        &self,
        session: &mut dyn BrowserSession,
        seen: &mut DownloadDeduplicator,
    ) -> Result<usize> {
        let buttons = session
            .find_all(&Locator::class(selectors::FILE_DOWNLOAD_BUTTON))
            .await?;
        let mut triggered = 0;
        for button in buttons {
            if self.trigger_once(session, button, seen).await? {
                triggered += 1;
            }
        }
        Ok(triggered)
    }

    /// Claim the control's identifier and click it if the claim is new.
    async fn trigger_once(
        &self,
        session: &mut dyn BrowserSession,
        control: ElementRef,
        seen: &mut DownloadDeduplicator,
    ) -> Result<bool> {
        let Some(href) = session.attribute(control, "href").await? else {
            tracing::debug!("download control without a target, skipped");
            return Ok(false);
        };
        let id = ContentIdentifier::from_location(&href);
        if !seen.claim(&id) {
            tracing::debug!("{id} already downloaded");
            return Ok(false);
        }
        tokio::time::sleep(self.pacing.download_delay).await;
        session.click(control).await?;
        tracing::debug!("download {id} triggered");
        Ok(true)
    }

    async fn download_attachment(
        &self,
        session: &mut dyn BrowserSession,
        location: &str,
        seen: &mut DownloadDeduplicator,
    ) -> Result<usize> {
        let found = self
            .navigator
            .navigate(session, location, Some(&selectors::download_link_ready()), None)
            .await?
            .into_match();
        let link = match found.and_then(|m| m.element) {
            Some(link) => Some(link),
            None => {
                find_first(session, &Locator::link_text(selectors::DOWNLOAD_LINK_TEXT)).await?
            }
        };
        let Some(link) = link else {
            return Ok(0);
        };
        Ok(usize::from(self.trigger_once(session, link, seen).await?))
    }

    async fn print_tool(&self, session: &mut dyn BrowserSession, location: &str) -> Result<()> {
        self.navigator
            .navigate(session, location, Some(&selectors::tool_frame_ready()), None)
            .await?;
        let printed = session.print_page().await;
        session.leave_frame().await?;
        printed
    }

    async fn follow_external(&self, session: &mut dyn BrowserSession, location: &str) -> Result<()> {
        let found = self
            .navigator
            .navigate(session, location, Some(&selectors::external_link_ready()), None)
            .await?
            .into_match();
        let Some(found) = found else {
            return Ok(());
        };
        let target = match found.element {
            Some(element) => session.attribute(element, "href").await?,
            None => None,
        };
        let Some(target) = target else {
            tracing::warn!("{location}: external link has no target, skipped");
            return Ok(());
        };

        if found.branch == 0 {
            close_popup_window(session).await?;
        }

        if self.is_secondary(&target) {
            self.authenticator
                .authenticate(
                    session,
                    &self.navigator,
                    &target,
                    &selectors::secondary_ready(),
                )
                .await?;
        } else {
            session.goto(&target).await?;
        }
        tokio::time::sleep(self.pacing.external_settle).await;
        session.print_page().await
    }

    fn is_secondary(&self, target: &str) -> bool {
        let Some(secondary) = &self.secondary_origin else {
            return false;
        };
        Url::parse(target)
            .map(|url| url.origin() == secondary.origin())
            .unwrap_or(false)
    }
}

/// Close the window the "open externally" control spawned and put focus
/// back on the primary window.
async fn close_popup_window(session: &mut dyn BrowserSession) -> Result<()> {
    let handles = session.window_handles().await?;
    let (Some(primary), Some(popup)) = (handles.first(), handles.get(1)) else {
        tracing::debug!("no external window opened");
        return Ok(());
    };
    session.switch_window(popup).await?;
    session.close_window().await?;
    session.switch_window(primary).await
}
