//! Sign-in hand-off.
//!
//! The archiver only ever asks "is this page usable now?". How the session
//! gets there (certificates, second factor, a human at the keyboard) is the
//! authenticator's business.

use crate::error::ArchiveError;
use crate::navigation::{AttemptOutcome, Condition, ConditionMatch, PageNavigator};
use crate::renderer::{BrowserSession, Locator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

/// Brings the session to a state where `ready` holds on `location`.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        session: &mut dyn BrowserSession,
        navigator: &PageNavigator,
        location: &str,
        ready: &Condition,
    ) -> Result<()>;
}

/// Sign-in completed by a human operator in the visible browser window,
/// after clicking through the system's single-sign-on entry controls.
#[derive(Debug, Clone, Default)]
pub struct InteractiveAuthenticator {
    /// Controls clicked in order on the primary system's sign-in page.
    sso_steps: Vec<Locator>,
    /// Systems that sign in through different controls.
    origin_steps: Vec<(Url, Vec<Locator>)>,
    /// Ask on the terminal and wait for Enter before re-checking.
    prompt: bool,
}

impl InteractiveAuthenticator {
    /// `sso_link_text` is the partial text of the primary system's
    /// single-sign-on link.
    pub fn new(sso_link_text: Option<String>, prompt: bool) -> Self {
        Self {
            sso_steps: sso_link_text
                .map(|text| vec![Locator::link_text(&text)])
                .unwrap_or_default(),
            origin_steps: Vec::new(),
            prompt,
        }
    }

    /// Locations on `origin` click `steps` instead of the primary controls.
    pub fn with_origin_steps(mut self, origin: Url, steps: Vec<Locator>) -> Self {
        self.origin_steps.push((origin, steps));
        self
    }

    /// Sign-in controls for `location`.
    pub fn steps_for(&self, location: &str) -> &[Locator] {
        let Ok(url) = Url::parse(location) else {
            return &self.sso_steps;
        };
        self.origin_steps
            .iter()
            .find(|(origin, _)| origin.origin() == url.origin())
            .map(|(_, steps)| steps.as_slice())
            .unwrap_or(&self.sso_steps)
    }

    /// Click each control once it shows up; stop at the first one that
    /// never does.
    async fn click_through(
        &self,
        session: &mut dyn BrowserSession,
        navigator: &PageNavigator,
        location: &str,
    ) -> Result<()> {
        for step in self.steps_for(location) {
            let shown = Condition::visible(step.clone());
            match navigator.wait_for(session, Some(&shown), None).await? {
                AttemptOutcome::Matched(ConditionMatch {
                    element: Some(control),
                    ..
                }) => {
                    tracing::info!("sign-in: following {step}");
                    session.click(control).await?;
                }
                _ => {
                    tracing::debug!("sign-in control {step} not shown");
                    break;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Authenticator for InteractiveAuthenticator {
    async fn authenticate(
        &self,
        session: &mut dyn BrowserSession,
        navigator: &PageNavigator,
        location: &str,
        ready: &Condition,
    ) -> Result<()> {
        session.goto(location).await?;
        if let AttemptOutcome::Matched(_) = navigator.wait_for(session, Some(ready), None).await? {
            tracing::debug!("{location}: already signed in");
            return Ok(());
        }

        self.click_through(session, navigator, location).await?;

        if self.prompt {
            eprintln!("  Sign in to {location} in the browser window, then press Enter.");
            let mut line = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .context("failed to read operator confirmation")?;
        }

        match navigator.wait_for(session, Some(ready), None).await? {
            AttemptOutcome::Matched(_) => {
                tracing::info!("signed in at {location}");
                Ok(())
            }
            _ => Err(ArchiveError::AuthenticationIncomplete {
                location: location.to_string(),
            }
            .into()),
        }
    }
}
