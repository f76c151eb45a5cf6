//! Resilient page loading.
//!
//! [`PageNavigator::navigate`] loads a location and polls for a success or
//! failure condition. An attempt that times out is judged by where the
//! session ended up: somewhere else means a detour (usually a sign-in
//! interstitial) and the identical navigation is retried without limit; still
//! on the requested location means the page broke its contract and the run
//! aborts with [`ArchiveError::NavigationStalled`].

pub mod condition;

pub use condition::{Condition, ConditionMatch};

use crate::error::ArchiveError;
use crate::renderer::BrowserSession;
use anyhow::Result;
use std::time::Duration;
use tokio::time::Instant;

/// Default poll cadence for condition checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default per-attempt timeout.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a single polling attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Matched(ConditionMatch),
    Failed,
    /// Neither condition held before the attempt timeout.
    Indeterminate,
}

/// Terminal result of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Matched(ConditionMatch),
    Failed,
}

impl NavigationOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    pub fn into_match(self) -> Option<ConditionMatch> {
        match self {
            Self::Matched(m) => Some(m),
            Self::Failed => None,
        }
    }
}

/// Loads pages and waits for their conditions.
#[derive(Debug, Clone)]
pub struct PageNavigator {
    poll_interval: Duration,
    attempt_timeout: Duration,
}

impl Default for PageNavigator {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_ATTEMPT_TIMEOUT)
    }
}

impl PageNavigator {
    pub fn new(poll_interval: Duration, attempt_timeout: Duration) -> Self {
        Self {
            poll_interval,
            attempt_timeout,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Navigate to `location` and wait for `success` or `failure`.
    ///
    /// Without a success condition nothing on the page can count as success:
    /// the session must have left `location`. Still being there stalls, a
    /// detour is retried unless `failure` shows up on it first.
    pub async fn navigate(
        &self,
        session: &mut dyn BrowserSession,
        location: &str,
        success: Option<&Condition>,
        failure: Option<&Condition>,
    ) -> Result<NavigationOutcome> {
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            session.goto(location).await?;

            if success.is_none() && session.current_url().await? == location {
                return Err(stalled(location, attempts));
            }

            match self.wait_for(session, success, failure).await? {
                AttemptOutcome::Matched(found) => return Ok(NavigationOutcome::Matched(found)),
                AttemptOutcome::Failed => {
                    tracing::debug!("{location}: failure condition met");
                    return Ok(NavigationOutcome::Failed);
                }
                AttemptOutcome::Indeterminate => {
                    let current = session.current_url().await?;
                    if current != location {
                        tracing::warn!(
                            "{location}: redirected to {current} (attempt {attempts}), retrying"
                        );
                        continue;
                    }
                    return Err(stalled(location, attempts));
                }
            }
        }
    }

    /// Poll the current page until a condition holds or the attempt times
    /// out. Success is checked before failure on every poll; an absent
    /// condition never holds.
    pub async fn wait_for(
        &self,
        session: &mut dyn BrowserSession,
        success: Option<&Condition>,
        failure: Option<&Condition>,
    ) -> Result<AttemptOutcome> {
        let deadline = Instant::now() + self.attempt_timeout;
        loop {
            if let Some(condition) = success {
                if let Some(found) = poll(condition, session).await {
                    return Ok(AttemptOutcome::Matched(found));
                }
            }
            if let Some(condition) = failure {
                if poll(condition, session).await.is_some() {
                    return Ok(AttemptOutcome::Failed);
                }
            }
            if Instant::now() >= deadline {
                return Ok(AttemptOutcome::Indeterminate);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn stalled(location: &str, attempts: u64) -> anyhow::Error {
    ArchiveError::NavigationStalled {
        location: location.to_string(),
        attempts,
    }
    .into()
}

/// Evaluate once; query errors mid-load count as "not yet".
async fn poll(condition: &Condition, session: &mut dyn BrowserSession) -> Option<ConditionMatch> {
    match condition.evaluate(session).await {
        Ok(found) => found,
        Err(e) => {
            tracing::trace!("{condition} not evaluable yet: {e}");
            None
        }
    }
}
