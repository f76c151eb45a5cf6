//! Page conditions polled by the navigator.

use crate::renderer::{BrowserSession, ElementRef, Locator};
use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Something the current page can satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// An element matching the locator is visible.
    Visible(Locator),
    /// The embedded frame is available; the session enters it on match.
    FrameAvailable(Locator),
    /// The first of several conditions to hold. The match records which.
    AnyOf(Vec<Condition>),
}

/// Payload of a satisfied condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionMatch {
    /// Index of the matching branch of an `AnyOf`; 0 otherwise.
    pub branch: usize,
    /// The element that satisfied the condition, when there is one.
    pub element: Option<ElementRef>,
}

impl ConditionMatch {
    /// A match with no element, e.g. a frame that was entered.
    pub fn arrived() -> Self {
        Self {
            branch: 0,
            element: None,
        }
    }
}

impl Condition {
    pub fn visible(locator: Locator) -> Self {
        Self::Visible(locator)
    }

    pub fn frame(locator: Locator) -> Self {
        Self::FrameAvailable(locator)
    }

    pub fn any_of(conditions: Vec<Condition>) -> Self {
        Self::AnyOf(conditions)
    }

    /// Evaluate once against the current page.
    pub fn evaluate<'a>(
        &'a self,
        session: &'a mut dyn BrowserSession,
    ) -> BoxFuture<'a, Result<Option<ConditionMatch>>> {
        async move {
            match self {
                Self::Visible(locator) => {
                    for element in session.find_all(locator).await? {
                        if session.is_visible(element).await? {
                            return Ok(Some(ConditionMatch {
                                branch: 0,
                                element: Some(element),
                            }));
                        }
                    }
                    Ok(None)
                }
                Self::FrameAvailable(locator) => {
                    if session.enter_frame(locator).await? {
                        Ok(Some(ConditionMatch::arrived()))
                    } else {
                        Ok(None)
                    }
                }
                Self::AnyOf(conditions) => {
                    for (branch, condition) in conditions.iter().enumerate() {
                        // A failing branch must not hide a later one that holds.
                        match condition.evaluate(session).await {
                            Ok(Some(found)) => {
                                return Ok(Some(ConditionMatch {
                                    branch,
                                    element: found.element,
                                }))
                            }
                            Ok(None) => {}
                            Err(e) => tracing::trace!("condition branch {branch} errored: {e}"),
                        }
                    }
                    Ok(None)
                }
            }
        }
        .boxed()
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Visible(locator) => write!(f, "visible({locator})"),
            Self::FrameAvailable(locator) => write!(f, "frame({locator})"),
            Self::AnyOf(conditions) => {
                let parts: Vec<String> = conditions.iter().map(|c| c.to_string()).collect();
                write!(f, "any({})", parts.join(" | "))
            }
        }
    }
}
