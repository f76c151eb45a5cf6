//! Browser session abstraction.
//!
//! Defines the `BrowserSession` trait every archiving component drives. The
//! session is passed explicitly as `&mut dyn BrowserSession`; there is no
//! global browser handle. The production backend is Chromium via
//! chromiumoxide (see [`chromium`]).

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How an element is located on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locator {
    /// Element `id` attribute.
    Id(String),
    /// A single class name.
    Class(String),
    /// Arbitrary CSS selector.
    Css(String),
    /// Tag name, e.g. `a`.
    Tag(String),
    /// Anchor whose visible text contains the given fragment.
    PartialLinkText(String),
}

impl Locator {
    pub fn id(value: &str) -> Self {
        Self::Id(value.to_string())
    }

    pub fn class(value: &str) -> Self {
        Self::Class(value.to_string())
    }

    pub fn css(value: &str) -> Self {
        Self::Css(value.to_string())
    }

    pub fn tag(value: &str) -> Self {
        Self::Tag(value.to_string())
    }

    pub fn link_text(value: &str) -> Self {
        Self::PartialLinkText(value.to_string())
    }

    /// CSS selector equivalent. `PartialLinkText` maps to all anchors; the
    /// text filter is applied by the backend.
    pub fn to_css(&self) -> String {
        match self {
            Self::Id(id) => format!("[id=\"{}\"]", id.replace('"', "\\\"")),
            Self::Class(class) => format!(".{class}"),
            Self::Css(css) => css.clone(),
            Self::Tag(tag) => tag.clone(),
            Self::PartialLinkText(_) => "a".to_string(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(v) => write!(f, "#{v}"),
            Self::Class(v) => write!(f, ".{v}"),
            Self::Css(v) => write!(f, "{v}"),
            Self::Tag(v) => write!(f, "<{v}>"),
            Self::PartialLinkText(v) => write!(f, "link~\"{v}\""),
        }
    }
}

/// Opaque handle to an element found by the session.
///
/// Handles are only meaningful to the session that produced them and only
/// until the next navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u64);

/// Identifies a top-level browser window (tab).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub String);

/// A controlled browser session: one current window, one current document.
#[async_trait]
pub trait BrowserSession: Send {
    /// Issue a navigation to `url`. Returns once the navigation was accepted;
    /// it does not wait for any particular page content.
    async fn goto(&mut self, url: &str) -> Result<()>;
    /// The location the current window reports.
    async fn current_url(&self) -> Result<String>;
    /// All elements in the top-level document matching `locator`.
    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<ElementRef>>;
    /// All descendants of `parent` matching `locator`.
    async fn find_within(&mut self, parent: ElementRef, locator: &Locator)
        -> Result<Vec<ElementRef>>;
    /// Whether the element is rendered and visible.
    async fn is_visible(&self, element: ElementRef) -> Result<bool>;
    /// Resolved attribute or property value (`href` is absolute).
    async fn attribute(&self, element: ElementRef, name: &str) -> Result<Option<String>>;
    /// Click the element.
    async fn click(&mut self, element: ElementRef) -> Result<()>;
    /// Enter the embedded frame located by `locator` if it is available.
    async fn enter_frame(&mut self, locator: &Locator) -> Result<bool>;
    /// Return to the top-level document.
    async fn leave_frame(&mut self) -> Result<()>;
    /// Render the current document (or entered frame) to a file in the
    /// scratch download directory.
    async fn print_page(&mut self) -> Result<()>;
    /// All open windows, primary window first.
    async fn window_handles(&mut self) -> Result<Vec<WindowHandle>>;
    /// Make `handle` the current window.
    async fn switch_window(&mut self, handle: &WindowHandle) -> Result<()>;
    /// Close the current window.
    async fn close_window(&mut self) -> Result<()>;
}

/// First element matching `locator`, if any.
pub async fn find_first(
    session: &mut dyn BrowserSession,
    locator: &Locator,
) -> Result<Option<ElementRef>> {
    Ok(session.find_all(locator).await?.into_iter().next())
}

/// `href` of the first anchor inside `parent`, if any.
pub async fn first_link_within(
    session: &mut dyn BrowserSession,
    parent: ElementRef,
) -> Result<Option<String>> {
    let Some(anchor) = session
        .find_within(parent, &Locator::tag("a"))
        .await?
        .into_iter()
        .next()
    else {
        return Ok(None);
    };
    session.attribute(anchor, "href").await
}
