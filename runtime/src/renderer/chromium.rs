//! Chromium-backed browser session using chromiumoxide.
//!
//! Downloads land in the scratch directory through `Browser.setDownloadBehavior`
//! and print-to-archive goes through `Page.printToPDF`, so no interactive
//! dialog is ever shown. A throwaway profile turns off the built-in PDF
//! viewer so linked PDFs download instead of opening in a tab.

use super::{BrowserSession, ElementRef, Locator, WindowHandle};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const VISIBILITY_FN: &str = "function() { \
    const s = window.getComputedStyle(this); \
    const r = this.getBoundingClientRect(); \
    return s.visibility !== 'hidden' && s.display !== 'none' && r.width > 0 && r.height > 0; \
}";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. COURSEVAULT_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("COURSEVAULT_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// How to launch the browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Explicit browser binary; discovered with [`find_chromium`] when unset.
    pub executable: Option<PathBuf>,
    /// Run without a visible window. Interactive sign-in needs a window.
    pub headless: bool,
    /// Where downloads and printed documents are written.
    pub scratch_dir: PathBuf,
}

/// A live Chromium session with one current page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    primary: WindowHandle,
    elements: HashMap<u64, Element>,
    next_element: u64,
    /// `src` of the entered embedded frame, if any.
    frame_src: Option<String>,
    scratch_dir: PathBuf,
    profile_dir: PathBuf,
    handler: tokio::task::JoinHandle<()>,
}

impl ChromiumSession {
    /// Launch Chromium and route its downloads into the scratch directory.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let chrome_path = match &options.executable {
            Some(path) => path.clone(),
            None => find_chromium()
                .context("Chromium not found. Set COURSEVAULT_CHROMIUM_PATH or pass --chromium.")?,
        };

        std::fs::create_dir_all(&options.scratch_dir).with_context(|| {
            format!(
                "failed to create scratch directory {}",
                options.scratch_dir.display()
            )
        })?;
        let scratch_dir = options
            .scratch_dir
            .canonicalize()
            .context("failed to resolve scratch directory")?;

        let profile_dir =
            std::env::temp_dir().join(format!("coursevault-profile-{}", std::process::id()));
        write_profile_preferences(&profile_dir, &scratch_dir)?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&profile_dir)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--ignore-certificate-errors");
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let download = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(scratch_dir.display().to_string())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build download behavior: {e}"))?;
        browser
            .execute(download)
            .await
            .context("failed to route downloads into the scratch directory")?;

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        let primary = WindowHandle(page.target_id().as_ref().to_string());

        tracing::info!("chromium session ready, downloads -> {}", scratch_dir.display());

        Ok(Self {
            browser,
            page,
            primary,
            elements: HashMap::new(),
            next_element: 0,
            frame_src: None,
            scratch_dir,
            profile_dir,
            handler,
        })
    }

    /// Close the browser.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            tracing::debug!("failed to remove {}: {e}", self.profile_dir.display());
        }
        Ok(())
    }

    fn register(&mut self, found: Vec<Element>) -> Vec<ElementRef> {
        found
            .into_iter()
            .map(|element| {
                self.next_element += 1;
                self.elements.insert(self.next_element, element);
                ElementRef(self.next_element)
            })
            .collect()
    }

    fn element(&self, handle: ElementRef) -> Result<&Element> {
        self.elements
            .get(&handle.0)
            .with_context(|| format!("stale element handle {}", handle.0))
    }

    async fn filter_link_text(found: Vec<Element>, text: &str) -> Vec<Element> {
        let mut matching = Vec::new();
        for element in found {
            let label = element.inner_text().await.ok().flatten().unwrap_or_default();
            if label.contains(text) {
                matching.push(element);
            }
        }
        matching
    }

    async fn write_pdf(&self, page: &Page) -> Result<PathBuf> {
        let title = page.get_title().await.ok().flatten().unwrap_or_default();
        let bytes = page
            .pdf(PrintToPdfParams::default())
            .await
            .context("print to PDF failed")?;
        let path = unique_path(&self.scratch_dir, &document_file_name(&title));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.elements.clear();
        self.frame_src = None;
        match self.page.goto(url).await {
            Ok(_) => Ok(()),
            // Navigation that turns into a download is aborted by the browser.
            Err(e) if e.to_string().contains("ERR_ABORTED") => {
                tracing::debug!("navigation to {url} became a download");
                Ok(())
            }
            Err(e) => bail!("navigation to {url} failed: {e}"),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<ElementRef>> {
        let mut found = self
            .page
            .find_elements(locator.to_css())
            .await
            .with_context(|| format!("failed to query {locator}"))?;
        if let Locator::PartialLinkText(text) = locator {
            found = Self::filter_link_text(found, text).await;
        }
        Ok(self.register(found))
    }

    async fn find_within(
        &mut self,
        parent: ElementRef,
        locator: &Locator,
    ) -> Result<Vec<ElementRef>> {
        let mut found = self
            .element(parent)?
            .find_elements(locator.to_css())
            .await
            .with_context(|| format!("failed to query {locator} within element {}", parent.0))?;
        if let Locator::PartialLinkText(text) = locator {
            found = Self::filter_link_text(found, text).await;
        }
        Ok(self.register(found))
    }

    async fn is_visible(&self, element: ElementRef) -> Result<bool> {
        let returns = self
            .element(element)?
            .call_js_fn(VISIBILITY_FN, false)
            .await
            .context("visibility check failed")?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn attribute(&self, element: ElementRef, name: &str) -> Result<Option<String>> {
        let element = self.element(element)?;
        // Properties resolve relative hrefs; fall back to the raw attribute.
        if let Some(serde_json::Value::String(value)) = element
            .property(name)
            .await
            .with_context(|| format!("failed to read property {name}"))?
        {
            return Ok(Some(value));
        }
        element
            .attribute(name)
            .await
            .with_context(|| format!("failed to read attribute {name}"))
    }

    async fn click(&mut self, element: ElementRef) -> Result<()> {
        self.element(element)?
            .click()
            .await
            .context("click failed")?;
        Ok(())
    }

    async fn enter_frame(&mut self, locator: &Locator) -> Result<bool> {
        let Some(frame) = self
            .page
            .find_elements(locator.to_css())
            .await
            .with_context(|| format!("failed to query frame {locator}"))?
            .into_iter()
            .next()
        else {
            return Ok(false);
        };
        let src = frame
            .property("src")
            .await
            .ok()
            .flatten()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        if src.is_empty() || src == "about:blank" {
            return Ok(false);
        }
        self.frame_src = Some(src);
        Ok(true)
    }

    async fn leave_frame(&mut self) -> Result<()> {
        self.frame_src = None;
        Ok(())
    }

    async fn print_page(&mut self) -> Result<()> {
        let path = match self.frame_src.clone() {
            // Frames are usually cross-origin; render their document on its own.
            Some(src) => {
                let frame_page = self
                    .browser
                    .new_page(src.as_str())
                    .await
                    .with_context(|| format!("failed to open frame document {src}"))?;
                let _ = frame_page.wait_for_navigation().await;
                let written = self.write_pdf(&frame_page).await;
                let _ = frame_page.close().await;
                self.page.bring_to_front().await.ok();
                written?
            }
            None => self.write_pdf(&self.page).await?,
        };
        tracing::debug!("printed {}", path.display());
        Ok(())
    }

    async fn window_handles(&mut self) -> Result<Vec<WindowHandle>> {
        let pages = self.browser.pages().await.context("failed to list windows")?;
        let mut handles = vec![self.primary.clone()];
        handles.extend(
            pages
                .iter()
                .map(|p| WindowHandle(p.target_id().as_ref().to_string()))
                .filter(|h| *h != self.primary),
        );
        Ok(handles)
    }

    async fn switch_window(&mut self, handle: &WindowHandle) -> Result<()> {
        let pages = self.browser.pages().await.context("failed to list windows")?;
        let page = pages
            .into_iter()
            .find(|p| p.target_id().as_ref() == handle.0.as_str())
            .with_context(|| format!("window {} is gone", handle.0))?;
        page.bring_to_front().await.ok();
        self.page = page;
        self.elements.clear();
        self.frame_src = None;
        Ok(())
    }

    async fn close_window(&mut self) -> Result<()> {
        let closing = WindowHandle(self.page.target_id().as_ref().to_string());
        if closing == self.primary {
            bail!("refusing to close the primary window");
        }
        self.page.clone().close().await.context("failed to close window")?;
        // Fall back to the primary window so the session always has a page.
        let primary = self.primary.clone();
        self.switch_window(&primary).await
    }
}

/// Seed `profile_dir` with preferences that download PDFs into `scratch_dir`
/// instead of rendering them. Returns the preferences file.
pub fn write_profile_preferences(profile_dir: &Path, scratch_dir: &Path) -> Result<PathBuf> {
    let default_dir = profile_dir.join("Default");
    std::fs::create_dir_all(&default_dir)
        .with_context(|| format!("failed to create profile {}", default_dir.display()))?;
    let preferences = serde_json::json!({
        "plugins": { "always_open_pdf_externally": true },
        "download": {
            "default_directory": scratch_dir.display().to_string(),
            "prompt_for_download": false,
        },
    });
    let path = default_dir.join("Preferences");
    std::fs::write(&path, serde_json::to_vec_pretty(&preferences)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// File name for a printed document: the page title with path-hostile
/// characters replaced.
pub fn document_file_name(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "page.pdf".to_string()
    } else {
        format!("{cleaned}.pdf")
    }
}

/// `dir/name`, or `dir/stem (n).ext` when that already exists.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
        None => (name.to_string(), String::new()),
    };
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{stem} ({n}){ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
