//! Scripted in-memory browser session for integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use coursevault_runtime::config::ArchiveConfig;
use coursevault_runtime::extraction::Pacing;
use coursevault_runtime::renderer::chromium::{document_file_name, unique_path};
use coursevault_runtime::renderer::{BrowserSession, ElementRef, Locator, WindowHandle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LMS: &str = "https://lms.test";
pub const PRIMARY_WINDOW: &str = "main";

/// Settings with every delay shrunk to test scale.
pub fn test_config(archive_root: &Path) -> ArchiveConfig {
    ArchiveConfig {
        lms_url: LMS.to_string(),
        archive_root: archive_root.to_path_buf(),
        scratch_dir: archive_root.to_path_buf(),
        secondary_origin: Some("https://learn.test".to_string()),
        sso_link_text: None,
        prompt_for_sign_in: false,
        poll_interval: Duration::from_millis(5),
        attempt_timeout: Duration::from_millis(60),
        barrier_poll_interval: Duration::from_millis(5),
        pacing: Pacing {
            download_delay: Duration::ZERO,
            module_delay: Duration::ZERO,
            external_settle: Duration::ZERO,
        },
        ..ArchiveConfig::default()
    }
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    text: String,
    href: Option<String>,
    visible: bool,
    frame_ready: bool,
    children: Vec<FakeElement>,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            id: None,
            classes: Vec::new(),
            text: String::new(),
            href: None,
            visible: true,
            frame_ready: false,
            children: Vec::new(),
        }
    }

    pub fn div_id(id: &str) -> Self {
        Self::new("div").id(id)
    }

    pub fn div_class(class: &str) -> Self {
        Self::new("div").class(class)
    }

    pub fn link(href: &str) -> Self {
        Self::new("a").href(href)
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, classes: &str) -> Self {
        self.classes
            .extend(classes.split_whitespace().map(str::to_string));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn loaded_frame(mut self) -> Self {
        self.frame_ready = true;
        self
    }

    pub fn child(mut self, child: FakeElement) -> Self {
        self.children.push(child);
        self
    }

    fn matches(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Id(id) => self.id.as_deref() == Some(id.as_str()),
            Locator::Class(class) => self.classes.iter().any(|c| c == class),
            Locator::Tag(tag) => self.tag == *tag,
            Locator::PartialLinkText(text) => self.tag == "a" && self.text.contains(text.as_str()),
            Locator::Css(css) => self.matches_simple_css(css),
        }
    }

    /// `#id`, `.class`, `tag` or `tag.class`.
    fn matches_simple_css(&self, css: &str) -> bool {
        if let Some(id) = css.strip_prefix('#') {
            return self.id.as_deref() == Some(id);
        }
        match css.split_once('.') {
            Some((tag, class)) => {
                (tag.is_empty() || self.tag == tag) && self.classes.iter().any(|c| c == class)
            }
            None => self.tag == css,
        }
    }
}

/// A page the fake browser can land on.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub title: String,
    pub elements: Vec<FakeElement>,
    /// Loading the page spawns a second window.
    pub opens_window: bool,
}

impl FakePage {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn with(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn opening_window(mut self) -> Self {
        self.opens_window = true;
        self
    }

    /// An LMS page that flashed "not available".
    pub fn not_available() -> Self {
        Self::new("Page Not Found")
            .with(FakeElement::div_id("flash_message_holder").child(FakeElement::new("div")))
    }
}

pub struct FakeSession {
    pages: HashMap<String, FakePage>,
    /// Location -> (remaining detours, detour target).
    redirects: HashMap<String, (u32, String)>,
    /// Download location -> file name written to the scratch directory.
    downloads: HashMap<String, String>,
    scratch_dir: PathBuf,
    current: String,
    in_frame: bool,
    handles: Vec<Vec<usize>>,
    windows: Vec<String>,
    current_window: String,
    opened_windows: u32,
    /// Queries left to fail, as a document still being replaced would.
    failing_queries: u32,
    /// Every `goto` and link click, in order.
    pub visits: Vec<String>,
    /// Every download location triggered, in order.
    pub downloaded: Vec<String>,
    /// Location of every printed page.
    pub printed: Vec<String>,
}

impl FakeSession {
    pub fn new(scratch_dir: &Path) -> Self {
        Self {
            pages: HashMap::new(),
            redirects: HashMap::new(),
            downloads: HashMap::new(),
            scratch_dir: scratch_dir.to_path_buf(),
            current: "about:blank".to_string(),
            in_frame: false,
            handles: Vec::new(),
            windows: vec![PRIMARY_WINDOW.to_string()],
            current_window: PRIMARY_WINDOW.to_string(),
            opened_windows: 0,
            failing_queries: 0,
            visits: Vec::new(),
            downloaded: Vec::new(),
            printed: Vec::new(),
        }
    }

    pub fn page(&mut self, location: &str, page: FakePage) -> &mut Self {
        self.pages.insert(location.to_string(), page);
        self
    }

    /// The first `times` loads of `location` end up on `to` instead.
    pub fn redirect(&mut self, location: &str, times: u32, to: &str) -> &mut Self {
        self.redirects
            .insert(location.to_string(), (times, to.to_string()));
        self
    }

    pub fn download(&mut self, location: &str, file_name: &str) -> &mut Self {
        self.downloads
            .insert(location.to_string(), file_name.to_string());
        self
    }

    /// The next `times` element queries return an error.
    pub fn fail_queries(&mut self, times: u32) -> &mut Self {
        self.failing_queries = times;
        self
    }

    fn query_error(&mut self, locator: &Locator) -> Result<()> {
        if self.failing_queries > 0 {
            self.failing_queries -= 1;
            bail!("failed to query {locator}: document is being replaced");
        }
        Ok(())
    }

    pub fn windows(&self) -> &[String] {
        &self.windows
    }

    pub fn current_window(&self) -> &str {
        &self.current_window
    }

    pub fn visit_count(&self, location: &str) -> usize {
        self.visits.iter().filter(|v| *v == location).count()
    }

    fn land(&mut self, location: &str) {
        self.current = location.to_string();
        self.in_frame = false;
        self.handles.clear();
        if self.pages.get(location).is_some_and(|p| p.opens_window) {
            self.opened_windows += 1;
            self.windows.push(format!("popup-{}", self.opened_windows));
        }
    }

    fn start_download(&mut self, location: &str) -> Result<bool> {
        let Some(name) = self.downloads.get(location).cloned() else {
            return Ok(false);
        };
        self.downloaded.push(location.to_string());
        std::fs::write(self.scratch_dir.join(name), location.as_bytes())?;
        Ok(true)
    }

    fn resolve(&self, element: ElementRef) -> Result<&FakeElement> {
        let Some(path) = self.handles.get(element.0 as usize) else {
            bail!("stale element handle {}", element.0);
        };
        let Some(page) = self.pages.get(&self.current) else {
            bail!("no document at {}", self.current);
        };
        let mut found: Option<&FakeElement> = None;
        let mut level = &page.elements;
        for &index in path {
            let Some(next) = level.get(index) else {
                bail!("stale element handle {}", element.0);
            };
            level = &next.children;
            found = Some(next);
        }
        match found {
            Some(element) => Ok(element),
            None => bail!("empty element path"),
        }
    }

    fn register(&mut self, paths: Vec<Vec<usize>>) -> Vec<ElementRef> {
        paths
            .into_iter()
            .map(|path| {
                self.handles.push(path);
                ElementRef((self.handles.len() - 1) as u64)
            })
            .collect()
    }
}

fn collect_paths(
    elements: &[FakeElement],
    prefix: &[usize],
    locator: &Locator,
    out: &mut Vec<Vec<usize>>,
) {
    for (index, element) in elements.iter().enumerate() {
        let mut path = prefix.to_vec();
        path.push(index);
        if element.matches(locator) {
            out.push(path.clone());
        }
        collect_paths(&element.children, &path, locator, out);
    }
}

/// Paths of every match under `elements`; understands `<simple> > *`.
fn find_paths(elements: &[FakeElement], prefix: &[usize], locator: &Locator) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if let Locator::Css(css) = locator {
        if let Some(parent) = css.strip_suffix(" > *") {
            let mut parents = Vec::new();
            collect_paths(elements, prefix, &Locator::css(parent), &mut parents);
            for parent_path in parents {
                let mut level = elements;
                let mut node = None;
                for &index in &parent_path[prefix.len()..] {
                    node = level.get(index);
                    level = node.map(|n| n.children.as_slice()).unwrap_or(&[]);
                }
                if let Some(node) = node {
                    for child in 0..node.children.len() {
                        let mut path = parent_path.clone();
                        path.push(child);
                        out.push(path);
                    }
                }
            }
            return out;
        }
    }
    collect_paths(elements, prefix, locator, &mut out);
    out
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.visits.push(url.to_string());
        if let Some((remaining, to)) = self.redirects.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                let to = to.clone();
                self.land(&to);
                return Ok(());
            }
        }
        // The browser stays on the current document for downloads.
        if self.start_download(url)? {
            return Ok(());
        }
        self.land(url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.current.clone())
    }

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<ElementRef>> {
        self.query_error(locator)?;
        let paths = match self.pages.get(&self.current) {
            Some(page) => find_paths(&page.elements, &[], locator),
            None => Vec::new(),
        };
        Ok(self.register(paths))
    }

    async fn find_within(
        &mut self,
        parent: ElementRef,
        locator: &Locator,
    ) -> Result<Vec<ElementRef>> {
        self.query_error(locator)?;
        let Some(prefix) = self.handles.get(parent.0 as usize).cloned() else {
            bail!("stale element handle {}", parent.0);
        };
        let paths = find_paths(&self.resolve(parent)?.children, &prefix, locator);
        Ok(self.register(paths))
    }

    async fn is_visible(&self, element: ElementRef) -> Result<bool> {
        Ok(self.resolve(element)?.visible)
    }

    async fn attribute(&self, element: ElementRef, name: &str) -> Result<Option<String>> {
        let element = self.resolve(element)?;
        Ok(match name {
            "href" => element.href.clone(),
            "innerText" => Some(element.text.clone()),
            "id" => element.id.clone(),
            "class" => Some(element.classes.join(" ")),
            _ => None,
        })
    }

    async fn click(&mut self, element: ElementRef) -> Result<()> {
        let Some(href) = self.resolve(element)?.href.clone() else {
            return Ok(());
        };
        if !self.start_download(&href)? {
            self.visits.push(href.clone());
            self.land(&href);
        }
        Ok(())
    }

    async fn enter_frame(&mut self, locator: &Locator) -> Result<bool> {
        self.query_error(locator)?;
        let mut paths = Vec::new();
        if let Some(page) = self.pages.get(&self.current) {
            collect_paths(&page.elements, &[], locator, &mut paths);
        }
        let mut ready = false;
        for frame in self.register(paths) {
            if self.resolve(frame)?.frame_ready {
                ready = true;
                break;
            }
        }
        if ready {
            self.in_frame = true;
        }
        Ok(ready)
    }

    async fn leave_frame(&mut self) -> Result<()> {
        self.in_frame = false;
        Ok(())
    }

    async fn print_page(&mut self) -> Result<()> {
        let title = self
            .pages
            .get(&self.current)
            .map(|p| p.title.clone())
            .unwrap_or_default();
        let path = unique_path(&self.scratch_dir, &document_file_name(&title));
        std::fs::write(&path, b"%PDF-1.4")?;
        let printed = if self.in_frame {
            format!("{}#frame", self.current)
        } else {
            self.current.clone()
        };
        self.printed.push(printed);
        Ok(())
    }

    async fn window_handles(&mut self) -> Result<Vec<WindowHandle>> {
        Ok(self.windows.iter().cloned().map(WindowHandle).collect())
    }

    async fn switch_window(&mut self, handle: &WindowHandle) -> Result<()> {
        if !self.windows.contains(&handle.0) {
            bail!("no such window {}", handle.0);
        }
        self.current_window = handle.0.clone();
        Ok(())
    }

    async fn close_window(&mut self) -> Result<()> {
        if self.current_window == PRIMARY_WINDOW {
            bail!("refusing to close the primary window");
        }
        let closing = self.current_window.clone();
        self.windows.retain(|w| *w != closing);
        self.current_window = PRIMARY_WINDOW.to_string();
        Ok(())
    }
}
