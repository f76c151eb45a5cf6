//! Run configuration.
//!
//! Resolved in layers: built-in defaults, then `COURSEVAULT_*` environment
//! variables, then command-line flags (applied by the CLI).

use crate::archive::barrier::DEFAULT_PARTIAL_SUFFIX;
use crate::auth::InteractiveAuthenticator;
use crate::extraction::Pacing;
use crate::navigation::{PageNavigator, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::renderer::chromium::LaunchOptions;
use crate::renderer::Locator;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_LMS_URL: &str = "https://canvas.mit.edu";
const DEFAULT_SECONDARY_ORIGIN: &str = "https://lms.mitx.mit.edu";
const DEFAULT_SSO_LINK_TEXT: &str = "MIT Students, Faculty, and Staff";
const DEFAULT_SECONDARY_SSO_LINK_TEXT: &str = "Sign in";
const DEFAULT_SECONDARY_SSO_BUTTON_CLASS: &str = "button-saml-mit-kerberos";
const DEFAULT_ARCHIVE_DIR: &str = "data";

/// Everything a run needs to know.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Root of the LMS, e.g. `https://canvas.example.edu`.
    pub lms_url: String,
    /// Where course directories are created.
    pub archive_root: PathBuf,
    /// Where the browser drops downloads and printed pages.
    pub scratch_dir: PathBuf,
    /// Second system whose pages need their own sign-in.
    pub secondary_origin: Option<String>,
    /// Partial text of the single-sign-on link on the login page.
    pub sso_link_text: Option<String>,
    /// Partial text of the secondary system's sign-in link.
    pub secondary_sso_link_text: Option<String>,
    /// Class of the button clicked after the secondary sign-in link.
    pub secondary_sso_button_class: Option<String>,
    /// Wait for the operator on the terminal during sign-in.
    pub prompt_for_sign_in: bool,
    pub headless: bool,
    pub chromium_path: Option<PathBuf>,
    pub poll_interval: Duration,
    pub attempt_timeout: Duration,
    pub barrier_poll_interval: Duration,
    /// Extension of in-progress downloads.
    pub partial_suffix: String,
    pub pacing: Pacing,
    /// Empty the archive root before starting.
    pub clean: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        let archive_root = PathBuf::from(DEFAULT_ARCHIVE_DIR);
        Self {
            lms_url: DEFAULT_LMS_URL.to_string(),
            scratch_dir: archive_root.clone(),
            archive_root,
            secondary_origin: Some(DEFAULT_SECONDARY_ORIGIN.to_string()),
            sso_link_text: Some(DEFAULT_SSO_LINK_TEXT.to_string()),
            secondary_sso_link_text: Some(DEFAULT_SECONDARY_SSO_LINK_TEXT.to_string()),
            secondary_sso_button_class: Some(DEFAULT_SECONDARY_SSO_BUTTON_CLASS.to_string()),
            prompt_for_sign_in: true,
            headless: false,
            chromium_path: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            barrier_poll_interval: Duration::from_secs(1),
            partial_suffix: DEFAULT_PARTIAL_SUFFIX.to_string(),
            pacing: Pacing::default(),
            clean: false,
        }
    }
}

impl ArchiveConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let archive_root = read_env_string("COURSEVAULT_ARCHIVE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.archive_root);
        // The scratch area follows the archive root unless set on its own.
        let scratch_dir = read_env_string("COURSEVAULT_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| archive_root.clone());

        Self {
            lms_url: read_env_string("COURSEVAULT_LMS_URL").unwrap_or(defaults.lms_url),
            archive_root,
            scratch_dir,
            secondary_origin: read_env_optional("COURSEVAULT_SECONDARY_ORIGIN")
                .unwrap_or(defaults.secondary_origin),
            sso_link_text: read_env_optional("COURSEVAULT_SSO_LINK_TEXT")
                .unwrap_or(defaults.sso_link_text),
            secondary_sso_link_text: read_env_optional("COURSEVAULT_SECONDARY_SSO_LINK_TEXT")
                .unwrap_or(defaults.secondary_sso_link_text),
            secondary_sso_button_class: read_env_optional(
                "COURSEVAULT_SECONDARY_SSO_BUTTON_CLASS",
            )
            .unwrap_or(defaults.secondary_sso_button_class),
            prompt_for_sign_in: read_env_bool("COURSEVAULT_PROMPT", defaults.prompt_for_sign_in),
            headless: read_env_bool("COURSEVAULT_HEADLESS", defaults.headless),
            chromium_path: read_env_string("COURSEVAULT_CHROMIUM_PATH").map(PathBuf::from),
            poll_interval: read_env_millis("COURSEVAULT_POLL_MS", defaults.poll_interval),
            attempt_timeout: read_env_millis(
                "COURSEVAULT_ATTEMPT_TIMEOUT_MS",
                defaults.attempt_timeout,
            ),
            barrier_poll_interval: read_env_millis(
                "COURSEVAULT_BARRIER_POLL_MS",
                defaults.barrier_poll_interval,
            ),
            partial_suffix: read_env_string("COURSEVAULT_PARTIAL_SUFFIX")
                .unwrap_or(defaults.partial_suffix),
            pacing: Pacing {
                download_delay: read_env_millis(
                    "COURSEVAULT_DOWNLOAD_DELAY_MS",
                    defaults.pacing.download_delay,
                ),
                module_delay: read_env_millis(
                    "COURSEVAULT_MODULE_DELAY_MS",
                    defaults.pacing.module_delay,
                ),
                external_settle: read_env_millis(
                    "COURSEVAULT_EXTERNAL_SETTLE_MS",
                    defaults.pacing.external_settle,
                ),
            },
            clean: false,
        }
    }

    /// The enrollment listing page.
    pub fn courses_url(&self) -> String {
        format!("{}/courses", self.lms_url.trim_end_matches('/'))
    }

    pub fn navigator(&self) -> PageNavigator {
        PageNavigator::new(self.poll_interval, self.attempt_timeout)
    }

    pub fn secondary_origin_url(&self) -> Result<Option<Url>> {
        self.secondary_origin
            .as_deref()
            .map(|raw| Url::parse(raw).with_context(|| format!("invalid secondary origin: {raw}")))
            .transpose()
    }

    /// Operator sign-in for the primary system, with the secondary system's
    /// own entry controls.
    pub fn authenticator(&self) -> Result<InteractiveAuthenticator> {
        let auth =
            InteractiveAuthenticator::new(self.sso_link_text.clone(), self.prompt_for_sign_in);
        let Some(origin) = self.secondary_origin_url()? else {
            return Ok(auth);
        };
        let mut steps = Vec::new();
        if let Some(text) = &self.secondary_sso_link_text {
            steps.push(Locator::link_text(text));
        }
        if let Some(class) = &self.secondary_sso_button_class {
            steps.push(Locator::class(class));
        }
        Ok(auth.with_origin_steps(origin, steps))
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            executable: self.chromium_path.clone(),
            headless: self.headless,
            scratch_dir: self.scratch_dir.clone(),
        }
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.lms_url).with_context(|| format!("invalid LMS URL: {}", self.lms_url))?;
        self.secondary_origin_url()?;
        if self.poll_interval.is_zero() || self.barrier_poll_interval.is_zero() {
            anyhow::bail!("poll intervals must be greater than zero");
        }
        if self.attempt_timeout < self.poll_interval {
            anyhow::bail!("attempt timeout must be at least one poll interval");
        }
        Ok(())
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `Some(None)` when the variable is set but empty (explicitly disabled).
fn read_env_optional(name: &str) -> Option<Option<String>> {
    std::env::var(name).ok().map(|v| {
        let v = v.trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

fn read_env_bool(name: &str, default_value: bool) -> bool {
    match read_env_string(name).map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default_value,
    }
}

fn read_env_millis(name: &str, default_value: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default_value)
}
