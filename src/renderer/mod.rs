//! Browser driver abstraction.
//!
//! Defines the [`PageDriver`] trait that abstracts over the browser engine
//! (currently Chromium via chromiumoxide). The portal flow only talks to
//! this trait, so test code can drive it with a scripted page.

pub mod chromium;

use crate::visibility::VisibleTarget;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A live page the portal flow can drive.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL and wait for the load, bounded by `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait until the selector matches a visible element.
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Wait until the selector matches nothing, or only hidden elements.
    async fn wait_hidden(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Click the first element matching the selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Click the first element matching the selector whose text content
    /// contains `text`.
    async fn click_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Fill an input and dispatch an `input` event so reactive frontends
    /// observe the change.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Read the current value of an input element.
    async fn input_value(&self, selector: &str) -> Result<String>;

    /// Capture a PNG screenshot of the page.
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Snapshot the session state (cookies) as an opaque JSON document.
    async fn session_state(&self) -> Result<serde_json::Value>;

    /// Restore a session state snapshot previously taken with
    /// [`PageDriver::session_state`].
    async fn restore_session(&self, state: serde_json::Value) -> Result<()>;

    /// Route downloads triggered by this page into `dir`.
    async fn allow_downloads(&self, dir: &Path) -> Result<()>;

    /// Wait for a download routed into `dir` to finish and return the
    /// downloaded file's path.
    async fn wait_for_download(&self, dir: &Path, timeout: Duration) -> Result<PathBuf>;
}

/// A selector bound to a page, pollable for visibility.
///
/// Bridges [`PageDriver`] selectors into the visibility race.
pub struct Locator<'p> {
    page: &'p dyn PageDriver,
    selector: &'p str,
}

impl<'p> Locator<'p> {
    pub fn new(page: &'p dyn PageDriver, selector: &'p str) -> Self {
        Self { page, selector }
    }

    pub fn selector(&self) -> &str {
        self.selector
    }
}

#[async_trait]
impl VisibleTarget for Locator<'_> {
    async fn wait_until_visible(&self, timeout: Duration) -> Result<()> {
        self.page.wait_visible(self.selector, timeout).await
    }
}
