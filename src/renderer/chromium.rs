//! Chromium-based page driver using chromiumoxide.

use super::PageDriver;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Interval between visibility/download polls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. METERPORT_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("METERPORT_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.meterport/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".meterport/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".meterport/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".meterport/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".meterport/chromium/chrome-linux64/chrome"),
                home.join(".meterport/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    if let Ok(path) = which::which("google-chrome") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium-browser") {
        return Some(path);
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launch options for the Chromium driver.
pub struct LaunchOptions {
    /// Run with a visible window instead of headless.
    pub headful: bool,
    /// Delay inserted before each interaction (debug aid).
    pub slow_mo: Duration,
    /// Explicit browser binary, overriding the resolution chain.
    pub chromium_path: Option<PathBuf>,
}

/// Chromium browser instance.
pub struct ChromiumDriver {
    browser: Browser,
}

impl ChromiumDriver {
    /// Launch a Chromium instance, headless unless configured otherwise.
    pub async fn launch(opts: &LaunchOptions) -> Result<Self> {
        let chrome_path = match &opts.chromium_path {
            Some(path) => path.clone(),
            None => find_chromium()
                .context("Chromium not found. Install Chrome or set METERPORT_CHROMIUM_PATH.")?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        builder = if opts.headful {
            builder.with_head()
        } else {
            builder.arg("--headless=new")
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the CDP handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self { browser })
    }

    /// Open a fresh page (tab).
    pub async fn new_page(&self, slow_mo: Duration) -> Result<ChromiumPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        Ok(ChromiumPage { page, slow_mo })
    }

    /// Close the browser and wait for the process to exit.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await.context("failed to close browser")?;
        let _ = self.browser.wait().await;
        Ok(())
    }
}

/// A single Chromium page.
pub struct ChromiumPage {
    page: Page,
    slow_mo: Duration,
}

impl ChromiumPage {
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS evaluation failed")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn evaluate_bool(&self, script: &str) -> Result<bool> {
        Ok(self.evaluate(script).await?.as_bool().unwrap_or(false))
    }

    async fn pace(&self) {
        if !self.slow_mo.is_zero() {
            tokio::time::sleep(self.slow_mo).await;
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;
        match result {
            Ok(Ok(_response)) => {
                // Wait for the load to settle; navigation errors here are
                // non-fatal (the page may already be interactive).
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!(
                "navigation to {url} timed out after {}ms",
                timeout.as_millis()
            ),
        }
    }

    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.evaluate_bool(&is_visible_script(selector)).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!(
                    "selector {selector:?} did not become visible within {}ms",
                    timeout.as_millis()
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_hidden(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.evaluate_bool(&is_visible_script(selector)).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!(
                    "selector {selector:?} still visible after {}ms",
                    timeout.as_millis()
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.pace().await;
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                if (el) {{ el.click(); return {{ success: true }}; }}
                return {{ success: false }};
            }})()"#,
            sanitize_js_string(selector)
        );
        let result = self.evaluate(&script).await?;
        if !clicked(&result) {
            bail!("no element matching {selector:?} to click");
        }
        Ok(())
    }

    async fn click_text(&self, selector: &str, text: &str) -> Result<()> {
        self.pace().await;
        let script = format!(
            r#"(() => {{
                const els = [...document.querySelectorAll('{}')];
                const el = els.find(e => (e.textContent || '').trim().includes('{}'));
                if (el) {{ el.click(); return {{ success: true }}; }}
                return {{ success: false }};
            }})()"#,
            sanitize_js_string(selector),
            sanitize_js_string(text)
        );
        let result = self.evaluate(&script).await?;
        if !clicked(&result) {
            bail!("no element matching {selector:?} with text {text:?} to click");
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.pace().await;
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                if (el) {{
                    el.value = '{}';
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    return {{ success: true }};
                }}
                return {{ success: false }};
            }})()"#,
            sanitize_js_string(selector),
            sanitize_js_string(value)
        );
        let result = self.evaluate(&script).await?;
        if !clicked(&result) {
            bail!("no element matching {selector:?} to fill");
        }
        Ok(())
    }

    async fn input_value(&self, selector: &str) -> Result<String> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                return el ? el.value : null;
            }})()"#,
            sanitize_js_string(selector)
        );
        match self.evaluate(&script).await?.as_str() {
            Some(value) => Ok(value.to_string()),
            None => bail!("no input element matching {selector:?}"),
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.page
            .save_screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
                path,
            )
            .await
            .with_context(|| format!("failed to capture screenshot to {}", path.display()))?;
        Ok(())
    }

    async fn session_state(&self) -> Result<serde_json::Value> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .context("failed to read cookies")?;
        Ok(serde_json::json!({ "cookies": cookies }))
    }

    async fn restore_session(&self, state: serde_json::Value) -> Result<()> {
        let cookies: Vec<CookieParam> = match state.get("cookies") {
            Some(list) => serde_json::from_value(list.clone())
                .context("malformed session state: bad cookie list")?,
            None => return Ok(()),
        };
        if cookies.is_empty() {
            return Ok(());
        }
        self.page
            .set_cookies(cookies)
            .await
            .context("failed to restore session cookies")?;
        Ok(())
    }

    async fn allow_downloads(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create download dir {}", dir.display()))?;
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().to_string())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build download behavior params: {e}"))?;
        self.page
            .execute(params)
            .await
            .context("failed to enable downloads")?;
        Ok(())
    }

    async fn wait_for_download(&self, dir: &Path, timeout: Duration) -> Result<PathBuf> {
        let deadline = Instant::now() + timeout;
        // A download is complete when its file is no longer marked
        // in-progress and its size has been stable across two polls.
        let mut last_sizes: HashMap<PathBuf, u64> = HashMap::new();
        loop {
            for entry in std::fs::read_dir(dir)
                .with_context(|| format!("failed to read download dir {}", dir.display()))?
            {
                let entry = entry?;
                let path = entry.path();
                if !path.is_file() || is_in_progress(&path) {
                    continue;
                }
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                if size > 0 && last_sizes.get(&path) == Some(&size) {
                    return Ok(path);
                }
                last_sizes.insert(path, size);
            }
            if Instant::now() >= deadline {
                bail!("no download appeared within {}ms", timeout.as_millis());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn clicked(result: &serde_json::Value) -> bool {
    result
        .as_object()
        .and_then(|o| o.get("success"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn is_in_progress(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("crdownload") | Some("tmp")
    )
}

/// Visibility predicate: element present, laid out, and not hidden by CSS.
fn is_visible_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector('{}');
            if (!el) return false;
            const style = window.getComputedStyle(el);
            if (style.display === 'none' || style.visibility === 'hidden') return false;
            const rect = el.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0;
        }})()"#,
        sanitize_js_string(selector)
    )
}

/// Sanitize a string for safe injection into a JavaScript string literal.
///
/// Escapes all characters that could break out of a JS string context:
/// backslashes, quotes, backticks, newlines, tabs, angle brackets (to
/// prevent `</script>` injection); null bytes are stripped.
fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}
