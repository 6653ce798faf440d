//! Caruna Plus site flow.
//!
//! The linear sequence of portal interactions: cookie-consent dismissal,
//! login detection (a visibility race between the dashboard menu and the
//! login form), login with storage-state persistence, navigation to the
//! energy-monitoring view, hourly-report configuration, and the report
//! download itself. Milestone screenshots are captured along the way.

use crate::config::Settings;
use crate::renderer::{Locator, PageDriver};
use crate::session;
use crate::visibility::wait_for_any_visible;
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub const PORTAL_URL: &str = "https://plus.caruna.fi/";
pub const ENERGY_MONITORING_URL: &str = "https://plus.caruna.fi/person/energy-monitoring";

const COOKIE_OVERLAY: &str = ".onetrust-pc-dark-filter";
const COOKIE_ONLY_NECESSARY: &str = "Vain välttämättömät";
const DASHBOARD_MENU: &str = r#"[data-test="click_menuEnergyMonitoring"]"#;
const LOGIN_PANEL: &str = ".loginPanelContent";
const USERNAME_INPUT: &str = "#ttqusername";
const PASSWORD_INPUT: &str = "#userPassword";
const LOGIN_LINK_TEXT: &str = "Kirjaudu";
const LOGOUT_LINK: &str = r#"[data-test="click_logout"]"#;
const METERING_POINT_INPUT: &str = "input[name=meteringPointId]";
const DOWNLOAD_REPORT_BUTTON: &str = r#"[data-test="click_downloadReport"]"#;
const HOURLY_REPORT_HEADING: &str = "Tuntiraportti";
const REPORT_DIALOG_TITLE: &str = r#"[data-test="energyReportDialog"]>div:nth-child(1)"#;
const FROM_DATE_PICKER: &str = r#"[data-test="date_reportFromDate"]"#;
const TO_DATE_PICKER: &str = r#"[data-test="date_reportToDate"]"#;
const ENERGY_REPORT_DOWNLOAD: &str = r#"[data-test="click_energyReport"]"#;

const COOKIE_DIALOG_TIMEOUT: Duration = Duration::from_secs(2);
const DATEPICKER_HIDE_TIMEOUT: Duration = Duration::from_secs(1);
const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// The downloaded report, before parsing.
pub struct DownloadedReport {
    pub metering_point_id: String,
    pub file: PathBuf,
}

/// Drives one portal run on a live page.
pub struct Portal<'a> {
    page: &'a dyn PageDriver,
    settings: &'a Settings,
}

impl<'a> Portal<'a> {
    pub fn new(page: &'a dyn PageDriver, settings: &'a Settings) -> Self {
        Self { page, settings }
    }

    /// Run the full flow and return the downloaded report file.
    pub async fn run(&self) -> Result<DownloadedReport> {
        info!(url = PORTAL_URL, "navigating to portal");
        self.page
            .navigate(PORTAL_URL, self.settings.nav_timeout)
            .await?;
        self.shot("post-goto-portal.png").await;

        self.dismiss_cookie_dialog().await?;
        self.ensure_logged_in().await?;

        info!(url = ENERGY_MONITORING_URL, "navigating to energy monitoring view");
        self.page
            .navigate(ENERGY_MONITORING_URL, self.settings.nav_timeout)
            .await?;

        self.download_report().await
    }

    /// Best-effort milestone screenshot; failures are logged, not fatal.
    async fn shot(&self, name: &str) {
        let path = self.settings.screenshot_dir.join(name);
        if let Err(e) = self.page.screenshot(&path).await {
            warn!(name, "screenshot failed: {e:#}");
        }
    }

    /// Dismiss the OneTrust cookie dialog if it shows up. Its absence is
    /// not an error.
    async fn dismiss_cookie_dialog(&self) -> Result<()> {
        self.shot("pre-cookie-check.png").await;
        info!("looking for cookie dialog");
        match self
            .page
            .wait_visible(COOKIE_OVERLAY, COOKIE_DIALOG_TIMEOUT)
            .await
        {
            Ok(()) => {
                self.shot("cookie-check-is-visible.png").await;
                info!("selecting only necessary cookies");
                self.page.click_text("button", COOKIE_ONLY_NECESSARY).await?;
                info!("waiting for cookie dialog to disappear");
                self.page
                    .wait_hidden(COOKIE_OVERLAY, COOKIE_DIALOG_TIMEOUT)
                    .await?;
            }
            Err(_) => {
                self.shot("cookie-check-timed-out.png").await;
                info!("no cookie dialog, continuing");
            }
        }
        Ok(())
    }

    /// Wait for the application to land in either the dashboard or the
    /// login view, and perform a login when required.
    async fn ensure_logged_in(&self) -> Result<()> {
        info!("waiting for application to load into login or dashboard view");
        let targets = [
            Locator::new(self.page, DASHBOARD_MENU),
            Locator::new(self.page, LOGIN_PANEL),
        ];
        let winner = wait_for_any_visible(&targets, self.settings.nav_timeout)
            .await
            .context("neither dashboard nor login form appeared")?;

        if targets[winner].selector() == DASHBOARD_MENU {
            info!("already logged in");
            self.shot("user-is-logged-in.png").await;
            return Ok(());
        }

        info!("login required");
        self.shot("user-is-not-logged-in.png").await;
        self.login().await
    }

    async fn login(&self) -> Result<()> {
        self.page
            .wait_visible(USERNAME_INPUT, self.settings.nav_timeout)
            .await?;

        info!("filling in credentials");
        self.page
            .fill(USERNAME_INPUT, &self.settings.username)
            .await?;
        self.page
            .fill(PASSWORD_INPUT, &self.settings.password)
            .await?;

        info!("clicking login button");
        self.page.click_text("a", LOGIN_LINK_TEXT).await?;

        info!("waiting for logout link to appear");
        self.page.wait_visible(LOGOUT_LINK, LOGIN_TIMEOUT).await?;

        info!(state_file = %self.settings.state_file.display(), "saving session state");
        let state = self.page.session_state().await?;
        session::save(&self.settings.state_file, &state)?;
        self.shot("post-login.png").await;
        Ok(())
    }

    /// Configure and download the hourly report.
    async fn download_report(&self) -> Result<DownloadedReport> {
        info!("reading metering point id");
        let metering_point_id = self.page.input_value(METERING_POINT_INPUT).await?;
        info!(%metering_point_id, "got metering point id");

        info!("opening report dialog");
        self.page.click(DOWNLOAD_REPORT_BUTTON).await?;

        info!("picking hour based report");
        self.page
            .click_text("h1, h2, h3, h4, h5, h6", HOURLY_REPORT_HEADING)
            .await?;

        info!(start = %self.settings.range.start, "setting start date");
        self.fill_date(FROM_DATE_PICKER, self.settings.range.start)
            .await?;
        info!(end = %self.settings.range.end, "setting end date");
        self.fill_date(TO_DATE_PICKER, self.settings.range.end)
            .await?;

        // Clicking the dialog title makes the open datepickers disappear.
        self.page.click(REPORT_DIALOG_TITLE).await?;
        for picker in [FROM_DATE_PICKER, TO_DATE_PICKER] {
            self.page
                .wait_hidden(
                    &format!("{picker} .react-calendar"),
                    DATEPICKER_HIDE_TIMEOUT,
                )
                .await?;
        }

        info!(dir = %self.settings.download_dir.display(), "watching for download");
        self.page
            .allow_downloads(&self.settings.download_dir)
            .await?;

        info!("clicking download link");
        self.page.click(ENERGY_REPORT_DOWNLOAD).await?;

        let file = self
            .page
            .wait_for_download(&self.settings.download_dir, DOWNLOAD_TIMEOUT)
            .await?;
        info!(file = %file.display(), "download finished");

        Ok(DownloadedReport {
            metering_point_id,
            file,
        })
    }

    /// The pickers take day, month and year as separate inputs; month is
    /// 1-based.
    async fn fill_date(&self, picker: &str, date: NaiveDate) -> Result<()> {
        let fields = [
            ("day", date.day().to_string()),
            ("month", date.month().to_string()),
            ("year", date.year().to_string()),
        ];
        for (field, value) in fields {
            self.page
                .fill(&format!("{picker} input[name=\"{field}\"]"), &value)
                .await?;
        }
        Ok(())
    }
}
