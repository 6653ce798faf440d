//! `meterport fetch` — the full export run.

use crate::config::{Overrides, Settings};
use crate::portal::Portal;
use crate::renderer::chromium::{ChromiumDriver, LaunchOptions};
use crate::renderer::PageDriver;
use crate::{report, session};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Run the export: validate configuration, drive the portal, parse the
/// downloaded report, and write the JSON output. No output file is
/// produced on failure.
pub async fn run(overrides: Overrides) -> Result<()> {
    let settings = Settings::resolve(&overrides)?;
    info!(
        start = %settings.range.start,
        end = %settings.range.end,
        "starting export run"
    );

    info!(headful = settings.headful, "launching browser");
    let driver = ChromiumDriver::launch(&LaunchOptions {
        headful: settings.headful,
        slow_mo: settings.slow_mo,
        chromium_path: settings.chromium_path.clone(),
    })
    .await?;
    let page = driver.new_page(settings.slow_mo).await?;

    if let Some(state) = session::load(&settings.state_file) {
        info!(state_file = %settings.state_file.display(), "restoring previous session state");
        if let Err(e) = page.restore_session(state).await {
            warn!("failed to restore session state, continuing fresh: {e:#}");
        }
    }

    let portal = Portal::new(&page, &settings);
    let outcome = portal.run().await;

    let downloaded = match outcome {
        Ok(downloaded) => downloaded,
        Err(err) => {
            // Capture diagnostic context before giving up; no output file
            // is written on a failed run.
            let error_shot = settings.screenshot_dir.join("error.png");
            if let Err(shot_err) = page.screenshot(&error_shot).await {
                warn!("error screenshot failed: {shot_err:#}");
            }
            let _ = driver.close().await;
            return Err(err);
        }
    };

    info!(
        file = %downloaded.file.display(),
        metering_point_id = %downloaded.metering_point_id,
        "parsing report"
    );
    let rows = report::parse_report(&downloaded.file, &downloaded.metering_point_id)
        .context("failed to parse downloaded report")?;

    report::write_output(&settings.output_path, &rows)?;
    info!(
        rows = rows.len(),
        output = %settings.output_path.display(),
        "report written"
    );

    driver.close().await?;
    Ok(())
}
