mod bootstrap;
mod view;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio_stream::StreamExt;
use traffic_core::settings::Settings;
use traffic_core::time_utils::{days_since, resolve_timezone};
use traffic_core::window::parse_day_offsets;
use traffic_data::{Aggregator, JsonlUsageSource};
use traffic_runtime::{
    Credentials, HttpReportClient, RefreshHandle, RefreshLoop, ReportOutcome, Reporter,
};

/// How long the report view waits for the first aggregation.
const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Traffic Monitor v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Days: {}, Timezone: {}",
        settings.view,
        settings.days,
        settings.timezone
    );

    let tz = resolve_timezone(&settings.timezone);
    let data_path = bootstrap::discover_data_path(settings.data_path.as_ref())
        .context("no usage data directory found; pass --data-path")?;
    tracing::info!("Reading usage records from {}", data_path.display());

    let aggregator = Aggregator::new(Arc::new(JsonlUsageSource::new(data_path)), tz);

    match settings.view.as_str() {
        "realtime" => {
            let handle = start_loop(&settings, aggregator);
            let mut updates = handle.subscribe();

            loop {
                tokio::select! {
                    update = updates.next() => {
                        let Some(state) = update else { break };
                        println!("{}", view::render_snapshot(&state, tz));
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Ctrl+C received; stopping refresh loop");
                        break;
                    }
                }
            }

            handle.cancel();
            handle.join().await;
        }

        "hourly" => {
            let days_ago = settings.date.map(|d| days_since(d, Utc::now(), tz));
            let buckets = match &settings.app {
                Some(package) => aggregator.hourly_for_app(package, days_ago)?,
                None => aggregator.hourly_totals(days_ago)?,
            };
            print!("{}", view::render_hourly(&buckets));
        }

        "report" => {
            let Some(n) = settings.send_top else {
                bail!("--send-top is required for the report view");
            };
            let server_url = settings
                .server_url
                .as_deref()
                .context("--server-url is required for the report view")?;
            let (Some(email), Some(password)) = (&settings.email, &settings.password) else {
                bail!("--email and --password (or TRAFFIC_EMAIL/TRAFFIC_PASSWORD) are required");
            };
            let credentials = Credentials::new(email.as_str(), password.as_str());

            let handle = start_loop(&settings, aggregator);
            let mut snapshots = handle.snapshots();
            tokio::time::timeout(
                FIRST_SNAPSHOT_TIMEOUT,
                snapshots.wait_for(|s| s.updated_at.is_some() || s.last_error.is_some()),
            )
            .await
            .context("timed out waiting for traffic data")??;

            let client = Arc::new(HttpReportClient::new(server_url)?);
            let reporter = Reporter::new(client.clone(), client, handle.snapshots());
            let outcome = reporter.send_top(n, &credentials).await;

            handle.cancel();
            handle.join().await;

            match outcome {
                ReportOutcome::Sent(count) => println!("Sent {count} app(s) to {server_url}"),
                failed => bail!("report not delivered: {failed}"),
            }
        }

        unknown => bail!("unknown view mode: {unknown}"),
    }

    Ok(())
}

/// Start the refresh loop over `--days`, switching to `--date` when given.
fn start_loop(settings: &Settings, aggregator: Aggregator) -> RefreshHandle {
    let offsets = match parse_day_offsets(&settings.days) {
        Ok(offsets) => offsets,
        Err(e) => {
            tracing::warn!(error = %e, days = %settings.days, "ignoring --days");
            BTreeSet::new()
        }
    };

    let handle = RefreshLoop::new(aggregator)
        .with_interval(Duration::from_secs(u64::from(settings.refresh_rate)))
        .start(offsets);
    if let Some(date) = settings.date {
        handle.set_explicit_date(date);
    }
    handle
}
