//! dealroom - Loads the signed-in user's inbox and inquiry dashboard

use anyhow::{Context, Result};
use dealroom::config::Settings;
use dealroom::services::InquiryStatsAggregator;
use dealroom::Session;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting dealroom");

    let settings = Settings::load().context("loading settings")?;
    let session = Session::connect(settings).context("building backend client")?;

    let conversations = session
        .store()
        .load_conversations()
        .await
        .context("loading conversations")?;

    match session.stats().refresh().await {
        Ok(snapshot) => {
            let stats = InquiryStatsAggregator::new(&snapshot);
            let severity = stats.response_time_severity();
            tracing::info!(
                inquiries = snapshot.overview.total,
                avg_response_hours = snapshot.performance.avg_response_time_hours,
                severity = ?severity,
                color = severity.color(),
                "Inquiry dashboard loaded"
            );
        }
        Err(e) => tracing::warn!(error = %e, "Inquiry dashboard unavailable"),
    }

    tracing::info!(
        conversations,
        total_unread = session.store().total_unread(),
        "Inbox loaded"
    );

    session.close();
    Ok(())
}
