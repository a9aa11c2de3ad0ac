use retention_purge::app_state::AppState;
use retention_purge::config::Settings;
use retention_purge::prelude::*;
use retention_purge::scheduler::{spawn_scheduler, CronTrigger};
use retention_purge::server::run_server;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("Starting retention purge service");

    let settings = Settings::new()?;
    let app_state = AppState::from_settings(&settings).await?;
    let trigger = &settings.trigger;

    if trigger.schedule.is_none() && trigger.http.is_none() {
        info!("No trigger configured, running once");
        let report = app_state.job.run().await?;
        if !report.is_clean() {
            warn!(
                objects_failed = report.storage.failed.len(),
                records_failed = report.records.failed.len(),
                "Run completed with failures"
            );
        }
        return Ok(());
    }

    let scheduler = match &trigger.schedule {
        Some(schedule) => {
            let cron = CronTrigger::new(&schedule.cron, schedule.timezone)?;
            Some(spawn_scheduler(app_state.job.clone(), cron, schedule.run_on_start))
        }
        None => None,
    };

    match &trigger.http {
        Some(http) => {
            tokio::select! {
                result = run_server(app_state.clone(), http) => {
                    if let Err(e) = &result {
                        error!(error = %e, "HTTP trigger stopped");
                    }
                    result?;
                }
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Received Ctrl-C");
        }
    }

    if let Some((handle, shutdown_tx)) = scheduler {
        let _ = shutdown_tx.send(true);
        let _ = handle.await;
    }

    info!("Retention purge service stopped");
    Ok(())
}
