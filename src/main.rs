use anyhow::Result;
use repostats::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let archiver = archiver::Archiver::new(&app_config)?;
    tracing::info!(
        version = version::VERSION,
        repositories = app_config.repositories.len(),
        database = %app_config.database.path,
        "starting"
    );

    let Some(schedule_config) = &app_config.schedule else {
        let summary = archiver.archive_all(&app_config.repositories).await;
        anyhow::ensure!(
            !summary.all_failed(),
            "all {} repositories failed to archive",
            summary.failed
        );
        return Ok(());
    };

    let schedule = scheduler::Schedule::from_config(schedule_config)?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    let archiver = &archiver;
    let repositories = &app_config.repositories;
    scheduler::run(schedule, shutdown_rx, move || async move {
        archiver.archive_all(repositories).await;
    })
    .await;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
