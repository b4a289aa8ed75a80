//! mcpanel Daemon - game server supervisor

use anyhow::Result;
use mcpanel_core::{constants, PanelConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod backup;
mod daemon;
mod decisions;
mod dispatcher;
mod history;
mod registry;
mod scheduler;
mod status;
mod supervisor;
mod transfer;
mod watchdog;

#[cfg(test)]
mod test_support;

use daemon::Daemon;

#[tokio::main]
async fn main() -> Result<()> {
    let config = PanelConfig::load()?;

    // Ensure home and log directories exist
    let home = constants::mcpanel_home();
    if !home.exists() {
        std::fs::create_dir_all(&home)?;
    }
    mcpanel_logs::ensure_log_dir(&config.logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(&config.logs_dir, "mcpaneld.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcpaneld=info,mcpanel_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    info!("mcpanel daemon starting...");
    let daemon = Daemon::new(config).await?;

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let outcome = tokio::select! {
        result = daemon.run() => result,
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
            Ok(())
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
            Ok(())
        }
    };

    daemon.shutdown().await;

    if let Err(e) = outcome {
        error!("Daemon error: {}", e);
        return Err(e.into());
    }

    info!("Daemon shutdown complete");
    Ok(())
}
