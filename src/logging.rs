//! Tracing setup: journald when available on Linux, daily-rolled files
//! otherwise.

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging. The level filter comes from the `CROWDPIX_LOG`
/// environment variable and defaults to `info`; file output lands in
/// `log_dir` when journald is not an option.
pub fn init(log_dir: &Path) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env("CROWDPIX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .init();

            tracing::info!("logging to journald");
            return Ok(());
        }
    }

    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "crowdpix.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer guard must live as long as the process; init() runs once.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!("logging to {}", log_dir.display());
    Ok(())
}
