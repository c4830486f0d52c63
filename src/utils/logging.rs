use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber.
///
/// Console output is always on. When `log_dir` is set a daily-rolling file
/// layer is added; the returned guard must be held until exit so buffered
/// lines are flushed.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let default_directive = if verbose {
        "pricewatch=debug"
    } else {
        "pricewatch=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))?;

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "pricewatch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            Ok(None)
        }
    }
}
