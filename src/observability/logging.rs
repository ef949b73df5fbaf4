use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system with both console and file output.
pub fn init_logging() {
    // Ensure logs directory exists
    let _ = fs::create_dir_all("logs");

    // Daily rotation, written off the hot path
    let file_appender = tracing_appender::rolling::daily("logs", "wage_recon.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Structured JSON for the log files
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    // Human-readable console output on stderr so stdout stays clean for reports
    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    // Respect RUST_LOG if set; otherwise info for our crate
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wage_recon=info,warn"));

    // try_init: tests and repeated calls must not panic on an installed subscriber
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    // Keep the guard alive for the life of the process so logs are flushed
    std::mem::forget(guard);
}
