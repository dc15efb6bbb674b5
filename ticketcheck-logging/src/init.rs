use anyhow::Result;
use ticketcheck_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

fn non_blank(s: &str) -> Option<&str> {
    Some(s.trim()).filter(|s| !s.is_empty())
}

/// Filter directive in effect: an explicit override wins, then `RUST_LOG`,
/// then the configured level.
pub fn filter_directive(
    config: &LoggingConfig,
    level_override: Option<&str>,
    rust_log: Option<&str>,
) -> String {
    level_override
        .and_then(non_blank)
        .or_else(|| rust_log.and_then(non_blank))
        .map(str::to_string)
        .unwrap_or_else(|| config.level.as_str().to_string())
}

/// Initialize tracing from the logging configuration.
///
/// Logs go to stderr so reports on stdout stay machine-readable. Calling
/// this again after a subscriber is installed is a no-op.
pub fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(config, level_override, rust_log.as_deref());

    let env_filter = EnvFilter::try_new(&directive)
        .or_else(|_| EnvFilter::try_new(config.level.as_str()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
