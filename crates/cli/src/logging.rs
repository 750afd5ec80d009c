use quotedesk_core::config::{LogFormat, LoggingConfig};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Output goes to stderr so rendered quotes on
/// stdout can be piped or copied untouched. `RUST_LOG` narrows the level further.
pub fn init_logging(config: &LoggingConfig) {
    let log_level = config.level.parse::<Level>().unwrap_or(Level::WARN);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_ascii_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when commands run inside tests.
    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
