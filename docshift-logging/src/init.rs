use anyhow::Result;
use docshift_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build the level filter for the subscriber
///
/// An explicit override wins, then the configured level, then `RUST_LOG`, then `info`.
pub fn resolve_filter(config: &LoggingConfig, override_level: Option<&str>) -> EnvFilter {
    let explicit = override_level
        .map(str::to_string)
        .or_else(|| config.level.map(|level| level.as_directive().to_string()));

    match explicit {
        Some(level) => EnvFilter::try_new(&level)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Initialize logging from configuration
pub fn init_logging(config: &LoggingConfig, override_level: Option<&str>) -> Result<()> {
    let env_filter = resolve_filter(config, override_level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshift_config::LogLevel;

    #[test]
    fn test_override_wins_over_config() {
        let config = LoggingConfig {
            level: Some(LogLevel::Error),
            ..LoggingConfig::default()
        };
        let filter = resolve_filter(&config, Some("debug"));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_config_level_used_without_override() {
        let config = LoggingConfig {
            level: Some(LogLevel::Warn),
            ..LoggingConfig::default()
        };
        assert_eq!(resolve_filter(&config, None).to_string(), "warn");
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config, Some("info")).is_ok());
        assert!(init_logging(&config, Some("info")).is_ok());
    }
}
