//! Diagnostic logging setup.
//!
//! Output goes to a file when one is configured, so log lines never mix
//! with the remote session on a raw-mode terminal. Otherwise it goes to
//! stderr, which with the default `warn` filter stays quiet.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Filter used when none is configured.
pub const DEFAULT_FILTER: &str = "warn";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directives.
    pub filter: String,
    /// Append log lines to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    /// Line format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            log_file: None,
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// The filter, falling back to [`DEFAULT_FILTER`] when the directives
    /// do not parse.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init(config: &LoggingConfig) -> io::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_target(false);

    let result = match (&config.log_file, config.format) {
        (Some(path), format) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Text => builder.try_init(),
                LogFormat::Json => builder.json().try_init(),
            }
        }
        (None, LogFormat::Text) => builder.with_writer(io::stderr).try_init(),
        (None, LogFormat::Json) => builder.with_writer(io::stderr).json().try_init(),
    };

    result.map_err(io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_falls_back() {
        let config = LoggingConfig {
            filter: "shellhop=[[[".into(),
            ..LoggingConfig::default()
        };
        assert_eq!(config.env_filter().to_string(), DEFAULT_FILTER);
    }

    #[test]
    fn unwritable_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            log_file: Some(dir.path().join("missing/dir/hop.log")),
            ..LoggingConfig::default()
        };
        assert!(init(&config).is_err());
    }
}
