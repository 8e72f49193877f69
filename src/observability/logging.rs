//! Structured logging configuration.

use crate::config::LoggingSettings;
use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidInput(format!(
                "unknown log format '{other}' (expected pretty or json)"
            ))),
        }
    }
}

/// Resolved logging configuration ready for [`super::init`].
#[derive(Debug)]
pub struct LoggingConfig {
    /// Event filter.
    pub filter: EnvFilter,
    /// Output format.
    pub format: LogFormat,
    /// Append-mode log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

/// Maps `-v` count and `-q` to a default filter directive.
#[must_use]
pub const fn verbosity_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "off";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

impl LoggingConfig {
    /// Builds the logging config from settings and command-line verbosity.
    ///
    /// `-q` always wins. Otherwise an explicit filter from the config file or
    /// `STASHD_LOG` wins over the `-v` default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the filter directive is malformed.
    pub fn from_settings(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<Self> {
        let directive = match (&settings.filter, quiet) {
            (Some(explicit), false) => explicit.as_str(),
            _ => verbosity_directive(verbose, quiet),
        };
        let filter = EnvFilter::try_new(directive)
            .map_err(|e| Error::InvalidInput(format!("log filter '{directive}': {e}")))?;
        Ok(Self {
            filter,
            format: settings.format,
            file: settings.file.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, false, "warn"; "default")]
    #[test_case(1, false, "info"; "one v")]
    #[test_case(2, false, "debug"; "two v")]
    #[test_case(5, false, "trace"; "many v")]
    #[test_case(3, true, "off"; "quiet wins")]
    fn test_verbosity_directive(verbose: u8, quiet: bool, expected: &str) {
        assert_eq!(verbosity_directive(verbose, quiet), expected);
    }

    #[test]
    fn test_explicit_filter_wins_over_verbosity() {
        let settings = LoggingSettings {
            filter: Some("stashd=trace".to_string()),
            ..LoggingSettings::default()
        };
        let config = LoggingConfig::from_settings(&settings, 0, false).unwrap();
        assert_eq!(config.filter.to_string(), "stashd=trace");
    }

    #[test]
    fn test_quiet_wins_over_explicit_filter() {
        let settings = LoggingSettings {
            filter: Some("debug".to_string()),
            ..LoggingSettings::default()
        };
        let config = LoggingConfig::from_settings(&settings, 0, true).unwrap();
        assert_eq!(config.filter.to_string(), "off");
    }

    #[test]
    fn test_bad_filter_rejected() {
        let settings = LoggingSettings {
            filter: Some("stashd=loud".to_string()),
            ..LoggingSettings::default()
        };
        assert!(LoggingConfig::from_settings(&settings, 0, false).is_err());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
