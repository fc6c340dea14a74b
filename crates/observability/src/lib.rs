//! Process-wide logging setup.

use std::str::FromStr;

use anyhow::Context;
use evstore_core::Settings;
use tracing_subscriber::EnvFilter;

/// Output format of the log lines.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub default_directive: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            default_directive: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Read `EVSTORE_LOG_FORMAT` through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup("EVSTORE_LOG_FORMAT") {
            config.format = raw
                .parse()
                .map_err(anyhow::Error::msg)
                .context("EVSTORE_LOG_FORMAT")?;
        }
        Ok(config)
    }
}

/// Initialize tracing with the default configuration.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(&LogConfig::default());
}

pub fn init_with(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

/// Load settings and logging from the environment (and `.env`).
pub fn bootstrap() -> anyhow::Result<Settings> {
    let config = LogConfig::from_lookup(|k| std::env::var(k).ok())?;
    init_with(&config);

    let settings = Settings::from_env().context("loading settings")?;
    tracing::info!(server_id = %settings.server_id, app = %settings.app_name, "settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_known_names() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn config_reads_format_variable() {
        let cfg = LogConfig::from_lookup(|k| (k == "EVSTORE_LOG_FORMAT").then(|| "pretty".to_string())).unwrap();
        assert_eq!(cfg.format, LogFormat::Pretty);

        let err = LogConfig::from_lookup(|_| Some("xml".to_string())).unwrap_err();
        assert!(format!("{err:#}").contains("EVSTORE_LOG_FORMAT"));

        init();
        init();
    }
}
