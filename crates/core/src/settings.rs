//! Runtime settings loaded from the environment.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{var} must be a valid {expected} (got '{value}')")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Tunables shared by the store, fanout and reader components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Identity of this store instance (registered with the router).
    pub server_id: String,
    /// Application name; the correlation stream is `<app>_log`.
    pub app_name: String,
    /// Events fetched per page by cursors.
    pub page_size: usize,
    /// Bounded queue in front of webhook delivery.
    pub fanout_capacity: usize,
    pub delivery_timeout: Duration,
    pub view_poll_interval: Duration,
    pub purge_interval: Duration,
    pub purge_batch: u64,
    pub reader_queue_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_id: "evstore-local".to_string(),
            app_name: "evstore".to_string(),
            page_size: 100,
            fanout_capacity: 10_000,
            delivery_timeout: Duration::from_secs(5),
            view_poll_interval: Duration::from_millis(400),
            purge_interval: Duration::from_secs(60),
            purge_batch: 100,
            reader_queue_capacity: 1_000,
        }
    }
}

impl Settings {
    /// Load settings from `EVSTORE_*` variables, reading `.env` first if present.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, SettingsError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();

        let server_id = text(&lookup, "EVSTORE_SERVER_ID", d.server_id)?;
        let app_name = text(&lookup, "EVSTORE_APP_NAME", d.app_name)?;

        Ok(Self {
            server_id,
            app_name,
            page_size: number(&lookup, "EVSTORE_PAGE_SIZE", d.page_size)?,
            fanout_capacity: number(&lookup, "EVSTORE_FANOUT_CAPACITY", d.fanout_capacity)?,
            delivery_timeout: millis(&lookup, "EVSTORE_DELIVERY_TIMEOUT_MS", d.delivery_timeout)?,
            view_poll_interval: millis(&lookup, "EVSTORE_VIEW_POLL_MS", d.view_poll_interval)?,
            purge_interval: millis(&lookup, "EVSTORE_PURGE_INTERVAL_MS", d.purge_interval)?,
            purge_batch: number(&lookup, "EVSTORE_PURGE_BATCH", d.purge_batch)?,
            reader_queue_capacity: number(&lookup, "EVSTORE_READER_QUEUE", d.reader_queue_capacity)?,
        })
    }

    /// Name of the application-wide correlation stream.
    pub fn main_log(&self) -> String {
        format!("{}_log", self.app_name.trim().to_lowercase().replace(' ', "_"))
    }
}

fn text<F>(lookup: &F, var: &'static str, default: String) -> Result<String, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Err(SettingsError::Empty(var)),
        Some(v) => Ok(v),
    }
}

fn number<F, N>(lookup: &F, var: &'static str, default: N) -> Result<N, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    N: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().parse::<N>() {
        Ok(n) if n > N::default() => Ok(n),
        _ => Err(SettingsError::Invalid {
            var,
            expected: "positive integer",
            value: raw,
        }),
    }
}

fn millis<F>(lookup: &F, var: &'static str, default: Duration) -> Result<Duration, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let ms: u64 = number(lookup, var, u64::try_from(default.as_millis()).unwrap_or(u64::MAX))?;
    Ok(Duration::from_millis(ms))
}
