use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Url;

use crate::transport::ReconnectPolicy;

pub const DEFAULT_URL: &str = "http://localhost:2829/events";
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_SESSION: &str = "default";

/// Runtime settings for one watcher process.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Push-stream endpoint.
    pub url: Url,
    /// Dashboard address; `None` disables the dashboard.
    pub bind: Option<String>,
    /// Session name; restarts with the same name restore the same history.
    pub session: String,
    pub state_dir: PathBuf,
    /// Retained history entries; `None` keeps everything.
    pub history_limit: Option<usize>,
    pub reconnect: ReconnectPolicy,
    pub keep_awake: bool,
    /// Drop the stored history before starting.
    pub reset: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_URL).expect("default url is valid"),
            bind: Some(DEFAULT_BIND.to_string()),
            session: DEFAULT_SESSION.to_string(),
            state_dir: default_state_dir(),
            history_limit: None,
            reconnect: ReconnectPolicy::default(),
            keep_awake: false,
            reset: false,
        }
    }
}

impl Settings {
    pub fn with_url(mut self, url: &str) -> Result<Self> {
        self.url = parse_stream_url(url)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_limit == Some(0) {
            bail!("history limit must be at least 1 (omit it to keep everything)");
        }
        if self.reconnect.initial.is_zero() {
            bail!("reconnect delay must be greater than zero");
        }
        Ok(())
    }
}

pub fn parse_stream_url(s: &str) -> Result<Url> {
    let url = Url::parse(s).with_context(|| format!("invalid stream url: {s}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("unsupported stream url scheme: {other}"),
    }
}

pub fn reconnect_policy(initial_ms: u64, max_ms: u64) -> ReconnectPolicy {
    ReconnectPolicy {
        initial: Duration::from_millis(initial_ms),
        max: Duration::from_millis(max_ms),
    }
}

/// Per-user state goes under the temp dir so it shares the machine session's lifetime.
pub fn default_state_dir() -> PathBuf {
    std::env::temp_dir().join("scan-watch")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let s = Settings::default();
        s.validate().unwrap();
        assert_eq!(s.url.path(), "/events");
        assert_eq!(s.history_limit, None);
    }

    #[test]
    fn rejects_zero_limit() {
        let s = Settings {
            history_limit: Some(0),
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn url_scheme_checked() {
        assert!(parse_stream_url("https://example.com/events").is_ok());
        assert!(parse_stream_url("ws://example.com/events").is_err());
        assert!(parse_stream_url("not a url").is_err());
    }
}
