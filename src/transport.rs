use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::sse::{EventParser, SseEvent};

const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Lifecycle callbacks of the push stream, delivered in order on one channel.
#[derive(Debug)]
pub enum StreamSignal {
    Open,
    Message(SseEvent),
    Error(TransportError),
}

/// How long to wait before reconnecting.
///
/// The first retry waits `initial` (or whatever the server last sent in a
/// `retry:` field). Each further consecutive failure doubles the wait, up to
/// `max`. A connection that opens resets the count. Retries never give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(3000),
            max: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self, base: Duration, consecutive_failures: u32) -> Duration {
        let factor = 1u32.checked_shl(consecutive_failures).unwrap_or(u32::MAX);
        base.saturating_mul(factor).min(self.max.max(base))
    }
}

/// A single push-stream connection that reconnects on its own.
#[derive(Debug, Clone)]
pub struct EventStream {
    client: reqwest::Client,
    url: Url,
    policy: ReconnectPolicy,
}

enum Ended {
    ReceiverClosed,
    Failed { opened: bool, error: TransportError },
}

impl EventStream {
    pub fn new(url: Url, policy: ReconnectPolicy) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url,
            policy,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Run the stream on its own task until `cancel` fires, the receiver is
    /// dropped, or the server answers 204.
    pub fn spawn(
        self,
        tx: mpsc::Sender<StreamSignal>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(tx, cancel).await })
    }

    pub async fn run(self, tx: mpsc::Sender<StreamSignal>, cancel: CancellationToken) {
        let mut parser = EventParser::new();
        let mut base = self.policy.initial;
        let mut failures = 0u32;

        loop {
            let ended = tokio::select! {
                _ = cancel.cancelled() => return,
                ended = self.connect_once(&mut parser, &tx) => ended,
            };
            let (opened, error) = match ended {
                Ended::ReceiverClosed => return,
                Ended::Failed { opened, error } => (opened, error),
            };

            if let Some(retry) = parser.take_retry() {
                base = retry;
            }
            if opened {
                failures = 0;
            }
            let retryable = error.is_retryable();
            warn!(url = %self.url, error = %error, "event stream failed");
            if tx.send(StreamSignal::Error(error)).await.is_err() || !retryable {
                return;
            }

            let delay = self.policy.delay(base, failures);
            failures = failures.saturating_add(1);
            debug!(delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect_once(
        &self,
        parser: &mut EventParser,
        tx: &mpsc::Sender<StreamSignal>,
    ) -> Ended {
        let failed = |opened, error| Ended::Failed { opened, error };

        let mut req = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if !parser.last_event_id().is_empty() {
            if let Ok(v) = HeaderValue::from_str(parser.last_event_id()) {
                req = req.header(LAST_EVENT_ID, v);
            }
        }

        let mut resp = match req.send().await {
            Ok(r) => r,
            Err(e) => return failed(false, e.into()),
        };
        if resp.status() == StatusCode::NO_CONTENT {
            return failed(false, TransportError::NoContent);
        }
        if !resp.status().is_success() {
            return failed(false, TransportError::Status(resp.status()));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_event_stream(&content_type) {
            return failed(false, TransportError::ContentType(content_type));
        }

        parser.reset_connection();
        info!(url = %self.url, "event stream open");
        if tx.send(StreamSignal::Open).await.is_err() {
            return Ended::ReceiverClosed;
        }

        loop {
            match resp.chunk().await {
                Ok(Some(bytes)) => {
                    for ev in parser.feed(&bytes) {
                        if tx.send(StreamSignal::Message(ev)).await.is_err() {
                            return Ended::ReceiverClosed;
                        }
                    }
                }
                Ok(None) => return failed(true, TransportError::Eof),
                Err(e) => return failed(true, e.into()),
            }
        }
    }
}

fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|m| m.trim().eq_ignore_ascii_case("text/event-stream"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let p = ReconnectPolicy {
            initial: Duration::from_secs(3),
            max: Duration::from_secs(20),
        };
        let base = p.initial;
        assert_eq!(p.delay(base, 0), Duration::from_secs(3));
        assert_eq!(p.delay(base, 1), Duration::from_secs(6));
        assert_eq!(p.delay(base, 2), Duration::from_secs(12));
        assert_eq!(p.delay(base, 3), Duration::from_secs(20));
        assert_eq!(p.delay(base, 200), Duration::from_secs(20));
    }

    #[test]
    fn server_retry_larger_than_cap_is_honoured() {
        let p = ReconnectPolicy {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
        };
        assert_eq!(p.delay(Duration::from_secs(30), 2), Duration::from_secs(30));
    }

    #[test]
    fn content_type_matching() {
        assert!(is_event_stream("text/event-stream"));
        assert!(is_event_stream("Text/Event-Stream; charset=utf-8"));
        assert!(!is_event_stream("application/json"));
        assert!(!is_event_stream(""));
    }

    #[test]
    fn only_204_stops_retrying() {
        assert!(!TransportError::NoContent.is_retryable());
        assert!(TransportError::Eof.is_retryable());
        assert!(TransportError::Status(StatusCode::BAD_GATEWAY).is_retryable());
    }
}
