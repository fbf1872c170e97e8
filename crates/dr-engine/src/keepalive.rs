//! Liveness pings to an external URL while the engine waits between cycles.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Sends a GET to `url` at most once per `interval`.
#[derive(Debug)]
pub struct KeepAlive {
    http: reqwest::Client,
    url: Option<String>,
    interval: Duration,
    last_ping: Instant,
}

impl KeepAlive {
    /// `None` disables pinging.
    pub fn new(url: Option<String>, interval: Duration) -> Self {
        Self { http: reqwest::Client::new(), url, interval, last_ping: Instant::now() }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Ping if the interval has elapsed since the last ping. Failures are logged only.
    pub async fn tick(&mut self) {
        let Some(url) = self.url.as_deref() else {
            return;
        };
        if self.last_ping.elapsed() < self.interval {
            return;
        }
        self.last_ping = Instant::now();
        match self.http.get(url).send().await {
            Ok(resp) => debug!("keep-alive ping {url}: HTTP {}", resp.status()),
            Err(e) => warn!("keep-alive ping {url} failed: {e}"),
        }
    }
}
