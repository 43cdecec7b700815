// Rate-limited HTTP client with bounded retry, exponential backoff and
// proxy rotation on block responses.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::model::{ConfigError, NetworkError};
use crate::scraper::traits::PageFetcher;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:126.0) Gecko/20100101 Firefox/126.0",
];

// Markers of an interstitial challenge page served with a 200.
const CHALLENGE_MARKERS: &[&str] = &["challenge-form", "security verification"];

/// Bounded retry schedule: each failed attempt doubles the delay up to a cap.
/// `next_delay` returns `None` once the attempt budget is spent.
#[derive(Debug)]
pub struct Backoff {
    attempt: u32,
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self { attempt: 0, max_attempts, base, cap }
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(self.attempt - 1);
        Some(self.base.saturating_mul(factor).min(self.cap))
    }
}

/// Minimum spacing between consecutive outbound calls, with random jitter
/// inside `[min_delay, min_delay + band]`. The last-call instant is the one
/// piece of shared state; concurrent callers serialize through the mutex.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    band: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration, band: Duration) -> Self {
        Self { min_delay, band, last_call: Mutex::new(None) }
    }

    /// Zero-delay variant for tests.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let jitter = if self.band.is_zero() {
                Duration::ZERO
            } else {
                Duration::from_millis(rand::rng().random_range(0..=self.band.as_millis() as u64))
            };
            let delay = self.min_delay + jitter;
            let elapsed = prev.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

enum Outcome {
    Success(String),
    Retry(NetworkError),
    Fail(NetworkError),
}

/// Production [`PageFetcher`]. Holds one reqwest client per proxy endpoint
/// (reqwest binds proxies at build time) plus a direct client, and rotates
/// to the next one whenever the site blocks a request.
pub struct RateLimitedClient {
    clients: Vec<Client>,
    active: AtomicUsize,
    limiter: RateLimiter,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl RateLimitedClient {
    pub fn new(proxies: &[String], limiter: RateLimiter) -> Result<Self, ConfigError> {
        let mut clients = Vec::with_capacity(proxies.len().max(1));
        if proxies.is_empty() {
            clients.push(Self::build_client(None)?);
        } else {
            for proxy in proxies {
                clients.push(Self::build_client(Some(proxy))?);
            }
        }
        Ok(Self {
            clients,
            active: AtomicUsize::new(0),
            limiter,
            max_attempts: 4,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
        })
    }

    fn build_client(proxy: Option<&String>) -> Result<Client, ConfigError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(10));
        if let Some(endpoint) = proxy {
            let proxy = reqwest::Proxy::all(endpoint)
                .map_err(|e| ConfigError::InvalidProxy(endpoint.clone(), e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|e| ConfigError::ClientBuild(e.to_string()))
    }

    fn current_client(&self) -> &Client {
        &self.clients[self.active.load(Ordering::Relaxed) % self.clients.len()]
    }

    fn rotate_proxy(&self) {
        if self.clients.len() > 1 {
            let next = (self.active.load(Ordering::Relaxed) + 1) % self.clients.len();
            self.active.store(next, Ordering::Relaxed);
            debug!("rotated to proxy slot {}", next);
        }
    }

    async fn attempt(&self, url: &str, params: &[(String, String)]) -> Outcome {
        self.limiter.wait().await;

        let ua = USER_AGENTS[rand::rng().random_range(0..USER_AGENTS.len())];
        let result = self
            .current_client()
            .get(url)
            .query(params)
            .header(reqwest::header::USER_AGENT, ua)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await;

        let response = match result {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return Outcome::Retry(NetworkError::Timeout),
            Err(e) => return Outcome::Fail(NetworkError::Malformed(e.to_string())),
        };

        let status = response.status();
        if let Some(err) = classify_status(status) {
            return match err {
                NetworkError::Blocked(_) => {
                    self.rotate_proxy();
                    Outcome::Retry(err)
                }
                NetworkError::ServerError(_) => Outcome::Retry(err),
                other => Outcome::Fail(other),
            };
        }

        match response.text().await {
            Ok(body) => {
                let lower = body.to_lowercase();
                if CHALLENGE_MARKERS.iter().any(|m| lower.contains(m)) {
                    self.rotate_proxy();
                    return Outcome::Retry(NetworkError::Blocked("challenge page".into()));
                }
                Outcome::Success(body)
            }
            Err(e) => Outcome::Fail(NetworkError::Malformed(e.to_string())),
        }
    }
}

/// Maps a response status to the error taxonomy; `None` means usable.
/// 999 is the site's nonstandard block status.
fn classify_status(status: StatusCode) -> Option<NetworkError> {
    let code = status.as_u16();
    match code {
        200..=399 => None,
        429 | 999 => Some(NetworkError::Blocked(format!("status {code}"))),
        500..=599 => Some(NetworkError::ServerError(format!("status {code}"))),
        _ => Some(NetworkError::Malformed(format!("status {code}"))),
    }
}

#[async_trait::async_trait]
impl PageFetcher for RateLimitedClient {
    async fn fetch_page(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<String, NetworkError> {
        let mut backoff = Backoff::new(self.max_attempts, self.backoff_base, self.backoff_cap);
        let mut blocked_rotations = 0usize;
        loop {
            match self.attempt(url, params).await {
                Outcome::Success(body) => return Ok(body),
                Outcome::Fail(err) => return Err(err),
                Outcome::Retry(err) => {
                    if matches!(err, NetworkError::Blocked(_)) {
                        blocked_rotations += 1;
                        if blocked_rotations >= self.clients.len() && self.clients.len() > 1 {
                            warn!("all {} proxy slots blocked for {url}", self.clients.len());
                            return Err(err);
                        }
                    }
                    match backoff.next_delay() {
                        Some(delay) => {
                            warn!("retrying {url} after {:?}: {err}", delay);
                            sleep(delay).await;
                        }
                        None => return Err(err),
                    }
                }
            }
        }
    }
}
