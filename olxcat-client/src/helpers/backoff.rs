use chrono::{DateTime, Utc};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Errors that may carry an HTTP status and a `Retry-After` header value
pub trait Retryable {
    fn status(&self) -> Option<u16>;
    fn retry_after(&self) -> Option<&str>;
}

#[derive(Debug, Clone)]
pub struct BackoffOptions {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
    pub retry_on_429: bool,
    pub retry_on_503: bool,
    /// Total attempts before giving up and returning the last error.
    /// `None` keeps retrying for as long as the server keeps throttling.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(15000),
            jitter_ratio: 0.2,
            retry_on_429: false,
            retry_on_503: true,
            max_attempts: None,
        }
    }
}

impl BackoffOptions {
    fn retries(&self, status: Option<u16>) -> bool {
        match status {
            Some(429) => self.retry_on_429,
            Some(503) => self.retry_on_503,
            _ => false,
        }
    }
}

/// Doubling delay with symmetric jitter, capped at `max`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    jitter_ratio: f64,
    current: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, jitter_ratio: f64) -> Self {
        Self {
            initial,
            max,
            jitter_ratio,
            current: Duration::ZERO,
        }
    }

    /// Advances the schedule and returns the jittered delay to sleep
    pub fn next_delay(&mut self) -> Duration {
        self.current = if self.current.is_zero() {
            self.initial
        } else {
            (self.current * 2).min(self.max)
        };
        apply_jitter(self.current, self.jitter_ratio)
    }

    /// Un-jittered delay of the last step, zero after a reset
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = Duration::ZERO;
    }
}

fn apply_jitter(delay: Duration, jitter_ratio: f64) -> Duration {
    if jitter_ratio <= 0.0 {
        return delay;
    }
    let base = delay.as_millis() as f64;
    let jitter = base * jitter_ratio * rand::thread_rng().gen_range(-1.0..=1.0);
    Duration::from_millis((base + jitter).max(0.0).round() as u64)
}

/// Parses a `Retry-After` value: delay in seconds, or an HTTP-date relative
/// to `now`. Dates in the past yield zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() {
            return None;
        }
        return Some(Duration::from_millis((seconds.max(0.0) * 1000.0).round() as u64));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc) - now;
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Runs `op`, retrying on throttling statuses enabled in `options`.
///
/// A server `Retry-After` hint wins over the computed schedule. Any other
/// error is returned immediately. Without `max_attempts` this loops until
/// success or a non-retryable error; callers wanting a ceiling can set one or
/// wrap the call in `tokio::time::timeout`.
pub async fn with_backoff<T, E, F, Fut>(mut op: F, options: &BackoffOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut schedule = ExponentialBackoff::new(
        options.initial_delay,
        options.max_delay,
        options.jitter_ratio,
    );
    let mut attempts: u32 = 0;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        attempts += 1;

        if !options.retries(err.status()) {
            return Err(err);
        }
        if options.max_attempts.is_some_and(|max| attempts >= max) {
            tracing::warn!("Giving up after {} attempts: {}", attempts, err);
            return Err(err);
        }

        let delay = match err
            .retry_after()
            .and_then(|value| parse_retry_after(value, Utc::now()))
        {
            Some(hinted) => hinted,
            None => schedule.next_delay(),
        };

        tracing::debug!(
            status = ?err.status(),
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Retrying throttled request"
        );
        tokio::time::sleep(delay).await;
    }
}
