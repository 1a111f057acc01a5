use chrono::Utc;
use shared_types::{ChangeItem, ChangesResponse};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::helpers::backoff::{parse_retry_after, ExponentialBackoff};
use crate::helpers::session_store::KeyValueStore;
use crate::helpers::visibility::PageVisibility;
use crate::integrations::http::{ApiRequest, HttpClient, HttpError};

const VERSION_KEY: &str = "changes_version";
const CHANGES_PATH: &str = "/changes";

pub type Listener = Arc<dyn Fn(&[ChangeItem]) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChangeFeedOptions {
    /// Wait budget the server may hold each poll open for
    pub poll_timeout: Duration,
    /// Client-side ceiling for one poll, above `poll_timeout`
    pub request_timeout: Duration,
    pub hidden_check_interval: Duration,
    pub auth_check_interval: Duration,
    /// Consecutive no-response failures before the feed gives up
    pub cors_failure_threshold: u32,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub jitter_ratio: f64,
    pub cors_backoff_initial: Duration,
    pub cors_backoff_max: Duration,
    /// Origin named in the breaker warning
    pub origin: String,
}

impl Default for ChangeFeedOptions {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(25_000),
            request_timeout: Duration::from_millis(35_000),
            hidden_check_interval: Duration::from_millis(2_000),
            auth_check_interval: Duration::from_millis(2_000),
            cors_failure_threshold: 3,
            backoff_initial: Duration::from_millis(1_000),
            backoff_max: Duration::from_millis(15_000),
            jitter_ratio: 0.2,
            cors_backoff_initial: Duration::from_millis(5_000),
            cors_backoff_max: Duration::from_millis(30_000),
            origin: "http://localhost:3000".to_string(),
        }
    }
}

enum PollOutcome {
    NotModified,
    RateLimited(Option<Duration>),
    Changed(usize),
}

enum LoopExit {
    Idle,
    BreakerTripped,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

struct Inner {
    http: HttpClient,
    store: Arc<dyn KeyValueStore>,
    visibility: PageVisibility,
    options: ChangeFeedOptions,
    listeners: Mutex<Listeners>,
    running: AtomicBool,
    tripped: AtomicBool,
    cursor: AtomicI64,
    visibility_task: Mutex<Option<JoinHandle<()>>>,
}

/// Long-poll client for `GET /changes`.
///
/// One background task polls for as long as anyone is subscribed and fans
/// each batch out to every listener. Throttling, auth races and dropped
/// connections are absorbed with backoff; listeners only ever see delivered
/// batches. After `cors_failure_threshold` consecutive requests that got no
/// response at all the feed stops and warns once, since retrying cannot fix
/// a server that rejects the origin.
///
/// Subscribing spawns onto the current tokio runtime.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<Inner>,
}

impl ChangeFeed {
    pub fn new(
        http: HttpClient,
        store: Arc<dyn KeyValueStore>,
        visibility: PageVisibility,
        options: ChangeFeedOptions,
    ) -> Self {
        let cursor = store
            .get(VERSION_KEY)
            .and_then(|saved| saved.trim().parse::<i64>().ok())
            .unwrap_or(-1);

        Self {
            inner: Arc::new(Inner {
                http,
                store,
                visibility,
                options,
                listeners: Mutex::new(Listeners::default()),
                running: AtomicBool::new(false),
                tripped: AtomicBool::new(false),
                cursor: AtomicI64::new(cursor),
                visibility_task: Mutex::new(None),
            }),
        }
    }

    /// Registers `listener` for every non-empty batch, starting the poll
    /// loop if it is not already running.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[ChangeItem]) + Send + Sync + 'static,
    {
        let id = {
            let mut listeners = self.inner.lock_listeners();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.insert(id, Arc::new(listener));

            if listeners.entries.len() == 1 {
                Inner::attach_visibility_handler(&self.inner);
            }
            id
        };

        Inner::ensure_running(&self.inner);

        Subscription {
            feed: Arc::downgrade(&self.inner),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Last version seen, `-1` before the first one
    pub fn cursor(&self) -> i64 {
        self.inner.cursor.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn breaker_tripped(&self) -> bool {
        self.inner.tripped.load(Ordering::SeqCst)
    }

    /// Re-arms the feed after the network breaker tripped
    pub fn reset_breaker(&self) {
        if self.inner.tripped.swap(false, Ordering::SeqCst) {
            tracing::info!("Change feed breaker reset");
        }
        if self.inner.listener_count() > 0 {
            Inner::ensure_running(&self.inner);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listener_count()
    }
}

/// Handle returned by [`ChangeFeed::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    feed: Weak<Inner>,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    /// Stops delivery to this listener; calling it again does nothing. A
    /// poll already in flight is not aborted.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.feed.upgrade() {
            inner.remove_listener(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl Inner {
    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn listener_count(&self) -> usize {
        self.lock_listeners().entries.len()
    }

    fn remove_listener(&self, id: u64) {
        let mut listeners = self.lock_listeners();
        listeners.entries.remove(&id);
        if listeners.entries.is_empty() {
            self.detach_visibility_handler();
        }
    }

    fn ensure_running(inner: &Arc<Inner>) {
        if inner.tripped.load(Ordering::SeqCst) {
            tracing::debug!("Change feed breaker is open; not starting");
            return;
        }
        if inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let inner = inner.clone();
        tokio::spawn(async move {
            Inner::run(inner).await;
        });
    }

    async fn run(inner: Arc<Inner>) {
        tracing::debug!(cursor = inner.cursor.load(Ordering::SeqCst), "Change feed started");
        let exit = inner.poll_loop().await;
        inner.running.store(false, Ordering::SeqCst);

        match exit {
            LoopExit::Idle => {
                tracing::debug!("Change feed idle");
                // A subscriber may have arrived between the last check and
                // clearing the flag
                if inner.listener_count() > 0 {
                    Inner::ensure_running(&inner);
                }
            }
            LoopExit::BreakerTripped => {}
        }
    }

    /// One global handler per feed, installed with the first listener
    fn attach_visibility_handler(inner: &Arc<Inner>) {
        let mut task = inner
            .visibility_task
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if task.is_some() {
            return;
        }

        let feed = Arc::downgrade(inner);
        let mut changes = inner.visibility.changes();
        *task = Some(tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let visible = *changes.borrow_and_update();
                let Some(inner) = feed.upgrade() else {
                    break;
                };
                if visible && inner.listener_count() > 0 {
                    Inner::ensure_running(&inner);
                }
            }
        }));
    }

    fn detach_visibility_handler(&self) {
        let mut task = self
            .visibility_task
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }

    async fn poll_loop(&self) -> LoopExit {
        let options = &self.options;
        let mut backoff = ExponentialBackoff::new(
            options.backoff_initial,
            options.backoff_max,
            options.jitter_ratio,
        );
        let mut cors_backoff =
            ExponentialBackoff::new(options.cors_backoff_initial, options.cors_backoff_max, 0.0);
        let mut network_failures: u32 = 0;
        let mut visibility_changes = self.visibility.changes();
        let mut auth_changes = self.http.auth().subscribe();

        loop {
            if self.listener_count() == 0 {
                return LoopExit::Idle;
            }

            if !self.visibility.is_visible() {
                sleep_or_change(&mut visibility_changes, options.hidden_check_interval).await;
                continue;
            }

            if !self.http.auth().is_authenticated() {
                sleep_or_change(&mut auth_changes, options.auth_check_interval).await;
                continue;
            }

            let result = self.poll_once().await;
            if !matches!(&result, Err(e) if e.is_network()) {
                network_failures = 0;
                cors_backoff.reset();
            }

            match result {
                Ok(PollOutcome::NotModified) => {
                    backoff.reset();
                }
                Ok(PollOutcome::Changed(count)) => {
                    backoff.reset();
                    tracing::debug!(
                        count,
                        cursor = self.cursor.load(Ordering::SeqCst),
                        "Change batch received"
                    );
                }
                Ok(PollOutcome::RateLimited(hint)) => {
                    let delay = hint.unwrap_or_else(|| backoff.next_delay());
                    tracing::debug!(delay_ms = delay.as_millis() as u64, "Change feed rate limited");
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_network() => {
                    network_failures += 1;
                    if network_failures >= options.cors_failure_threshold {
                        self.tripped.store(true, Ordering::SeqCst);
                        tracing::warn!(
                            origin = %options.origin,
                            failures = network_failures,
                            "Change feed stopped: requests to {} got no response; the API is likely not allowing origin {} (check its CORS configuration)",
                            CHANGES_PATH,
                            options.origin
                        );
                        return LoopExit::BreakerTripped;
                    }

                    let delay = cors_backoff.next_delay();
                    tracing::debug!(
                        failures = network_failures,
                        delay_ms = delay.as_millis() as u64,
                        "Change feed got no response: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    if e.is_auth_failure() {
                        tracing::debug!("Change feed not authorized yet: {}", e);
                    } else {
                        tracing::warn!(delay_ms = delay.as_millis() as u64, "Change feed poll failed: {}", e);
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn poll_once(&self) -> Result<PollOutcome, HttpError> {
        let cursor = self.cursor.load(Ordering::SeqCst);
        let request = ApiRequest::get(CHANGES_PATH)
            .query("timeoutMs", Some(self.options.poll_timeout.as_millis()))
            .header("If-None-Match", format!("\"{cursor}\""))
            .timeout(self.options.request_timeout)
            .omit_graph_token()
            .preserve_session()
            .accept(304)
            .accept(429);

        let response = self.http.send(request).await?;

        match response.status {
            304 => Ok(PollOutcome::NotModified),
            429 => Ok(PollOutcome::RateLimited(
                response
                    .header("retry-after")
                    .and_then(|value| parse_retry_after(value, Utc::now())),
            )),
            _ => {
                let body: ChangesResponse = if response.body.is_empty() {
                    ChangesResponse::default()
                } else {
                    serde_json::from_slice(&response.body)?
                };

                let version = response
                    .header("etag")
                    .and_then(parse_etag_version)
                    .or(body.version);
                if let Some(version) = version {
                    self.advance_cursor(version);
                }

                let (items, rejected) = body.into_items();
                for reason in &rejected {
                    tracing::warn!("Dropping change item: {}", reason);
                }
                if !items.is_empty() {
                    self.emit(&items);
                }
                Ok(PollOutcome::Changed(items.len()))
            }
        }
    }

    fn advance_cursor(&self, version: i64) {
        let previous = self.cursor.fetch_max(version, Ordering::SeqCst);
        if version > previous {
            self.store.set(VERSION_KEY, &version.to_string());
        } else if version < previous {
            tracing::debug!(version, previous, "Ignoring older change version");
        }
    }

    fn emit(&self, items: &[ChangeItem]) {
        let listeners: Vec<Listener> = self.lock_listeners().entries.values().cloned().collect();

        for listener in listeners {
            let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| listener(items)));
            if delivered.is_err() {
                tracing::warn!("Change listener panicked; other listeners still notified");
            }
        }
    }
}

/// `"6"`, `W/"6"` or `6` → 6
fn parse_etag_version(etag: &str) -> Option<i64> {
    let etag = etag.trim();
    let etag = etag.strip_prefix("W/").unwrap_or(etag);
    etag.trim_matches('"').parse().ok()
}

async fn sleep_or_change<T>(changes: &mut watch::Receiver<T>, interval: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        changed = changes.changed() => {
            if changed.is_err() {
                tokio::time::sleep(interval).await;
            }
        }
    }
}
