use shared_types::ChangeItem;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use crate::jobs::change_feed::{ChangeFeed, Subscription};

type ChangeListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct State {
    moved_at: HashMap<String, i64>,
    next_id: u64,
    listeners: BTreeMap<u64, ChangeListener>,
}

/// Remembers when emails were last categorized, fed by `email:moved`
/// events from the change feed and by local moves.
#[derive(Clone, Default)]
pub struct RecentlyCategorized {
    state: Arc<Mutex<State>>,
}

impl RecentlyCategorized {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follows `feed` until the returned subscription is dropped
    pub fn follow(&self, feed: &ChangeFeed) -> Subscription {
        let tracker = self.clone();
        feed.subscribe(move |items| tracker.record(items))
    }

    pub fn record(&self, items: &[ChangeItem]) {
        let now = chrono::Utc::now().timestamp_millis();
        let mut moved = Vec::new();
        for item in items {
            if let ChangeItem::EmailMoved(event) = item {
                if event.message_id.is_empty() {
                    continue;
                }
                let ts = if event.ts > 0 { event.ts } else { now };
                moved.push((event.message_id.clone(), ts));
            }
        }

        if moved.is_empty() {
            return;
        }
        {
            let mut state = self.lock();
            state.moved_at.extend(moved);
        }
        self.notify();
    }

    /// Marks `ids` as categorized at `timestamp_ms`, or now
    pub fn mark(&self, ids: &[String], timestamp_ms: Option<i64>) {
        let ts = timestamp_ms.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        {
            let mut state = self.lock();
            for id in ids {
                state.moved_at.insert(id.clone(), ts);
            }
        }
        self.notify();
    }

    pub fn timestamp_ms(&self, email_id: &str) -> Option<i64> {
        self.lock().moved_at.get(email_id).copied()
    }

    /// Calls `listener` after every update; returns an id for [`Self::remove_listener`]
    pub fn on_change<F>(&self, listener: F) -> u64
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.insert(id, Arc::new(listener));
        id
    }

    pub fn remove_listener(&self, id: u64) {
        self.lock().listeners.remove(&id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self) {
        let listeners: Vec<ChangeListener> = self.lock().listeners.values().cloned().collect();
        for listener in listeners {
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                tracing::warn!("Recently-categorized listener panicked");
            }
        }
    }
}
