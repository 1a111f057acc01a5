use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Last validator and payload seen for one query
#[derive(Debug)]
pub struct CachedPage<T> {
    pub etag: String,
    pub data: Arc<[T]>,
}

/// Conditional-request cache for list endpoints, keyed by normalized query.
///
/// Each entry is swapped as a single `Arc`, so a reader never observes an
/// etag from one response paired with data from another. Entries live for
/// the lifetime of the cache.
pub struct EtagCache<T> {
    entries: Mutex<HashMap<String, Arc<CachedPage<T>>>>,
}

impl<T> Default for EtagCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> EtagCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<CachedPage<T>>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    pub fn store(&self, key: String, etag: String, data: Vec<T>) -> Arc<[T]> {
        let page = Arc::new(CachedPage {
            etag,
            data: Arc::from(data),
        });
        let data = page.data.clone();

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, page);
        data
    }

    /// Forgets `key`, e.g. after a full response that came without a validator
    pub fn remove(&self, key: &str) -> Option<Arc<CachedPage<T>>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds a cache key from a path and its query parameters. Absent
/// parameters are dropped and the rest sorted, so `top=10&skip=0` and
/// `skip=0&top=10` share an entry.
pub fn cache_key(path: &str, params: &[(&str, Option<String>)]) -> String {
    let mut present: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(name, value)| value.as_deref().map(|value| (*name, value)))
        .collect();
    present.sort();

    if present.is_empty() {
        return path.to_string();
    }

    let query: Vec<String> = present
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    format!("{}?{}", path, query.join("&"))
}
