use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Per-session key/value persistence for small client state (auth tokens,
/// the change-feed cursor).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
    }
}

/// Stores all keys in one JSON object file. Reads go through an in-memory
/// copy loaded at open time; every write rewrites the file.
///
/// The file holds bearer tokens in plain JSON. On unix it is kept readable
/// by the owner only.
pub struct FileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Map<String, Value>>(&raw) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable session file {:?}: {}", path, e);
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };

        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &Map<String, Value>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(values)?;
        write_owner_only(&self.path, raw.as_bytes())
    }
}

#[cfg(unix)]
fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation; tighten files left by older builds.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), Value::String(value.to_string()));

        if let Err(e) = self.persist(&values) {
            tracing::warn!("Failed to write session file {:?}: {}", self.path, e);
        }
    }
}

pub fn get_session_path() -> PathBuf {
    if let Some(cache_dir) = dirs::cache_dir() {
        cache_dir.join("olxcat").join("session.json")
    } else {
        PathBuf::from("olxcat-session.json")
    }
}
