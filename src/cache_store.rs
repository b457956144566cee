use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "cp_leaderboard";
const CACHE_FILE: &str = "provider_cache.json";
const SQLITE_FILE: &str = "provider_cache.sqlite";

/// Raw provider JSON as it was stored, plus when it was fetched (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub body: String,
    pub fetched_at: u64,
}

impl CacheEntry {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            fetched_at: now_secs(),
        }
    }
}

/// Process-external key/value store for provider responses.
///
/// No namespacing is applied here; callers build provider-scoped keys.
/// Concurrent writers to the same key race and the last one wins.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn set(&self, key: &str, entry: CacheEntry) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Entries never go stale.
    #[default]
    Forever,
    Ttl(Duration),
}

impl CachePolicy {
    pub fn from_ttl_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(secs) if secs > 0 => CachePolicy::Ttl(Duration::from_secs(secs)),
            _ => CachePolicy::Forever,
        }
    }

    pub fn is_fresh(&self, entry: &CacheEntry, now: u64) -> bool {
        match self {
            CachePolicy::Forever => true,
            CachePolicy::Ttl(ttl) => now.saturating_sub(entry.fetched_at) < ttl.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Json,
    Sqlite,
    Memory,
}

impl CacheBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" | "file" => Some(CacheBackend::Json),
            "sqlite" | "db" => Some(CacheBackend::Sqlite),
            "memory" | "mem" | "none" => Some(CacheBackend::Memory),
            _ => None,
        }
    }
}

/// Opens the configured backend at its default location. Falls back to an
/// in-memory store when no cache directory can be resolved.
pub fn open_store(backend: CacheBackend) -> Result<Box<dyn CacheStore>> {
    let dir = app_cache_dir();
    match (backend, dir) {
        (CacheBackend::Json, Some(dir)) => Ok(Box::new(JsonFileStore::new(dir.join(CACHE_FILE)))),
        (CacheBackend::Sqlite, Some(dir)) => {
            Ok(Box::new(SqliteStore::open(&dir.join(SQLITE_FILE))?))
        }
        _ => Ok(Box::new(MemoryStore::default())),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        guard.get(key).cloned()
    }

    fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key.to_string(), entry);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

/// Whole-file JSON store. The file is read lazily on first access and
/// rewritten through a temp file on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<Option<CacheFile>>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut guard = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let cache = guard.get_or_insert_with(|| load_cache_file(&self.path));
        cache.entries.get(key).cloned()
    }

    fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let mut guard = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let cache = guard.get_or_insert_with(|| load_cache_file(&self.path));
        cache.version = CACHE_VERSION;
        cache.entries.insert(key.to_string(), entry);
        save_cache_file(&self.path, cache)
    }
}

fn load_cache_file(path: &Path) -> CacheFile {
    let Ok(raw) = fs::read_to_string(path) else {
        return CacheFile::default();
    };
    let cache = serde_json::from_str::<CacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return CacheFile::default();
    }
    cache
}

fn save_cache_file(path: &Path, cache: &CacheFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize provider cache")?;
    fs::write(&tmp, json).context("write provider cache")?;
    fs::rename(&tmp, path).context("swap provider cache")?;
    Ok(())
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            fetched_at INTEGER NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.query_row(
            "SELECT body, fetched_at FROM cache_entries WHERE key = ?1",
            params![key],
            |row| {
                Ok(CacheEntry {
                    body: row.get(0)?,
                    fetched_at: row.get::<_, i64>(1)?.max(0) as u64,
                })
            },
        )
        .optional()
        .ok()
        .flatten()
    }

    fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            r#"
            INSERT INTO cache_entries (key, body, fetched_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET body = excluded.body, fetched_at = excluded.fetched_at
            "#,
            params![key, entry.body, entry.fetched_at as i64],
        )
        .with_context(|| format!("upsert cache entry {key}"))?;
        Ok(())
    }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
