use std::fs;

use tempfile::tempdir;

use cp_leaderboard::cache_store::{CacheEntry, CacheStore, JsonFileStore, SqliteStore};

fn entry(body: &str, fetched_at: u64) -> CacheEntry {
    CacheEntry {
        body: body.to_string(),
        fetched_at,
    }
}

#[test]
fn json_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.json");

    let store = JsonFileStore::new(path.clone());
    assert!(store.get("codeforces:user:a").is_none());
    store.set("codeforces:user:a", entry("{\"a\":1}", 10)).unwrap();
    store.set("codeforces:user:b", entry("{\"b\":2}", 20)).unwrap();
    store.set("codeforces:user:a", entry("{\"a\":3}", 30)).unwrap();
    assert!(path.exists());

    let reopened = JsonFileStore::new(path);
    assert_eq!(reopened.get("codeforces:user:a"), Some(entry("{\"a\":3}", 30)));
    assert_eq!(reopened.get("codeforces:user:b"), Some(entry("{\"b\":2}", 20)));
}

#[test]
fn json_store_ignores_other_versions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    fs::write(
        &path,
        r#"{"version":99,"entries":{"k":{"body":"x","fetched_at":1}}}"#,
    )
    .unwrap();

    let store = JsonFileStore::new(path);
    assert!(store.get("k").is_none());
}

#[test]
fn json_store_treats_garbage_as_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    fs::write(&path, "not json").unwrap();

    let store = JsonFileStore::new(path.clone());
    assert!(store.get("k").is_none());
    store.set("k", entry("v", 5)).unwrap();
    assert_eq!(JsonFileStore::new(path).get("k"), Some(entry("v", 5)));
}

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.sqlite");

    {
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get("leetcode:contests:x").is_none());
        store.set("leetcode:contests:x", entry("[]", 100)).unwrap();
        store.set("leetcode:contests:x", entry("[1]", 200)).unwrap();
    }

    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(reopened.get("leetcode:contests:x"), Some(entry("[1]", 200)));
    assert!(reopened.get("leetcode:contests:y").is_none());
}
