use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use lru::LruCache;
use rusqlite::{Connection, OptionalExtension, params};

/// Two-layer discovery cache (§4.7.1): an in-process LRU in front of a
/// persistent SQLite key/value store at `cache/discovery.sqlite`. Keyed on
/// `(source, canonical_id)`, e.g. `(openalex, doi:10.1/x)`.
pub struct DiscoveryCache {
    lru: Mutex<LruCache<String, String>>,
    conn: Mutex<Connection>,
    ttl: Duration,
    hits: Mutex<u64>,
    misses: Mutex<u64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

fn cache_key(source: &str, canonical_id: &str) -> String {
    format!("{source}:{canonical_id}")
}

impl DiscoveryCache {
    pub fn open(path: &Path, ttl: Duration) -> rusqlite::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS discovery_cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                cached_at TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            lru: Mutex::new(LruCache::new(NonZeroUsize::new(1024).unwrap())),
            conn: Mutex::new(conn),
            ttl,
            hits: Mutex::new(0),
            misses: Mutex::new(0),
        })
    }

    pub fn open_in_memory(ttl: Duration) -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS discovery_cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                cached_at TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            lru: Mutex::new(LruCache::new(NonZeroUsize::new(1024).unwrap())),
            conn: Mutex::new(conn),
            ttl,
            hits: Mutex::new(0),
            misses: Mutex::new(0),
        })
    }

    /// A hit short-circuits the network call entirely, per §4.7.1.
    pub fn get(&self, source: &str, canonical_id: &str) -> Option<String> {
        let key = cache_key(source, canonical_id);

        if let Some(value) = self.lru.lock().unwrap().get(&key) {
            *self.hits.lock().unwrap() += 1;
            return Some(value.clone());
        }

        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT value, cached_at FROM discovery_cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .ok()
            .flatten();
        drop(conn);

        match row {
            Some((value, cached_at)) if !self.is_expired(&cached_at) => {
                self.lru.lock().unwrap().put(key, value.clone());
                *self.hits.lock().unwrap() += 1;
                Some(value)
            }
            _ => {
                *self.misses.lock().unwrap() += 1;
                None
            }
        }
    }

    pub fn set(&self, source: &str, canonical_id: &str, value: &str) {
        let key = cache_key(source, canonical_id);
        self.lru.lock().unwrap().put(key.clone(), value.to_string());
        let conn = self.conn.lock().unwrap();
        let _ = conn.execute(
            "INSERT OR REPLACE INTO discovery_cache (key, value, cached_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        );
    }

    fn is_expired(&self, cached_at: &str) -> bool {
        match chrono::DateTime::parse_from_rfc3339(cached_at) {
            Ok(ts) => {
                let age = Utc::now().signed_duration_since(ts.with_timezone(&Utc));
                age.to_std().unwrap_or(Duration::ZERO) > self.ttl
            }
            Err(_) => true,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let conn = self.conn.lock().unwrap();
        let entries: u64 = conn
            .query_row("SELECT COUNT(*) FROM discovery_cache", [], |row| row.get(0))
            .unwrap_or(0);
        CacheStats {
            hits: *self.hits.lock().unwrap(),
            misses: *self.misses.lock().unwrap(),
            entries,
        }
    }

    /// Removes entries older than the TTL. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        let cutoff = Utc::now() - chrono::Duration::from_std(self.ttl).unwrap_or_default();
        conn.execute(
            "DELETE FROM discovery_cache WHERE cached_at < ?1",
            params![cutoff.to_rfc3339()],
        )
        .unwrap_or(0)
    }

    /// Removes entries by exact key (`source:canonical_id`) or by prefix when
    /// `key` ends with `*`.
    pub fn invalidate(&self, key: &str) -> usize {
        self.lru.lock().unwrap().clear();
        let conn = self.conn.lock().unwrap();
        if let Some(prefix) = key.strip_suffix('*') {
            conn.execute(
                "DELETE FROM discovery_cache WHERE key LIKE ?1",
                params![format!("{prefix}%")],
            )
            .unwrap_or(0)
        } else {
            conn.execute("DELETE FROM discovery_cache WHERE key = ?1", params![key])
                .unwrap_or(0)
        }
    }

    pub fn clear(&self) -> usize {
        self.lru.lock().unwrap().clear();
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM discovery_cache", []).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_after_set_short_circuits_and_counts() {
        let cache = DiscoveryCache::open_in_memory(Duration::from_secs(604800)).unwrap();
        assert!(cache.get("openalex", "doi:10.1/x").is_none());
        cache.set("openalex", "doi:10.1/x", "[]");
        assert_eq!(cache.get("openalex", "doi:10.1/x").as_deref(), Some("[]"));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn expired_entries_are_treated_as_misses() {
        let cache = DiscoveryCache::open_in_memory(Duration::from_secs(0)).unwrap();
        cache.set("openalex", "doi:10.1/x", "[]");
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("openalex", "doi:10.1/x").is_none());
    }

    #[test]
    fn invalidate_prefix_removes_matching_keys() {
        let cache = DiscoveryCache::open_in_memory(Duration::from_secs(604800)).unwrap();
        cache.set("openalex", "doi:1", "a");
        cache.set("openalex", "doi:2", "b");
        cache.set("semantic_scholar", "doi:1", "c");
        let removed = cache.invalidate("openalex:*");
        assert_eq!(removed, 2);
        assert!(cache.get("semantic_scholar", "doi:1").is_some());
    }
}
