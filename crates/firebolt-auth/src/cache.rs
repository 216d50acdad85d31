//! Process-wide connection-info cache.
//!
//! Bootstrap lookups (account id, system-engine URL, engine and database
//! resolution) are cached per credential set so repeated connections skip
//! redundant round-trips. Entries are immutable `Arc`s replaced whole; a
//! reader never observes a partially updated entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

/// How long a cache entry stays valid.
const CACHE_EXPIRY: Duration = Duration::from_secs(3600);

/// Environment variable disabling every cache in the process.
pub const DISABLE_CACHE_ENV: &str = "FIREBOLT_SDK_DISABLE_CACHE";

/// Cache key over a credential set.
///
/// The raw principal and secret never leave the process: the map key is a
/// SHA-256 digest over `(principal, secret, account)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from credentials and an optional account name.
    #[must_use]
    pub fn new(principal: &str, secret: &str, account: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(principal.as_bytes());
        hasher.update([0u8]);
        hasher.update(secret.as_bytes());
        hasher.update([0u8]);
        hasher.update(account.unwrap_or("").as_bytes());
        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }
}

/// Cached engine endpoint and its attached parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    /// Engine endpoint URL.
    pub url: String,
    /// Query parameters the endpoint arrived with.
    pub params: Vec<(String, String)>,
}

/// Cached database existence record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
}

/// Everything remembered about one credential set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Resolved account id.
    pub account_id: Option<String>,
    /// System-engine endpoint for the account.
    pub system_engine: Option<EngineInfo>,
    /// Databases known to exist.
    pub databases: HashMap<String, DatabaseInfo>,
    /// Resolved user engines by name.
    pub engines: HashMap<String, EngineInfo>,
}

struct Entry {
    value: Arc<ConnectionInfo>,
    expires_at: SystemTime,
}

/// A generic disable-aware cache over immutable entries.
pub struct ConnectionCache {
    name: &'static str,
    map: RwLock<HashMap<CacheKey, Entry>>,
    disabled: RwLock<bool>,
}

impl ConnectionCache {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            map: RwLock::new(HashMap::new()),
            disabled: RwLock::new(env_disabled(name)),
        }
    }

    /// Whether the cache is currently disabled.
    #[must_use]
    pub fn disabled(&self) -> bool {
        *self.disabled.read()
    }

    /// Disable the cache at runtime.
    pub fn disable(&self) {
        *self.disabled.write() = true;
    }

    /// Re-enable the cache at runtime.
    pub fn enable(&self) {
        *self.disabled.write() = false;
    }

    /// Look up an entry, dropping it if expired.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<ConnectionInfo>> {
        if self.disabled() {
            return None;
        }
        {
            let map = self.map.read();
            let entry = map.get(key)?;
            if entry.expires_at > SystemTime::now() {
                return Some(Arc::clone(&entry.value));
            }
        }
        self.map.write().remove(key);
        None
    }

    /// Replace the entry for `key`, restarting its expiry clock.
    pub fn set(&self, key: CacheKey, value: ConnectionInfo) {
        if self.disabled() {
            return;
        }
        self.map.write().insert(
            key,
            Entry {
                value: Arc::new(value),
                expires_at: SystemTime::now() + CACHE_EXPIRY,
            },
        );
    }

    /// Clone-and-update convenience: apply `mutate` to the current entry (or
    /// a default) and store the result as a fresh entry.
    pub fn update(&self, key: &CacheKey, mutate: impl FnOnce(&mut ConnectionInfo)) {
        if self.disabled() {
            return;
        }
        let mut value = self
            .get(key)
            .map(|arc| (*arc).clone())
            .unwrap_or_default();
        mutate(&mut value);
        self.set(key.clone(), value);
    }

    /// Remove the entry for `key`.
    pub fn delete(&self, key: &CacheKey) {
        self.map.write().remove(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.map.write().clear();
    }

    /// Cache name, used in the per-cache disable variable.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn env_disabled(name: &str) -> bool {
    let per_cache = format!("{DISABLE_CACHE_ENV}_{}", name.to_uppercase());
    env_flag(DISABLE_CACHE_ENV) || env_flag(&per_cache)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"))
}

/// The process-wide connection-info cache.
#[must_use]
pub fn connection_cache() -> &'static ConnectionCache {
    static CACHE: once_cell::sync::Lazy<ConnectionCache> =
        once_cell::sync::Lazy::new(|| ConnectionCache::new("connection_info"));
    &CACHE
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key(tag: &str) -> CacheKey {
        CacheKey::new(tag, "secret", Some("account"))
    }

    #[test]
    fn test_key_hides_credentials() {
        let k = CacheKey::new("principal", "secret", Some("acc"));
        assert!(!k.0.contains("principal"));
        assert!(!k.0.contains("secret"));
        assert_eq!(k, CacheKey::new("principal", "secret", Some("acc")));
        assert_ne!(k, CacheKey::new("principal", "other", Some("acc")));
        assert_ne!(k, CacheKey::new("principal", "secret", None));
    }

    #[test]
    fn test_set_get_roundtrip() {
        let cache = ConnectionCache::new("test_roundtrip");
        let info = ConnectionInfo {
            account_id: Some("id-1".to_owned()),
            ..Default::default()
        };
        cache.set(key("a"), info.clone());
        assert_eq!(*cache.get(&key("a")).unwrap(), info);
        assert!(cache.get(&key("b")).is_none());
    }

    #[test]
    fn test_update_replaces_whole_entry() {
        let cache = ConnectionCache::new("test_update");
        cache.update(&key("a"), |info| {
            info.account_id = Some("id-1".to_owned());
        });
        let before = cache.get(&key("a")).unwrap();
        cache.update(&key("a"), |info| {
            info.system_engine = Some(EngineInfo {
                url: "https://se.example".to_owned(),
                params: vec![],
            });
        });
        // The first Arc is untouched; readers holding it see the old value.
        assert!(before.system_engine.is_none());
        let after = cache.get(&key("a")).unwrap();
        assert_eq!(after.account_id.as_deref(), Some("id-1"));
        assert!(after.system_engine.is_some());
    }

    #[test]
    fn test_disable_turns_cache_off() {
        let cache = ConnectionCache::new("test_disable");
        cache.disable();
        cache.set(key("a"), ConnectionInfo::default());
        assert!(cache.get(&key("a")).is_none());
        cache.enable();
        cache.set(key("a"), ConnectionInfo::default());
        assert!(cache.get(&key("a")).is_some());
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = ConnectionCache::new("test_delete");
        cache.set(key("a"), ConnectionInfo::default());
        cache.set(key("b"), ConnectionInfo::default());
        cache.delete(&key("a"));
        assert!(cache.get(&key("a")).is_none());
        assert!(cache.get(&key("b")).is_some());
        cache.clear();
        assert!(cache.get(&key("b")).is_none());
    }
}
