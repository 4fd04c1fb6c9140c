//! Access-key to credential cache.
//!
//! [`CredentialCache`] is a secondary index over the bucket credentials of a
//! single [`ServerConfig`](crate::ServerConfig). It is never authoritative:
//! entries are inserted lazily by the resolver, eagerly when a bucket
//! credential is set, and evicted when that credential is overwritten. It is
//! guarded by its own sharded locks rather than by the store's field lock.

use dashmap::DashMap;
use ruststack_auth::Credential;

/// Concurrent map from access key to credential.
#[derive(Debug, Default)]
pub struct CredentialCache {
    entries: DashMap<String, Credential>,
}

impl CredentialCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a credential by access key.
    #[must_use]
    pub fn get(&self, access_key: &str) -> Option<Credential> {
        self.entries.get(access_key).map(|entry| entry.value().clone())
    }

    /// Insert `cred` under its own access key. Invalid credentials are not cached.
    pub fn insert(&self, cred: Credential) {
        if cred.is_valid() {
            self.entries.insert(cred.access_key.clone(), cred);
        }
    }

    /// Remove the entry for `access_key`, returning it if present.
    pub fn evict(&self, access_key: &str) -> Option<Credential> {
        self.entries.remove(access_key).map(|(_, cred)| cred)
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(access: &str) -> Credential {
        Credential::new(access, "secret-key-123").unwrap()
    }

    #[test]
    fn test_should_insert_and_get_by_access_key() {
        let cache = CredentialCache::new();
        cache.insert(cred("alpha"));
        assert_eq!(cache.get("alpha"), Some(cred("alpha")));
        assert_eq!(cache.get("beta"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_should_not_cache_invalid_credentials() {
        let cache = CredentialCache::new();
        cache.insert(Credential::default());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_should_evict_and_clear() {
        let cache = CredentialCache::new();
        cache.insert(cred("alpha"));
        cache.insert(cred("beta"));

        assert_eq!(cache.evict("alpha"), Some(cred("alpha")));
        assert_eq!(cache.evict("alpha"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
