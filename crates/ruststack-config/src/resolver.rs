//! Credential resolution by access key.
//!
//! Lookup order, stopping at the first match:
//!
//! 1. the root credential, returned without touching the cache;
//! 2. the [`CredentialCache`](crate::CredentialCache), when the cached entry
//!    is valid and carries the requested access key;
//! 3. a scan of the bucket overrides in bucket-name order, caching the match;
//! 4. otherwise the zero credential.

use std::sync::atomic::Ordering;

use ruststack_auth::Credential;
use tracing::debug;

use crate::store::{ServerConfig, owning_bucket};

impl ServerConfig {
    /// Resolve the credential that owns `access_key`.
    ///
    /// Never fails: an unknown key yields [`Credential::default`], which is
    /// not valid.
    #[must_use]
    pub fn credential_for_key(&self, access_key: &str) -> Credential {
        // The read lock is held across the scan and the cache insert so a
        // concurrent `set_credential_for_bucket` cannot evict in between.
        let fields = self.fields.read();

        if fields.credential.access_key == access_key {
            return fields.credential.clone();
        }

        if let Some(cred) = self.cache.get(access_key) {
            if cred.is_valid() && cred.access_key == access_key {
                return cred;
            }
        }

        self.scans.fetch_add(1, Ordering::Relaxed);
        match owning_bucket(&fields, access_key) {
            Some((bucket, cred)) => {
                debug!(bucket = %bucket, access_key, "resolved bucket credential by scan");
                self.cache.insert(cred.clone());
                cred.clone()
            }
            None => Credential::default(),
        }
    }

    /// Number of full bucket scans performed by [`Self::credential_for_key`].
    #[must_use]
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Number of entries currently cached.
    #[must_use]
    pub fn cached_credentials(&self) -> usize {
        self.cache.len()
    }
}
