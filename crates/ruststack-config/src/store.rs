//! The versioned server configuration store.
//!
//! [`ServerConfig`] holds the region, root credential, per-bucket credential
//! overrides, browser flag, domain, storage classes and notification block
//! behind one `parking_lot::RwLock`. Getters take the lock in shared mode and
//! copy the requested value out; setters take it exclusively.
//!
//! [`ServerConfigDoc`] is the plain, serializable form of the same fields and
//! is what the persistence layer reads and writes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::AtomicU64;

use parking_lot::RwLock;
use ruststack_auth::Credential;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::cache::CredentialCache;
use crate::error::ConfigResult;
use crate::notify::NotifyConfig;
use crate::storage_class::{ParityValidator, StorageClass, StorageClassConfig};
use crate::version::SERVER_CONFIG_VERSION;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Whether the web browser interface is enabled, persisted as `"on"`/`"off"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrowserFlag(pub bool);

impl Default for BrowserFlag {
    fn default() -> Self {
        Self(true)
    }
}

impl From<BrowserFlag> for bool {
    fn from(flag: BrowserFlag) -> Self {
        flag.0
    }
}

impl Serialize for BrowserFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if self.0 { "on" } else { "off" })
    }
}

impl<'de> Deserialize<'de> for BrowserFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FlagVisitor;

        impl Visitor<'_> for FlagVisitor {
            type Value = BrowserFlag;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"on\", \"off\" or a boolean")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<BrowserFlag, E> {
                Ok(BrowserFlag(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<BrowserFlag, E> {
                match v {
                    "on" => Ok(BrowserFlag(true)),
                    "off" => Ok(BrowserFlag(false)),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(FlagVisitor)
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_owned()
}

/// Serializable snapshot of every persisted configuration field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfigDoc {
    /// Configuration version token.
    #[serde(default)]
    pub version: String,
    /// Root credential.
    #[serde(default)]
    pub credential: Credential,
    /// Server region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Browser flag.
    #[serde(default)]
    pub browser: BrowserFlag,
    /// Domain for virtual-host style requests.
    #[serde(default)]
    pub domain: String,
    /// Standard and reduced redundancy storage classes.
    #[serde(default, rename = "storageclass")]
    pub storage_class: StorageClassConfig,
    /// Notification targets.
    #[serde(default = "NotifyConfig::empty")]
    pub notify: NotifyConfig,
    /// Per-bucket credential overrides.
    #[serde(default)]
    pub bucket: BTreeMap<String, Credential>,
}

impl ServerConfigDoc {
    /// A fresh document at the current version with default settings.
    #[must_use]
    pub fn new(credential: Credential) -> Self {
        Self {
            version: SERVER_CONFIG_VERSION.to_owned(),
            credential,
            region: default_region(),
            browser: BrowserFlag::default(),
            domain: String::new(),
            storage_class: StorageClassConfig::default(),
            notify: NotifyConfig::default(),
            bucket: BTreeMap::new(),
        }
    }
}

/// Thread-safe server configuration.
///
/// Each instance owns the [`CredentialCache`] for its bucket credentials, so
/// replacing the published instance also replaces the cache.
///
/// # Examples
///
/// ```
/// use ruststack_auth::Credential;
/// use ruststack_config::ServerConfig;
///
/// let root = Credential::new("admin", "admin-secret").unwrap();
/// let config = ServerConfig::new(root.clone());
///
/// let photos = Credential::new("photos-key", "photos-secret").unwrap();
/// let previous = config.set_credential_for_bucket("photos", photos.clone());
/// assert_eq!(previous, root);
///
/// assert_eq!(config.credential_for_bucket("photos"), photos);
/// assert_eq!(config.credential_for_bucket("videos"), root);
/// assert_eq!(config.bucket_for_key("photos-key"), "photos");
/// ```
pub struct ServerConfig {
    pub(crate) fields: RwLock<ServerConfigDoc>,
    pub(crate) cache: CredentialCache,
    pub(crate) scans: AtomicU64,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields.read();
        f.debug_struct("ServerConfig")
            .field("version", &fields.version)
            .field("region", &fields.region)
            .field("bucket_count", &fields.bucket.len())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Create a configuration at the current version with default settings.
    #[must_use]
    pub fn new(credential: Credential) -> Self {
        Self::from_doc(ServerConfigDoc::new(credential))
    }

    /// Wrap a deserialized document. The cache starts empty.
    #[must_use]
    pub fn from_doc(doc: ServerConfigDoc) -> Self {
        Self {
            fields: RwLock::new(doc),
            cache: CredentialCache::new(),
            scans: AtomicU64::new(0),
        }
    }

    /// Copy every persisted field out.
    #[must_use]
    pub fn snapshot(&self) -> ServerConfigDoc {
        self.fields.read().clone()
    }

    /// Configuration version token.
    #[must_use]
    pub fn version(&self) -> String {
        self.fields.read().version.clone()
    }

    /// Current region.
    #[must_use]
    pub fn region(&self) -> String {
        self.fields.read().region.clone()
    }

    /// Set a new region.
    pub fn set_region(&self, region: impl Into<String>) {
        self.fields.write().region = region.into();
    }

    /// Current root credential.
    #[must_use]
    pub fn credential(&self) -> Credential {
        self.fields.read().credential.clone()
    }

    /// Replace the root credential, returning the previous one.
    pub fn set_credential(&self, cred: Credential) -> Credential {
        std::mem::replace(&mut self.fields.write().credential, cred)
    }

    /// Whether the browser interface is enabled.
    #[must_use]
    pub fn browser(&self) -> bool {
        self.fields.read().browser.into()
    }

    /// Enable or disable the browser interface.
    pub fn set_browser(&self, enabled: bool) {
        self.fields.write().browser = BrowserFlag(enabled);
    }

    /// Current domain.
    #[must_use]
    pub fn domain(&self) -> String {
        self.fields.read().domain.clone()
    }

    /// Set a new domain.
    pub fn set_domain(&self, domain: impl Into<String>) {
        self.fields.write().domain = domain.into();
    }

    /// Copy of the notification block.
    #[must_use]
    pub fn notify(&self) -> NotifyConfig {
        self.fields.read().notify.clone()
    }

    /// Copy of the per-bucket credential overrides.
    #[must_use]
    pub fn bucket_credentials(&self) -> BTreeMap<String, Credential> {
        self.fields.read().bucket.clone()
    }

    /// Replace both storage classes.
    pub fn set_storage_class(&self, standard: StorageClass, rrs: StorageClass) {
        let mut fields = self.fields.write();
        fields.storage_class.standard = standard;
        fields.storage_class.rrs = rrs;
    }

    /// Read both storage classes, validating their parities against each other.
    ///
    /// Validation runs on every call, not just at load time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::StorageClassParity`](crate::ConfigError::StorageClassParity) when a configured class is
    /// inconsistent with its sibling. The stored values are left unchanged.
    pub fn storage_class(
        &self,
        parity: &dyn ParityValidator,
    ) -> ConfigResult<StorageClassConfig> {
        let fields = self.fields.read();
        fields.storage_class.validate(parity)?;
        Ok(fields.storage_class.clone())
    }

    /// Set the credential for `bucket`, returning the previous one.
    ///
    /// An empty bucket name targets the root credential. Otherwise the
    /// previous bucket credential, when valid, is evicted from the cache; when
    /// there was no valid override the root credential is reported as the
    /// previous value. The new credential is written to the bucket map, and
    /// the bucket that now owns its access key (the smallest name using it)
    /// is eagerly cached.
    pub fn set_credential_for_bucket(&self, bucket: &str, cred: Credential) -> Credential {
        let mut fields = self.fields.write();

        if bucket.is_empty() {
            return std::mem::replace(&mut fields.credential, cred);
        }

        let previous = match fields.bucket.get(bucket) {
            Some(prev) if prev.is_valid() => {
                self.cache.evict(&prev.access_key);
                prev.clone()
            }
            _ => fields.credential.clone(),
        };

        let access_key = cred.access_key.clone();
        fields.bucket.insert(bucket.to_owned(), cred);
        if let Some((_, owner)) = owning_bucket(&fields, &access_key) {
            self.cache.insert(owner.clone());
        }
        debug!(bucket, "bucket credential updated");

        previous
    }

    /// Credential for `bucket`: its override when valid, else the root credential.
    #[must_use]
    pub fn credential_for_bucket(&self, bucket: &str) -> Credential {
        let fields = self.fields.read();
        fields
            .bucket
            .get(bucket)
            .filter(|cred| cred.is_valid())
            .unwrap_or(&fields.credential)
            .clone()
    }

    /// Bucket whose override uses `access_key`, or an empty string.
    ///
    /// The root access key never maps to a bucket. When several buckets share
    /// an access key the lexicographically smallest bucket name wins.
    #[must_use]
    pub fn bucket_for_key(&self, access_key: &str) -> String {
        let fields = self.fields.read();

        if access_key == fields.credential.access_key {
            return String::new();
        }

        owning_bucket(&fields, access_key)
            .map(|(bucket, _)| bucket.clone())
            .unwrap_or_default()
    }
}

/// First bucket in name order whose override uses `access_key`.
pub(crate) fn owning_bucket<'a>(
    fields: &'a ServerConfigDoc,
    access_key: &str,
) -> Option<(&'a String, &'a Credential)> {
    fields
        .bucket
        .iter()
        .find(|(_, cred)| cred.access_key == access_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::storage_class::DriveParity;

    fn cred(access: &str) -> Credential {
        Credential::new(access, format!("{access}-secret")).unwrap()
    }

    #[test]
    fn test_should_create_defaults() {
        let config = ServerConfig::new(cred("root"));
        assert_eq!(config.version(), SERVER_CONFIG_VERSION);
        assert_eq!(config.region(), DEFAULT_REGION);
        assert!(config.browser());
        assert_eq!(config.domain(), "");
        assert!(config.bucket_credentials().is_empty());
        assert_eq!(config.notify(), NotifyConfig::default());
        assert!(
            !config
                .storage_class(&DriveParity::default())
                .unwrap()
                .is_configured()
        );
    }

    #[test]
    fn test_should_set_and_get_scalar_fields() {
        let config = ServerConfig::new(cred("root"));
        config.set_region("eu-west-1");
        config.set_browser(false);
        config.set_domain("storage.example.com");

        assert_eq!(config.region(), "eu-west-1");
        assert!(!config.browser());
        assert_eq!(config.domain(), "storage.example.com");
    }

    #[test]
    fn test_should_return_previous_root_credential() {
        let config = ServerConfig::new(cred("root"));
        let previous = config.set_credential(cred("newroot"));
        assert_eq!(previous, cred("root"));
        assert_eq!(config.credential(), cred("newroot"));
    }

    #[test]
    fn test_should_target_root_for_empty_bucket_name() {
        let config = ServerConfig::new(cred("root"));
        let previous = config.set_credential_for_bucket("", cred("newroot"));
        assert_eq!(previous, cred("root"));
        assert_eq!(config.credential(), cred("newroot"));
        assert!(config.bucket_credentials().is_empty());
        assert!(config.cache.is_empty());
    }

    #[test]
    fn test_should_report_root_when_no_previous_override() {
        let config = ServerConfig::new(cred("root"));
        let previous = config.set_credential_for_bucket("photos", cred("photos"));
        assert_eq!(previous, cred("root"));
        assert_eq!(config.cache.get("photos"), Some(cred("photos")));
    }

    #[test]
    fn test_should_evict_previous_override_from_cache() {
        let config = ServerConfig::new(cred("root"));
        config.set_credential_for_bucket("photos", cred("first"));
        let previous = config.set_credential_for_bucket("photos", cred("second"));

        assert_eq!(previous, cred("first"));
        assert_eq!(config.cache.get("first"), None);
        assert_eq!(config.cache.get("second"), Some(cred("second")));
        assert_eq!(config.credential_for_bucket("photos"), cred("second"));
    }

    #[test]
    fn test_should_fall_back_to_root_for_invalid_override() {
        let config = ServerConfig::new(cred("root"));
        config.set_credential_for_bucket("broken", Credential::default());

        assert_eq!(config.credential_for_bucket("broken"), cred("root"));
        assert_eq!(config.credential_for_bucket("missing"), cred("root"));
        assert!(config.cache.is_empty());

        let previous = config.set_credential_for_bucket("broken", cred("fixed"));
        assert_eq!(previous, cred("root"));
    }

    #[test]
    fn test_should_find_bucket_for_key() {
        let config = ServerConfig::new(cred("root"));
        config.set_credential_for_bucket("photos", cred("photos"));
        config.set_credential_for_bucket("videos", cred("videos"));

        assert_eq!(config.bucket_for_key("videos"), "videos");
        assert_eq!(config.bucket_for_key("nobody"), "");
    }

    #[test]
    fn test_should_never_map_root_key_to_bucket() {
        let config = ServerConfig::new(cred("root"));
        config.set_credential_for_bucket("sneaky", cred("root"));
        assert_eq!(config.bucket_for_key("root"), "");
    }

    #[test]
    fn test_should_break_ties_by_smallest_bucket_name() {
        let config = ServerConfig::new(cred("root"));
        config.set_credential_for_bucket("zebra", cred("shared"));
        config.set_credential_for_bucket("apple", cred("shared"));
        config.set_credential_for_bucket("mango", cred("shared"));
        assert_eq!(config.bucket_for_key("shared"), "apple");
    }

    #[test]
    fn test_should_cache_smallest_bucket_for_shared_key() {
        let config = ServerConfig::new(cred("root"));
        let apple = Credential::new("shared", "apple-secret").unwrap();
        let zebra = Credential::new("shared", "zebra-secret").unwrap();
        config.set_credential_for_bucket("apple", apple.clone());
        config.set_credential_for_bucket("zebra", zebra);

        assert_eq!(config.cache.get("shared"), Some(apple.clone()));
        let bucket = config.bucket_for_key("shared");
        assert_eq!(bucket, "apple");
        assert_eq!(config.credential_for_bucket(&bucket), config.credential_for_key("shared"));
        assert_eq!(config.credential_for_key("shared"), apple);
    }

    #[test]
    fn test_should_move_cached_owner_to_new_smaller_bucket() {
        let config = ServerConfig::new(cred("root"));
        let mango = Credential::new("shared", "mango-secret").unwrap();
        let apple = Credential::new("shared", "apple-secret").unwrap();
        config.set_credential_for_bucket("mango", mango);
        config.set_credential_for_bucket("apple", apple.clone());

        assert_eq!(config.bucket_for_key("shared"), "apple");
        assert_eq!(config.credential_for_key("shared"), apple);
    }

    #[test]
    fn test_should_validate_storage_class_on_every_read() {
        let config = ServerConfig::new(cred("root"));
        let rules = DriveParity::new(16);

        config.set_storage_class(StorageClass::erasure(6), StorageClass::erasure(2));
        let sc = config.storage_class(&rules).unwrap();
        assert_eq!(sc.standard, StorageClass::erasure(6));
        assert!(sc.is_configured());

        config.set_storage_class(StorageClass::erasure(2), StorageClass::erasure(6));
        let err = config.storage_class(&rules).unwrap_err();
        assert!(matches!(err, ConfigError::StorageClassParity { .. }));

        let doc = config.snapshot();
        assert_eq!(doc.storage_class.standard, StorageClass::erasure(2));
        assert_eq!(doc.storage_class.rrs, StorageClass::erasure(6));
    }

    #[test]
    fn test_should_round_trip_document_through_json() {
        let config = ServerConfig::new(cred("root"));
        config.set_credential_for_bucket("photos", cred("photos"));
        config.set_storage_class(StorageClass::erasure(4), StorageClass::default());
        config.set_browser(false);

        let doc = config.snapshot();
        let json = serde_json::to_string_pretty(&doc).unwrap();
        assert!(json.contains(r#""browser": "off""#));
        assert!(json.contains(r#""storageclass""#));
        assert!(json.contains(r#""standard": "EC:4""#));

        let back: ServerConfigDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
        assert_eq!(ServerConfig::from_doc(back).snapshot(), doc);
    }

    #[test]
    fn test_should_default_missing_document_fields() {
        let doc: ServerConfigDoc = serde_json::from_str(r#"{"version": "23"}"#).unwrap();
        assert_eq!(doc.region, DEFAULT_REGION);
        assert!(bool::from(doc.browser));
        assert!(!doc.credential.is_valid());
        assert!(doc.bucket.is_empty());
    }

    #[test]
    fn test_should_parse_browser_flag_forms() {
        for (raw, expected) in [(r#""on""#, true), (r#""off""#, false), ("true", true), ("false", false)] {
            let flag: BrowserFlag = serde_json::from_str(raw).unwrap();
            assert_eq!(flag.0, expected);
        }
        assert!(serde_json::from_str::<BrowserFlag>(r#""maybe""#).is_err());
    }

    #[test]
    fn test_should_debug_format_without_secrets() {
        let config = ServerConfig::new(cred("root"));
        let debug = format!("{config:?}");
        assert!(debug.contains("ServerConfig"));
        assert!(!debug.contains("root-secret"));
    }
}
