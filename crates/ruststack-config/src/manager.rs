//! Lifecycle of the published server configuration.
//!
//! [`ConfigManager`] owns the pointer to the current [`ServerConfig`] and is
//! the only component that replaces it. Locking is two-tier: the manager's
//! `current` lock guards *which* store is published, while each store's own
//! field lock guards the values inside it. Publication swaps the pointer in
//! one step, so a reader sees either the old store or the new one.
//!
//! ```text
//! persistence.load ─► parse ─► version gate ─► duplicate keys ─► credential
//!        ─► notify ─► ServerConfig ─► env overrides ─► parity ─► publish
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use ruststack_auth::{AuthError, Credential, CredentialProvider};
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::dupkeys::check_duplicate_keys;
use crate::error::{ConfigError, ConfigResult};
use crate::notify::{BasicNotifyValidator, NotifyValidator};
use crate::overrides::EnvOverrides;
use crate::persist::ConfigPersistence;
use crate::storage_class::{DriveParity, ParityValidator, StorageClassConfig};
use crate::store::{DEFAULT_REGION, ServerConfig, ServerConfigDoc};
use crate::version::check_version;

/// Logical file name used when the path has none.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Where the manager is in its publication cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing has been published yet.
    Uninitialized,
    /// A bootstrap or reload is building a new store.
    Publishing,
    /// A store is published.
    Published,
}

/// Effective settings mirrored for subsystems that do not hold a store.
///
/// Values sourced from the environment are set once at construction and are
/// never overwritten by a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalValues {
    /// Active root credential.
    pub credential: Credential,
    /// Whether the browser interface is enabled.
    pub browser_enabled: bool,
    /// Server region.
    pub region: String,
    /// Server domain.
    pub domain: String,
    /// Standard and reduced redundancy storage classes.
    pub storage_class: StorageClassConfig,
}

impl GlobalValues {
    fn seeded(overrides: &EnvOverrides) -> Self {
        Self {
            credential: overrides.credential.clone().unwrap_or_default(),
            browser_enabled: overrides.browser.unwrap_or(true),
            region: overrides
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            domain: overrides.domain.clone().unwrap_or_default(),
            storage_class: overrides.storage_class.clone().unwrap_or_default(),
        }
    }
}

/// Construction options for [`ConfigManager`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use ruststack_config::{ConfigManager, ManagerOptions, MemoryStore};
///
/// let manager = ConfigManager::new(
///     ManagerOptions::builder()
///         .path("/etc/ruststack/config.json")
///         .persistence(Arc::new(MemoryStore::new()))
///         .build(),
/// );
///
/// let config = manager.bootstrap().unwrap();
/// assert!(config.credential().is_valid());
/// assert_eq!(manager.reload().unwrap().snapshot(), config.snapshot());
/// ```
#[derive(TypedBuilder)]
pub struct ManagerOptions {
    /// Path of the configuration document.
    #[builder(setter(into))]
    pub path: PathBuf,
    /// Load/save collaborator.
    pub persistence: Arc<dyn ConfigPersistence>,
    /// Environment-sourced overrides.
    #[builder(default)]
    pub overrides: EnvOverrides,
    /// Storage class parity rules.
    #[builder(default = Arc::new(DriveParity::default()))]
    pub parity: Arc<dyn ParityValidator>,
    /// Notification block validator.
    #[builder(default = Arc::new(BasicNotifyValidator))]
    pub notify: Arc<dyn NotifyValidator>,
}

impl std::fmt::Debug for ManagerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerOptions")
            .field("path", &self.path)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// Owner of the published [`ServerConfig`].
pub struct ConfigManager {
    path: PathBuf,
    file_name: String,
    persistence: Arc<dyn ConfigPersistence>,
    overrides: EnvOverrides,
    parity: Arc<dyn ParityValidator>,
    notify: Arc<dyn NotifyValidator>,
    current: RwLock<Option<Arc<ServerConfig>>>,
    state: Mutex<LifecycleState>,
    globals: RwLock<GlobalValues>,
    storage_class_configured: AtomicBool,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("path", &self.path)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl ConfigManager {
    /// Create a manager with nothing published.
    #[must_use]
    pub fn new(options: ManagerOptions) -> Self {
        let file_name = options
            .path
            .file_name()
            .map_or_else(|| DEFAULT_CONFIG_FILE.to_owned(), |n| n.to_string_lossy().into_owned());
        let globals = GlobalValues::seeded(&options.overrides);
        let storage_class_configured = options.overrides.storage_class.is_some();

        Self {
            path: options.path,
            file_name,
            persistence: options.persistence,
            overrides: options.overrides,
            parity: options.parity,
            notify: options.notify,
            current: RwLock::new(None),
            state: Mutex::new(LifecycleState::Uninitialized),
            globals: RwLock::new(globals),
            storage_class_configured: AtomicBool::new(storage_class_configured),
        }
    }

    /// Path of the configuration document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// The published configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotInitialized`] before the first publication.
    pub fn current(&self) -> ConfigResult<Arc<ServerConfig>> {
        self.current.read().clone().ok_or(ConfigError::NotInitialized)
    }

    /// Snapshot of the mirrored process-wide values.
    #[must_use]
    pub fn globals(&self) -> GlobalValues {
        self.globals.read().clone()
    }

    /// Whether a storage class is explicitly configured, by the environment or
    /// by a validated read of the published configuration.
    ///
    /// Once set, the mirrored storage class in [`GlobalValues`] is written into
    /// every newly built store and is no longer refreshed from documents.
    #[must_use]
    pub fn storage_class_configured(&self) -> bool {
        self.storage_class_configured.load(Ordering::Acquire)
    }

    /// Create, persist and publish a default configuration.
    ///
    /// The new store gets a generated root credential, then the environment
    /// overrides and, when one is configured, the mirrored storage class.
    /// Nothing is published unless the save succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::StorageClassParity`] for an inconsistent
    /// environment storage class, or the persistence error unchanged.
    pub fn bootstrap(&self) -> ConfigResult<Arc<ServerConfig>> {
        self.publishing(|| {
            let config = ServerConfig::new(Credential::generate());
            self.apply_overrides(&config);
            let storage_class = config.storage_class(&*self.parity)?;

            self.persistence.save(&self.path, &config.snapshot())?;
            info!(path = %self.path.display(), "created new server configuration");

            Ok(self.publish(config, &storage_class))
        })
    }

    /// Load, validate and publish the persisted configuration.
    ///
    /// # Errors
    ///
    /// Any load or validation failure is returned unchanged and leaves the
    /// published configuration untouched.
    pub fn reload(&self) -> ConfigResult<Arc<ServerConfig>> {
        self.publishing(|| {
            let config = self.load_valid()?;
            self.apply_overrides(&config);
            let storage_class = config.storage_class(&*self.parity)?;

            info!(path = %self.path.display(), "loaded server configuration");
            Ok(self.publish(config, &storage_class))
        })
        .inspect_err(|e| warn!(path = %self.path.display(), error = %e, "configuration rejected"))
    }

    /// Persist the published configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotInitialized`] before the first publication,
    /// or the persistence error unchanged.
    pub fn save(&self) -> ConfigResult<()> {
        let config = self.current()?;
        self.persistence.save(&self.path, &config.snapshot())
    }

    /// Read and validate the published storage classes.
    ///
    /// The first configured class read this way marks the storage class as
    /// explicitly configured and becomes the mirrored value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotInitialized`] or
    /// [`ConfigError::StorageClassParity`].
    pub fn storage_class(&self) -> ConfigResult<StorageClassConfig> {
        let storage_class = self.current()?.storage_class(&*self.parity)?;
        if storage_class.is_configured() {
            let mut globals = self.globals.write();
            if !self.storage_class_configured.swap(true, Ordering::AcqRel) {
                globals.storage_class = storage_class.clone();
            }
        }
        Ok(storage_class)
    }

    /// Write the environment overrides into `config`, then the mirrored
    /// storage class when one is explicitly configured.
    fn apply_overrides(&self, config: &ServerConfig) {
        self.overrides.apply(config);
        if self.storage_class_configured() {
            let sc = self.globals.read().storage_class.clone();
            config.set_storage_class(sc.standard, sc.rrs);
        }
    }

    /// Parse and validate the persisted document without publishing it.
    fn load_valid(&self) -> ConfigResult<ServerConfig> {
        let bytes = self.persistence.load(&self.path)?;
        let parse_error = |message: String| ConfigError::Parse {
            file: self.file_name.clone(),
            message,
        };

        // Untyped first so repeated keys reach the scope check.
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| parse_error(e.to_string()))?;
        let version = match value.get("version") {
            None => "",
            Some(serde_json::Value::String(version)) => version.as_str(),
            Some(other) => {
                return Err(parse_error(format!(
                    "version must be a string, found {other}"
                )));
            }
        };
        check_version(version)?;

        let raw = std::str::from_utf8(&bytes).map_err(|e| parse_error(e.to_string()))?;
        check_duplicate_keys(raw, &self.file_name)?;

        let doc: ServerConfigDoc =
            serde_json::from_value(value).map_err(|e| parse_error(e.to_string()))?;

        if !self.overrides.has_credential() && !doc.credential.is_valid() {
            return Err(ConfigError::InvalidCredential {
                file: self.path.display().to_string(),
            });
        }

        doc.notify.validate(&*self.notify)?;

        Ok(ServerConfig::from_doc(doc))
    }

    /// Run `build` in the publishing state.
    ///
    /// On failure the state is derived from what is published at that moment,
    /// since a concurrent bootstrap or reload may have published meanwhile.
    fn publishing(
        &self,
        build: impl FnOnce() -> ConfigResult<Arc<ServerConfig>>,
    ) -> ConfigResult<Arc<ServerConfig>> {
        *self.state.lock() = LifecycleState::Publishing;
        let result = build();
        if result.is_err() {
            let current = self.current.read();
            *self.state.lock() = if current.is_some() {
                LifecycleState::Published
            } else {
                LifecycleState::Uninitialized
            };
        }
        result
    }

    /// Swap in `config` and mirror its effective values.
    fn publish(&self, config: ServerConfig, storage_class: &StorageClassConfig) -> Arc<ServerConfig> {
        let config = Arc::new(config);
        let snapshot = config.snapshot();

        let mut current = self.current.write();
        *current = Some(Arc::clone(&config));

        {
            let mut globals = self.globals.write();
            if self.overrides.credential.is_none() {
                globals.credential = snapshot.credential;
            }
            if self.overrides.browser.is_none() {
                globals.browser_enabled = snapshot.browser.into();
            }
            if self.overrides.region.is_none() {
                globals.region = snapshot.region;
            }
            if self.overrides.domain.is_none() {
                globals.domain = snapshot.domain;
            }
            if !self.storage_class_configured() {
                globals.storage_class = storage_class.clone();
                if storage_class.is_configured() {
                    self.storage_class_configured.store(true, Ordering::Release);
                }
            }
        }
        *self.state.lock() = LifecycleState::Published;
        drop(current);

        info!(buckets = snapshot.bucket.len(), "server configuration published");
        config
    }
}

impl CredentialProvider for ConfigManager {
    fn get_secret_key(&self, access_key_id: &str) -> Result<String, AuthError> {
        self.current()
            .ok()
            .map(|config| config.credential_for_key(access_key_id))
            .filter(|cred| cred.is_valid() && cred.access_key == access_key_id)
            .map(|cred| cred.secret_key)
            .ok_or_else(|| AuthError::AccessKeyNotFound(access_key_id.to_owned()))
    }
}
