//! Versioned server configuration for RustStack.
//!
//! This crate owns the server's persisted configuration document: the root
//! credential, per-bucket credential overrides, region, browser flag, domain,
//! storage classes and notification targets. It validates documents on load
//! (version gate, duplicate-key scan, credential and notification checks),
//! resolves access keys to credentials through a per-instance cache, and
//! hot-swaps the published configuration atomically on reload.
//!
//! # Architecture
//!
//! ```text
//!   EnvOverrides ──────────────┐
//!                              v
//! ConfigPersistence ──► ConfigManager ──► Arc<ServerConfig>
//!  (FileStore, MemoryStore)    │            ├── RwLock<ServerConfigDoc>
//!                              │            └── CredentialCache
//!                              v
//!                        GlobalValues
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ruststack_auth::CredentialProvider;
//! use ruststack_config::{ConfigManager, EnvOverrides, ManagerOptions, MemoryStore};
//!
//! let manager = ConfigManager::new(
//!     ManagerOptions::builder()
//!         .path("/var/lib/ruststack/config.json")
//!         .persistence(Arc::new(MemoryStore::new()))
//!         .overrides(EnvOverrides::builder().region("eu-west-1").build())
//!         .build(),
//! );
//!
//! let config = manager.bootstrap().unwrap();
//! assert_eq!(config.region(), "eu-west-1");
//!
//! let root = config.credential();
//! assert_eq!(manager.get_secret_key(&root.access_key).unwrap(), root.secret_key);
//! ```
//!
//! # Modules
//!
//! - [`dupkeys`] - Duplicate-key scope validation over raw JSON
//! - [`store`] - The lock-protected configuration store
//! - [`resolver`] - Access key to credential resolution
//! - [`manager`] - Bootstrap, reload and atomic publication

pub mod cache;
pub mod dupkeys;
pub mod error;
pub mod manager;
pub mod notify;
pub mod overrides;
pub mod persist;
pub mod resolver;
pub mod storage_class;
pub mod store;
pub mod version;

pub use cache::CredentialCache;
pub use dupkeys::{JsonNode, check_duplicate_keys};
pub use error::{ConfigError, ConfigResult};
pub use manager::{ConfigManager, GlobalValues, LifecycleState, ManagerOptions};
pub use notify::{BasicNotifyValidator, NotifyConfig, NotifyKind, NotifyValidator};
pub use overrides::EnvOverrides;
pub use persist::{ConfigPersistence, FileStore, MemoryStore};
pub use storage_class::{DriveParity, ParityValidator, StorageClass, StorageClassConfig};
pub use store::{BrowserFlag, ServerConfig, ServerConfigDoc};
pub use version::{SERVER_CONFIG_VERSION, check_version};
