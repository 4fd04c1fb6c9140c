//! Persistence seam for the configuration document.
//!
//! The store only needs to load raw bytes and save a [`ServerConfigDoc`].
//! [`FileStore`] writes pretty-printed JSON through a temporary file in the
//! target directory and renames it into place. [`MemoryStore`] keeps
//! documents in process memory.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::store::ServerConfigDoc;

/// Load and save capability for configuration documents.
pub trait ConfigPersistence: Send + Sync {
    /// Read the raw document bytes at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persistence`] when the document cannot be read.
    fn load(&self, path: &Path) -> ConfigResult<Vec<u8>>;

    /// Write `doc` to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persistence`] when the document cannot be written.
    fn save(&self, path: &Path, doc: &ServerConfigDoc) -> ConfigResult<()>;
}

fn persistence_error(path: &Path) -> impl FnOnce(io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

fn encode(doc: &ServerConfigDoc) -> io::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(doc).map_err(io::Error::other)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// JSON documents on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore;

impl FileStore {
    fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ConfigPersistence for FileStore {
    fn load(&self, path: &Path) -> ConfigResult<Vec<u8>> {
        std::fs::read(path).map_err(persistence_error(path))
    }

    fn save(&self, path: &Path, doc: &ServerConfigDoc) -> ConfigResult<()> {
        let bytes = encode(doc).map_err(persistence_error(path))?;
        Self::write_atomic(path, &bytes).map_err(persistence_error(path))?;
        debug!(path = %path.display(), size = bytes.len(), "configuration written");
        Ok(())
    }
}

/// Documents held in memory, keyed by path.
///
/// Raw bytes can be planted with [`MemoryStore::put`], and saves can be made
/// to fail with [`MemoryStore::set_fail_saves`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes at `path`, bypassing serialization.
    pub fn put(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.lock().insert(path.into(), bytes.into());
    }

    /// Raw bytes stored at `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    /// Make every subsequent save fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }
}

impl ConfigPersistence for MemoryStore {
    fn load(&self, path: &Path) -> ConfigResult<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| persistence_error(path)(io::Error::from(io::ErrorKind::NotFound)))
    }

    fn save(&self, path: &Path, doc: &ServerConfigDoc) -> ConfigResult<()> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(persistence_error(path)(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "saves disabled",
            )));
        }
        let bytes = encode(doc).map_err(persistence_error(path))?;
        self.put(path, bytes);
        Ok(())
    }
}
