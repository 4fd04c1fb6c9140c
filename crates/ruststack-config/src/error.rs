//! Error types for the server configuration store.
//!
//! Every failure the store can report is a [`ConfigError`] variant. Load and
//! reload failures are returned unchanged to the caller; none of them touch
//! the currently published configuration.

use std::path::PathBuf;

/// Server configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not well-formed JSON, or does not match the expected shape.
    #[error("unable to parse {file}: {message}")]
    Parse {
        /// Logical name of the document.
        file: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A key occurs more than once within a single JSON object scope.
    #[error("{} => `{key}` entry is duplicated", .path.join(" => "))]
    DuplicateKey {
        /// Enclosing key names, outermost first, starting with the file name.
        path: Vec<String>,
        /// The duplicated key.
        key: String,
    },

    /// The document was written for a different configuration version.
    #[error("configuration version mismatch. Expected: '{expected}', Got: '{found}'")]
    VersionMismatch {
        /// The version this build understands.
        expected: String,
        /// The version found in the document.
        found: String,
    },

    /// The root credential is invalid and no environment credential is active.
    #[error("invalid credential in config file {file}")]
    InvalidCredential {
        /// Logical name of the document.
        file: String,
    },

    /// The notification block was rejected by its validator.
    #[error("invalid notification configuration: {0}")]
    Notification(String),

    /// A storage class string could not be parsed.
    #[error("invalid storage class value {0:?}, expected EC:<parity>")]
    InvalidStorageClass(String),

    /// A configured storage class parity is inconsistent with its sibling.
    #[error("invalid value {value} set for {class} storage class: {reason}")]
    StorageClassParity {
        /// Which storage class failed (`standard` or `rrs`).
        class: &'static str,
        /// The configured value (e.g. `EC:1`).
        value: String,
        /// Why the parity was rejected.
        reason: String,
    },

    /// The persistence collaborator failed to read or write the document.
    #[error("unable to access {}: {source}", .path.display())]
    Persistence {
        /// The document path.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// No configuration has been published yet.
    #[error("server configuration is not initialized")]
    NotInitialized,
}

/// Convenience result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
