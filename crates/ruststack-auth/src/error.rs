//! Error types for credential handling.
//!
//! All credential failures are represented by [`AuthError`].

/// Errors that can occur while building or looking up credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The access key is shorter or longer than allowed.
    #[error("access key length should be between {min} and {max}")]
    InvalidAccessKeyLength {
        /// Minimum accepted length.
        min: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// The secret key is shorter or longer than allowed.
    #[error("secret key length should be between {min} and {max}")]
    InvalidSecretKeyLength {
        /// Minimum accepted length.
        min: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// The access key ID was not found in the credential store.
    #[error("Access key not found: {0}")]
    AccessKeyNotFound(String),
}
