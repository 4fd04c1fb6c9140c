//! Access credentials for RustStack.
//!
//! This crate provides the [`Credential`] value type shared by the server
//! configuration and the request authentication layers, together with the
//! [`CredentialProvider`] lookup seam.
//!
//! # Usage
//!
//! ```rust
//! use ruststack_auth::{Credential, CredentialProvider, StaticCredentialProvider};
//!
//! let root = Credential::generate();
//! let provider = StaticCredentialProvider::from(std::slice::from_ref(&root));
//!
//! assert_eq!(provider.get_secret_key(&root.access_key).unwrap(), root.secret_key);
//! ```
//!
//! # Modules
//!
//! - [`credentials`] - Credential value type, provider trait and in-memory implementation
//! - [`error`] - Credential error types

pub mod credentials;
pub mod error;

pub use credentials::{Credential, CredentialProvider, StaticCredentialProvider};
pub use error::AuthError;
