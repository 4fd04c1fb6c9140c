//! Configuration version gate.
//!
//! A loaded document is only trusted when its `version` field equals
//! [`SERVER_CONFIG_VERSION`]. Bringing older documents up to date is the
//! caller's job; this build does not migrate.

use crate::error::{ConfigError, ConfigResult};

/// The configuration version this build reads and writes.
pub const SERVER_CONFIG_VERSION: &str = "23";

/// Reject any version other than [`SERVER_CONFIG_VERSION`].
///
/// # Errors
///
/// Returns [`ConfigError::VersionMismatch`] with the expected and found tokens.
pub fn check_version(found: &str) -> ConfigResult<()> {
    if found == SERVER_CONFIG_VERSION {
        Ok(())
    } else {
        Err(ConfigError::VersionMismatch {
            expected: SERVER_CONFIG_VERSION.to_owned(),
            found: found.to_owned(),
        })
    }
}
