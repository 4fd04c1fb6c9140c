//! Environment-sourced configuration overrides.
//!
//! [`EnvOverrides`] carries values that take precedence over the persisted
//! configuration. Each field is `Some` only when the value was supplied by
//! the environment (or the caller); the store never reads the environment on
//! its own. [`EnvOverrides::from_env`] reads the following variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ACCESS_KEY` + `SECRET_KEY` | `credential` |
//! | `BROWSER` | `browser` |
//! | `DEFAULT_REGION` | `region` |
//! | `DOMAIN` | `domain` |
//! | `STORAGE_CLASS_STANDARD` / `STORAGE_CLASS_RRS` | `storage_class` |

use ruststack_auth::Credential;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::error::ConfigResult;
use crate::storage_class::{StorageClass, StorageClassConfig};
use crate::store::ServerConfig;

/// Values that override the persisted configuration.
///
/// # Examples
///
/// ```
/// use ruststack_config::EnvOverrides;
///
/// let overrides = EnvOverrides::builder()
///     .region("eu-west-1")
///     .browser(false)
///     .build();
/// assert_eq!(overrides.region.as_deref(), Some("eu-west-1"));
/// assert!(overrides.credential.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct EnvOverrides {
    /// Root credential.
    #[builder(default, setter(strip_option))]
    pub credential: Option<Credential>,
    /// Browser flag.
    #[builder(default, setter(strip_option))]
    pub browser: Option<bool>,
    /// Region.
    #[builder(default, setter(into, strip_option))]
    pub region: Option<String>,
    /// Domain.
    #[builder(default, setter(into, strip_option))]
    pub domain: Option<String>,
    /// Standard and reduced redundancy storage classes.
    #[builder(default, setter(strip_option))]
    pub storage_class: Option<StorageClassConfig>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    ///
    /// Unusable values (a credential failing the length rules, a malformed
    /// storage class) are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read overrides through `lookup`, which maps a variable name to its value.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut overrides = Self::default();

        if let (Some(access), Some(secret)) = (lookup("ACCESS_KEY"), lookup("SECRET_KEY")) {
            match Credential::new(access, secret) {
                Ok(cred) => {
                    info!(access_key = %cred.access_key, "using credential from environment");
                    overrides.credential = Some(cred);
                }
                Err(e) => warn!(error = %e, "ignoring invalid credential from environment"),
            }
        }
        if let Some(v) = lookup("BROWSER") {
            overrides.browser = Some(parse_bool(&v));
        }
        if let Some(v) = lookup("DEFAULT_REGION") {
            overrides.region = Some(v);
        }
        if let Some(v) = lookup("DOMAIN") {
            overrides.domain = Some(v);
        }

        let standard = lookup("STORAGE_CLASS_STANDARD");
        let rrs = lookup("STORAGE_CLASS_RRS");
        if standard.is_some() || rrs.is_some() {
            match parse_storage_class(standard.as_deref(), rrs.as_deref()) {
                Ok(sc) => overrides.storage_class = Some(sc),
                Err(e) => warn!(error = %e, "ignoring invalid storage class from environment"),
            }
        }

        overrides
    }

    /// Whether the root credential comes from the environment.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Write the present credential, browser, region and domain overrides
    /// into `config`.
    ///
    /// The storage class is left alone: [`ConfigManager`](crate::ConfigManager)
    /// seeds it into its mirrored values and applies it only while a storage
    /// class is explicitly configured.
    pub fn apply(&self, config: &ServerConfig) {
        if let Some(cred) = &self.credential {
            config.set_credential(cred.clone());
        }
        if let Some(browser) = self.browser {
            config.set_browser(browser);
        }
        if let Some(region) = &self.region {
            config.set_region(region.clone());
        }
        if let Some(domain) = &self.domain {
            config.set_domain(domain.clone());
        }
    }
}

fn parse_storage_class(
    standard: Option<&str>,
    rrs: Option<&str>,
) -> ConfigResult<StorageClassConfig> {
    Ok(StorageClassConfig {
        standard: standard.unwrap_or_default().parse::<StorageClass>()?,
        rrs: rrs.unwrap_or_default().parse::<StorageClass>()?,
    })
}

/// Parse a string as a boolean, accepting `"1"`, `"true"` and `"on"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("on")
}
