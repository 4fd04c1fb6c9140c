//! Storage class settings and parity rules.
//!
//! A [`StorageClass`] is a scheme tag plus a parity drive count, written as
//! `EC:<parity>` in the persisted configuration. The standard and reduced
//! redundancy classes are validated against each other through the
//! [`ParityValidator`] seam; [`DriveParity`] implements the erasure-coding
//! rules for a fixed drive count.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ConfigError, ConfigResult};

/// The only recognised storage class scheme (erasure coding).
pub const STORAGE_CLASS_SCHEME_EC: &str = "EC";

/// Minimum number of parity drives for any configured class.
pub const MIN_PARITY_DRIVES: usize = 2;

/// Drive count assumed by [`DriveParity::default`].
pub const DEFAULT_DRIVE_COUNT: usize = 16;

/// A storage class: scheme tag and parity count.
///
/// The empty scheme means "not configured".
///
/// # Examples
///
/// ```
/// use ruststack_config::StorageClass;
///
/// let sc: StorageClass = "EC:4".parse().unwrap();
/// assert_eq!(sc.parity, 4);
/// assert_eq!(sc.to_string(), "EC:4");
/// assert!(!StorageClass::default().is_set());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StorageClass {
    /// Scheme tag, `EC` or empty.
    pub scheme: String,
    /// Number of parity drives.
    pub parity: usize,
}

impl StorageClass {
    /// An erasure-coded class with the given parity.
    #[must_use]
    pub fn erasure(parity: usize) -> Self {
        Self {
            scheme: STORAGE_CLASS_SCHEME_EC.to_owned(),
            parity,
        }
    }

    /// Whether a scheme is configured.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.scheme.is_empty()
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            write!(f, "{}:{}", self.scheme, self.parity)
        } else {
            Ok(())
        }
    }
}

impl FromStr for StorageClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        let invalid = || ConfigError::InvalidStorageClass(s.to_owned());
        let (scheme, parity) = s.split_once(':').ok_or_else(invalid)?;
        if scheme != STORAGE_CLASS_SCHEME_EC {
            return Err(invalid());
        }
        let parity = parity.parse::<usize>().map_err(|_| invalid())?;
        Ok(Self::erasure(parity))
    }
}

impl Serialize for StorageClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StorageClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The standard and reduced redundancy storage classes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClassConfig {
    /// Standard storage class.
    #[serde(default)]
    pub standard: StorageClass,
    /// Reduced redundancy storage class.
    #[serde(default)]
    pub rrs: StorageClass,
}

impl StorageClassConfig {
    /// Whether either class has a scheme configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.standard.is_set() || self.rrs.is_set()
    }

    /// Validate both classes against each other.
    ///
    /// The reduced redundancy class is checked first, then the standard one;
    /// unset classes are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::StorageClassParity`] for the first class whose
    /// parity the validator rejects.
    pub fn validate(&self, validator: &dyn ParityValidator) -> ConfigResult<()> {
        if self.rrs.is_set() {
            validator
                .validate_reduced_redundancy(self.rrs.parity, self.standard.parity)
                .map_err(|reason| ConfigError::StorageClassParity {
                    class: "rrs",
                    value: self.rrs.to_string(),
                    reason,
                })?;
        }
        if self.standard.is_set() {
            validator
                .validate_standard(self.standard.parity, self.rrs.parity)
                .map_err(|reason| ConfigError::StorageClassParity {
                    class: "standard",
                    value: self.standard.to_string(),
                    reason,
                })?;
        }
        Ok(())
    }
}

/// Parity rules for storage classes.
///
/// A sibling parity of `0` means the sibling class is not configured.
pub trait ParityValidator: Send + Sync {
    /// Validate the standard class parity against the reduced redundancy parity.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the parity is rejected.
    fn validate_standard(&self, parity: usize, rrs_parity: usize) -> Result<(), String>;

    /// Validate the reduced redundancy parity against the standard parity.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the parity is rejected.
    fn validate_reduced_redundancy(&self, parity: usize, standard_parity: usize)
    -> Result<(), String>;
}

/// Erasure-coding parity rules for a deployment with a fixed drive count.
///
/// - storage classes need at least four drives;
/// - a four-drive setup has no reduced redundancy class;
/// - parity is at least [`MIN_PARITY_DRIVES`] and at most half the drives;
/// - reduced redundancy parity is strictly below standard parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveParity {
    drive_count: usize,
}

impl DriveParity {
    /// Rules for `drive_count` drives.
    #[must_use]
    pub fn new(drive_count: usize) -> Self {
        Self { drive_count }
    }

    /// The drive count these rules apply to.
    #[must_use]
    pub fn drive_count(&self) -> usize {
        self.drive_count
    }

    fn check_erasure_mode(&self) -> Result<(), String> {
        if self.drive_count < 4 {
            return Err("setting storage class only allowed for erasure coding mode".to_owned());
        }
        Ok(())
    }
}

impl Default for DriveParity {
    fn default() -> Self {
        Self::new(DEFAULT_DRIVE_COUNT)
    }
}

impl ParityValidator for DriveParity {
    fn validate_standard(&self, parity: usize, rrs_parity: usize) -> Result<(), String> {
        self.check_erasure_mode()?;

        if rrs_parity == 0 {
            if parity < MIN_PARITY_DRIVES {
                return Err(format!(
                    "standard storage class parity should be greater than or equal to {MIN_PARITY_DRIVES}"
                ));
            }
        } else if parity <= rrs_parity {
            return Err(format!(
                "standard storage class parity disks should be greater than {rrs_parity}"
            ));
        }

        let half = self.drive_count / 2;
        if parity > half {
            return Err(format!(
                "standard storage class parity disks should be less than or equal to {half}"
            ));
        }
        Ok(())
    }

    fn validate_reduced_redundancy(
        &self,
        parity: usize,
        standard_parity: usize,
    ) -> Result<(), String> {
        self.check_erasure_mode()?;

        if self.drive_count == 4 && parity != 0 {
            return Err("reduced redundancy storage class not supported for 4 disk setup".to_owned());
        }
        if parity < MIN_PARITY_DRIVES {
            return Err(format!(
                "reduced redundancy storage class parity should be greater than or equal to {MIN_PARITY_DRIVES}"
            ));
        }

        let limit = if standard_parity == 0 {
            self.drive_count / 2
        } else {
            standard_parity
        };
        if parity >= limit {
            return Err(format!(
                "reduced redundancy storage class parity disks should be less than {limit}"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_and_format_storage_class() {
        let sc: StorageClass = "EC:3".parse().unwrap();
        assert_eq!(sc, StorageClass::erasure(3));
        assert_eq!(sc.to_string(), "EC:3");

        let empty: StorageClass = "".parse().unwrap();
        assert!(!empty.is_set());
        assert_eq!(empty.to_string(), "");
    }

    #[test]
    fn test_should_reject_malformed_storage_class() {
        for raw in ["EC", "EC:", "EC:x", "RS:2", "ec:2", "EC:-1"] {
            assert!(
                matches!(raw.parse::<StorageClass>(), Err(ConfigError::InvalidStorageClass(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_should_serialize_as_string() {
        let config = StorageClassConfig {
            standard: StorageClass::erasure(4),
            rrs: StorageClass::default(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"standard":"EC:4","rrs":""}"#);

        let back: StorageClassConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_should_default_missing_classes() {
        let config: StorageClassConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.is_configured());
    }

    #[test]
    fn test_should_accept_consistent_parities() {
        let rules = DriveParity::new(16);
        assert!(rules.validate_standard(8, 0).is_ok());
        assert!(rules.validate_standard(6, 2).is_ok());
        assert!(rules.validate_reduced_redundancy(2, 6).is_ok());
        assert!(rules.validate_reduced_redundancy(7, 0).is_ok());
    }

    #[test]
    fn test_should_reject_parity_below_minimum() {
        let rules = DriveParity::new(16);
        assert!(rules.validate_standard(1, 0).is_err());
        assert!(rules.validate_reduced_redundancy(1, 6).is_err());
    }

    #[test]
    fn test_should_reject_standard_parity_above_half_the_drives() {
        let rules = DriveParity::new(8);
        assert!(rules.validate_standard(4, 0).is_ok());
        assert!(rules.validate_standard(5, 0).is_err());
    }

    #[test]
    fn test_should_reject_rrs_not_below_standard() {
        let rules = DriveParity::new(16);
        assert!(rules.validate_reduced_redundancy(4, 4).is_err());
        assert!(rules.validate_standard(4, 4).is_err());
        assert!(rules.validate_reduced_redundancy(8, 0).is_err());
    }

    #[test]
    fn test_should_reject_storage_class_without_erasure_mode() {
        let rules = DriveParity::new(1);
        assert!(rules.validate_standard(2, 0).is_err());
        assert!(rules.validate_reduced_redundancy(2, 0).is_err());

        let four = DriveParity::new(4);
        assert!(four.validate_reduced_redundancy(2, 0).is_err());
    }

    #[test]
    fn test_should_validate_pair_and_name_failing_class() {
        let rules = DriveParity::new(16);
        let good = StorageClassConfig {
            standard: StorageClass::erasure(6),
            rrs: StorageClass::erasure(2),
        };
        assert!(good.validate(&rules).is_ok());

        let bad = StorageClassConfig {
            standard: StorageClass::erasure(2),
            rrs: StorageClass::erasure(4),
        };
        let err = bad.validate(&rules).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::StorageClassParity { class: "rrs", ref value, .. } if value == "EC:4"
        ));
    }

    #[test]
    fn test_should_skip_validation_when_unset() {
        let rules = DriveParity::new(1);
        assert!(StorageClassConfig::default().validate(&rules).is_ok());
    }
}
