//! Notification target block.
//!
//! The configuration store carries notification targets without interpreting
//! them: a map from target kind to a map from target ID to an opaque JSON
//! target configuration. Validation is delegated to a [`NotifyValidator`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ConfigError, ConfigResult};

/// ID of the default target created for every kind.
pub const DEFAULT_TARGET_ID: &str = "1";

/// Supported notification target kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    /// AMQP exchange.
    Amqp,
    /// MQTT broker.
    Mqtt,
    /// Elasticsearch index.
    Elasticsearch,
    /// Redis key.
    Redis,
    /// NATS subject.
    Nats,
    /// PostgreSQL table.
    Postgresql,
    /// MySQL table.
    Mysql,
    /// Kafka topic.
    Kafka,
    /// HTTP webhook.
    Webhook,
}

impl NotifyKind {
    /// Every supported kind.
    pub const ALL: [Self; 9] = [
        Self::Amqp,
        Self::Mqtt,
        Self::Elasticsearch,
        Self::Redis,
        Self::Nats,
        Self::Postgresql,
        Self::Mysql,
        Self::Kafka,
        Self::Webhook,
    ];
}

/// Notification targets grouped by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifyConfig {
    targets: BTreeMap<NotifyKind, BTreeMap<String, Value>>,
}

impl Default for NotifyConfig {
    /// Every supported kind with a single disabled target `"1"`.
    fn default() -> Self {
        let targets = NotifyKind::ALL
            .into_iter()
            .map(|kind| {
                let mut ids = BTreeMap::new();
                ids.insert(DEFAULT_TARGET_ID.to_owned(), json!({ "enable": false }));
                (kind, ids)
            })
            .collect();
        Self { targets }
    }
}

impl NotifyConfig {
    /// A block with no targets at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            targets: BTreeMap::new(),
        }
    }

    /// Targets configured for `kind`.
    #[must_use]
    pub fn targets(&self, kind: NotifyKind) -> Option<&BTreeMap<String, Value>> {
        self.targets.get(&kind)
    }

    /// Insert or replace a target.
    pub fn set_target(&mut self, kind: NotifyKind, id: impl Into<String>, target: Value) {
        self.targets.entry(kind).or_default().insert(id.into(), target);
    }

    /// Iterate over `(kind, id, target)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (NotifyKind, &str, &Value)> {
        self.targets
            .iter()
            .flat_map(|(kind, ids)| ids.iter().map(move |(id, v)| (*kind, id.as_str(), v)))
    }

    /// Run the block through `validator`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Notification`] carrying the validator's reason.
    pub fn validate(&self, validator: &dyn NotifyValidator) -> ConfigResult<()> {
        validator.validate(self).map_err(ConfigError::Notification)
    }
}

/// Validation capability for the notification block.
pub trait NotifyValidator: Send + Sync {
    /// Check the whole block.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the block is rejected.
    fn validate(&self, notify: &NotifyConfig) -> Result<(), String>;
}

/// Structural checks shared by every target kind.
///
/// Each target ID must be non-empty, each target must be a JSON object, and
/// its `enable` field, when present, must be a boolean. Kind-specific fields
/// are not inspected.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicNotifyValidator;

impl NotifyValidator for BasicNotifyValidator {
    fn validate(&self, notify: &NotifyConfig) -> Result<(), String> {
        for (kind, id, target) in notify.iter() {
            if id.is_empty() {
                return Err(format!("{kind:?} target has an empty id"));
            }
            let Some(fields) = target.as_object() else {
                return Err(format!("{kind:?} target {id} must be an object"));
            };
            if fields.get("enable").is_some_and(|v| !v.is_boolean()) {
                return Err(format!("{kind:?} target {id}: enable must be a boolean"));
            }
        }
        Ok(())
    }
}
