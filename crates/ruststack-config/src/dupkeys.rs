//! Duplicate-key detection for JSON documents.
//!
//! `serde_json::Value` keeps only the last of several same-named keys, so a
//! persisted configuration with `"region"` written twice would silently load
//! the second value. [`check_duplicate_keys`] parses the raw text into a
//! [`JsonNode`] tree that preserves every object entry in document order and
//! rejects any object scope declaring the same key more than once.
//!
//! Duplication is scope-local: `{"a": {"x": 1}, "b": {"x": 1}}` is accepted,
//! `{"a": {"x": 1, "x": 2}}` is not.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::error::{ConfigError, ConfigResult};

/// A parsed JSON value that keeps duplicate object keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonNode {
    /// An object literal, entries in document order.
    Object(Vec<(String, JsonNode)>),
    /// An array literal.
    Array(Vec<JsonNode>),
    /// A string, number, boolean or null.
    Scalar,
}

impl<'de> Deserialize<'de> for JsonNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = JsonNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<JsonNode, E> {
        Ok(JsonNode::Scalar)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<JsonNode, E> {
        Ok(JsonNode::Scalar)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<JsonNode, E> {
        Ok(JsonNode::Scalar)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<JsonNode, E> {
        Ok(JsonNode::Scalar)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<JsonNode, E> {
        Ok(JsonNode::Scalar)
    }

    fn visit_unit<E: de::Error>(self) -> Result<JsonNode, E> {
        Ok(JsonNode::Scalar)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<JsonNode, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<JsonNode>()? {
            items.push(item);
        }
        Ok(JsonNode::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<JsonNode, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, JsonNode>()? {
            entries.push((key, value));
        }
        Ok(JsonNode::Object(entries))
    }
}

/// A duplicate found while walking a subtree.
///
/// `path` collects enclosing key names innermost first while unwinding.
#[derive(Debug)]
struct Duplicate {
    path: Vec<String>,
    key: String,
}

impl Duplicate {
    fn within(mut self, segment: String) -> Self {
        self.path.push(segment);
        self
    }
}

impl JsonNode {
    /// Parse `raw` into a tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON, labelled with `file`.
    pub fn parse(raw: &str, file: &str) -> ConfigResult<Self> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            file: file.to_owned(),
            message: e.to_string(),
        })
    }

    fn check_scope(&self) -> Result<(), Duplicate> {
        match self {
            Self::Scalar => Ok(()),
            Self::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    item.check_scope()
                        .map_err(|dup| dup.within(format!("[{index}]")))?;
                }
                Ok(())
            }
            Self::Object(entries) => {
                let mut occurrences: HashMap<&str, usize> = HashMap::with_capacity(entries.len());
                // Nested scopes are checked before this one, so their errors win.
                for (key, value) in entries {
                    *occurrences.entry(key.as_str()).or_default() += 1;
                    value.check_scope().map_err(|dup| dup.within(key.clone()))?;
                }
                match entries
                    .iter()
                    .find(|(key, _)| occurrences.get(key.as_str()).copied().unwrap_or(0) > 1)
                {
                    Some((key, _)) => Err(Duplicate {
                        path: Vec::new(),
                        key: key.clone(),
                    }),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Check recursively that no key is duplicated within the same JSON scope.
///
/// The document is treated as one implicit scope named `root` (the logical
/// file name), which prefixes the path of any reported duplicate.
///
/// # Errors
///
/// - [`ConfigError::Parse`] if `raw` is not valid JSON.
/// - [`ConfigError::DuplicateKey`] naming the first offending key and its
///   enclosing scopes.
///
/// # Examples
///
/// ```
/// use ruststack_config::check_duplicate_keys;
///
/// assert!(check_duplicate_keys(r#"{"key": {"key": 1}}"#, "config.json").is_ok());
///
/// let err = check_duplicate_keys(r#"{"key": {"sub": 1, "sub": 2}}"#, "config.json")
///     .unwrap_err();
/// assert_eq!(err.to_string(), "config.json => key => `sub` entry is duplicated");
/// ```
pub fn check_duplicate_keys(raw: &str, root: &str) -> ConfigResult<()> {
    let tree = JsonNode::parse(raw, root)?;
    tree.check_scope().map_err(|dup| {
        let mut path = dup.path;
        path.push(root.to_owned());
        path.reverse();
        ConfigError::DuplicateKey { path, key: dup.key }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duplicate(raw: &str) -> (Vec<String>, String) {
        match check_duplicate_keys(raw, "config.json") {
            Err(ConfigError::DuplicateKey { path, key }) => (path, key),
            other => panic!("expected DuplicateKey, got {other:?}"),
        }
    }

    #[test]
    fn test_should_accept_document_without_duplicates() {
        let raw = r#"{
            "version": "23",
            "credential": {"accessKey": "admin", "secretKey": "password"},
            "notify": {"amqp": {"1": {"enable": false}}, "mqtt": {"1": {"enable": false}}}
        }"#;
        assert!(check_duplicate_keys(raw, "config.json").is_ok());
    }

    #[test]
    fn test_should_accept_same_key_in_different_scopes() {
        assert!(check_duplicate_keys(r#"{"a": {"x": 1}, "b": {"x": 1}}"#, "config.json").is_ok());
        assert!(check_duplicate_keys(r#"{"key": {"key": {"key": 1}}}"#, "config.json").is_ok());
    }

    #[test]
    fn test_should_accept_empty_object_and_scalars() {
        assert!(check_duplicate_keys("{}", "config.json").is_ok());
        assert!(check_duplicate_keys("[]", "config.json").is_ok());
        assert!(check_duplicate_keys("\"text\"", "config.json").is_ok());
        assert!(check_duplicate_keys("null", "config.json").is_ok());
    }

    #[test]
    fn test_should_reject_duplicate_in_nested_scope() {
        let (path, key) = duplicate(r#"{"a": {"x": 1, "x": 2}}"#);
        assert_eq!(path, vec!["config.json", "a"]);
        assert_eq!(key, "x");
    }

    #[test]
    fn test_should_reject_duplicate_at_top_level() {
        let (path, key) = duplicate(r#"{"region": "us-east-1", "browser": "on", "region": "eu"}"#);
        assert_eq!(path, vec!["config.json"]);
        assert_eq!(key, "region");
    }

    #[test]
    fn test_should_report_nested_error_before_outer_duplicate() {
        let (path, key) = duplicate(r#"{"a": 1, "a": 2, "b": {"c": {"d": 1, "d": 2}}}"#);
        assert_eq!(path, vec!["config.json", "b", "c"]);
        assert_eq!(key, "d");
    }

    #[test]
    fn test_should_report_first_duplicated_key_in_document_order() {
        let (_, key) = duplicate(r#"{"b": 1, "a": 1, "b": 2, "a": 2}"#);
        assert_eq!(key, "b");
    }

    #[test]
    fn test_should_walk_into_arrays() {
        let (path, key) = duplicate(r#"{"list": [{"ok": 1}, {"k": 1, "k": 2}]}"#);
        assert_eq!(path, vec!["config.json", "list", "[1]"]);
        assert_eq!(key, "k");
    }

    #[test]
    fn test_should_not_count_array_elements_as_keys() {
        assert!(check_duplicate_keys(r#"{"list": [{"k": 1}, {"k": 2}]}"#, "config.json").is_ok());
    }

    #[test]
    fn test_should_reject_malformed_json_as_parse_error() {
        let result = check_duplicate_keys(r#"{"a": 1,"#, "config.json");
        assert!(matches!(result, Err(ConfigError::Parse { ref file, .. }) if file == "config.json"));
    }

    #[test]
    fn test_should_preserve_entries_in_tree() {
        let tree = JsonNode::parse(r#"{"x": [1, true], "x": null}"#, "t").unwrap();
        assert_eq!(
            tree,
            JsonNode::Object(vec![
                (
                    "x".to_owned(),
                    JsonNode::Array(vec![JsonNode::Scalar, JsonNode::Scalar])
                ),
                ("x".to_owned(), JsonNode::Scalar),
            ])
        );
    }
}
