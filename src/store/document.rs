//! # Document
//!
//! The parsed contents of a store file: one JSON object whose top-level keys
//! are user keys, plus the reserved [`MARKER_KEY`] recording that `init()` ran.
//!
//! Every accessor on [`Document`] hides the marker, so callers enumerating keys,
//! values or entries never see it. Only the serialized form carries it.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Reserved top-level key holding the initialization flag
pub const MARKER_KEY: &str = "initialized";

/// A key together with its value, as returned by `all()` and `find()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub key: String,
    pub value: Value,
}

/// The full key-value mapping persisted in one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Map<String, Value>,
}

impl Document {
    /// Create an empty, uninitialized document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from raw file contents.
    ///
    /// # Returns
    /// * `Result<Document>` - The document, `Serialization` if the bytes are not
    ///   JSON, or `InvalidDocument` if the top level is not an object
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        match serde_json::from_slice(bytes)? {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(StoreError::InvalidDocument {
                found: value_kind(&other).to_string(),
            }),
        }
    }

    /// Encode the document, marker included, for writing back to the file.
    pub fn to_bytes(&self, pretty: bool) -> Result<Vec<u8>> {
        let bytes = if pretty {
            serde_json::to_vec_pretty(&self.entries)?
        } else {
            serde_json::to_vec(&self.entries)?
        };
        Ok(bytes)
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.entries.get(MARKER_KEY), Some(Value::Bool(true)))
    }

    pub fn mark_initialized(&mut self) {
        self.entries
            .insert(MARKER_KEY.to_string(), Value::Bool(true));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        if key == MARKER_KEY {
            return None;
        }
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        if key == MARKER_KEY {
            return None;
        }
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or overwrite a user key, returning the previous value.
    ///
    /// # Errors
    /// * `InvalidKey` - `key` is [`MARKER_KEY`], which only
    ///   [`mark_initialized`](Self::mark_initialized) may change
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Value>> {
        let key = key.into();
        if key == MARKER_KEY {
            return Err(StoreError::invalid_key(format!(
                "'{}' is reserved by the store",
                MARKER_KEY
            )));
        }
        Ok(self.entries.insert(key, value))
    }

    /// Remove a user key, keeping the order of the remaining keys.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if key == MARKER_KEY {
            return None;
        }
        self.entries.shift_remove(key)
    }

    /// User entries in stored order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().filter(|(key, _)| key.as_str() != MARKER_KEY)
    }

    pub fn keys(&self) -> Vec<String> {
        self.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.iter().map(|(_, value)| value.clone()).collect()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.iter()
            .map(|(key, value)| Entry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// Number of user keys.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

/// Renders the document exactly as it is persisted.
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.entries).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Human-readable JSON type name, used in error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rejects_non_objects() {
        let err = Document::from_slice(b"[1, 2]").unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument { found } if found == "array"));

        let err = Document::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn test_marker_hidden_from_views() {
        let doc = Document::from_slice(br#"{"a":1,"initialized":true,"b":[2]}"#).unwrap();

        assert!(doc.is_initialized());
        assert_eq!(doc.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(doc.values(), vec![json!(1), json!([2])]);
        assert_eq!(doc.len(), 2);
        assert!(doc.get(MARKER_KEY).is_none());
        assert!(!doc.contains_key(MARKER_KEY));
    }

    #[test]
    fn test_marker_must_be_true() {
        let doc = Document::from_slice(br#"{"initialized":false}"#).unwrap();
        assert!(!doc.is_initialized());

        let doc = Document::from_slice(br#"{"initialized":"yes"}"#).unwrap();
        assert!(!doc.is_initialized());

        let mut doc = Document::new();
        assert!(!doc.is_initialized());
        doc.mark_initialized();
        assert!(doc.is_initialized());
        assert!(doc.is_empty());
    }

    #[test]
    fn test_insert_rejects_marker_key() {
        let mut doc = Document::new();
        doc.mark_initialized();

        assert!(matches!(
            doc.insert(MARKER_KEY, json!(false)),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(doc.remove(MARKER_KEY).is_none());
        assert!(doc.is_initialized());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut doc = Document::new();
        doc.insert("zeta", json!(1)).unwrap();
        doc.insert("alpha", json!(2)).unwrap();
        doc.insert("mid", json!(3)).unwrap();
        doc.remove("alpha");
        assert_eq!(doc.insert("beta", json!(4)).unwrap(), None);
        assert_eq!(doc.insert("mid", json!(5)).unwrap(), Some(json!(3)));

        assert_eq!(doc.keys(), vec!["zeta", "mid", "beta"]);
    }

    #[test]
    fn test_display_includes_marker() {
        let mut doc = Document::new();
        doc.mark_initialized();
        doc.insert("name", json!("filekv")).unwrap();

        assert_eq!(doc.to_string(), r#"{"initialized":true,"name":"filekv"}"#);
        assert_eq!(doc.to_bytes(false).unwrap(), doc.to_string().into_bytes());
    }

    #[test]
    fn test_pretty_output_parses_back() {
        let mut doc = Document::new();
        doc.insert("list", json!([1, 2, 3])).unwrap();

        let pretty = doc.to_bytes(true).unwrap();
        assert!(pretty.contains(&b'\n'));
        assert_eq!(Document::from_slice(&pretty).unwrap(), doc);
    }

    #[test]
    fn test_entries_serialize_as_key_value_objects() {
        let mut doc = Document::new();
        doc.insert("n", json!(7)).unwrap();

        let entries = serde_json::to_value(doc.entries()).unwrap();
        assert_eq!(entries, json!([{"key": "n", "value": 7}]));
    }
}
