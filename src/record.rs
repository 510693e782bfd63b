//! Records: an identifier, its embedding, and the payload it carries

use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payload field conventionally holding the display name (color name, word).
pub const NAME_FIELD: &str = "name";

/// Arbitrary string data attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Payload {
    fields: BTreeMap<String, String>,
}

impl Payload {
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// A payload holding only a `name` field.
    pub fn named(name: impl Into<String>) -> Self {
        let mut payload = Self::new();
        payload.insert(NAME_FIELD, name);
        payload
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME_FIELD)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub vector: Vector,
    #[serde(default)]
    pub payload: Payload,
}

impl Record {
    pub fn new(id: impl Into<String>, vector: impl Into<Vector>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            vector: vector.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_payload() {
        let payload = Payload::named("crimson");
        assert_eq!(payload.name(), Some("crimson"));
        assert_eq!(payload.get("missing"), None);
    }

    #[test]
    fn test_payload_fields_are_ordered() {
        let mut payload = Payload::new();
        payload.insert("rgb", "220,20,60");
        payload.insert("name", "crimson");
        let keys: Vec<&str> = payload.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "rgb"]);
    }

    #[test]
    fn test_record_json_shape() {
        let record: Record =
            serde_json::from_str(r#"{"id":"c1","vector":[255,0,0],"payload":{"name":"red"}}"#)
                .unwrap();
        assert_eq!(record.id, "c1");
        assert_eq!(record.vector.as_slice(), &[255.0, 0.0, 0.0]);
        assert_eq!(record.payload.name(), Some("red"));

        let bare: Record = serde_json::from_str(r#"{"id":"c2","vector":[0,0,0]}"#).unwrap();
        assert!(bare.payload.is_empty());
    }
}
