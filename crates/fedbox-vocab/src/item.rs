use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VocabError;
use crate::kinds;

/// Audience fields, in the order they are collected.
pub const AUDIENCE_FIELDS: &[&str] = &["to", "cc", "bto", "bcc", "audience"];

/// An ActivityStreams document, or a bare IRI standing in for one.
///
/// `Item` keeps the raw JSON so that fields storage does not understand
/// survive a save/load round-trip untouched. A link (a JSON string) is
/// promoted to an object `{"id": ...}` the first time a field is set on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Item(Value);

impl Item {
    /// A bare IRI reference.
    pub fn link(iri: impl Into<String>) -> Self {
        Self(Value::String(iri.into()))
    }

    /// A new object document of the given type.
    pub fn new(kind: &str, id: Option<&str>) -> Self {
        let mut doc = Map::new();
        if let Some(id) = id {
            doc.insert("id".into(), Value::String(id.to_string()));
        }
        doc.insert("type".into(), Value::String(kind.to_string()));
        Self(Value::Object(doc))
    }

    /// Decode from JSON bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, VocabError> {
        let value: Value = serde_json::from_slice(data)?;
        Self::try_from(value)
    }

    /// Encode to JSON bytes.
    pub fn to_vec(&self) -> Result<Vec<u8>, VocabError> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn is_link(&self) -> bool {
        self.0.is_string()
    }

    /// The item's IRI: the link itself, or the `id` field of an object.
    pub fn id(&self) -> Option<&str> {
        match &self.0 {
            Value::String(iri) => Some(iri.as_str()),
            Value::Object(doc) => doc.get("id").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn set_id(&mut self, iri: &str) {
        self.set("id", Value::String(iri.to_string()));
    }

    /// The vocabulary type. For multi-typed documents, the first entry.
    pub fn kind(&self) -> Option<&str> {
        match self.get("type")? {
            Value::String(kind) => Some(kind.as_str()),
            Value::Array(kinds) => kinds.iter().find_map(Value::as_str),
            _ => None,
        }
    }

    pub fn is_activity(&self) -> bool {
        self.kind().is_some_and(kinds::is_activity)
    }

    pub fn is_actor(&self) -> bool {
        self.kind().is_some_and(kinds::is_actor)
    }

    pub fn is_collection(&self) -> bool {
        self.kind().is_some_and(kinds::is_collection)
    }

    pub fn is_tombstone(&self) -> bool {
        self.kind().is_some_and(kinds::is_tombstone)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.as_object()?.get(field)
    }

    /// Set a field, promoting a link to an object first.
    pub fn set(&mut self, field: &str, value: Value) {
        if let Value::String(iri) = &self.0 {
            let mut doc = Map::new();
            doc.insert("id".into(), Value::String(iri.clone()));
            self.0 = Value::Object(doc);
        }
        if let Value::Object(doc) = &mut self.0 {
            doc.insert(field.to_string(), value);
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.as_object_mut()?.remove(field)
    }

    /// IRIs referenced by a field that holds a link, an object, or an
    /// array of either.
    pub fn iris(&self, field: &str) -> Vec<String> {
        self.get(field).map(value_iris).unwrap_or_default()
    }

    /// The entries of a field as items (links stay links).
    pub fn items(&self, field: &str) -> Vec<Item> {
        match self.get(field) {
            Some(Value::Array(values)) => values.iter().filter_map(|v| Item::try_from(v.clone()).ok()).collect(),
            Some(value) => Item::try_from(value.clone()).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Text values of a natural-language field as `(language, text)` pairs.
    ///
    /// The plain field (`name`) yields a `None` language; the map form
    /// (`nameMap`) yields one pair per language tag.
    pub fn language_values(&self, field: &str) -> Vec<(Option<String>, String)> {
        let mut values = Vec::new();
        match self.get(field) {
            Some(Value::String(text)) => values.push((None, text.clone())),
            Some(Value::Array(texts)) => {
                values.extend(texts.iter().filter_map(Value::as_str).map(|t| (None, t.to_string())))
            }
            _ => {}
        }
        if let Some(Value::Object(map)) = self.get(&format!("{field}Map")) {
            for (lang, text) in map {
                if let Some(text) = text.as_str() {
                    values.push((Some(lang.clone()), text.to_string()));
                }
            }
        }
        values
    }

    /// The `published` timestamp, when present and well formed.
    pub fn published(&self) -> Option<DateTime<Utc>> {
        let raw = self.get("published")?.as_str()?;
        DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
    }

    /// Every IRI in the item's audience fields, deduplicated in order.
    pub fn recipients(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for field in AUDIENCE_FIELDS {
            for iri in self.iris(field) {
                if !out.contains(&iri) {
                    out.push(iri);
                }
            }
        }
        out
    }

    /// Members listed on a collection document (`orderedItems` or `items`).
    pub fn collection_items(&self) -> Vec<Item> {
        if self.get("orderedItems").is_some() {
            self.items("orderedItems")
        } else {
            self.items("items")
        }
    }
}

/// IRIs held in a JSON value: a string, an object's `id`, or an array of either.
pub fn value_iris(value: &Value) -> Vec<String> {
    match value {
        Value::String(iri) => vec![iri.clone()],
        Value::Object(doc) => doc
            .get("id")
            .and_then(Value::as_str)
            .map(|iri| vec![iri.to_string()])
            .unwrap_or_default(),
        Value::Array(values) => values.iter().flat_map(value_iris).collect(),
        _ => Vec::new(),
    }
}

impl TryFrom<Value> for Item {
    type Error = VocabError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(_) | Value::Object(_) => Ok(Self(value)),
            other => Err(VocabError::InvalidDocument(format!(
                "expected an object or an IRI, got {other}"
            ))),
        }
    }
}

impl From<Item> for Value {
    fn from(item: Item) -> Self {
        item.0
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.kind(), self.id()) {
            (Some(kind), Some(id)) => write!(f, "{kind} {id}"),
            (None, Some(id)) => write!(f, "{id}"),
            (Some(kind), None) => write!(f, "{kind} (no id)"),
            (None, None) => write!(f, "(empty item)"),
        }
    }
}
