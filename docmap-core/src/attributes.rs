//! Field storage shared by every record.
//!
//! [`AttributeMap`] is an insertion-ordered map of field name to [`Bson`] value. A
//! [`Record`](crate::document::Record) dereferences to its map, so the map view and
//! the field-style view of a record read and write the same storage:
//!
//! ```ignore
//! record["first_name"] = "Bob".into();
//! assert_eq!(record.get_str("first_name"), Some("Bob"));
//! record.insert("last_name", "Smith");
//! assert!(record.fields().contains("last_name"));
//! ```
//!
//! Nothing here validates values; that is the job of [`Schema`](crate::schema::Schema).

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::ops::{Index, IndexMut};

use crate::error::{DocumentStoreError, DocumentStoreResult};

static NULL: Bson = Bson::Null;

/// An ordered bag of named fields backed by a BSON document.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct AttributeMap(Document);

impl AttributeMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self(Document::new())
    }

    /// Builds a map from any serializable struct or map.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if the value does not serialize
    /// to a BSON document.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> DocumentStoreResult<Self> {
        match serialize_to_bson(value)? {
            Bson::Document(document) => Ok(Self(document)),
            other => Err(DocumentStoreError::Serialization(format!(
                "expected a document, got {:?}",
                other.element_type()
            ))),
        }
    }

    /// Deserializes the whole map into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> DocumentStoreResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.0.clone()))?)
    }

    /// Builds a map from a JSON object.
    pub fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(Self(serde_json::from_value::<Document>(value)?))
    }

    /// Converts the map to a JSON value.
    pub fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(serde_json::to_value(&self.0)?)
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Bson> {
        self.0.get_mut(key)
    }

    /// Returns the value of a string field, or `None` if absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Bson::as_str)
    }

    /// Deserializes a single field into a typed value.
    ///
    /// Returns `Ok(None)` when the field is absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> DocumentStoreResult<Option<T>> {
        self.0
            .get(key)
            .cloned()
            .map(deserialize_from_bson)
            .transpose()
            .map_err(Into::into)
    }

    /// Inserts a value, returning the previous value of the field if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Bson>) -> Option<Bson> {
        self.0.insert(key.into(), value.into())
    }

    /// Serializes `value` and stores it under `key`.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) -> DocumentStoreResult<()> {
        self.0.insert(key.into(), serialize_to_bson(value)?);

        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Bson> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bson)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying BSON document.
    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

impl From<Document> for AttributeMap {
    fn from(document: Document) -> Self {
        Self(document)
    }
}

impl From<AttributeMap> for Document {
    fn from(map: AttributeMap) -> Self {
        map.0
    }
}

impl From<AttributeMap> for Bson {
    fn from(map: AttributeMap) -> Self {
        Bson::Document(map.0)
    }
}

impl<K: Into<String>, V: Into<Bson>> FromIterator<(K, V)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect()
        )
    }
}

impl<K: Into<String>, V: Into<Bson>, const N: usize> From<[(K, V); N]> for AttributeMap {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for AttributeMap {
    type Item = (String, Bson);
    type IntoIter = bson::document::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeMap {
    type Item = (&'a String, &'a Bson);
    type IntoIter = bson::document::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Reads a field; absent fields read as `Bson::Null`.
impl Index<&str> for AttributeMap {
    type Output = Bson;

    fn index(&self, key: &str) -> &Bson {
        self.0.get(key).unwrap_or(&NULL)
    }
}

/// Writes a field; absent fields are created as `Bson::Null` first.
impl IndexMut<&str> for AttributeMap {
    fn index_mut(&mut self, key: &str) -> &mut Bson {
        self.0
            .entry(key.to_string())
            .or_insert(Bson::Null)
    }
}
