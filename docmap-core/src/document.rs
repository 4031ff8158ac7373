//! Map-like records and their persistence.
//!
//! A [`Record`] is an instance of a [`DocumentType`]: an optional identity plus an
//! [`AttributeMap`] of fields. It dereferences to the map, so every map operation is
//! available directly on the record.
//!
//! A record without identity has never been stored. Saving it inserts all fields and
//! assigns the identity the store returns. Saving a record that has an identity
//! re-reads the stored copy and writes only the fields that differ; a record whose
//! fields all match the stored copy is not written at all.
//!
//! # Example
//!
//! ```ignore
//! let mut user = users.create([("first_name", "Evan"), ("last_name", "Smith")])?;
//! user.save().await?;
//! assert!(user.id().is_some());
//!
//! user["last_name"] = "Jones".into();
//! assert_eq!(user.changed_fields().await?, vec!["last_name".to_string()]);
//! user.save().await?;
//! ```

use bson::{Bson, Document, de::deserialize_from_bson, oid::ObjectId};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::ops::{Deref, DerefMut};
use tracing::debug;

use crate::{
    attributes::AttributeMap,
    backend::{Update, id_filter},
    document_type::DocumentType,
    error::{DocumentStoreError, DocumentStoreResult},
};

const ID_FIELD: &str = "_id";

/// Persistence state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// No identity; never stored.
    Unpersisted,
    /// Identity assigned.
    Persisted,
}

/// Conversion of the accepted lookup forms into an identity value.
///
/// Strings are read as hex `ObjectId`s; a string that is not one converts to
/// `None`. `Bson` values are used as they are, except `null`.
pub trait IntoDocumentId {
    fn into_document_id(self) -> Option<Bson>;
}

impl IntoDocumentId for ObjectId {
    fn into_document_id(self) -> Option<Bson> {
        Some(Bson::ObjectId(self))
    }
}

impl IntoDocumentId for &ObjectId {
    fn into_document_id(self) -> Option<Bson> {
        Some(Bson::ObjectId(*self))
    }
}

impl IntoDocumentId for &str {
    fn into_document_id(self) -> Option<Bson> {
        ObjectId::parse_str(self).ok().map(Bson::ObjectId)
    }
}

impl IntoDocumentId for String {
    fn into_document_id(self) -> Option<Bson> {
        self.as_str().into_document_id()
    }
}

impl IntoDocumentId for &String {
    fn into_document_id(self) -> Option<Bson> {
        self.as_str().into_document_id()
    }
}

impl IntoDocumentId for Bson {
    fn into_document_id(self) -> Option<Bson> {
        match self {
            Bson::Null => None,
            id => Some(id),
        }
    }
}

impl IntoDocumentId for &Bson {
    fn into_document_id(self) -> Option<Bson> {
        self.clone().into_document_id()
    }
}

/// Takes the `_id` entry out of `fields`. `null` means no identity.
pub(crate) fn take_identity(fields: &mut AttributeMap) -> Option<Bson> {
    fields.remove(ID_FIELD).and_then(IntoDocumentId::into_document_id)
}

/// Identity rendered for error messages: the hex form for `ObjectId`s.
fn identity_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(id) => id.to_hex(),
        Bson::String(id) => id.clone(),
        other => other.to_string(),
    }
}

/// A single document of a declared [`DocumentType`].
///
/// The identity is owned by the record and never changes once assigned. An `_id`
/// entry written into the field map is not persisted: inserts, change detection and
/// updates all skip it.
#[derive(Debug, Clone)]
pub struct Record {
    id: Option<Bson>,
    fields: AttributeMap,
    kind: DocumentType,
}

impl Record {
    pub(crate) fn new(id: Option<Bson>, fields: AttributeMap, kind: DocumentType) -> Self {
        Self { id, fields, kind }
    }

    /// The identity, if the record has been saved or was read from the store.
    ///
    /// Identities are opaque: stored documents keep whatever `_id` they were read with.
    pub fn id(&self) -> Option<&Bson> {
        self.id.as_ref()
    }

    /// The identity as an `ObjectId`, when it is one.
    pub fn object_id(&self) -> Option<ObjectId> {
        self.id.as_ref().and_then(Bson::as_object_id)
    }

    pub fn state(&self) -> RecordState {
        match self.id {
            Some(_) => RecordState::Persisted,
            None => RecordState::Unpersisted,
        }
    }

    pub fn document_type(&self) -> &DocumentType {
        &self.kind
    }

    pub fn fields(&self) -> &AttributeMap {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut AttributeMap {
        &mut self.fields
    }

    /// Sets a field and returns the record, for keyword-style construction.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.fields.insert(key, value);
        self
    }

    /// The full document: `_id` (when assigned) followed by every field.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();

        if let Some(id) = &self.id {
            document.insert(ID_FIELD, id.clone());
        }

        for (name, value) in self.persisted_fields() {
            document.insert(name.clone(), value.clone());
        }

        document
    }

    fn persisted_fields(&self) -> impl Iterator<Item = (&String, &Bson)> {
        self.fields
            .iter()
            .filter(|(name, _)| name.as_str() != ID_FIELD)
    }

    /// Top-level names containing `.` or starting with `$` are paths or operators
    /// to a document store, not field names.
    fn check_field_names(&self) -> DocumentStoreResult<()> {
        match self
            .persisted_fields()
            .find(|(name, _)| name.contains('.') || name.starts_with('$'))
        {
            Some((name, _)) => Err(DocumentStoreError::InvalidDocument(format!(
                "Field name '{name}' must not contain '.' or start with '$'"
            ))),
            None => Ok(()),
        }
    }

    pub fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(serde_json::to_value(self.to_document())?)
    }

    /// Deserializes the full document, `_id` included, into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> DocumentStoreResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.to_document()))?)
    }

    /// Validates the fields against the document type's schema, if it has one.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if let Some(schema) = self.kind.schema() {
            schema.validate(&self.fields)?;
        }

        Ok(())
    }

    /// Names of the fields whose values differ from the stored copy.
    ///
    /// A record without identity, or whose stored copy is gone, reports every field.
    /// Fields absent from the stored copy count as changed. Fields only present in
    /// the stored copy are not reported.
    ///
    /// Field names are projected as given; [`save`](Self::save) rejects names that a
    /// store would read as paths or operators.
    pub async fn changed_fields(&self) -> DocumentStoreResult<Vec<String>> {
        let projection = self
            .persisted_fields()
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();

        let Some(id) = &self.id else {
            return Ok(projection);
        };

        let stored = self
            .kind
            .collection()?
            .find_one(&id_filter(id), Some(&projection))
            .await?;

        Ok(match stored {
            None => projection,
            Some(stored) => self
                .persisted_fields()
                .filter(|(name, value)| stored.get(name.as_str()) != Some(*value))
                .map(|(name, _)| name.clone())
                .collect(),
        })
    }

    /// Returns `true` when no field differs from the stored copy.
    pub async fn is_saved(&self) -> DocumentStoreResult<bool> {
        Ok(self.changed_fields().await?.is_empty())
    }

    /// Persists the record.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::CollectionConfig`] if the type has no bound collection.
    /// - [`DocumentStoreError::Field`] if schema validation fails; nothing is written.
    /// - [`DocumentStoreError::InvalidDocument`] if a field name contains `.` or starts
    ///   with `$`; nothing is written.
    /// - [`DocumentStoreError::DocumentNotFound`] if the record has an identity that
    ///   no longer exists in the collection.
    pub async fn save(&mut self) -> DocumentStoreResult<&mut Self> {
        let collection = self.kind.collection()?.clone();

        self.validate()?;
        self.check_field_names()?;

        match self.id.clone() {
            None => {
                let payload = self
                    .persisted_fields()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect::<Document>();

                let id = collection.insert_one(payload).await?;

                debug!(collection = collection.name(), %id, "Inserted document");
                self.id = Some(id);
            }
            Some(id) => {
                let changed = self.changed_fields().await?;

                if changed.is_empty() {
                    debug!(collection = collection.name(), %id, "Document unchanged, skipping update");
                    return Ok(self);
                }

                let set = changed
                    .iter()
                    .filter_map(|name| {
                        self.fields
                            .get(name)
                            .map(|value| (name.clone(), value.clone()))
                    })
                    .collect::<Document>();

                let outcome = collection
                    .update_one(&id_filter(&id), &Update::set(set))
                    .await?;

                if outcome.matched == 0 {
                    return Err(DocumentStoreError::DocumentNotFound(
                        identity_string(&id),
                        collection.name().to_string(),
                    ));
                }

                debug!(collection = collection.name(), %id, fields = ?changed, "Updated document");
            }
        }

        Ok(self)
    }

    /// Removes a field from the stored copy.
    ///
    /// The in-memory field is left in place, so a following save writes it back.
    /// Records without identity have no stored copy and are left untouched.
    pub async fn delete_field(&self, name: &str) -> DocumentStoreResult<()> {
        let collection = self.kind.collection()?;

        let Some(id) = &self.id else {
            return Ok(());
        };

        collection
            .update_one(&id_filter(id), &Update::unset(name))
            .await?;

        debug!(collection = collection.name(), %id, field = name, "Removed stored field");

        Ok(())
    }
}

impl Deref for Record {
    type Target = AttributeMap;

    fn deref(&self) -> &AttributeMap {
        &self.fields
    }
}

impl DerefMut for Record {
    fn deref_mut(&mut self) -> &mut AttributeMap {
        &mut self.fields
    }
}

/// Records nest as their plain field document.
impl From<Record> for Bson {
    fn from(record: Record) -> Self {
        Bson::Document(record.to_document())
    }
}

impl From<Record> for Document {
    fn from(record: Record) -> Self {
        record.to_document()
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn identity_forms() {
        let id = ObjectId::new();

        assert_eq!(id.into_document_id(), Some(Bson::ObjectId(id)));
        assert_eq!(id.to_hex().into_document_id(), Some(Bson::ObjectId(id)));
        assert_eq!("not-an-id".into_document_id(), None);
        assert_eq!(Bson::Null.into_document_id(), None);
        assert_eq!(Bson::Int32(7).into_document_id(), Some(Bson::Int32(7)));
        assert_eq!(
            Bson::String(id.to_hex()).into_document_id(),
            Some(Bson::String(id.to_hex()))
        );
    }

    #[test]
    fn supplied_identity_is_kept_verbatim() {
        let mut fields = AttributeMap::from(doc! { "_id": "custom-key", "name": "Evan" });

        assert_eq!(take_identity(&mut fields), Some(Bson::String("custom-key".to_string())));
        assert!(!fields.contains("_id"));
        assert_eq!(take_identity(&mut fields), None);

        let mut fields = AttributeMap::from(doc! { "_id": Bson::Null });
        assert_eq!(take_identity(&mut fields), None);
    }

    #[test]
    fn identity_strings_for_errors() {
        let id = ObjectId::new();

        assert_eq!(identity_string(&Bson::ObjectId(id)), id.to_hex());
        assert_eq!(identity_string(&Bson::String("abc".to_string())), "abc");
        assert_eq!(identity_string(&Bson::Int32(7)), "7");
    }

    #[test]
    fn id_field_in_map_is_not_part_of_document() {
        let mut user = DocumentType::unbound("User", None)
            .create(doc! { "first_name": "Evan" })
            .unwrap();

        user["_id"] = "overwritten".into();

        assert_eq!(user.id(), None);
        assert_eq!(user.to_document(), doc! { "first_name": "Evan" });
    }

    #[test]
    fn rejects_path_like_field_names() {
        let mut user = DocumentType::unbound("User", None)
            .create(doc! { "first_name": "Evan" })
            .unwrap();

        assert!(user.check_field_names().is_ok());

        user.insert("address.street", "Storgatan 1");
        assert!(matches!(
            user.check_field_names(),
            Err(DocumentStoreError::InvalidDocument(_))
        ));

        user.remove("address.street");
        user.insert("$set", 1);
        assert!(user.check_field_names().is_err());
    }

    #[test]
    fn nested_records_flatten_to_documents() {
        let kind = DocumentType::unbound("Address", None);
        let address = kind
            .create(doc! { "street": "Storgatan 1" })
            .unwrap();

        let user = DocumentType::unbound("User", None)
            .create(doc! { "first_name": "Evan" })
            .unwrap()
            .with("address", &address);

        assert_eq!(
            user.to_document(),
            doc! { "first_name": "Evan", "address": { "street": "Storgatan 1" } }
        );
        assert_eq!(user.state(), RecordState::Unpersisted);
    }

    #[test]
    fn map_and_field_views_agree() {
        let mut user = DocumentType::unbound("User", None)
            .create(AttributeMap::new())
            .unwrap();

        user["first_name"] = "Evan".into();
        user.fields_mut().insert("last_name", "Smith");

        assert_eq!(user.get_str("first_name"), Some("Evan"));
        assert_eq!(user["last_name"], Bson::String("Smith".to_string()));
        assert!(user.contains("last_name"));
        assert_eq!(user.len(), 2);
    }
}
