//! Declarative field rules and record validation.
//!
//! A [`Schema`] is a closed, ordered set of named [`FieldRule`]s. Validation walks the
//! declared fields in declaration order and then rejects any field on the record that
//! the schema does not declare (`_id` excepted).
//!
//! # Example
//!
//! ```ignore
//! use docmap::schema::{FieldKind, FieldRule, Schema};
//!
//! let address = Schema::new()
//!     .field("street", FieldRule::new(FieldKind::String).required())
//!     .field("zip_code", FieldKind::String);
//!
//! let user = Schema::new()
//!     .field("first_name", FieldRule::new(FieldKind::String).required())
//!     .field("last_name", FieldKind::String)
//!     .field(
//!         "street_addresses",
//!         FieldRule::new(FieldKind::Array)
//!             .schema(address)
//!             .elements_match_schema(),
//!     );
//! ```

use bson::Bson;
use std::{fmt, sync::Arc};

use crate::{attributes::AttributeMap, error::FieldError};

type Validator = Arc<dyn Fn(&Bson, Option<&Schema>) -> bool + Send + Sync>;

/// The kind of value a field is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    /// 32-bit integer.
    Int32,
    /// 64-bit integer.
    Int64,
    /// Either integer width.
    Integer,
    Double,
    /// Any numeric value, including decimals.
    Number,
    Boolean,
    Array,
    /// An embedded document.
    Document,
    ObjectId,
    DateTime,
    Binary,
    /// Accepts every value.
    Any,
}

impl FieldKind {
    /// Returns `true` when `value` is of this kind.
    pub fn matches(&self, value: &Bson) -> bool {
        match (self, value) {
            (FieldKind::Any, _) => true,
            (FieldKind::String, Bson::String(_)) => true,
            (FieldKind::Int32, Bson::Int32(_)) => true,
            (FieldKind::Int64, Bson::Int64(_)) => true,
            (FieldKind::Integer, Bson::Int32(_) | Bson::Int64(_)) => true,
            (FieldKind::Double, Bson::Double(_)) => true,
            (
                FieldKind::Number,
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_),
            ) => true,
            (FieldKind::Boolean, Bson::Boolean(_)) => true,
            (FieldKind::Array, Bson::Array(_)) => true,
            (FieldKind::Document, Bson::Document(_)) => true,
            (FieldKind::ObjectId, Bson::ObjectId(_)) => true,
            (FieldKind::DateTime, Bson::DateTime(_)) => true,
            (FieldKind::Binary, Bson::Binary(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "string",
            FieldKind::Int32 => "int",
            FieldKind::Int64 => "long",
            FieldKind::Integer => "integer",
            FieldKind::Double => "double",
            FieldKind::Number => "number",
            FieldKind::Boolean => "bool",
            FieldKind::Array => "array",
            FieldKind::Document => "object",
            FieldKind::ObjectId => "objectId",
            FieldKind::DateTime => "date",
            FieldKind::Binary => "binData",
            FieldKind::Any => "any",
        };

        f.write_str(name)
    }
}

/// The type alias of a concrete value, as reported in type mismatch errors.
pub fn kind_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Timestamp(_) => "timestamp",
        Bson::Binary(_) => "binData",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Decimal128(_) => "decimal",
        _ => "unknown",
    }
}

/// The rule a single field must satisfy.
#[derive(Clone)]
pub struct FieldRule {
    kind: FieldKind,
    required: bool,
    validator: Option<Validator>,
    schema: Option<Schema>,
}

impl FieldRule {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            validator: None,
            schema: None,
        }
    }

    /// Marks the field as required; an absent or null value fails validation.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attaches a custom predicate. Absent fields are passed to it as `Bson::Null`.
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Bson) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(move |value, _| validator(value)));
        self
    }

    /// Attaches a custom predicate that also receives this rule's nested schema.
    pub fn validator_with_schema<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Bson, Option<&Schema>) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Sets the nested schema describing embedded sub-documents.
    ///
    /// The nested schema is never applied on its own; a validator has to consult it.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Installs a validator requiring an array whose elements are documents carrying
    /// every required key of the nested schema. Null values pass.
    pub fn elements_match_schema(self) -> Self {
        self.validator_with_schema(|value, nested| match value {
            Bson::Null => true,
            Bson::Array(items) => match nested {
                Some(schema) => items.iter().all(|item| schema.admits(item)),
                None => true,
            },
            _ => false,
        })
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn nested_schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    fn check(&self, field: &str, value: &Bson) -> Result<(), FieldError> {
        if let Some(validator) = &self.validator {
            if !validator(value, self.schema.as_ref()) {
                return Err(FieldError::Invalid { field: field.to_string() });
            }
        }

        if matches!(value, Bson::Null) {
            if self.required {
                return Err(FieldError::MissingRequired { field: field.to_string() });
            }

            return Ok(());
        }

        if !self.kind.matches(value) {
            return Err(FieldError::TypeMismatch {
                field: field.to_string(),
                expected: self.kind.to_string(),
                actual: kind_name(value).to_string(),
            });
        }

        Ok(())
    }
}

impl From<FieldKind> for FieldRule {
    fn from(kind: FieldKind) -> Self {
        FieldRule::new(kind)
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("validator", &self.validator.as_ref().map(|_| "<fn>"))
            .field("schema", &self.schema)
            .finish()
    }
}

/// An ordered, closed set of field rules.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, FieldRule)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field. Declaring a name twice replaces the earlier rule in place.
    pub fn field(mut self, name: impl Into<String>, rule: impl Into<FieldRule>) -> Self {
        let name = name.into();
        let rule = rule.into();

        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = rule,
            None => self.fields.push((name, rule)),
        }

        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, rule)| rule)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields
            .iter()
            .map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validates a set of fields against this schema.
    ///
    /// Declared fields are checked first, in declaration order: the custom validator,
    /// then presence of required fields, then the value kind. Afterwards every field
    /// on the instance other than `_id` must be declared. The first violation found
    /// is returned.
    pub fn validate(&self, fields: &AttributeMap) -> Result<(), FieldError> {
        for (name, rule) in &self.fields {
            rule.check(name, &fields[name.as_str()])?;
        }

        for name in fields.keys() {
            if name != "_id" && !self.contains(name) {
                return Err(FieldError::UnknownField { field: name.clone() });
            }
        }

        Ok(())
    }

    /// Returns `true` when `value` is a document holding every required field of
    /// this schema. Kinds and validators are not consulted.
    pub fn admits(&self, value: &Bson) -> bool {
        match value {
            Bson::Document(document) => self
                .fields
                .iter()
                .filter(|(_, rule)| rule.required)
                .all(|(name, _)| document.contains_key(name)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};

    use super::*;

    fn user_schema() -> Schema {
        let address = Schema::new()
            .field("street", FieldRule::new(FieldKind::String).required())
            .field("zip_code", FieldRule::new(FieldKind::String).required());

        Schema::new()
            .field("first_name", FieldRule::new(FieldKind::String).required())
            .field("last_name", FieldKind::String)
            .field("age", FieldKind::Integer)
            .field(
                "street_addresses",
                FieldRule::new(FieldKind::Array)
                    .schema(address)
                    .elements_match_schema(),
            )
    }

    #[test]
    fn accepts_valid_fields() {
        let fields = AttributeMap::from(doc! {
            "_id": ObjectId::new(),
            "first_name": "Evan",
            "age": 40_i64,
            "street_addresses": [{ "street": "Storgatan 1", "zip_code": "12345" }],
        });

        assert_eq!(user_schema().validate(&fields), Ok(()));
    }

    #[test]
    fn reports_missing_required_field() {
        let fields = AttributeMap::from(doc! { "last_name": "Smith" });

        assert_eq!(
            user_schema().validate(&fields),
            Err(FieldError::MissingRequired { field: "first_name".to_string() })
        );

        let fields = AttributeMap::from(doc! { "first_name": Bson::Null });
        assert!(matches!(
            user_schema().validate(&fields),
            Err(FieldError::MissingRequired { .. })
        ));
    }

    #[test]
    fn reports_type_mismatch_with_kind_names() {
        let fields = AttributeMap::from(doc! { "first_name": "Evan", "age": "forty" });

        assert_eq!(
            user_schema().validate(&fields),
            Err(FieldError::TypeMismatch {
                field: "age".to_string(),
                expected: "integer".to_string(),
                actual: "string".to_string(),
            })
        );
    }

    #[test]
    fn reports_unknown_field_after_declared_fields() {
        let fields = AttributeMap::from(doc! { "nickname": "ev", "first_name": 5 });

        // Declared fields are checked before unknown ones.
        assert!(matches!(
            user_schema().validate(&fields),
            Err(FieldError::TypeMismatch { .. })
        ));

        let fields = AttributeMap::from(doc! { "first_name": "Evan", "nickname": "ev" });
        assert_eq!(
            user_schema().validate(&fields),
            Err(FieldError::UnknownField { field: "nickname".to_string() })
        );
    }

    #[test]
    fn validator_runs_before_required_check() {
        let schema = Schema::new().field(
            "email",
            FieldRule::new(FieldKind::String)
                .required()
                .validator(|value| value.as_str().is_some_and(|s| s.contains('@'))),
        );

        assert_eq!(
            schema.validate(&AttributeMap::new()),
            Err(FieldError::Invalid { field: "email".to_string() })
        );
        assert_eq!(
            schema.validate(&AttributeMap::from(doc! { "email": "evan@example.com" })),
            Ok(())
        );
    }

    #[test]
    fn nested_schema_is_only_applied_through_validator() {
        let fields = AttributeMap::from(doc! {
            "first_name": "Evan",
            "street_addresses": [{ "street": "Storgatan 1" }],
        });

        assert_eq!(
            user_schema().validate(&fields),
            Err(FieldError::Invalid { field: "street_addresses".to_string() })
        );

        let permissive = Schema::new().field(
            "street_addresses",
            FieldRule::new(FieldKind::Array).schema(Schema::new().field(
                "street",
                FieldRule::new(FieldKind::String).required(),
            )),
        );
        let fields = AttributeMap::from(doc! { "street_addresses": [{ "zip_code": 1 }] });
        assert_eq!(permissive.validate(&fields), Ok(()));
    }

    #[test]
    fn redeclaring_a_field_replaces_its_rule() {
        let schema = Schema::new()
            .field("a", FieldKind::String)
            .field("b", FieldKind::String)
            .field("a", FieldKind::Integer);

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("a").map(FieldRule::kind), Some(FieldKind::Integer));
        assert_eq!(schema.iter().map(|(name, _)| name).collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
