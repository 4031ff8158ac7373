//! Query expression evaluation for in-memory document filtering.
//!
//! This module evaluates [`Expr`] trees against BSON documents, following MongoDB
//! matching rules where they matter to callers: dotted paths reach into embedded
//! documents and arrays, equality against an array field matches any element, and
//! equality with `null` matches a missing field.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docmap_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::{DocumentStoreError, DocumentStoreResult},
};


/// A BSON value normalised for comparison. Numbers of any width compare as `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Every value a (possibly dotted) path resolves to.
///
/// Path segments crossing an array fan out over its embedded documents.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut found = Vec::new();
    lookup_into(document, path, &mut found);
    found
}

fn lookup_into<'a>(document: &'a Document, path: &str, found: &mut Vec<&'a Bson>) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    let Some(value) = document.get(head) else {
        return;
    };

    match (rest, value) {
        (None, _) => found.push(value),
        (Some(rest), Bson::Document(inner)) => lookup_into(inner, rest, found),
        (Some(rest), Bson::Array(items)) => {
            for item in items {
                if let Bson::Document(inner) = item {
                    lookup_into(inner, rest, found);
                }
            }
        }
        _ => {}
    }
}

fn equals(candidate: &Bson, value: &Bson) -> bool {
    let expected = Comparable::from(value);

    if Comparable::from(candidate) == expected {
        return true;
    }

    match candidate {
        Bson::Array(items) => items
            .iter()
            .any(|item| Comparable::from(item) == expected),
        _ => false,
    }
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> DocumentStoreResult<Vec<&'a Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(expr)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn field_equals(&self, field: &str, value: &Bson) -> bool {
        let candidates = lookup(self.document, field);

        if candidates.is_empty() {
            return matches!(value, Bson::Null);
        }

        candidates
            .into_iter()
            .any(|candidate| equals(candidate, value))
    }

    fn field_in(&self, field: &str, values: &Bson) -> bool {
        match values {
            Bson::Array(values) => values
                .iter()
                .any(|value| self.field_equals(field, value)),
            single => self.field_equals(field, single),
        }
    }

    fn field_compares(&self, field: &str, value: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
        let expected = Comparable::from(value);

        lookup(self.document, field)
            .into_iter()
            .flat_map(|candidate| match candidate {
                Bson::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .any(|candidate| {
                Comparable::from(candidate)
                    .partial_cmp(&expected)
                    .is_some_and(&accept)
            })
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(!lookup(self.document, field).is_empty() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(match op {
            FieldOp::Eq => self.field_equals(field, value),
            FieldOp::Ne => !self.field_equals(field, value),
            FieldOp::Gt => self.field_compares(field, value, |o| o == Ordering::Greater),
            FieldOp::Gte => self.field_compares(field, value, |o| o != Ordering::Less),
            FieldOp::Lt => self.field_compares(field, value, |o| o == Ordering::Less),
            FieldOp::Lte => self.field_compares(field, value, |o| o != Ordering::Greater),
            FieldOp::AnyOf => self.field_in(field, value),
            FieldOp::NoneOf => !self.field_in(field, value),
        })
    }
}
