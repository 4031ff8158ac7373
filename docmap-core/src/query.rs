//! Filter criteria and the filter expression AST.
//!
//! [`Criteria`] is what every lookup on a document type accepts. It always wraps a
//! filter document in MongoDB filter syntax and can be built from:
//!
//! - keyword pairs: `[("first_name", "Evan")]` or [`Criteria::keywords`]
//! - a structured filter map, passed through unchanged: `doc! { "age": { "$gt": 30 } }`
//! - the typed [`Filter`] builder: `Filter::eq("first_name", "Evan").and(Filter::gt("age", 30))`
//! - the shortcuts [`Criteria::by_id`], [`Criteria::within`] and [`Criteria::all`]
//!
//! Backends with a native query engine hand the filter document straight through.
//! Backends without one call [`Criteria::to_expr`] and evaluate the resulting [`Expr`]
//! with a [`QueryVisitor`].

use bson::{Bson, Document, doc, oid::ObjectId};
use std::convert::Infallible;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Value is one of the listed values.
    AnyOf,
    /// Value is none of the listed values.
    NoneOf,
}

impl FieldOp {
    /// The MongoDB operator name for this comparison.
    pub fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::AnyOf => "$in",
            FieldOp::NoneOf => "$nin",
        }
    }

    fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" => FieldOp::AnyOf,
            "$nin" => FieldOp::NoneOf,
            _ => return None,
        })
    }
}

/// A filter expression for querying documents.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match). An empty list matches everything.
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name to compare. Dotted paths address embedded documents.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended
    /// to the list. Otherwise, a new OR expression is created.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// Helper struct for constructing filter expressions.
///
/// ```ignore
/// use docmap::query::Filter;
///
/// let expr = Filter::eq("first_name", "Evan")
///     .and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the field exists.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field does not exist.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field equals any of `values`, or, for array
    /// fields, holds any of them.
    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, Bson::Array(values.into_iter().map(Into::into).collect()))
    }

    /// The negation of [`Filter::any_of`].
    pub fn none_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, Bson::Array(values.into_iter().map(Into::into).collect()))
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Renders an [`Expr`] as a MongoDB filter document.
pub struct DocumentTranslator;

impl QueryVisitor for DocumentTranslator {
    type Output = Document;
    type Error = Infallible;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(Document::new());
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    // `$not` only applies to operator expressions, `$nor` negates whole filters.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let value = match (op, value) {
            (FieldOp::AnyOf | FieldOp::NoneOf, Bson::Array(_)) => value.clone(),
            (FieldOp::AnyOf | FieldOp::NoneOf, single) => Bson::Array(vec![single.clone()]),
            _ => value.clone(),
        };

        let operator = op.operator();

        Ok(doc! {
            field: { operator: value },
        })
    }
}

/// Selection criteria for lookups, counts and deletes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria(Document);

impl Criteria {
    /// Matches every document.
    pub fn all() -> Self {
        Self(Document::new())
    }

    /// Builds criteria from keyword pairs, each requiring field equality.
    ///
    /// When exactly one pair is given and its value is itself a document, that
    /// document is used as the whole filter.
    pub fn keywords<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Bson>,
    {
        let filter = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect::<Document>();

        if filter.len() == 1 {
            if let Some((_, Bson::Document(inner))) = filter.iter().next() {
                return Self(inner.clone());
            }
        }

        Self(filter)
    }

    /// Matches the document with the given identity.
    pub fn by_id(id: impl Into<Bson>) -> Self {
        let id = id.into();

        Self(doc! { "_id": id })
    }

    /// Matches documents whose `field` equals any of `values`.
    pub fn within<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values
            .into_iter()
            .map(Into::into)
            .collect::<Vec<Bson>>();

        let field: String = field.into();

        Self(doc! { field: { "$in": values } })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }

    /// Parses the filter document into an expression tree.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] for operators outside
    /// `$and`, `$or`, `$nor`, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
    /// `$nin`, `$exists` and `$not`, or for operands of the wrong shape.
    pub fn to_expr(&self) -> DocumentStoreResult<Expr> {
        parse_filter(&self.0)
    }
}

impl From<Document> for Criteria {
    fn from(filter: Document) -> Self {
        Self(filter)
    }
}

impl From<Expr> for Criteria {
    fn from(expr: Expr) -> Self {
        match DocumentTranslator.visit_expr(&expr) {
            Ok(filter) => Self(filter),
            Err(never) => match never {},
        }
    }
}

impl From<ObjectId> for Criteria {
    fn from(id: ObjectId) -> Self {
        Criteria::by_id(id)
    }
}

impl<K: Into<String>, V: Into<Bson>, const N: usize> From<[(K, V); N]> for Criteria {
    fn from(pairs: [(K, V); N]) -> Self {
        Criteria::keywords(pairs)
    }
}

impl From<Criteria> for Document {
    fn from(criteria: Criteria) -> Self {
        criteria.0
    }
}

fn collapse(mut exprs: Vec<Expr>) -> Expr {
    if exprs.len() == 1 {
        if let Some(expr) = exprs.pop() {
            return expr;
        }
    }

    Expr::And(exprs)
}

fn parse_filter(filter: &Document) -> DocumentStoreResult<Expr> {
    let mut exprs = Vec::with_capacity(filter.len());

    for (key, value) in filter {
        let expr = match key.as_str() {
            "$and" => Expr::And(parse_filter_list(key, value)?),
            "$or" => Expr::Or(parse_filter_list(key, value)?),
            "$nor" => Expr::Or(parse_filter_list(key, value)?).not(),
            operator if operator.starts_with('$') => {
                return Err(DocumentStoreError::InvalidQuery(format!(
                    "Unsupported top-level operator '{operator}'"
                )));
            }
            field => match value {
                Bson::Document(operators) if is_operator_document(operators) => {
                    parse_operators(field, operators)?
                }
                _ => Expr::field(field.to_string(), FieldOp::Eq, value.clone()),
            },
        };

        exprs.push(expr);
    }

    Ok(collapse(exprs))
}

fn parse_filter_list(operator: &str, value: &Bson) -> DocumentStoreResult<Vec<Expr>> {
    let Bson::Array(items) = value else {
        return Err(DocumentStoreError::InvalidQuery(format!(
            "'{operator}' expects an array of filters"
        )));
    };

    items
        .iter()
        .map(|item| match item {
            Bson::Document(filter) => parse_filter(filter),
            _ => Err(DocumentStoreError::InvalidQuery(format!(
                "'{operator}' expects an array of filters"
            ))),
        })
        .collect()
}

fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn parse_operators(field: &str, operators: &Document) -> DocumentStoreResult<Expr> {
    let mut exprs = Vec::with_capacity(operators.len());

    for (operator, operand) in operators {
        let expr = match operator.as_str() {
            "$exists" => Expr::Exists(field.to_string(), truthy(operand)),
            "$not" => match operand {
                Bson::Document(inner) if is_operator_document(inner) => {
                    parse_operators(field, inner)?.not()
                }
                _ => {
                    return Err(DocumentStoreError::InvalidQuery(format!(
                        "'$not' on '{field}' expects an operator document"
                    )));
                }
            },
            other => match FieldOp::from_operator(other) {
                Some(op @ (FieldOp::AnyOf | FieldOp::NoneOf)) => {
                    if !matches!(operand, Bson::Array(_)) {
                        return Err(DocumentStoreError::InvalidQuery(format!(
                            "'{other}' on '{field}' expects an array"
                        )));
                    }

                    Expr::field(field.to_string(), op, operand.clone())
                }
                Some(op) => Expr::field(field.to_string(), op, operand.clone()),
                None => {
                    return Err(DocumentStoreError::InvalidQuery(format!(
                        "Unsupported operator '{other}' on '{field}'"
                    )));
                }
            },
        };

        exprs.push(expr);
    }

    Ok(collapse(exprs))
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}
