//! Store-agnostic filter expressions.
//!
//! An [`Expr`] is the boolean predicate tree an ORM layer hands to the store. It knows
//! nothing about any particular backend; the [`compiler`](crate::compiler) turns it into
//! a [`NativeQuery`](crate::native::NativeQuery).
//!
//! # Filter Expression API
//!
//! The [`Filter`] struct provides static constructors for every leaf and composite:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Membership: `is_in`
//! - Pattern: `regex`
//! - Existence: `exists`, `not_exists`
//! - Logical: `and`, `or`, `not`
//!
//! ```ignore
//! use docquery::filter::Filter;
//!
//! let expr = Filter::eq("status", "active")
//!     .and(Filter::gt("age", 18))
//!     .and(Filter::exists("email"));
//! ```
//!
//! # Wire format
//!
//! Expressions (de)serialize as internally tagged objects so they can travel between
//! processes:
//!
//! ```json
//! {"type": "and", "exprs": [
//!     {"type": "eq", "field": "status", "value": "active"},
//!     {"type": "not", "expr": {"type": "in", "field": "role", "values": ["guest"]}}
//! ]}
//! ```

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to.
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
}

/// A filter expression for querying documents.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex predicates. Each leaf is scoped to one field and carries the
/// payload its tag requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireExpr", into = "WireExpr")]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression.
    Not(Box<Expr>),
    /// Field comparison against a single scalar value.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
    /// Field value is a member of the given set.
    In {
        /// The field name to test.
        field: String,
        /// The accepted values.
        values: Vec<Bson>,
    },
    /// String field matches the given pattern.
    ///
    /// The pattern is handed to the store verbatim; escaping is the caller's job.
    Regex {
        /// The field name to match.
        field: String,
        /// The uninterpreted pattern.
        pattern: String,
    },
    /// Field holds a usable (present and non-null) value, or does not.
    Exists {
        /// The field name to test.
        field: String,
        /// `true` for "has a value", `false` for "missing or null".
        should_exist: bool,
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

    /// Parses an expression from its tagged JSON form.
    ///
    /// An unknown `type` tag or a payload of the wrong shape is a
    /// [`StoreError::Compile`].
    pub fn from_json(value: serde_json::Value) -> StoreResult<Self> {
        serde_json::from_value(value).map_err(|e| StoreError::Compile(e.to_string()))
    }

    /// Parses an expression from a JSON string.
    pub fn from_json_str(input: &str) -> StoreResult<Self> {
        serde_json::from_str(input).map_err(|e| StoreError::Compile(e.to_string()))
    }
}

/// Helper struct for constructing filter expressions.
///
/// All methods accept field names and values as `Into<String>` and `Into<Bson>`.
///
/// ```ignore
/// use docquery::filter::Filter;
///
/// let expr = Filter::not(Filter::is_in("status", ["archived", "deleted"]));
/// ```
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the field equals any of the values.
    pub fn is_in<V: Into<Bson>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Expr {
        Expr::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Matches documents where the string field matches the pattern.
    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Expr {
        Expr::Regex {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Matches documents where the field is present and not null.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists {
            field: field.into(),
            should_exist: true,
        }
    }

    /// Matches documents where the field is missing or null.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists {
            field: field.into(),
            should_exist: false,
        }
    }

    /// Combines expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Inverts an expression.
    pub fn not(expr: Expr) -> Expr {
        expr.not()
    }
}

/// Dispatches over the variants of an [`Expr`] tree.
pub trait QueryVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error>;
    fn visit_regex(&mut self, field: &str, pattern: &str) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
            Expr::In { field, values } => self.visit_in(field, values),
            Expr::Regex { field, pattern } => self.visit_regex(field, pattern),
            Expr::Exists { field, should_exist } => self.visit_exists(field, *should_exist),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireExpr {
    And { exprs: Vec<Expr> },
    Or { exprs: Vec<Expr> },
    Not { expr: Box<Expr> },
    Eq { field: String, value: Bson },
    Ne { field: String, value: Bson },
    Gt { field: String, value: Bson },
    Gte { field: String, value: Bson },
    Lt { field: String, value: Bson },
    Lte { field: String, value: Bson },
    In { field: String, values: Vec<Bson> },
    Regex { field: String, pattern: String },
    Exists { field: String, value: bool },
}

impl From<WireExpr> for Expr {
    fn from(wire: WireExpr) -> Self {
        match wire {
            WireExpr::And { exprs } => Expr::And(exprs),
            WireExpr::Or { exprs } => Expr::Or(exprs),
            WireExpr::Not { expr } => Expr::Not(expr),
            WireExpr::Eq { field, value } => Expr::field(field, FieldOp::Eq, value),
            WireExpr::Ne { field, value } => Expr::field(field, FieldOp::Ne, value),
            WireExpr::Gt { field, value } => Expr::field(field, FieldOp::Gt, value),
            WireExpr::Gte { field, value } => Expr::field(field, FieldOp::Gte, value),
            WireExpr::Lt { field, value } => Expr::field(field, FieldOp::Lt, value),
            WireExpr::Lte { field, value } => Expr::field(field, FieldOp::Lte, value),
            WireExpr::In { field, values } => Expr::In { field, values },
            WireExpr::Regex { field, pattern } => Expr::Regex { field, pattern },
            WireExpr::Exists { field, value } => Expr::Exists {
                field,
                should_exist: value,
            },
        }
    }
}

impl From<Expr> for WireExpr {
    fn from(expr: Expr) -> Self {
        match expr {
            Expr::And(exprs) => WireExpr::And { exprs },
            Expr::Or(exprs) => WireExpr::Or { exprs },
            Expr::Not(expr) => WireExpr::Not { expr },
            Expr::Field { field, op, value } => match op {
                FieldOp::Eq => WireExpr::Eq { field, value },
                FieldOp::Ne => WireExpr::Ne { field, value },
                FieldOp::Gt => WireExpr::Gt { field, value },
                FieldOp::Gte => WireExpr::Gte { field, value },
                FieldOp::Lt => WireExpr::Lt { field, value },
                FieldOp::Lte => WireExpr::Lte { field, value },
            },
            Expr::In { field, values } => WireExpr::In { field, values },
            Expr::Regex { field, pattern } => WireExpr::Regex { field, pattern },
            Expr::Exists { field, should_exist } => WireExpr::Exists {
                field,
                value: should_exist,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn chaining_flattens_into_existing_composite() {
        let expr = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));

        match expr {
            Expr::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected and, got {other:?}"),
        }
    }

    #[test]
    fn parses_tagged_json() {
        let expr = Expr::from_json(json!({
            "type": "or",
            "exprs": [
                {"type": "eq", "field": "status", "value": "active"},
                {"type": "not", "expr": {"type": "exists", "field": "deleted_at", "value": true}},
                {"type": "regex", "field": "name", "pattern": "^A"},
                {"type": "in", "field": "role", "values": ["admin", "owner"]}
            ]
        }))
        .unwrap();

        assert_eq!(
            expr,
            Filter::or([
                Filter::eq("status", "active"),
                Filter::not(Filter::exists("deleted_at")),
                Filter::regex("name", "^A"),
                Filter::is_in("role", ["admin", "owner"]),
            ])
        );
    }

    #[test]
    fn unknown_tag_is_a_compile_error() {
        let err = Expr::from_json(json!({"type": "near", "field": "loc", "value": "x"})).unwrap_err();

        assert!(err.is_compile(), "unexpected error: {err:?}");
    }

    #[test]
    fn wrong_payload_shape_is_a_compile_error() {
        let err = Expr::from_json_str(r#"{"type": "exists", "field": "email", "value": "yes"}"#)
            .unwrap_err();

        assert!(err.is_compile());
    }

    #[test]
    fn serializes_back_to_the_tagged_form() {
        let value = serde_json::to_value(Filter::not_exists("email")).unwrap();

        assert_eq!(value, json!({"type": "exists", "field": "email", "value": false}));
    }
}
