//! Compilation of [`Expr`] trees into [`NativeQuery`] documents.
//!
//! Compilation is pure: no I/O, no state. Every read, update and delete path calls
//! [`compile`] before touching a backend, so a malformed filter is reported before the
//! store sees anything.
//!
//! # Negation
//!
//! `not` is never emitted as a top-level wrapper. Instead [`negate`] pushes negation down
//! to the field clauses of the compiled query (negation-normal form): `$and` and `$or`
//! swap per De Morgan, complementary field operators flip (`$eq`/`$ne`,
//! `$exists: true`/`$exists: false`), a field-level `$not` unwraps, and any other field
//! condition gains a field-level `$not`.
//!
//! ```ignore
//! use docquery::{compiler::compile, filter::Filter};
//!
//! let query = compile(Some(&Filter::not(Filter::or([
//!     Filter::eq("age", 5),
//!     Filter::eq("age", 10),
//! ]))))?;
//! // { "$and": [ { "age": { "$ne": 5 } }, { "age": { "$ne": 10 } } ] }
//! ```

use bson::Bson;
use tracing::trace;

use crate::{
    error::{StoreError, StoreResult},
    filter::{Expr, FieldOp, QueryVisitor},
    native::{Condition, NativeQuery},
};

/// Compiles an optional filter. `None` matches every document.
pub fn compile(filter: Option<&Expr>) -> StoreResult<NativeQuery> {
    let query = match filter {
        Some(expr) => FilterCompiler.visit_expr(expr)?,
        None => NativeQuery::MatchAll,
    };

    trace!(query = ?query, "compiled filter");

    Ok(query)
}

/// Returns the negation-normal-form complement of a compiled query.
///
/// `negate(negate(q)) == q` holds for every query produced by [`compile`].
/// [`NativeQuery::MatchAll`] carries no clauses and is returned unchanged.
pub fn negate(query: NativeQuery) -> NativeQuery {
    match query {
        NativeQuery::MatchAll => NativeQuery::MatchAll,
        NativeQuery::And(children) => NativeQuery::Or(children.into_iter().map(negate).collect()),
        NativeQuery::Or(children) => NativeQuery::And(children.into_iter().map(negate).collect()),
        NativeQuery::Field { field, condition } => NativeQuery::Field {
            field,
            condition: negate_condition(condition),
        },
    }
}

fn negate_condition(condition: Condition) -> Condition {
    match condition {
        Condition::Not(inner) => *inner,
        Condition::Eq(value) => Condition::Ne(value),
        Condition::Ne(value) => Condition::Eq(value),
        Condition::Exists(flag) => Condition::Exists(!flag),
        other @ (Condition::Gt(_)
        | Condition::Gte(_)
        | Condition::Lt(_)
        | Condition::Lte(_)
        | Condition::In(_)
        | Condition::Regex(_)) => Condition::Not(Box::new(other)),
    }
}

/// Translates filter expressions into native queries.
///
/// Implements [`QueryVisitor`] so it can be driven over any [`Expr`]; most callers use
/// the [`compile`] function instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterCompiler;

impl FilterCompiler {
    fn children(&mut self, kind: &str, exprs: &[Expr]) -> StoreResult<Vec<NativeQuery>> {
        if exprs.is_empty() {
            return Err(StoreError::Compile(format!("`{kind}` requires at least one child")));
        }

        exprs
            .iter()
            .map(|expr| self.visit_expr(expr))
            .collect()
    }

    fn field_name(field: &str) -> StoreResult<&str> {
        if field.is_empty() {
            return Err(StoreError::Compile("filter field name must not be empty".to_string()));
        }

        Ok(field)
    }
}

impl QueryVisitor for FilterCompiler {
    type Output = NativeQuery;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(NativeQuery::And(self.children("and", exprs)?))
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(NativeQuery::Or(self.children("or", exprs)?))
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(negate(self.visit_expr(expr)?))
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let value = value.clone();

        Ok(NativeQuery::field(
            Self::field_name(field)?,
            match op {
                FieldOp::Eq => Condition::Eq(value),
                FieldOp::Ne => Condition::Ne(value),
                FieldOp::Gt => Condition::Gt(value),
                FieldOp::Gte => Condition::Gte(value),
                FieldOp::Lt => Condition::Lt(value),
                FieldOp::Lte => Condition::Lte(value),
            },
        ))
    }

    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error> {
        Ok(NativeQuery::field(
            Self::field_name(field)?,
            Condition::In(values.to_vec()),
        ))
    }

    fn visit_regex(&mut self, field: &str, pattern: &str) -> Result<Self::Output, Self::Error> {
        Ok(NativeQuery::field(
            Self::field_name(field)?,
            Condition::Regex(pattern.to_string()),
        ))
    }

    // A missing key and an explicit null are the same absence state.
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error> {
        let field = Self::field_name(field)?;

        Ok(if should_exist {
            NativeQuery::And(vec![
                NativeQuery::field(field, Condition::Exists(true)),
                NativeQuery::field(field, Condition::Ne(Bson::Null)),
            ])
        } else {
            NativeQuery::Or(vec![
                NativeQuery::field(field, Condition::Exists(false)),
                NativeQuery::field(field, Condition::Eq(Bson::Null)),
            ])
        })
    }
}
