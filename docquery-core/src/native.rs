//! Typed representation of a store-native query.
//!
//! A [`NativeQuery`] mirrors the nested operator documents a document store accepts
//! (`{ "$and": [...] }`, `{ "age": { "$gte": 18 } }`, ...), but every operator is an
//! explicit variant instead of a free-form string key. Queries are produced by the
//! [`compiler`](crate::compiler) and rendered with [`NativeQuery::to_document`].

use bson::{Bson, Document, doc};

/// A per-field operator clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Bson),
    Ne(Bson),
    Gt(Bson),
    Gte(Bson),
    Lt(Bson),
    Lte(Bson),
    In(Vec<Bson>),
    /// Pattern handed to the store verbatim.
    Regex(String),
    Exists(bool),
    Not(Box<Condition>),
}

impl Condition {
    /// The reserved operator key this condition renders under.
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "$eq",
            Condition::Ne(_) => "$ne",
            Condition::Gt(_) => "$gt",
            Condition::Gte(_) => "$gte",
            Condition::Lt(_) => "$lt",
            Condition::Lte(_) => "$lte",
            Condition::In(_) => "$in",
            Condition::Regex(_) => "$regex",
            Condition::Exists(_) => "$exists",
            Condition::Not(_) => "$not",
        }
    }

    /// Renders this condition as an operator document, e.g. `{ "$gt": 5 }`.
    pub fn to_document(&self) -> Document {
        let operand = match self {
            Condition::Eq(value)
            | Condition::Ne(value)
            | Condition::Gt(value)
            | Condition::Gte(value)
            | Condition::Lt(value)
            | Condition::Lte(value) => value.clone(),
            Condition::In(values) => Bson::Array(values.clone()),
            Condition::Regex(pattern) => Bson::String(pattern.clone()),
            Condition::Exists(flag) => Bson::Boolean(*flag),
            Condition::Not(inner) => Bson::Document(inner.to_document()),
        };

        let mut document = Document::new();
        document.insert(self.operator(), operand);
        document
    }
}

/// A compiled query in the store's native shape.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeQuery {
    /// The empty query, matching every document.
    MatchAll,
    /// `{ "$and": [...] }`
    And(Vec<NativeQuery>),
    /// `{ "$or": [...] }`
    Or(Vec<NativeQuery>),
    /// `{ field: condition }`
    Field { field: String, condition: Condition },
}

impl NativeQuery {
    pub(crate) fn field(field: impl Into<String>, condition: Condition) -> Self {
        NativeQuery::Field {
            field: field.into(),
            condition,
        }
    }

    /// Returns `true` if this query places no constraint on documents.
    pub fn is_match_all(&self) -> bool {
        matches!(self, NativeQuery::MatchAll)
    }

    /// Renders this query as a BSON document understood by the store.
    pub fn to_document(&self) -> Document {
        match self {
            NativeQuery::MatchAll => Document::new(),
            NativeQuery::And(children) => doc! {
                "$and": children
                    .iter()
                    .map(|child| Bson::Document(child.to_document()))
                    .collect::<Vec<_>>(),
            },
            NativeQuery::Or(children) => doc! {
                "$or": children
                    .iter()
                    .map(|child| Bson::Document(child.to_document()))
                    .collect::<Vec<_>>(),
            },
            NativeQuery::Field { field, condition } => {
                let mut document = Document::new();
                document.insert(field.as_str(), condition.to_document());
                document
            }
        }
    }
}

impl From<&NativeQuery> for Document {
    fn from(query: &NativeQuery) -> Self {
        query.to_document()
    }
}
