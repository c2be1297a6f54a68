//! Query evaluation for in-memory document filtering.
//!
//! This module evaluates compiled [`NativeQuery`]s against rows the way a document
//! store does: dotted paths reach into nested documents and arrays, equality-style
//! conditions match an array if any element matches, `$eq: null` also matches a
//! missing field, and range operators only compare values of the same type class.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, datetime::DateTime, oid::ObjectId};
use regex::Regex;

use docquery_core::{
    document::Row,
    error::{StoreError, StoreResult},
    native::{Condition, NativeQuery},
};

use crate::error::MemoryStoreError;

/// Type-erased, comparable representation of BSON values.
///
/// Integers compare exactly as `i64`; a comparison only goes through `f64` when one
/// side is a double, so `5` and `5.0` compare equal.
/// Values of different types order by type class:
/// null < numbers < strings < documents < arrays < object ids < booleans < dates.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Int(i64),
    Double(f64),
    String(&'a str),
    /// Document fields, in document order
    Map(Vec<(&'a str, Comparable<'a>)>),
    Array(Vec<Comparable<'a>>),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
    /// Anything else (binary, timestamps, ...); only equal to an identical value
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Int32(value) => Comparable::Int(*value as i64),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::String(value) | Bson::Symbol(value) => Comparable::String(value),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Int(_) | Comparable::Double(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
            Comparable::Other(_) => 8,
        }
    }

    /// Total order used for sorting, across type classes.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => self.partial_cmp(other) == Some(Ordering::Equal),
        }
    }
}

impl PartialOrd for Comparable<'_> {
    /// Orders values of the same type class; `None` across classes.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Int(a), Comparable::Int(b)) => Some(a.cmp(b)),
            (Comparable::Double(a), Comparable::Double(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Double(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Double(a), Comparable::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Map(a), Comparable::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    match ka.cmp(kb).then_with(|| va.total_cmp(vb)) {
                        Ordering::Equal => continue,
                        ordering => return Some(ordering),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Comparable::Array(a), Comparable::Array(b)) => {
                for (va, vb) in a.iter().zip(b.iter()) {
                    match va.total_cmp(vb) {
                        Ordering::Equal => continue,
                        ordering => return Some(ordering),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => Some(a.bytes().cmp(&b.bytes())),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => {
                Some(a.timestamp_millis().cmp(&b.timestamp_millis()))
            }
            (Comparable::Other(a), Comparable::Other(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

/// Resolves a dotted path against a row.
///
/// Arrays along the path fan out: `tags.name` on `{ tags: [{ name: "a" }, { name: "b" }] }`
/// yields both names. A numeric segment also indexes into an array. An empty result
/// means the field is missing.
pub(crate) fn resolve<'a>(row: &'a Row, path: &str) -> Vec<&'a Bson> {
    let segments = path.split('.').collect::<Vec<_>>();
    let mut found = Vec::new();

    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = row.get(*head) {
            descend(value, rest, &mut found);
        }
    }

    found
}

/// Resolves a dotted path through nested documents only, the way an aggregation
/// field path does. Any array along the path, or a missing key, yields `None`.
pub(crate) fn lookup<'a>(row: &'a Row, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut value = row.get(segments.next()?)?;

    for segment in segments {
        match value {
            Bson::Document(doc) => value = doc.get(segment)?,
            _ => return None,
        }
    }

    Some(value)
}

fn descend<'a>(value: &'a Bson, path: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = path.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(child) = doc.get(*head) {
                descend(child, rest, found);
            }
        }
        Bson::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(item) = items.get(index) {
                    descend(item, rest, found);
                }
            }

            for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                descend(item, path, found);
            }
        }
        _ => {}
    }
}

/// The values a condition is tested against: each resolved value, and the elements
/// of resolved arrays.
fn candidates<'a>(resolved: &[&'a Bson]) -> impl Iterator<Item = &'a Bson> {
    resolved.iter().flat_map(|value| {
        let value: &'a Bson = *value;
        let elements: &'a [Bson] = match value {
            Bson::Array(items) => items,
            _ => &[],
        };

        std::iter::once(value).chain(elements.iter())
    })
}

/// Evaluates one compiled query against rows.
///
/// Regular expressions are compiled once, when the evaluator is created, so an
/// invalid pattern fails the request even when the collection is empty.
#[derive(Debug)]
pub(crate) struct DocumentEvaluator<'q> {
    query: &'q NativeQuery,
    patterns: HashMap<&'q str, Regex>,
}

impl<'q> DocumentEvaluator<'q> {
    pub fn new(query: &'q NativeQuery) -> StoreResult<Self> {
        let mut patterns = HashMap::new();
        collect_patterns(query, &mut patterns)?;

        Ok(Self { query, patterns })
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.matches_query(self.query, row)
    }

    pub fn filter_rows<'r>(&self, rows: impl IntoIterator<Item = &'r Row>) -> Vec<&'r Row> {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }

    fn matches_query(&self, query: &NativeQuery, row: &Row) -> bool {
        match query {
            NativeQuery::MatchAll => true,
            NativeQuery::And(children) => children.iter().all(|child| self.matches_query(child, row)),
            NativeQuery::Or(children) => children.iter().any(|child| self.matches_query(child, row)),
            NativeQuery::Field { field, condition } => {
                self.matches_condition(condition, &resolve(row, field))
            }
        }
    }

    fn matches_condition(&self, condition: &Condition, resolved: &[&Bson]) -> bool {
        match condition {
            Condition::Eq(value) => equals(resolved, value),
            Condition::Ne(value) => !equals(resolved, value),
            Condition::Gt(value) => compares(resolved, value, Ordering::is_gt),
            Condition::Gte(value) => compares(resolved, value, Ordering::is_ge),
            Condition::Lt(value) => compares(resolved, value, Ordering::is_lt),
            Condition::Lte(value) => compares(resolved, value, Ordering::is_le),
            Condition::In(values) => values.iter().any(|value| equals(resolved, value)),
            Condition::Regex(pattern) => match self.patterns.get(pattern.as_str()) {
                Some(regex) => candidates(resolved).any(|value| match value {
                    Bson::String(text) => regex.is_match(text),
                    _ => false,
                }),
                None => false,
            },
            Condition::Exists(should_exist) => !resolved.is_empty() == *should_exist,
            Condition::Not(inner) => !self.matches_condition(inner, resolved),
        }
    }
}

fn equals(resolved: &[&Bson], value: &Bson) -> bool {
    let expected = Comparable::from(value);

    if matches!(expected, Comparable::Null) && resolved.is_empty() {
        return true;
    }

    candidates(resolved).any(|candidate| Comparable::from(candidate) == expected)
}

fn compares(resolved: &[&Bson], value: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let bound = Comparable::from(value);

    candidates(resolved).any(|candidate| {
        Comparable::from(candidate)
            .partial_cmp(&bound)
            .is_some_and(accept)
    })
}

fn collect_patterns<'q>(query: &'q NativeQuery, patterns: &mut HashMap<&'q str, Regex>) -> StoreResult<()> {
    match query {
        NativeQuery::MatchAll => Ok(()),
        NativeQuery::And(children) | NativeQuery::Or(children) => children
            .iter()
            .try_for_each(|child| collect_patterns(child, patterns)),
        NativeQuery::Field { condition, .. } => collect_condition_patterns(condition, patterns),
    }
}

fn collect_condition_patterns<'q>(
    condition: &'q Condition,
    patterns: &mut HashMap<&'q str, Regex>,
) -> StoreResult<()> {
    match condition {
        Condition::Regex(pattern) if !patterns.contains_key(pattern.as_str()) => {
            let regex = Regex::new(pattern).map_err(|source| {
                StoreError::execution(MemoryStoreError::InvalidRegex {
                    pattern: pattern.clone(),
                    source,
                })
            })?;
            patterns.insert(pattern.as_str(), regex);
            Ok(())
        }
        Condition::Not(inner) => collect_condition_patterns(inner, patterns),
        _ => Ok(()),
    }
}
