//! Row transformations applied by the in-memory store: sorting, projection and
//! `$set` / `$inc` updates.

use std::cmp::Ordering;

use bson::{Bson, Document};

use docquery_core::{
    document::Row,
    error::{StoreError, StoreResult},
    update::{Update, UpdateOp},
};

use crate::{
    error::MemoryStoreError,
    evaluator::{Comparable, resolve},
};

/// Sorts rows by a `{ field: 1 | -1, ... }` document. The sort is stable, so rows with
/// equal keys keep insertion order.
pub(crate) fn sort_rows(rows: &mut [&Row], sort: &Document) {
    let keys = sort
        .iter()
        .map(|(field, direction)| {
            let descending = numeric(direction).is_some_and(|n| n < 0.0);
            (field.as_str(), descending)
        })
        .collect::<Vec<_>>();

    rows.sort_by(|a, b| {
        keys.iter().fold(Ordering::Equal, |ordering, (field, descending)| {
            ordering.then_with(|| {
                let ordering = sort_key(a, field).total_cmp(&sort_key(b, field));
                if *descending { ordering.reverse() } else { ordering }
            })
        })
    });
}

fn sort_key<'a>(row: &'a Row, field: &str) -> Comparable<'a> {
    resolve(row, field)
        .first()
        .map(|value| Comparable::from(*value))
        .unwrap_or(Comparable::Null)
}

/// Applies a `{ field: 1 }` (include) or `{ field: 0 }` (exclude) projection.
///
/// Inclusion always keeps `_id`. Dotted paths select inside nested documents.
pub(crate) fn project(row: &Row, projection: &Document) -> Row {
    let include = projection
        .iter()
        .next()
        .is_some_and(|(_, flag)| numeric(flag) != Some(0.0));
    let paths = projection.keys().map(String::as_str).collect::<Vec<_>>();

    if include {
        let mut projected = include_paths(row, &paths);
        if let Some(id) = row.get("_id") {
            if !projected.contains_key("_id") {
                let mut with_id = Document::new();
                with_id.insert("_id", id.clone());
                for (key, value) in projected {
                    with_id.insert(key, value);
                }
                projected = with_id;
            }
        }
        projected
    } else {
        exclude_paths(row, &paths)
    }
}

/// The remainders of `paths` below `key`, or `None` when `key` itself is listed.
fn nested<'p>(paths: &[&'p str], key: &str) -> Option<Vec<&'p str>> {
    let mut rest = Vec::new();

    for &path in paths {
        match path.split_once('.') {
            None if path == key => return None,
            Some((head, tail)) if head == key => rest.push(tail),
            _ => {}
        }
    }

    Some(rest)
}

fn include_paths(row: &Document, paths: &[&str]) -> Document {
    let mut projected = Document::new();

    for (key, value) in row {
        match nested(paths, key) {
            None => {
                projected.insert(key.as_str(), value.clone());
            }
            Some(rest) if !rest.is_empty() => {
                if let Bson::Document(child) = value {
                    projected.insert(key.as_str(), include_paths(child, &rest));
                }
            }
            Some(_) => {}
        }
    }

    projected
}

fn exclude_paths(row: &Document, paths: &[&str]) -> Document {
    let mut projected = Document::new();

    for (key, value) in row {
        match (nested(paths, key), value) {
            (None, _) => {}
            (Some(rest), Bson::Document(child)) if !rest.is_empty() => {
                projected.insert(key.as_str(), exclude_paths(child, &rest));
            }
            (Some(_), value) => {
                projected.insert(key.as_str(), value.clone());
            }
        }
    }

    projected
}

/// Applies `update` to a copy of `row`.
///
/// `$inc` on a missing field initialises it to the increment. Changing `_id` is
/// rejected.
pub(crate) fn apply_update(row: &Row, update: &Update) -> StoreResult<Row> {
    let mut updated = row.clone();

    for (field, change) in update.fields() {
        let value = match change.op {
            UpdateOp::Set => change.value.clone(),
            UpdateOp::Inc => {
                let current = resolve(&updated, field).first().map(|value| (*value).clone());
                increment(field, current, &change.value)?
            }
        };

        set_path(&mut updated, field, value)?;
    }

    if updated.get("_id") != row.get("_id") {
        return Err(StoreError::execution(MemoryStoreError::ImmutableId));
    }

    Ok(updated)
}

fn increment(field: &str, current: Option<Bson>, amount: &Bson) -> StoreResult<Bson> {
    if !matches!(amount, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
        return Err(StoreError::execution(MemoryStoreError::NonNumericAmount(field.to_string())));
    }

    let overflow = || StoreError::execution(MemoryStoreError::IntegerOverflow(field.to_string()));

    Ok(match (current.unwrap_or(Bson::Int32(0)), amount) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(a as i64 + *b as i64)),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64((a as i64).checked_add(*b).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(*b as i64).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(overflow)?),
        (current @ (Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)), amount) => {
            Bson::Double(as_f64(&current) + as_f64(amount))
        }
        _ => return Err(StoreError::execution(MemoryStoreError::NonNumericField(field.to_string()))),
    })
}

/// The value of a numeric BSON scalar, if it is one.
pub(crate) fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn as_f64(value: &Bson) -> f64 {
    numeric(value).unwrap_or_default()
}

fn set_path(row: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    match path.split_once('.') {
        None => {
            row.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !row.contains_key(head) {
                row.insert(head, Document::new());
            }

            match row.get_mut(head) {
                Some(Bson::Document(child)) => set_path(child, rest, value),
                _ => Err(StoreError::execution(MemoryStoreError::PathConflict(path.to_string()))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[test]
    fn sorts_on_multiple_keys() {
        let rows = [
            doc! { "team": "b", "score": 1 },
            doc! { "team": "a", "score": 1 },
            doc! { "team": "a", "score": 7 },
            doc! { "score": 4 },
        ];
        let mut sorted = rows.iter().collect::<Vec<_>>();

        sort_rows(&mut sorted, &doc! { "team": 1, "score": -1 });

        assert_eq!(
            sorted,
            vec![&rows[3], &rows[2], &rows[1], &rows[0]]
        );
    }

    #[test]
    fn inclusion_keeps_id_and_nested_paths() {
        let row = doc! { "_id": 1, "name": "ada", "address": { "city": "Oslo", "zip": "0150" }, "age": 36 };

        assert_eq!(
            project(&row, &doc! { "address.city": 1, "name": 1 }),
            doc! { "_id": 1, "name": "ada", "address": { "city": "Oslo" } }
        );
    }

    #[test]
    fn exclusion_drops_listed_paths() {
        let row = doc! { "_id": 1, "name": "ada", "address": { "city": "Oslo", "zip": "0150" } };

        assert_eq!(
            project(&row, &doc! { "address.zip": 0, "_id": 0 }),
            doc! { "name": "ada", "address": { "city": "Oslo" } }
        );
    }

    #[test]
    fn applies_set_and_inc() {
        let row = doc! { "_id": 1, "visits": 2, "stats": { "x": 1.5 } };
        let update = Update::new()
            .set("status", "active")
            .inc("visits", 3)
            .inc("stats.x", 1)
            .inc("fresh", 4_i64)
            .set("meta.source", "api");

        assert_eq!(
            apply_update(&row, &update).unwrap(),
            doc! {
                "_id": 1,
                "visits": 5,
                "stats": { "x": 2.5 },
                "status": "active",
                "fresh": 4_i64,
                "meta": { "source": "api" }
            }
        );
    }

    #[test]
    fn inc_rejects_non_numeric_values() {
        let row = doc! { "_id": 1, "name": "ada" };

        for update in [Update::new().inc("name", 1), Update::new().inc("n", "one")] {
            let err = apply_update(&row, &update).unwrap_err();
            assert!(matches!(err, StoreError::QueryExecution(_)), "unexpected error: {err:?}");
        }
    }

    #[test]
    fn inc_widens_int32_but_rejects_int64_overflow() {
        assert_eq!(
            apply_update(&doc! { "n": i32::MAX }, &Update::new().inc("n", 1)).unwrap(),
            doc! { "n": i32::MAX as i64 + 1 }
        );

        for (row, amount) in [
            (doc! { "n": i64::MAX }, Bson::Int64(1)),
            (doc! { "n": i64::MAX }, Bson::Int32(1)),
            (doc! { "n": -1 }, Bson::Int64(i64::MIN)),
        ] {
            let err = apply_update(&row, &Update::new().inc("n", amount)).unwrap_err();

            match err {
                StoreError::QueryExecution(source) => assert!(matches!(
                    source.downcast_ref::<MemoryStoreError>(),
                    Some(MemoryStoreError::IntegerOverflow(field)) if field == "n"
                )),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn id_is_immutable() {
        let err = apply_update(&doc! { "_id": 1 }, &Update::new().set("_id", 2)).unwrap_err();

        assert!(matches!(err, StoreError::QueryExecution(_)));
    }
}
