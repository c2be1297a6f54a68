//! Update descriptors for the write path.
//!
//! An [`Update`] is an ordered list of per-field operations. Fields tagged `set` (or
//! untagged) are grouped under `$set`, fields tagged `inc` under `$inc`; both clauses
//! may appear in one update.
//!
//! ```ignore
//! use docquery::update::Update;
//!
//! let update = Update::new().set("status", "active").inc("logins", 1);
//! // { "$set": { "status": "active" }, "$inc": { "logins": 1 } }
//! ```

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The operation applied to one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOp {
    /// Replace the field value.
    #[default]
    Set,
    /// Add to the numeric field value.
    Inc,
}

impl UpdateOp {
    pub fn operator(&self) -> &'static str {
        match self {
            UpdateOp::Set => "$set",
            UpdateOp::Inc => "$inc",
        }
    }
}

/// A per-field update descriptor. `op` defaults to [`UpdateOp::Set`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    #[serde(default)]
    pub op: UpdateOp,
    pub value: Bson,
}

/// An ordered set of field updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    fields: Vec<(String, FieldUpdate)>,
}

impl Update {
    pub fn new() -> Self {
        Update::default()
    }

    /// Adds a `$set` of `field` to `value`.
    pub fn set(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.with(field, UpdateOp::Set, value)
    }

    /// Adds an `$inc` of `field` by `amount`.
    pub fn inc(self, field: impl Into<String>, amount: impl Into<Bson>) -> Self {
        self.with(field, UpdateOp::Inc, amount)
    }

    pub fn with(mut self, field: impl Into<String>, op: UpdateOp, value: impl Into<Bson>) -> Self {
        self.fields.push((field.into(), FieldUpdate { op, value: value.into() }));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates the field updates in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldUpdate)> {
        self.fields.iter().map(|(field, update)| (field.as_str(), update))
    }

    /// Parses an update from a JSON object of field descriptors.
    ///
    /// ```json
    /// { "name": { "value": "Ada" }, "visits": { "op": "inc", "value": 1 } }
    /// ```
    pub fn from_json(value: serde_json::Value) -> StoreResult<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(StoreError::Compile("update must be a JSON object".to_string()));
        };

        map.into_iter()
            .try_fold(Update::new(), |update, (field, descriptor)| {
                let descriptor: FieldUpdate = serde_json::from_value(descriptor)
                    .map_err(|e| StoreError::Compile(format!("field `{field}`: {e}")))?;

                Ok(update.with(field, descriptor.op, descriptor.value))
            })
    }

    /// Renders the update as `{ "$set": {...}, "$inc": {...} }`, omitting empty clauses.
    ///
    /// An update without fields, or with an empty field name, is a compile error.
    pub fn to_document(&self) -> StoreResult<Document> {
        if self.fields.is_empty() {
            return Err(StoreError::Compile("update has no fields".to_string()));
        }

        let mut set = Document::new();
        let mut inc = Document::new();

        for (field, update) in &self.fields {
            if field.is_empty() {
                return Err(StoreError::Compile("update field name must not be empty".to_string()));
            }

            match update.op {
                UpdateOp::Set => set.insert(field.as_str(), update.value.clone()),
                UpdateOp::Inc => inc.insert(field.as_str(), update.value.clone()),
            };
        }

        let mut document = Document::new();
        for (op, clause) in [(UpdateOp::Set, set), (UpdateOp::Inc, inc)] {
            if !clause.is_empty() {
                document.insert(op.operator(), clause);
            }
        }

        Ok(document)
    }
}
