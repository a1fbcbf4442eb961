//! Field maps and the relational command encoding used by `create`/`write`.
//!
//! Many2many and one2many values are written as lists of positional command
//! tuples `(tag, id, payload)`:
//!
//! | Command | Tuple |
//! | --- | --- |
//! | `Create(values)` | `(0, 0, values)` per record |
//! | `Update { id, values }` | `(1, id, values)` |
//! | `Delete(ids)` | `(2, id, 0)` per id |
//! | `Remove(ids)` | `(3, id, 0)` per id |
//! | `Add(ids)` | `(4, id, 0)` per id |
//! | `Clear` | `(5, 0, 0)` |
//! | `Replace(ids)` | `(6, 0, ids)` |
//!
//! A bare list assigned to a field is shorthand for `Replace`.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use crate::errors::{OdooError, OdooResult};

pub const CREATE: i64 = 0;
pub const UPDATE: i64 = 1;
pub const DELETE: i64 = 2;
pub const REMOVE: i64 = 3;
pub const ADD: i64 = 4;
pub const CLEAR: i64 = 5;
pub const REPLACE: i64 = 6;

#[derive(Clone, Debug, PartialEq)]
pub enum RelationCommand {
    /// Create related records from field maps and link them.
    Create(Vec<Map<String, Value>>),
    /// Write `values` on the linked record `id`.
    Update { id: i64, values: Map<String, Value> },
    /// Unlink and delete the related records.
    Delete(Vec<i64>),
    /// Unlink without deleting.
    Remove(Vec<i64>),
    Add(Vec<i64>),
    Clear,
    Replace(Vec<i64>),
}

impl RelationCommand {
    pub fn add(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::Add(ids.into_iter().collect())
    }

    pub fn remove(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::Remove(ids.into_iter().collect())
    }

    pub fn delete(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::Delete(ids.into_iter().collect())
    }

    pub fn replace(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::Replace(ids.into_iter().collect())
    }

    /// Parse the loose `{action, id?, value?}` form.
    ///
    /// `field` only labels errors.
    pub fn parse(field: &str, command: &Map<String, Value>) -> OdooResult<Self> {
        let action = match command.get("action") {
            Some(Value::String(action)) => action.as_str(),
            Some(other) => {
                return Err(OdooError::invalid_relation(
                    field,
                    format!("action must be a string, found {other}"),
                ));
            }
            None => return Err(OdooError::invalid_relation(field, "missing action")),
        };
        let id = command.get("id").filter(|id| !id.is_null());
        let value = command.get("value").filter(|value| !value.is_null());

        match action {
            "create" => {
                let value = value.ok_or_else(|| {
                    OdooError::invalid_relation(field, "create requires 'value'")
                })?;
                let records = match value {
                    Value::Object(record) => vec![record.clone()],
                    Value::Array(items) => items
                        .iter()
                        .map(|item| {
                            item.as_object().cloned().ok_or_else(|| {
                                OdooError::invalid_relation(
                                    field,
                                    format!("create values must be objects, found {item}"),
                                )
                            })
                        })
                        .collect::<OdooResult<Vec<_>>>()?,
                    other => {
                        return Err(OdooError::invalid_relation(
                            field,
                            format!("create 'value' must be an object or list of objects, found {other}"),
                        ));
                    }
                };
                Ok(Self::Create(records))
            }
            "update" => {
                let id = id.ok_or_else(|| {
                    OdooError::invalid_relation(field, "update requires 'id'")
                })?;
                let id = id.as_i64().ok_or_else(|| {
                    OdooError::invalid_relation(
                        field,
                        format!("update 'id' must be a single integer, found {id}"),
                    )
                })?;
                let values = value
                    .ok_or_else(|| OdooError::invalid_relation(field, "update requires 'value'"))?
                    .as_object()
                    .cloned()
                    .ok_or_else(|| {
                        OdooError::invalid_relation(field, "update 'value' must be an object")
                    })?;
                Ok(Self::Update { id, values })
            }
            "add" => parse_ids(field, action, id).map(Self::Add),
            "remove" => parse_ids(field, action, id).map(Self::Remove),
            "delete" => parse_ids(field, action, id).map(Self::Delete),
            "replace" => parse_ids(field, action, id).map(Self::Replace),
            "clear" => Ok(Self::Clear),
            other => Err(OdooError::invalid_relation(
                field,
                format!("unknown action '{other}'"),
            )),
        }
    }

    /// Command tuples for this instruction.
    pub fn to_tuples(&self) -> Value {
        let tuples: Vec<Value> = match self {
            Self::Create(records) => records
                .iter()
                .map(|record| json!([CREATE, 0, record]))
                .collect(),
            Self::Update { id, values } => vec![json!([UPDATE, id, values])],
            Self::Delete(ids) => per_id(DELETE, ids),
            Self::Remove(ids) => per_id(REMOVE, ids),
            Self::Add(ids) => per_id(ADD, ids),
            Self::Clear => vec![json!([CLEAR, 0, 0])],
            Self::Replace(ids) => vec![json!([REPLACE, 0, ids])],
        };
        Value::Array(tuples)
    }
}

fn per_id(tag: i64, ids: &[i64]) -> Vec<Value> {
    ids.iter().map(|id| json!([tag, id, 0])).collect()
}

fn parse_ids(field: &str, action: &str, id: Option<&Value>) -> OdooResult<Vec<i64>> {
    let id = id.ok_or_else(|| OdooError::invalid_relation(field, format!("{action} requires 'id'")))?;
    let invalid = || {
        OdooError::invalid_relation(
            field,
            format!("{action} 'id' must be an integer or list of integers, found {id}"),
        )
    };
    match id {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_i64().ok_or_else(invalid))
            .collect(),
        single => single.as_i64().map(|id| vec![id]).ok_or_else(invalid),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Sent as is, except that a bare list becomes a `Replace` of its items.
    Value(Value),
    Relation(RelationCommand),
}

impl FieldValue {
    pub fn encode(&self) -> Value {
        match self {
            Self::Value(Value::Array(items)) => json!([[REPLACE, 0, items]]),
            Self::Value(value) => value.clone(),
            Self::Relation(command) => command.to_tuples(),
        }
    }
}

impl From<RelationCommand> for FieldValue {
    fn from(command: RelationCommand) -> Self {
        Self::Relation(command)
    }
}

/// Field name to value map for `create` and `write`.
///
/// Relation commands are validated when they enter the map, so encoding
/// cannot fail.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields {
    entries: BTreeMap<String, FieldValue>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, FieldValue::Value(value.into()));
        self
    }

    pub fn relation(mut self, field: impl Into<String>, command: RelationCommand) -> Self {
        self.insert(field, FieldValue::Relation(command));
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.entries.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.entries.get(field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Any object value carrying an `action` key is parsed as a relation command.
    pub fn from_map(map: Map<String, Value>) -> OdooResult<Self> {
        let mut fields = Self::new();
        for (field, value) in map {
            let value = match value {
                Value::Object(command) if command.contains_key("action") => {
                    FieldValue::Relation(RelationCommand::parse(&field, &command)?)
                }
                other => FieldValue::Value(other),
            };
            fields.insert(field, value);
        }
        Ok(fields)
    }

    pub fn from_json(value: Value) -> OdooResult<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(OdooError::invalid_relation(
                "<root>",
                format!("field values must be an object, found {other}"),
            )),
        }
    }

    pub fn encode(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(field, value)| (field.clone(), value.encode()))
            .collect()
    }
}

/// Validate and encode a loose JSON field map in one step.
pub fn encode_fields(fields: &Map<String, Value>) -> OdooResult<Map<String, Value>> {
    Ok(Fields::from_map(fields.clone())?.encode())
}
