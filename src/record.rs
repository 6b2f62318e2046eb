use std::collections::BTreeMap;

use rusqlite::types::Value;

use crate::error::{DeletionError, Result};
use crate::model::Model;
use crate::predicate::DELETED_COLUMN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Not yet inserted.
    New,
    Persisted,
    /// Logically deleted. Only `undelete` may bring it back to life.
    Tombstoned,
    /// Physically removed.
    Destroyed,
}

/// One row of a registered model.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    model: String,
    primary_key: String,
    values: BTreeMap<String, Value>,
    state: RecordState,
    included: BTreeMap<String, Vec<Record>>,
}

impl Record {
    pub fn new(model: &Model) -> Self {
        Self {
            model: model.name().to_string(),
            primary_key: model.primary_key().to_string(),
            values: BTreeMap::new(),
            state: RecordState::New,
            included: BTreeMap::new(),
        }
    }
    pub(crate) fn loaded(model: &Model, values: BTreeMap<String, Value>) -> Self {
        let mut record = Self::new(model);
        record.values = values;
        record.state = if model.is_deletion_capable() && record.is_deleted() {
            RecordState::Tombstoned
        } else {
            RecordState::Persisted
        };
        record
    }
    pub fn model(&self) -> &str {
        &self.model
    }
    pub fn id(&self) -> Option<i64> {
        match self.values.get(&self.primary_key) {
            Some(Value::Integer(id)) => Some(*id),
            _ => None,
        }
    }
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.values.get(column) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }
    pub fn get_text(&self, column: &str) -> Option<&str> {
        match self.values.get(column) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
    /// Writes an attribute in memory. Tombstoned and destroyed records are
    /// immutable.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.ensure_mutable()?;
        self.values.insert(column.into(), value.into());
        Ok(())
    }
    pub fn state(&self) -> RecordState {
        self.state
    }
    pub fn is_new(&self) -> bool {
        self.state == RecordState::New
    }
    pub fn is_tombstoned(&self) -> bool {
        self.state == RecordState::Tombstoned
    }
    pub fn is_destroyed(&self) -> bool {
        self.state == RecordState::Destroyed
    }
    /// In-memory state of the deletion flag. Null counts as live.
    pub fn is_deleted(&self) -> bool {
        match self.values.get(DELETED_COLUMN) {
            Some(Value::Integer(flag)) => *flag != 0,
            Some(Value::Real(flag)) => *flag != 0.0,
            _ => false,
        }
    }
    /// Records eager loaded through `FindOptions::includes`.
    pub fn included(&self, association: &str) -> &[Record] {
        self.included
            .get(association)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values
            .iter()
            .map(|(column, value)| (column.clone(), value_to_json(value)))
            .collect();
        serde_json::Value::Object(map)
    }

    pub(crate) fn ensure_mutable(&self) -> Result<()> {
        match self.state {
            RecordState::Tombstoned | RecordState::Destroyed => Err(DeletionError::Immutable {
                model: self.model.clone(),
                id: self.id(),
            }),
            _ => Ok(()),
        }
    }
    pub(crate) fn include(&mut self, association: &str, record: Option<Record>) {
        let slot = self.included.entry(association.to_string()).or_default();
        if let Some(record) = record {
            if !slot.iter().any(|r| r.id() == record.id()) {
                slot.push(record);
            }
        }
    }
    pub(crate) fn mark_persisted(&mut self, id: i64) {
        self.values.insert(self.primary_key.clone(), Value::Integer(id));
        self.state = RecordState::Persisted;
    }
    pub(crate) fn mark_tombstoned(&mut self) {
        self.values.insert(DELETED_COLUMN.to_string(), Value::Integer(1));
        self.state = RecordState::Tombstoned;
    }
    pub(crate) fn clear_tombstone(&mut self) {
        self.values.insert(DELETED_COLUMN.to_string(), Value::Integer(0));
        if self.state == RecordState::Tombstoned {
            self.state = if self.id().is_some() {
                RecordState::Persisted
            } else {
                RecordState::New
            };
        }
    }
    pub(crate) fn mark_destroyed(&mut self) {
        self.state = RecordState::Destroyed;
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::from(s.as_str()),
        Value::Blob(b) => serde_json::Value::from(b.clone()),
    }
}
