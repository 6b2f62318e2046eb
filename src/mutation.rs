//! Writes: saving, logical and physical deletion, undeletion.
//!
//! `delete` and `delete_all` turn into flag updates on deletion capable
//! models. The physical paths (`destroy_permanently`, `delete_all_permanently`)
//! always remove rows, whatever the scope.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use tracing::{debug, info};

use crate::error::{DeletionError, Result};
use crate::model::Model;
use crate::predicate::{quote, Conditions, DELETED_COLUMN};
use crate::query::FindOptions;
use crate::record::{Record, RecordState};
use crate::session::Session;

impl Session<'_> {
    // ------------- Saving -------------
    /// Builds, fills and saves a record in one go.
    pub fn create<I, K, V>(&self, model: &str, values: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = self.build(model)?;
        for (column, value) in values {
            record.set(column, value)?;
        }
        self.save(&mut record)?;
        Ok(record)
    }

    /// Inserts a new record or updates a persisted one, running the save
    /// hooks around it. On failure the record is left as it was.
    pub fn save(&self, record: &mut Record) -> Result<()> {
        record.ensure_mutable()?;
        let model = self.registry.model(record.model())?;
        for column in record.values().keys() {
            model.check_column(column)?;
        }
        let snapshot = record.clone();
        let saved = self.transaction(|| {
            if let Some(hooks) = model.lifecycle() {
                hooks.before_save(record)?;
            }
            if record.is_new() {
                self.insert(&model, record)?;
            } else {
                self.update(&model, record)?;
            }
            if let Some(hooks) = model.lifecycle() {
                hooks.after_save(record)?;
            }
            Ok(())
        });
        if saved.is_err() {
            *record = snapshot;
        }
        saved
    }

    // ------------- Deleting -------------
    /// Logical delete. Sets the flag on the row, bypassing the save hooks,
    /// and tombstones the record. Models that are not deletion capable are
    /// destroyed instead.
    pub fn delete(&self, record: &mut Record) -> Result<()> {
        let model = self.registry.model(record.model())?;
        if !model.is_deletion_capable() {
            return self.destroy_permanently(record);
        }
        if record.state() == RecordState::Tombstoned {
            debug!(model = model.name(), id = ?record.id(), "already deleted");
            return Ok(());
        }
        record.ensure_mutable()?;
        if !record.is_new() {
            // keyed on the row itself, ambient scopes don't apply
            let id = require_id(&model, record)?;
            let sql = format!(
                "update {} set {} = 1 where {} = ?",
                quote(model.table()),
                quote(DELETED_COLUMN),
                quote(model.primary_key())
            );
            debug!(model = model.name(), %sql, "delete");
            if self.conn.execute(&sql, params![id])? == 0 {
                return Err(DeletionError::NotFound {
                    model: model.name().to_string(),
                    id,
                });
            }
        }
        record.mark_tombstoned();
        self.audit.audit_deletion(self.conn, record, &self.actor, false);
        info!(model = model.name(), id = ?record.id(), actor = %self.actor, "logically deleted");
        Ok(())
    }

    /// Flags every live row matching `conditions`; returns how many were flagged.
    pub fn delete_all(&self, model: &str, conditions: Conditions) -> Result<usize> {
        let definition = self.registry.model(model)?;
        if !definition.is_deletion_capable() {
            return self.delete_all_permanently(model, conditions);
        }
        let flag = format!("{} = 1", quote(DELETED_COLUMN));
        let flagged = self.without_deleted(model, || self.update_all(&definition, &flag, &conditions))?;
        info!(model, flagged, actor = %self.actor, "logically deleted rows");
        Ok(flagged)
    }

    /// Removes every row matching `conditions`, deleted or not.
    pub fn delete_all_permanently(&self, model: &str, conditions: Conditions) -> Result<usize> {
        let definition = self.registry.model(model)?;
        let (removed, doomed) = self.transaction(|| {
            let doomed = if definition.is_deletion_capable() {
                self.select(&definition, &FindOptions::new().conditions(conditions.clone()))?
            } else {
                Vec::new()
            };
            let removed = self.delete_rows(&definition, &conditions)?;
            Ok((removed, doomed))
        })?;
        for mut record in doomed {
            record.mark_destroyed();
            self.audit.audit_deletion(self.conn, &record, &self.actor, true);
        }
        info!(model, removed, actor = %self.actor, "physically deleted rows");
        Ok(removed)
    }

    /// Physically removes the row behind `record`. The destroy hooks run in
    /// the same transaction, so a hook returning an error keeps the row.
    pub fn destroy_permanently(&self, record: &mut Record) -> Result<()> {
        let model = self.registry.model(record.model())?;
        match record.state() {
            RecordState::Destroyed => return Ok(()),
            RecordState::New => {
                record.mark_destroyed();
                return Ok(());
            }
            _ => {}
        }
        let id = require_id(&model, record)?;
        let sql = format!(
            "delete from {} where {} = ?",
            quote(model.table()),
            quote(model.primary_key())
        );
        self.transaction(|| {
            if let Some(hooks) = model.lifecycle() {
                hooks.before_destroy(record)?;
            }
            debug!(model = model.name(), %sql, "destroy");
            if self.conn.execute(&sql, params![id])? == 0 {
                return Err(DeletionError::NotFound {
                    model: model.name().to_string(),
                    id,
                });
            }
            if let Some(hooks) = model.lifecycle() {
                hooks.after_destroy(record)?;
            }
            Ok(())
        })?;
        record.mark_destroyed();
        if model.is_deletion_capable() {
            self.audit.audit_deletion(self.conn, record, &self.actor, true);
        }
        info!(model = model.name(), id, actor = %self.actor, "physically deleted");
        Ok(())
    }

    /// Clears the flag and saves. Returns `false` when there was nothing to
    /// undo.
    pub fn undelete(&self, record: &mut Record) -> Result<bool> {
        if !record.is_deleted() {
            return Ok(false);
        }
        let snapshot = record.clone();
        record.clear_tombstone();
        if let Err(e) = self.save(record) {
            *record = snapshot;
            return Err(e);
        }
        self.audit.audit_undeletion(self.conn, record, &self.actor);
        info!(model = record.model(), id = ?record.id(), actor = %self.actor, "undeleted");
        Ok(true)
    }

    // ------------- Statements -------------
    fn insert(&self, model: &Model, record: &mut Record) -> Result<()> {
        let table = quote(model.table());
        let sql = if record.values().is_empty() {
            format!("insert into {table} default values")
        } else {
            let columns: Vec<String> = record.values().keys().map(|c| quote(c)).collect();
            let holes = vec!["?"; columns.len()];
            format!("insert into {table} ({}) values ({})", columns.join(", "), holes.join(", "))
        };
        debug!(model = model.name(), %sql, "insert");
        self.conn.execute(&sql, params_from_iter(record.values().values()))?;
        let id = record.id().unwrap_or_else(|| self.conn.last_insert_rowid());
        record.mark_persisted(id);
        Ok(())
    }

    fn update(&self, model: &Model, record: &Record) -> Result<()> {
        let id = require_id(model, record)?;
        let assignments: Vec<(&String, &Value)> = record
            .values()
            .iter()
            .filter(|(column, _)| column.as_str() != model.primary_key())
            .collect();
        if assignments.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "update {} set {} where {} = ?",
            quote(model.table()),
            assignments
                .iter()
                .map(|(column, _)| format!("{} = ?", quote(column)))
                .collect::<Vec<_>>()
                .join(", "),
            quote(model.primary_key()),
        );
        let key = Value::Integer(id);
        let mut params: Vec<&Value> = assignments.iter().map(|(_, value)| *value).collect();
        params.push(&key);
        debug!(model = model.name(), %sql, "update");
        self.conn.execute(&sql, params_from_iter(params))?;
        Ok(())
    }

    /// `update <table> set <assignment>` restricted by the ambient conditions
    /// of the model and `conditions`.
    fn update_all(&self, model: &Model, assignment: &str, conditions: &Conditions) -> Result<usize> {
        let (where_sql, params) = self.restriction(model, conditions);
        let mut sql = format!("update {} set {assignment}", quote(model.table()));
        if !where_sql.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&where_sql);
        }
        debug!(model = model.name(), %sql, "update_all");
        Ok(self.conn.execute(&sql, params_from_iter(params.iter()))?)
    }

    fn delete_rows(&self, model: &Model, conditions: &Conditions) -> Result<usize> {
        let (where_sql, params) = self.restriction(model, conditions);
        let mut sql = format!("delete from {}", quote(model.table()));
        if !where_sql.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&where_sql);
        }
        debug!(model = model.name(), %sql, "delete_rows");
        Ok(self.conn.execute(&sql, params_from_iter(params.iter()))?)
    }

    fn restriction(&self, model: &Model, conditions: &Conditions) -> (String, Vec<Value>) {
        self.scope
            .ambient(model.name())
            .and(conditions.clone())
            .to_sql(model.table())
    }
}

fn require_id(model: &Model, record: &Record) -> Result<i64> {
    record
        .id()
        .ok_or_else(|| DeletionError::MissingKey(model.name().to_string()))
}
