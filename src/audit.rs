//! Audit sinks for deletions and undeletions.
//!
//! The session calls a sink after the fact and never looks at the outcome.
//! A sink that can fail (such as [`TableAudit`]) logs the failure and moves on.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{DeletionError, Result};
use crate::predicate::{quote, validate_identifier};
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
    LogicalDelete,
    PhysicalDelete,
    Undelete,
}
impl AuditAction {
    pub fn deletion(physical: bool) -> Self {
        if physical { Self::PhysicalDelete } else { Self::LogicalDelete }
    }
    pub fn is_physical(&self) -> bool {
        matches!(self, Self::PhysicalDelete)
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LogicalDelete => "logical_delete",
            Self::PhysicalDelete => "physical_delete",
            Self::Undelete => "undelete",
        }
    }
}
impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for AuditAction {
    type Err = DeletionError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "logical_delete" => Ok(Self::LogicalDelete),
            "physical_delete" => Ok(Self::PhysicalDelete),
            "undelete" => Ok(Self::Undelete),
            other => Err(DeletionError::Persistence(format!("unknown audit action '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub model: String,
    pub record_id: Option<i64>,
    pub actor: String,
    pub action: AuditAction,
    pub recorded_at: DateTime<Utc>,
}
impl AuditEvent {
    pub fn new(record: &Record, actor: &str, action: AuditAction) -> Self {
        Self {
            model: record.model().to_string(),
            record_id: record.id(),
            actor: actor.to_string(),
            action,
            recorded_at: Utc::now(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn audit_deletion(&self, conn: &Connection, record: &Record, actor: &str, physical: bool);
    fn audit_undeletion(&self, conn: &Connection, record: &Record, actor: &str);
}

// ------------- Tracing -------------
/// Writes audit events to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn audit_deletion(&self, _conn: &Connection, record: &Record, actor: &str, physical: bool) {
        info!(model = record.model(), id = ?record.id(), actor, physical, "audit deletion");
    }
    fn audit_undeletion(&self, _conn: &Connection, record: &Record, actor: &str) {
        info!(model = record.model(), id = ?record.id(), actor, "audit undeletion");
    }
}

// ------------- Memory -------------
#[derive(Debug, Default)]
pub struct MemoryAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
    fn push(&self, event: AuditEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl AuditSink for MemoryAudit {
    fn audit_deletion(&self, _conn: &Connection, record: &Record, actor: &str, physical: bool) {
        self.push(AuditEvent::new(record, actor, AuditAction::deletion(physical)));
    }
    fn audit_undeletion(&self, _conn: &Connection, record: &Record, actor: &str) {
        self.push(AuditEvent::new(record, actor, AuditAction::Undelete));
    }
}

// ------------- Table -------------
/// Keeps the audit trail in a table on the audited connection, together with
/// a JSON snapshot of the row as it looked when the event happened.
#[derive(Debug, Clone)]
pub struct TableAudit {
    table: String,
}

impl TableAudit {
    pub fn new(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self { table })
    }
    pub fn table(&self) -> &str {
        &self.table
    }
    pub fn install(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "
            create table if not exists {} (
                Audit_Identity integer primary key,
                Model text not null,
                Record_Identity integer null,
                Actor text not null,
                Action text not null,
                Physical integer not null,
                Snapshot text null,
                RecordedAt text not null
            );
            ",
            quote(&self.table)
        ))?;
        Ok(())
    }
    pub fn events(&self, conn: &Connection) -> Result<Vec<AuditEvent>> {
        let mut statement = conn.prepare(&format!(
            "
            select Model, Record_Identity, Actor, Action, RecordedAt
                from {}
                order by Audit_Identity
            ",
            quote(&self.table)
        ))?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(model, record_id, actor, action, recorded_at)| {
                Ok(AuditEvent {
                    model,
                    record_id,
                    actor,
                    action: action.parse()?,
                    recorded_at,
                })
            })
            .collect()
    }
    fn write(&self, conn: &Connection, record: &Record, event: &AuditEvent) {
        let written = conn.execute(
            &format!(
                "
                insert into {} (
                    Model,
                    Record_Identity,
                    Actor,
                    Action,
                    Physical,
                    Snapshot,
                    RecordedAt
                ) values (?, ?, ?, ?, ?, ?, ?)
                ",
                quote(&self.table)
            ),
            params![
                &event.model,
                &event.record_id,
                &event.actor,
                event.action.as_str(),
                event.action.is_physical(),
                record.to_json().to_string(),
                &event.recorded_at
            ],
        );
        if let Err(e) = written {
            warn!(table = %self.table, model = %event.model, error = %e, "could not write audit event");
        }
    }
}

impl AuditSink for TableAudit {
    fn audit_deletion(&self, conn: &Connection, record: &Record, actor: &str, physical: bool) {
        let event = AuditEvent::new(record, actor, AuditAction::deletion(physical));
        self.write(conn, record, &event);
    }
    fn audit_undeletion(&self, conn: &Connection, record: &Record, actor: &str) {
        let event = AuditEvent::new(record, actor, AuditAction::Undelete);
        self.write(conn, record, &event);
    }
}
