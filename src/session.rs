use std::sync::Arc;

use rusqlite::Connection;

use crate::audit::{AuditSink, TracingAudit};
use crate::error::Result;
use crate::model::Registry;
use crate::record::Record;
use crate::scope::ScopeStack;
use crate::settings::Settings;

/// One unit of work against a connection.
///
/// Reads, aggregates and deletes on deletion capable models go through the
/// session so that the exclusion predicate can be applied. Scope state
/// (`with_deleted`, `without_deleted`, `with_scope`) lives here rather than on
/// the models, so sessions never see each other's scopes. A session is not
/// `Sync`; give each request or thread its own.
pub struct Session<'db> {
    pub(crate) conn: &'db Connection,
    pub(crate) registry: &'db Registry,
    pub(crate) scope: ScopeStack,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) actor: String,
}

impl<'db> Session<'db> {
    pub fn new(conn: &'db Connection, registry: &'db Registry) -> Self {
        Self {
            conn,
            registry,
            scope: ScopeStack::new(),
            audit: Arc::new(TracingAudit),
            actor: "system".to_string(),
        }
    }
    pub fn from_settings(conn: &'db Connection, registry: &'db Registry, settings: &Settings) -> Self {
        Self::new(conn, registry).with_actor(settings.deletion.actor.clone())
    }
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }
    pub fn connection(&self) -> &'db Connection {
        self.conn
    }
    pub fn registry(&self) -> &'db Registry {
        self.registry
    }
    pub fn scope(&self) -> &ScopeStack {
        &self.scope
    }
    pub fn actor(&self) -> &str {
        &self.actor
    }
    /// An unsaved record for the model.
    pub fn build(&self, model: &str) -> Result<Record> {
        let model = self.registry.model(model)?;
        Ok(Record::new(&model))
    }
    /// Runs `op` in a transaction, or inside the caller's transaction if one
    /// is already open on the connection.
    pub(crate) fn transaction<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return op();
        }
        let transaction = self.conn.unchecked_transaction()?;
        let out = op()?;
        transaction.commit()?;
        Ok(out)
    }
}
