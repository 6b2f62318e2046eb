use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rusqlite::Connection;
use tracing::info;

use crate::error::{DeletionError, Result};
use crate::predicate::validate_identifier;
use crate::record::Record;
use crate::schema::enable_logical_deletion;

// ------------- Associations -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationKind {
    /// `source.foreign_key = target.primary_key`
    BelongsTo { foreign_key: String },
    /// `target.foreign_key = source.primary_key`
    HasMany { foreign_key: String },
    /// `through.source_key = source.primary_key` and
    /// `through.target_key = target.primary_key`
    HasManyThrough {
        through: String,
        source_key: String,
        target_key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    name: String,
    target: String,
    kind: AssociationKind,
}
impl Association {
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Name of the model at the far end of the association.
    pub fn target(&self) -> &str {
        &self.target
    }
    pub fn kind(&self) -> &AssociationKind {
        &self.kind
    }
    /// The model whose rows the join filters on, which for through
    /// associations is the join model rather than the target.
    pub fn through(&self) -> Option<&str> {
        match &self.kind {
            AssociationKind::HasManyThrough { through, .. } => Some(through),
            _ => None,
        }
    }
    fn validate(&self) -> Result<()> {
        match &self.kind {
            AssociationKind::BelongsTo { foreign_key } | AssociationKind::HasMany { foreign_key } => {
                validate_identifier(foreign_key)?;
            }
            AssociationKind::HasManyThrough { source_key, target_key, .. } => {
                validate_identifier(source_key)?;
                validate_identifier(target_key)?;
            }
        }
        Ok(())
    }
}

// ------------- Lifecycle -------------
/// Hooks run by the ordinary save and physical destroy paths. A hook that
/// returns an error halts the operation; inside a transaction it rolls back.
///
/// Logical deletion writes its flag without running any of these.
pub trait Lifecycle: Send + Sync {
    fn before_save(&self, _record: &Record) -> Result<()> {
        Ok(())
    }
    fn after_save(&self, _record: &Record) -> Result<()> {
        Ok(())
    }
    fn before_destroy(&self, _record: &Record) -> Result<()> {
        Ok(())
    }
    fn after_destroy(&self, _record: &Record) -> Result<()> {
        Ok(())
    }
}

// ------------- Model -------------
/// What a caller declares about a model before it is registered.
pub struct ModelDef {
    pub(crate) name: String,
    pub(crate) table: String,
    pub(crate) primary_key: String,
    pub(crate) associations: Vec<Association>,
    pub(crate) lifecycle: Option<Arc<dyn Lifecycle>>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            associations: Vec::new(),
            lifecycle: None,
        }
    }
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }
    pub fn belongs_to(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.associations.push(Association {
            name: name.into(),
            target: target.into(),
            kind: AssociationKind::BelongsTo { foreign_key: foreign_key.into() },
        });
        self
    }
    pub fn has_many(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.associations.push(Association {
            name: name.into(),
            target: target.into(),
            kind: AssociationKind::HasMany { foreign_key: foreign_key.into() },
        });
        self
    }
    pub fn has_many_through(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        through: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        self.associations.push(Association {
            name: name.into(),
            target: target.into(),
            kind: AssociationKind::HasManyThrough {
                through: through.into(),
                source_key: source_key.into(),
                target_key: target_key.into(),
            },
        });
        self
    }
    pub fn lifecycle(mut self, hooks: Arc<dyn Lifecycle>) -> Self {
        self.lifecycle = Some(hooks);
        self
    }
    pub(crate) fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.primary_key)?;
        for association in &self.associations {
            association.validate()?;
        }
        Ok(())
    }
}

/// Registered, immutable model metadata.
pub struct Model {
    name: String,
    table: String,
    primary_key: String,
    columns: Vec<String>,
    deletion_capable: bool,
    associations: Vec<Association>,
    lifecycle: Option<Arc<dyn Lifecycle>>,
}

impl Model {
    pub(crate) fn from_def(def: ModelDef, columns: Vec<String>, deletion_capable: bool) -> Self {
        Self {
            name: def.name,
            table: def.table,
            primary_key: def.primary_key,
            columns,
            deletion_capable,
            associations: def.associations,
            lifecycle: def.lifecycle,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn table(&self) -> &str {
        &self.table
    }
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }
    /// Columns found when the model was registered. Empty if the table was
    /// missing at that time.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
    pub fn is_deletion_capable(&self) -> bool {
        self.deletion_capable
    }
    pub fn associations(&self) -> &[Association] {
        &self.associations
    }
    pub fn association(&self, name: &str) -> Result<&Association> {
        self.associations
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| DeletionError::UnknownAssociation {
                model: self.name.clone(),
                association: name.to_string(),
            })
    }
    pub fn lifecycle(&self) -> Option<&Arc<dyn Lifecycle>> {
        self.lifecycle.as_ref()
    }
    /// Fails with `UnknownColumn` when the column is not part of the table.
    /// Models registered before their table existed accept anything.
    pub fn check_column(&self, column: &str) -> Result<()> {
        if self.columns.is_empty() || self.has_column(column) {
            Ok(())
        } else {
            Err(DeletionError::UnknownColumn {
                model: self.name.clone(),
                column: column.to_string(),
            })
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("columns", &self.columns)
            .field("deletion_capable", &self.deletion_capable)
            .field("associations", &self.associations)
            .field("lifecycle", &self.lifecycle.is_some())
            .finish()
    }
}

// ------------- Registry -------------
#[derive(Debug, Default)]
pub struct Registry {
    models: HashMap<String, Arc<Model>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }
    /// Introspects the model's table once and keeps the result. The tables
    /// must exist for logical deletion to be detected.
    pub fn register(&mut self, conn: &Connection, def: ModelDef) -> Result<Arc<Model>> {
        let model = Arc::new(enable_logical_deletion(conn, def)?);
        info!(
            model = model.name(),
            table = model.table(),
            deletion_capable = model.is_deletion_capable(),
            "registered model"
        );
        self.models.insert(model.name().to_string(), Arc::clone(&model));
        Ok(model)
    }
    pub fn model(&self, name: &str) -> Result<Arc<Model>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| DeletionError::UnknownModel(name.to_string()))
    }
    /// Unknown models are never deletion capable.
    pub fn is_deletion_capable(&self, name: &str) -> bool {
        self.models
            .get(name)
            .map(|m| m.is_deletion_capable())
            .unwrap_or(false)
    }
    pub fn len(&self) -> usize {
        self.models.len()
    }
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
