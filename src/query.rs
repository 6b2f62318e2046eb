//! Reads and aggregates.
//!
//! Every entry point here goes through `intercept`: unless the
//! caller asked for deleted rows with [`FindOptions::include_deleted`], or the
//! model is currently under `with_deleted`, the statement is built inside
//! `without_deleted` and so carries the exclusion predicate for the base table.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row};
use tracing::debug;

use crate::error::{DeletionError, Result};
use crate::join::{through_scope, JoinAssociation, JoinKind};
use crate::model::{AssociationKind, Model};
use crate::predicate::{qualified, quote, Conditions};
use crate::record::Record;
use crate::session::Session;

/// Options for a read or aggregate.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    conditions: Conditions,
    include_deleted: bool,
    joins: Vec<String>,
    includes: Vec<String>,
    order: Option<String>,
    limit: Option<usize>,
    through_join: Option<String>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }
    /// ANDs `conditions` into the options.
    pub fn conditions(mut self, conditions: Conditions) -> Self {
        self.conditions.merge(&conditions);
        self
    }
    pub fn filter(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions(Conditions::eq(column, value))
    }
    /// Ask for logically deleted rows too, for this call only.
    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
    /// Inner join on an association; base rows without a live partner drop out.
    pub fn joins(mut self, association: impl Into<String>) -> Self {
        self.joins.push(association.into());
        self
    }
    /// Eager load an association with an outer join.
    pub fn includes(mut self, association: impl Into<String>) -> Self {
        self.includes.push(association.into());
        self
    }
    /// Raw `order by` expression.
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
    /// Removes the per-call override from the options and reports whether it was set.
    pub(crate) fn take_include_deleted(&mut self) -> bool {
        std::mem::take(&mut self.include_deleted)
    }
    pub(crate) fn through(mut self, join: String) -> Self {
        self.through_join = Some(join);
        self
    }
    fn is_joined(&self) -> bool {
        !self.joins.is_empty() || self.through_join.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum(String),
    Average(String),
    Minimum(String),
    Maximum(String),
}
impl Aggregate {
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Count => None,
            Self::Sum(c) | Self::Average(c) | Self::Minimum(c) | Self::Maximum(c) => Some(c),
        }
    }
    fn to_sql(&self, alias: &str) -> String {
        let function = match self {
            Self::Count => return "count(*)".to_string(),
            Self::Sum(_) => "sum",
            Self::Average(_) => "avg",
            Self::Minimum(_) => "min",
            Self::Maximum(_) => "max",
        };
        format!("{function}({})", qualified(alias, self.column().unwrap_or_default()))
    }
}

struct Composed {
    sql: String,
    params: Vec<Value>,
    includes: Vec<JoinAssociation>,
}

impl Session<'_> {
    // ------------- Finders -------------
    pub fn find_all(&self, model: &str, options: FindOptions) -> Result<Vec<Record>> {
        let model = self.registry.model(model)?;
        self.intercept(&model, options, |options| self.select(&model, options))
    }
    pub fn first(&self, model: &str, options: FindOptions) -> Result<Option<Record>> {
        Ok(self.find_all(model, options.limit(1))?.into_iter().next())
    }
    /// Lookup by primary key. A logically deleted row is reported exactly
    /// like a missing one unless deleted rows are visible.
    pub fn find(&self, model: &str, id: i64) -> Result<Record> {
        self.find_with(model, id, FindOptions::new())
    }
    pub fn find_with(&self, model: &str, id: i64, options: FindOptions) -> Result<Record> {
        let primary_key = self.registry.model(model)?.primary_key().to_string();
        self.first(model, options.filter(primary_key, id))?
            .ok_or_else(|| DeletionError::NotFound {
                model: model.to_string(),
                id,
            })
    }
    pub fn find_by(&self, model: &str, column: &str, value: impl Into<Value>) -> Result<Option<Record>> {
        self.registry.model(model)?.check_column(column)?;
        self.first(model, FindOptions::new().filter(column, value))
    }
    pub fn find_all_by(&self, model: &str, column: &str, value: impl Into<Value>) -> Result<Vec<Record>> {
        self.registry.model(model)?.check_column(column)?;
        self.find_all(model, FindOptions::new().filter(column, value))
    }
    pub fn exists(&self, model: &str, id: i64) -> Result<bool> {
        let primary_key = self.registry.model(model)?.primary_key().to_string();
        Ok(self.count(model, FindOptions::new().filter(primary_key, id))? > 0)
    }
    /// Existence regardless of deletion state.
    pub fn exists_or_deleted(&self, model: &str, id: i64) -> Result<bool> {
        self.with_deleted(model, || self.exists(model, id))
    }

    // ------------- Aggregates -------------
    pub fn count(&self, model: &str, options: FindOptions) -> Result<i64> {
        match self.calculate(model, Aggregate::Count, options)? {
            Value::Integer(count) => Ok(count),
            _ => Ok(0),
        }
    }
    pub fn calculate(&self, model: &str, aggregate: Aggregate, options: FindOptions) -> Result<Value> {
        let model = self.registry.model(model)?;
        if let Some(column) = aggregate.column() {
            model.check_column(column)?;
        }
        self.intercept(&model, options, |options| self.aggregate(&model, options, &aggregate))
    }

    // ------------- Associations -------------
    /// Records at the far end of `association`, read like any other find on
    /// the target model.
    pub fn associated(&self, record: &Record, association: &str, options: FindOptions) -> Result<Vec<Record>> {
        let model = self.registry.model(record.model())?;
        let association = model.association(association)?;
        let target = association.target();
        match association.kind() {
            AssociationKind::BelongsTo { foreign_key } => match record.get(foreign_key) {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(key) => {
                    let primary_key = self.registry.model(target)?.primary_key().to_string();
                    self.find_all(target, options.filter(primary_key, key.clone()))
                }
            },
            AssociationKind::HasMany { foreign_key } => match record.id() {
                None => Ok(Vec::new()),
                Some(id) => self.find_all(target, options.filter(foreign_key.clone(), id)),
            },
            AssociationKind::HasManyThrough { .. } => {
                let Some(id) = record.id() else {
                    return Ok(Vec::new());
                };
                let (join, conditions) = through_scope(self.registry, association, id)?;
                self.find_all(target, options.through(join).conditions(conditions))
            }
        }
    }

    // ------------- Interception -------------
    fn intercept<T>(
        &self,
        model: &Model,
        mut options: FindOptions,
        op: impl FnOnce(&FindOptions) -> Result<T>,
    ) -> Result<T> {
        let include_deleted = options.take_include_deleted();
        if include_deleted || !model.is_deletion_capable() || self.is_suppressed(model.name()) {
            op(&options)
        } else {
            self.without_deleted(model.name(), || op(&options))
        }
    }

    fn compose(&self, model: &Arc<Model>, options: &FindOptions, aggregate: Option<&Aggregate>) -> Result<Composed> {
        let base = model.table();
        let mut counter = 0;
        let mut joins = Vec::new();
        if let Some(through) = &options.through_join {
            joins.push(through.clone());
        }
        for name in &options.joins {
            let join = JoinAssociation::new(self.registry, model, name, JoinKind::Inner, &mut counter)?;
            joins.push(join.association_join());
        }
        let mut includes = Vec::new();
        if aggregate.is_none() {
            for name in &options.includes {
                let join =
                    JoinAssociation::new(self.registry, model, name, JoinKind::LeftOuter, &mut counter)?;
                joins.push(join.association_join());
                includes.push(join);
            }
        }
        let conditions = self.scope.ambient(model.name()).and(options.conditions.clone());
        let (where_sql, params) = conditions.to_sql(base);

        let projection = if !includes.is_empty() {
            let mut columns: Vec<String> = model
                .columns()
                .iter()
                .map(|c| format!("{} as {}", qualified(base, c), quote(c)))
                .collect();
            for join in &includes {
                for c in join.target().columns() {
                    let name = format!("{}__{}", join.alias(), c);
                    columns.push(format!("{} as {}", qualified(join.alias(), c), quote(&name)));
                }
            }
            columns.join(", ")
        } else if options.is_joined() {
            format!("distinct {}.*", quote(base))
        } else if let Some(aggregate) = aggregate {
            aggregate.to_sql(base)
        } else {
            format!("{}.*", quote(base))
        };

        let mut sql = format!("select {projection} from {}", quote(base));
        for join in &joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !where_sql.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&where_sql);
        }
        match aggregate {
            // joined rows are deduplicated first so partners don't inflate the result
            Some(aggregate) if options.is_joined() => {
                sql = format!("select {} from ({sql}) as {}", aggregate.to_sql(base), quote(base));
            }
            Some(_) => {}
            None => {
                if let Some(order) = &options.order {
                    sql.push_str(" order by ");
                    sql.push_str(order);
                }
                if let (Some(limit), true) = (options.limit, includes.is_empty()) {
                    sql.push_str(&format!(" limit {limit}"));
                }
            }
        }
        Ok(Composed { sql, params, includes })
    }

    pub(crate) fn select(&self, model: &Arc<Model>, options: &FindOptions) -> Result<Vec<Record>> {
        let composed = self.compose(model, options, None)?;
        debug!(model = model.name(), sql = %composed.sql, "select");
        let mut statement = self.conn.prepare(&composed.sql)?;
        let names: Vec<String> = statement.column_names().into_iter().map(String::from).collect();
        let mut rows = statement.query(params_from_iter(composed.params.iter()))?;

        let mut records: Vec<Record> = Vec::new();
        if composed.includes.is_empty() {
            while let Some(row) = rows.next()? {
                let values = read_values(row, &names, 0, names.len(), "")?;
                records.push(Record::loaded(model, values));
            }
            return Ok(records);
        }

        // one record per base row, partners collected under it
        let base_width = model.columns().len();
        let mut positions: HashMap<i64, usize> = HashMap::new();
        while let Some(row) = rows.next()? {
            let record = Record::loaded(model, read_values(row, &names, 0, base_width, "")?);
            let index = match record.id().and_then(|id| positions.get(&id).copied()) {
                Some(index) => index,
                None => {
                    if let Some(id) = record.id() {
                        positions.insert(id, records.len());
                    }
                    records.push(record);
                    records.len() - 1
                }
            };
            let mut offset = base_width;
            for join in &composed.includes {
                let target = join.target();
                let width = target.columns().len();
                let prefix = format!("{}__", join.alias());
                let values = read_values(row, &names, offset, width, &prefix)?;
                offset += width;
                let partner = match values.get(target.primary_key()) {
                    None | Some(Value::Null) => None,
                    Some(_) => Some(Record::loaded(target, values)),
                };
                records[index].include(join.association().name(), partner);
            }
        }
        if let Some(limit) = options.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn aggregate(&self, model: &Arc<Model>, options: &FindOptions, aggregate: &Aggregate) -> Result<Value> {
        let composed = self.compose(model, options, Some(aggregate))?;
        debug!(model = model.name(), sql = %composed.sql, "aggregate");
        let value = self
            .conn
            .query_row(&composed.sql, params_from_iter(composed.params.iter()), |r| {
                r.get::<_, Value>(0)
            })?;
        Ok(value)
    }
}

fn read_values(
    row: &Row,
    names: &[String],
    offset: usize,
    width: usize,
    prefix: &str,
) -> Result<BTreeMap<String, Value>> {
    let mut values = BTreeMap::new();
    for index in offset..offset + width {
        let name = names[index].strip_prefix(prefix).unwrap_or(&names[index]);
        values.insert(name.to_string(), row.get::<_, Value>(index)?);
    }
    Ok(values)
}
