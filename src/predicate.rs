//! Conditions and the exclusion predicate.
//!
//! Every statement built for a model renders a [`Conditions`] list against a
//! table alias. The alias is only known when the statement is assembled (the
//! base table for plain reads, `<table>_<n>` for joined tables), so clauses
//! keep unqualified column names until [`Conditions::to_sql`] is called.

use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::types::Value;
use std::fmt;

use crate::error::{DeletionError, Result};

/// The reserved flag column. A table takes part in logical deletion iff it has it.
pub const DELETED_COLUMN: &str = "_deleted";

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Checks that a table or column name is a plain SQL identifier.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(DeletionError::InvalidIdentifier(name.to_string()))
    }
}

pub fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn qualified(alias: &str, column: &str) -> String {
    format!("{}.{}", quote(alias), quote(column))
}

// ------------- Exclusion Predicate -------------
/// "Flag is null or false", bound to one table alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPredicate {
    alias: String,
}
impl ExclusionPredicate {
    pub fn new(alias: impl Into<String>) -> Self {
        Self { alias: alias.into() }
    }
    pub fn alias(&self) -> &str {
        &self.alias
    }
    pub fn to_sql(&self) -> String {
        let column = qualified(&self.alias, DELETED_COLUMN);
        format!("({column} IS NULL OR {column} = 0)")
    }
}
impl fmt::Display for ExclusionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

// ------------- Conditions -------------
#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Eq { column: String, value: Value },
    Raw { sql: String, params: Vec<Value> },
    NotDeleted,
}

/// An AND-list of clauses. An empty list matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    clauses: Vec<Clause>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }
    /// `column = value`, qualified with the statement's base alias. A null
    /// value renders as `IS NULL`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            clauses: vec![Clause::Eq {
                column: column.into(),
                value: value.into(),
            }],
        }
    }
    /// A caller supplied SQL fragment with positional `?` parameters.
    /// Column references inside it are taken verbatim.
    pub fn raw<I>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            clauses: vec![Clause::Raw {
                sql: sql.into(),
                params: params.into_iter().map(Into::into).collect(),
            }],
        }
    }
    /// The exclusion predicate, rendered against whatever alias the
    /// conditions are rendered for.
    pub fn not_deleted() -> Self {
        Self {
            clauses: vec![Clause::NotDeleted],
        }
    }
    pub fn and(mut self, other: Conditions) -> Self {
        self.merge(&other);
        self
    }
    pub fn merge(&mut self, other: &Conditions) {
        self.clauses.extend(other.clauses.iter().cloned());
    }
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
    pub fn len(&self) -> usize {
        self.clauses.len()
    }
    pub fn excludes_deleted(&self) -> bool {
        self.clauses.iter().any(|c| matches!(c, Clause::NotDeleted))
    }
    /// Renders the conditions against `alias`. Returns an empty string when
    /// there is nothing to filter on.
    pub fn to_sql(&self, alias: &str) -> (String, Vec<Value>) {
        let mut fragments = Vec::with_capacity(self.clauses.len());
        let mut params = Vec::new();
        for clause in &self.clauses {
            match clause {
                Clause::Eq { column, value: Value::Null } => {
                    fragments.push(format!("{} IS NULL", qualified(alias, column)));
                }
                Clause::Eq { column, value } => {
                    fragments.push(format!("{} = ?", qualified(alias, column)));
                    params.push(value.clone());
                }
                Clause::Raw { sql, params: raw } => {
                    fragments.push(format!("({sql})"));
                    params.extend(raw.iter().cloned());
                }
                Clause::NotDeleted => {
                    fragments.push(ExclusionPredicate::new(alias).to_sql());
                }
            }
        }
        (fragments.join(" AND "), params)
    }
}
