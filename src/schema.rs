// used for schema introspection
use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::Result;
use crate::model::{Model, ModelDef};
use crate::predicate::{quote, DELETED_COLUMN};

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found: i64 = conn.query_row(
        "
        select count(*)
            from sqlite_master
            where type in ('table', 'view')
            and name = ?
        ",
        params![table],
        |r| r.get(0),
    )?;
    Ok(found > 0)
}

pub fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut statement = conn.prepare(&format!("pragma table_info({})", quote(table)))?;
    let names = statement
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// True iff the table exists and carries the `_deleted` column. A missing
/// table is not an error, it just can't take part.
pub fn is_deletion_capable(conn: &Connection, table: &str) -> Result<bool> {
    if !table_exists(conn, table)? {
        debug!(table, "table is missing, logical deletion not detected");
        return Ok(false);
    }
    let columns = column_names(conn, table)?;
    Ok(has_deleted_column(&columns))
}

fn has_deleted_column(columns: &[String]) -> bool {
    columns.iter().any(|c| c == DELETED_COLUMN)
}

/// Builds the registered model, deciding once whether reads, aggregates and
/// deletes on it get intercepted.
pub fn enable_logical_deletion(conn: &Connection, def: ModelDef) -> Result<Model> {
    def.validate()?;
    let columns = if table_exists(conn, &def.table)? {
        column_names(conn, &def.table)?
    } else {
        debug!(table = %def.table, "table is missing, logical deletion not detected");
        Vec::new()
    };
    let capable = has_deleted_column(&columns);
    Ok(Model::from_def(def, columns, capable))
}
