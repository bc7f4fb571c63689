//! Statement builders for each supported operation.
//!
//! Every builder escapes identifiers and binds values positionally; no value
//! is ever interpolated into SQL text. Two builders have a narrower
//! guarantee:
//!
//! - [`create_database`] binds nothing, since database names cannot be
//!   parameterized; only identifier escaping protects it.
//! - [`create_table`] passes its column definitions through verbatim. They are
//!   a full DDL fragment, so the caller must supply syntactically valid,
//!   trusted DDL.

use crate::error::CrudResult;
use crate::sql::Sql;
use crate::validate::{optional_condition, require_condition, require_values};
use crate::value::ColumnValues;

/// `CREATE DATABASE "name"`.
pub fn create_database(name: &str) -> Sql {
    let mut sql = Sql::new("CREATE DATABASE ");
    sql.push_ident(name);
    sql
}

/// `CREATE TABLE IF NOT EXISTS "schema"."table" (<column_defs>)`.
///
/// `column_defs` is trusted DDL and is not escaped.
pub fn create_table(schema: &str, table: &str, column_defs: &str) -> Sql {
    let mut sql = Sql::new("CREATE TABLE IF NOT EXISTS ");
    sql.push_qualified(schema, table)
        .push(" (")
        .push(column_defs)
        .push(")");
    sql
}

/// `DROP TABLE IF EXISTS "schema"."table"`.
pub fn drop_table(schema: &str, table: &str) -> Sql {
    let mut sql = Sql::new("DROP TABLE IF EXISTS ");
    sql.push_qualified(schema, table);
    sql
}

/// `INSERT INTO "schema"."table" ("a", "b") VALUES ($1, $2)`.
pub fn insert(schema: &str, table: &str, values: &ColumnValues) -> CrudResult<Sql> {
    let values = require_values("data", values)?;

    let mut sql = Sql::new("INSERT INTO ");
    sql.push_qualified(schema, table).push(" (");
    sql.push_separated(values.iter(), ", ", |sql, (column, _)| {
        sql.push_ident(column);
    });
    sql.push(") VALUES (");
    sql.push_separated(values.iter(), ", ", |sql, (_, value)| {
        sql.push_bind(value.clone());
    });
    sql.push(")");
    Ok(sql)
}

/// `SELECT * FROM "schema"."table" [WHERE ...]`.
///
/// An absent or empty condition selects every row.
pub fn select(schema: &str, table: &str, condition: Option<&ColumnValues>) -> CrudResult<Sql> {
    let condition = optional_condition(condition)?;

    let mut sql = Sql::new("SELECT * FROM ");
    sql.push_qualified(schema, table);
    if let Some(condition) = condition {
        push_where(&mut sql, condition);
    }
    Ok(sql)
}

/// `UPDATE "schema"."table" SET "a" = $1 WHERE "b" = $2`.
///
/// SET placeholders come first, WHERE placeholders continue the numbering, so
/// the two ranges never overlap. A missing or empty condition is rejected.
pub fn update(
    schema: &str,
    table: &str,
    set: &ColumnValues,
    condition: Option<&ColumnValues>,
) -> CrudResult<Sql> {
    let set = require_values("data", set)?;
    let condition = require_condition(condition)?;

    let mut sql = Sql::new("UPDATE ");
    sql.push_qualified(schema, table).push(" SET ");
    sql.push_separated(set.iter(), ", ", |sql, (column, value)| {
        sql.push_ident(column).push(" = ").push_bind(value.clone());
    });
    push_where(&mut sql, condition);
    Ok(sql)
}

/// `DELETE FROM "schema"."table" [WHERE ...]`.
///
/// An absent or empty condition deletes every row.
pub fn delete(schema: &str, table: &str, condition: Option<&ColumnValues>) -> CrudResult<Sql> {
    let condition = optional_condition(condition)?;

    let mut sql = Sql::new("DELETE FROM ");
    sql.push_qualified(schema, table);
    if let Some(condition) = condition {
        push_where(&mut sql, condition);
    }
    Ok(sql)
}

/// Catalog query rendering an existing table as one `CREATE TABLE` text.
///
/// Returns a single row with a `create_table_sql` column, or no rows when the
/// table does not exist.
pub fn describe_create_table(schema: &str, table: &str) -> Sql {
    let mut sql = Sql::new(
        r#"SELECT
  'CREATE TABLE ' || format('%I.%I', n.nspname, c.relname) || E' (\n' ||
  string_agg(
    '    ' || quote_ident(a.attname) || ' ' ||
    pg_catalog.format_type(a.atttypid, a.atttypmod) ||
    CASE WHEN a.attnotnull THEN ' NOT NULL' ELSE ' NULL' END,
    E',\n' ORDER BY a.attnum
  ) || E'\n);' AS create_table_sql
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid
WHERE n.nspname = "#,
    );
    sql.push_bind(schema)
        .push(" AND c.relname = ")
        .push_bind(table)
        .push(
            r#"
  AND c.relkind IN ('r', 'p')
  AND a.attnum > 0
  AND NOT a.attisdropped
GROUP BY n.nspname, c.relname"#,
        );
    sql
}

/// Append ` WHERE "a" = $n AND "b" = $n+1 ...` for a non-empty condition.
fn push_where(sql: &mut Sql, condition: &ColumnValues) {
    sql.push(" WHERE ");
    sql.push_separated(condition.iter(), " AND ", |sql, (column, value)| {
        sql.push_ident(column).push(" = ").push_bind(value.clone());
    });
}
