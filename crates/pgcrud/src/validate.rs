//! Pre-flight argument checks shared by every operation.
//!
//! These run before a connection is requested, so a rejected request never
//! touches the engine.

use crate::error::{CrudError, CrudResult};
use crate::value::ColumnValues;

/// Schema used when the caller does not name one.
pub const DEFAULT_SCHEMA: &str = "public";

/// Require a non-blank name. `kind` names the argument in the error ("table", "database", ...).
pub fn require_name<'a>(kind: &str, value: &'a str) -> CrudResult<&'a str> {
    if value.trim().is_empty() {
        return Err(CrudError::validation(format!("{kind} name is required")));
    }
    Ok(value)
}

/// Require a non-empty column map whose column names are all non-blank.
pub fn require_values<'a>(kind: &str, values: &'a ColumnValues) -> CrudResult<&'a ColumnValues> {
    if values.is_empty() {
        return Err(CrudError::validation(format!("{kind} must not be empty")));
    }
    require_column_names(kind, values)?;
    Ok(values)
}

/// Require a condition for UPDATE; an empty or absent one would touch every row.
pub fn require_condition(condition: Option<&ColumnValues>) -> CrudResult<&ColumnValues> {
    match condition {
        Some(c) if !c.is_empty() => {
            require_column_names("condition", c)?;
            Ok(c)
        }
        _ => Err(CrudError::validation(
            "condition must not be empty for update (refusing to update every row)",
        )),
    }
}

/// Check an optional condition (SELECT/DELETE). Absent or empty means "all rows".
pub fn optional_condition(condition: Option<&ColumnValues>) -> CrudResult<Option<&ColumnValues>> {
    match condition {
        Some(c) if !c.is_empty() => {
            require_column_names("condition", c)?;
            Ok(Some(c))
        }
        _ => Ok(None),
    }
}

/// `schema` if given and non-blank, else [`DEFAULT_SCHEMA`].
pub fn schema_or_default(schema: Option<&str>) -> &str {
    match schema {
        Some(s) if !s.trim().is_empty() => s,
        _ => DEFAULT_SCHEMA,
    }
}

fn require_column_names(kind: &str, values: &ColumnValues) -> CrudResult<()> {
    if values.iter().any(|(column, _)| column.trim().is_empty()) {
        return Err(CrudError::validation(format!(
            "{kind} contains an empty column name"
        )));
    }
    Ok(())
}
