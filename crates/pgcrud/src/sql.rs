//! Parameter-safe SQL fragment builder.
//!
//! [`Sql`] stores SQL text pieces and parameters separately and renders
//! `$1, $2, ...` placeholders in order, so callers never track placeholder
//! indices by hand. Identifiers go through [`crate::ident`]; values go through
//! [`crate::value::normalize`] and are only ever bound, never interpolated.
//!
//! # Example
//!
//! ```
//! use pgcrud::Sql;
//!
//! let mut q = Sql::new("SELECT * FROM ");
//! q.push_qualified("public", "users").push(" WHERE ").push_ident("id").push(" = ").push_bind(42);
//!
//! assert_eq!(q.to_sql(), r#"SELECT * FROM "public"."users" WHERE "id" = $1"#);
//! ```

use crate::client::TypedParam;
use crate::ident;
use crate::value::{FieldValue, WireType, normalize};
use tokio_postgres::types::ToSql;

#[derive(Debug, Clone, PartialEq)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A SQL statement under construction.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Sql {
    parts: Vec<SqlPart>,
    params: Vec<FieldValue>,
}

impl Sql {
    /// Create a new builder with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            parts: vec![SqlPart::Raw(initial_sql.into())],
            params: Vec::new(),
        }
    }

    /// Create an empty builder.
    pub fn empty() -> Self {
        Self {
            parts: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        self.raw_tail().push_str(sql);
        self
    }

    /// Append a parameter placeholder and bind its normalized value.
    pub fn push_bind(&mut self, value: impl Into<FieldValue>) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.params.push(normalize(value));
        self
    }

    /// Append an escaped identifier.
    pub fn push_ident(&mut self, identifier: &str) -> &mut Self {
        ident::write_escaped(self.raw_tail(), identifier);
        self
    }

    /// Append an escaped `"schema"."table"` pair.
    pub fn push_qualified(&mut self, schema: &str, table: &str) -> &mut Self {
        let tail = self.raw_tail();
        ident::write_escaped(tail, schema);
        tail.push('.');
        ident::write_escaped(tail, table);
        self
    }

    /// Append `items` separated by `sep`, rendering each with `f`.
    pub fn push_separated<I, F>(&mut self, items: I, sep: &str, mut f: F) -> &mut Self
    where
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item),
    {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            f(self, item);
        }
        self
    }

    /// Append another fragment, consuming it. Its placeholders are renumbered
    /// after the ones already present.
    pub fn push_sql(&mut self, mut other: Sql) -> &mut Self {
        for part in other.parts.drain(..) {
            match part {
                SqlPart::Raw(s) => {
                    self.push(&s);
                }
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.params.append(&mut other.params);
        self
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> String {
        let cap: usize = self
            .parts
            .iter()
            .map(|p| match p {
                SqlPart::Raw(s) => s.len(),
                SqlPart::Param => 4,
            })
            .sum();
        let mut out = String::with_capacity(cap);
        let mut idx = 0usize;
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    out.push('$');
                    out.push_str(&idx.to_string());
                }
            }
        }
        out
    }

    /// The bound values, in placeholder order.
    pub fn params(&self) -> &[FieldValue] {
        &self.params
    }

    /// Wire type hints, in placeholder order.
    pub fn param_types(&self) -> Vec<WireType> {
        self.params.iter().map(FieldValue::wire_type).collect()
    }

    /// Parameters paired with their declared types, ready for execution.
    pub fn typed_params(&self) -> Vec<TypedParam<'_>> {
        self.params
            .iter()
            .map(|v| (v as &(dyn ToSql + Sync), v.wire_type().pg_type()))
            .collect()
    }

    fn raw_tail(&mut self) -> &mut String {
        if !matches!(self.parts.last(), Some(SqlPart::Raw(_))) {
            self.parts.push(SqlPart::Raw(String::new()));
        }
        match self.parts.last_mut() {
            Some(SqlPart::Raw(s)) => s,
            _ => unreachable!("a raw part was just ensured"),
        }
    }
}

impl std::fmt::Display for Sql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_postgres::types::Type;

    #[test]
    fn builds_placeholders_in_order() {
        let mut q = Sql::new("SELECT * FROM t WHERE a = ");
        q.push_bind(1).push(" AND b = ").push_bind("x");

        assert_eq!(q.to_sql(), "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(q.params().len(), 2);
        assert_eq!(q.param_types(), [WireType::Integer, WireType::Text]);
    }

    #[test]
    fn can_compose_fragments() {
        let mut w = Sql::empty();
        w.push(" WHERE id = ").push_bind(42);

        let mut q = Sql::new("SELECT * FROM t WHERE x = ");
        q.push_bind(true).push_sql(w);

        assert_eq!(q.to_sql(), "SELECT * FROM t WHERE x = $1 WHERE id = $2");
        assert_eq!(q.params(), &[FieldValue::Bool(true), FieldValue::Int(42)]);
    }

    #[test]
    fn identifiers_are_escaped() {
        let mut q = Sql::new("SELECT ");
        q.push_ident(r#"we"ird"#).push(" FROM ").push_qualified("s", "t");
        assert_eq!(q.to_sql(), r#"SELECT "we""ird" FROM "s"."t""#);
        assert!(q.params().is_empty());
    }

    #[test]
    fn identifier_directly_after_param() {
        let mut q = Sql::empty();
        q.push_bind(1).push_ident("c");
        assert_eq!(q.to_sql(), r#"$1"c""#);
    }

    #[test]
    fn separated_list() {
        let mut q = Sql::new("(");
        q.push_separated(["a", "b", "c"], ", ", |q, c| {
            q.push_ident(c);
        })
        .push(")");
        assert_eq!(q.to_sql(), r#"("a", "b", "c")"#);
    }

    #[test]
    fn many_placeholders_render_multi_digit_indices() {
        let mut q = Sql::empty();
        q.push_separated(0..12, ",", |q, i| {
            q.push_bind(i);
        });
        assert!(q.to_sql().ends_with("$10,$11,$12"));
    }

    #[test]
    fn typed_params_carry_declared_types() {
        let mut q = Sql::empty();
        q.push_bind(3_000_000_000i64).push_bind(None::<i32>);
        let typed = q.typed_params();
        assert_eq!(typed[0].1, Type::INT8);
        assert_eq!(typed[1].1, Type::UNKNOWN);
    }
}
