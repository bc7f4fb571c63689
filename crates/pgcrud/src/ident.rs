//! SQL identifier escaping.
//!
//! Every schema, table, column and database name that reaches SQL text goes
//! through [`escape`]. The identifier is wrapped in double quotes and embedded
//! `"` characters are doubled, producing a delimited identifier that Postgres
//! parses back to the original name verbatim. Reserved words, mixed case,
//! spaces and quote characters are all representable.
//!
//! There is no allow-list: correctness relies entirely on quoting.
//!
//! # Example
//! ```
//! use pgcrud::ident::escape;
//!
//! assert_eq!(escape("users"), r#""users""#);
//! assert_eq!(escape(r#"odd"name"#), r#""odd""name""#);
//! ```

/// Quote `identifier` as a delimited SQL identifier.
pub fn escape(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 2);
    write_escaped(&mut out, identifier);
    out
}

/// Render `"schema"."table"`.
pub fn qualified(schema: &str, table: &str) -> String {
    let mut out = String::with_capacity(schema.len() + table.len() + 5);
    write_escaped(&mut out, schema);
    out.push('.');
    write_escaped(&mut out, table);
    out
}

pub(crate) fn write_escaped(out: &mut String, identifier: &str) {
    out.push('"');
    for ch in identifier.chars() {
        if ch == '"' {
            out.push('"');
            out.push('"');
        } else {
            out.push(ch);
        }
    }
    out.push('"');
}

/// Reverse of [`escape`]: strip the delimiting quotes and collapse `""` to `"`.
///
/// Returns `None` if `quoted` is not a single well-formed delimited identifier.
pub fn unescape(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            // A lone quote inside the delimiters would have ended the identifier.
            if chars.next() != Some('"') {
                return None;
            }
        }
        out.push(ch);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_simple() {
        assert_eq!(escape("users"), r#""users""#);
    }

    #[test]
    fn escape_keeps_case_and_spaces() {
        assert_eq!(escape("User Table"), r#""User Table""#);
    }

    #[test]
    fn escape_reserved_word() {
        assert_eq!(escape("select"), r#""select""#);
    }

    #[test]
    fn escape_doubles_quotes() {
        assert_eq!(escape(r#"a"b"#), r#""a""b""#);
        assert_eq!(escape(r#"""#), r#""""""#);
    }

    #[test]
    fn escape_neutralizes_injection_attempt() {
        let hostile = r#"users"; DROP TABLE users; --"#;
        let escaped = escape(hostile);
        assert_eq!(escaped, r#""users""; DROP TABLE users; --""#);
        assert_eq!(unescape(&escaped).as_deref(), Some(hostile));
    }

    #[test]
    fn escape_round_trips_quotes() {
        for name in [r#"a"b"#, r#""""#, r#"x""y"#, "plain", "", r#"end""#] {
            assert_eq!(unescape(&escape(name)).as_deref(), Some(name));
        }
    }

    #[test]
    fn qualified_escapes_both_parts() {
        assert_eq!(qualified("public", "users"), r#""public"."users""#);
        assert_eq!(qualified("my.schema", "t"), r#""my.schema"."t""#);
    }

    #[test]
    fn unescape_rejects_malformed() {
        assert_eq!(unescape("users"), None);
        assert_eq!(unescape(r#""a"b""#), None);
    }
}
