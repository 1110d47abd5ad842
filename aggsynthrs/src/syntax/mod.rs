//! Dialect syntax primitives: identifier quoting, string escaping and alias splitting.
//!
//! Each dialect is implemented in its own file. Aggregate builders only ever
//! reach the dialect's text rules through [`QuerySyntaxHelper`].

use crate::engine::DatabaseType;
use crate::error::{AggsynthError, Result};

mod mssql;
mod mysql;
mod oracle;
mod postgres;

pub use mssql::MsSqlSyntax;
pub use mysql::MySqlSyntax;
pub use oracle::OracleSyntax;
pub use postgres::PostgresSyntax;

pub trait QuerySyntaxHelper: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    fn open_qualifier(&self) -> &'static str;

    fn close_qualifier(&self) -> &'static str;

    /// Wrap an identifier in the dialect's qualifiers unless it already is.
    fn ensure_wrapped(&self, ident: &str) -> String {
        let ident = ident.trim();
        let (open, close) = (self.open_qualifier(), self.close_qualifier());
        if ident.len() >= open.len() + close.len()
            && ident.starts_with(open)
            && ident.ends_with(close)
        {
            return ident.to_string();
        }
        self.wrap(ident)
    }

    /// Wrap `ident` unconditionally, doubling any embedded close qualifier.
    fn wrap(&self, ident: &str) -> String {
        let close = self.close_qualifier();
        let doubled = format!("{close}{close}");
        format!(
            "{}{}{close}",
            self.open_qualifier(),
            ident.replace(close, &doubled)
        )
    }

    /// Strip one layer of qualifiers (any of `[]`, `""` or backticks).
    fn unwrap(&self, ident: &str) -> String {
        unwrap_qualifiers(ident)
    }

    /// Escape text for embedding inside a single-quoted string literal.
    fn escape(&self, sql: &str) -> String {
        sql.replace('\'', "''")
    }

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", self.escape(value))
    }

    /// Split a SELECT-list line such as `UPPER('a') as a,` into `UPPER('a')`
    /// and `Some("a")`.
    fn split_select_and_alias(&self, line: &str) -> Result<(String, Option<String>)> {
        let line = line.trim_end_matches(|c: char| c == ',' || c.is_whitespace());
        let line = line.trim_start();
        let separators = top_level_alias_separators(line);
        match separators.as_slice() {
            [] => Ok((line.to_string(), None)),
            [(start, end)] => {
                let select = line[..*start].trim().to_string();
                let alias = self.unwrap(line[*end..].trim());
                if select.is_empty() || alias.is_empty() {
                    return Err(AggsynthError::Syntax(format!(
                        "could not split '{line}' into a select expression and alias"
                    )));
                }
                Ok((select, Some(alias)))
            }
            many => Err(AggsynthError::Syntax(format!(
                "found {} top level ' AS ' in '{line}', expected at most one",
                many.len()
            ))),
        }
    }
}

pub(crate) fn unwrap_qualifiers(ident: &str) -> String {
    let ident = ident.trim();
    let pairs = [("[", "]", "]]"), ("\"", "\"", "\"\""), ("`", "`", "``")];
    for (open, close, doubled) in pairs {
        if ident.len() >= 2 && ident.starts_with(open) && ident.ends_with(close) {
            let inner = &ident[open.len()..ident.len() - close.len()];
            return inner.replace(doubled, close);
        }
    }
    ident.to_string()
}

/// Byte ranges of every `<ws>AS<ws>` that sits outside parentheses, string
/// literals and quoted identifiers.
fn top_level_alias_separators(line: &str) -> Vec<(usize, usize)> {
    let bytes = line.as_bytes();
    let mut found = Vec::new();
    let mut depth = 0i32;
    let mut closing: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(close) = closing {
            if b == close {
                closing = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => closing = Some(b),
            b'[' => closing = Some(b']'),
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if b.is_ascii_whitespace() && depth == 0 => {
                let start = i;
                let mut j = i;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let is_as = j + 2 < bytes.len()
                    && bytes[j..j + 2].eq_ignore_ascii_case(b"as")
                    && bytes[j + 2].is_ascii_whitespace();
                if is_as {
                    let mut k = j + 2;
                    while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                        k += 1;
                    }
                    found.push((start, k));
                    i = k;
                } else {
                    i = j;
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_function_with_alias() {
        let (select, alias) = MsSqlSyntax
            .split_select_and_alias("UPPER('a') as a")
            .unwrap();
        assert_eq!(select, "UPPER('a')");
        assert_eq!(alias.as_deref(), Some("a"));
    }

    #[test]
    fn unaliased_line_is_returned_unchanged() {
        let (select, alias) = MySqlSyntax.split_select_and_alias("UPPER('a')").unwrap();
        assert_eq!(select, "UPPER('a')");
        assert!(alias.is_none());
    }

    #[test]
    fn split_is_idempotent() {
        let (select, _) = PostgresSyntax
            .split_select_and_alias("count(*) AS \"MyCount\",")
            .unwrap();
        let (again, alias) = PostgresSyntax.split_select_and_alias(&select).unwrap();
        assert_eq!(again, select);
        assert!(alias.is_none());
    }

    #[test]
    fn ignores_as_inside_parentheses_and_literals() {
        let (select, alias) = MsSqlSyntax
            .split_select_and_alias("CAST(dt AS DATE) AS [day],")
            .unwrap();
        assert_eq!(select, "CAST(dt AS DATE)");
        assert_eq!(alias.as_deref(), Some("day"));

        let (select, alias) = MsSqlSyntax
            .split_select_and_alias("'x as y'")
            .unwrap();
        assert_eq!(select, "'x as y'");
        assert!(alias.is_none());
    }

    #[test]
    fn rejects_two_top_level_aliases() {
        let err = OracleSyntax
            .split_select_and_alias("a AS b AS c")
            .unwrap_err();
        assert!(matches!(err, AggsynthError::Syntax(_)));
    }

    #[test]
    fn wraps_and_escapes_per_dialect() {
        assert_eq!(MsSqlSyntax.ensure_wrapped("a]b"), "[a]]b]");
        assert_eq!(MsSqlSyntax.ensure_wrapped("[done]"), "[done]");
        assert_eq!(MsSqlSyntax.wrap("[done]"), "[[done]]]");
        assert_eq!(MySqlSyntax.ensure_wrapped("T"), "`T`");
        assert_eq!(PostgresSyntax.ensure_wrapped("joinDt"), "\"joinDt\"");
        assert_eq!(MsSqlSyntax.string_literal("O'Brien"), "N'O''Brien'");
        assert_eq!(MySqlSyntax.escape(r"O'Br\ien"), r"O\'Br\\ien");
        assert_eq!(OracleSyntax.string_literal("it's"), "'it''s'");
    }

    #[test]
    fn unwraps_doubled_qualifiers() {
        assert_eq!(unwrap_qualifiers("[a]]b]"), "a]b");
        assert_eq!(unwrap_qualifiers("\"x\"\"y\""), "x\"y");
        assert_eq!(unwrap_qualifiers("plain"), "plain");
    }
}
