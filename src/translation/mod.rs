//! Named placeholder handling.
//!
//! Templates use `:name` placeholders. They are rewritten to Postgres-style `$N`
//! before execution, and a parameter map is turned into the positional value
//! list in the same order. Quoted strings, quoted identifiers, comments,
//! dollar-quoted blocks and `::type` casts are left untouched, and words inside
//! them never count as keywords.

use crate::error::StoreError;
use crate::types::{QueryParameters, RowValues};

mod scanner;

use scanner::{
    State, dollar_quote_closes, dollar_quote_open, is_block_comment_end, is_block_comment_start,
    is_line_comment_start, scan_digits, scan_identifier,
};

/// A SQL template with its named placeholders rewritten to `$N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedStatement {
    sql: String,
    names: Vec<String>,
    returning: bool,
}

impl NamedStatement {
    /// Rewrite `:name` placeholders in `template` to positional parameters.
    ///
    /// A name that appears several times maps to a single positional parameter.
    ///
    /// ```rust
    /// use pg_store::NamedStatement;
    ///
    /// let stmt = NamedStatement::parse(
    ///     "SELECT * FROM t WHERE a = :a AND b::text = :b OR a = :a",
    /// ).unwrap();
    /// assert_eq!(stmt.sql(), "SELECT * FROM t WHERE a = $1 AND b::text = $2 OR a = $1");
    /// assert_eq!(stmt.parameter_names(), ["a", "b"]);
    /// ```
    ///
    /// # Errors
    /// Returns `StoreError::ParameterError` if the template uses positional `$N` placeholders.
    pub fn parse(template: &str) -> Result<Self, StoreError> {
        let bytes = template.as_bytes();
        let mut sql = String::with_capacity(template.len());
        let mut names: Vec<String> = Vec::new();
        let mut state = State::Normal;
        let mut depth = 0_u32;
        let mut returning = false;
        let mut copied = 0;
        let mut idx = 0;

        while idx < bytes.len() {
            let b = bytes[idx];
            match state {
                State::Normal => match b {
                    b'\'' => state = State::SingleQuoted,
                    b'"' => state = State::DoubleQuoted,
                    _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                    _ if is_block_comment_start(bytes, idx) => {
                        state = State::BlockComment(1);
                        idx += 1;
                    }
                    b'$' => {
                        if let Some((tag, close)) = dollar_quote_open(bytes, idx) {
                            state = State::DollarQuoted(tag);
                            idx = close;
                        } else if scan_digits(bytes, idx + 1).is_some()
                            && !prev_is_identifier(bytes, idx)
                        {
                            return Err(StoreError::ParameterError(format!(
                                "positional placeholders are not supported, use :name instead (at byte {idx})"
                            )));
                        }
                    }
                    b':' if bytes.get(idx + 1) == Some(&b':') => {
                        // type cast
                        idx += 1;
                    }
                    b':' => {
                        if let Some(end) = scan_identifier(bytes, idx + 1) {
                            let name = &template[idx + 1..end];
                            let position = match names.iter().position(|n| n == name) {
                                Some(existing) => existing + 1,
                                None => {
                                    names.push(name.to_string());
                                    names.len()
                                }
                            };
                            sql.push_str(&template[copied..idx]);
                            sql.push('$');
                            sql.push_str(&position.to_string());
                            copied = end;
                            idx = end;
                            continue;
                        }
                    }
                    b'(' => depth += 1,
                    b')' => depth = depth.saturating_sub(1),
                    _ if (b.is_ascii_alphabetic() || b == b'_') && !prev_is_identifier(bytes, idx) => {
                        if let Some(end) = scan_identifier(bytes, idx) {
                            if depth == 0 && template[idx..end].eq_ignore_ascii_case("returning") {
                                returning = true;
                            }
                            idx = end;
                            continue;
                        }
                    }
                    _ => {}
                },
                State::SingleQuoted => {
                    if b == b'\'' {
                        if bytes.get(idx + 1) == Some(&b'\'') {
                            idx += 1;
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::DoubleQuoted => {
                    if b == b'"' {
                        if bytes.get(idx + 1) == Some(&b'"') {
                            idx += 1;
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::LineComment => {
                    if b == b'\n' {
                        state = State::Normal;
                    }
                }
                State::BlockComment(depth) => {
                    if is_block_comment_start(bytes, idx) {
                        state = State::BlockComment(depth + 1);
                        idx += 1;
                    } else if is_block_comment_end(bytes, idx) {
                        state = if depth == 1 {
                            State::Normal
                        } else {
                            State::BlockComment(depth - 1)
                        };
                        idx += 1;
                    }
                }
                State::DollarQuoted(ref tag) => {
                    if dollar_quote_closes(bytes, idx, tag) {
                        idx += tag.len() + 1;
                        state = State::Normal;
                    }
                }
            }
            idx += 1;
        }

        sql.push_str(&template[copied..]);
        Ok(Self {
            sql,
            names,
            returning,
        })
    }

    /// The rewritten statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Placeholder names in positional order (`$1` first).
    #[must_use]
    pub fn parameter_names(&self) -> &[String] {
        &self.names
    }

    /// True when the statement ends in its own `RETURNING` clause.
    ///
    /// Only the keyword outside literals, comments and parentheses counts, so a
    /// `RETURNING` inside a CTE body does not.
    #[must_use]
    pub fn has_returning(&self) -> bool {
        self.returning
    }

    /// Resolve the positional values for this statement from a parameter map.
    ///
    /// Entries in `params` that the statement does not reference are ignored.
    ///
    /// # Errors
    /// Returns `StoreError::ParameterError` naming every placeholder that has no entry.
    pub fn bind(&self, params: &QueryParameters) -> Result<Vec<RowValues>, StoreError> {
        let mut values = Vec::with_capacity(self.names.len());
        let mut missing = Vec::new();
        for name in &self.names {
            match params.get(name) {
                Some(value) => values.push(value.clone()),
                None => missing.push(format!(":{name}")),
            }
        }
        if missing.is_empty() {
            Ok(values)
        } else {
            Err(StoreError::ParameterError(format!(
                "no value supplied for {}",
                missing.join(", ")
            )))
        }
    }
}

fn prev_is_identifier(bytes: &[u8], idx: usize) -> bool {
    idx > 0 && (bytes[idx - 1].is_ascii_alphanumeric() || bytes[idx - 1] == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn rewrites_named_placeholders() {
        let stmt = NamedStatement::parse("insert into t (id, name) values (:id, :name)").unwrap();
        assert_eq!(stmt.sql(), "insert into t (id, name) values ($1, $2)");
        assert_eq!(stmt.parameter_names(), ["id", "name"]);
    }

    #[test]
    fn leaves_casts_alone() {
        let stmt = NamedStatement::parse("select :v::jsonb, now()::date").unwrap();
        assert_eq!(stmt.sql(), "select $1::jsonb, now()::date");
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select ':a', \":b\" -- :c\n/* :d /* :e */ */ from t where x = :x";
        let stmt = NamedStatement::parse(sql).unwrap();
        assert_eq!(
            stmt.sql(),
            "select ':a', \":b\" -- :c\n/* :d /* :e */ */ from t where x = $1"
        );
        assert_eq!(stmt.parameter_names(), ["x"]);
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "select $body$ :inside $body$, $$ :also $$ where a = :a";
        let stmt = NamedStatement::parse(sql).unwrap();
        assert_eq!(stmt.sql(), "select $body$ :inside $body$, $$ :also $$ where a = $1");
    }

    #[test]
    fn keeps_non_ascii_text() {
        let stmt = NamedStatement::parse("select 'blåbær' as æ, :ø_ok").unwrap();
        // `ø` is not an ASCII identifier start, so it is not a placeholder
        assert_eq!(stmt.sql(), "select 'blåbær' as æ, :ø_ok");
        let stmt = NamedStatement::parse("select 'blåbær', :navn").unwrap();
        assert_eq!(stmt.sql(), "select 'blåbær', $1");
    }

    #[test]
    fn rejects_positional_placeholders() {
        let err = NamedStatement::parse("select * from t where id = $1").unwrap_err();
        assert!(matches!(err, StoreError::ParameterError(_)));
    }

    #[test]
    fn bind_orders_values_and_ignores_extras() {
        let stmt = NamedStatement::parse("select :b, :a, :b").unwrap();
        let values = stmt
            .bind(&params! { "a" => 1_i64, "b" => "x", "unused" => true })
            .unwrap();
        assert_eq!(values, vec![RowValues::Text("x".into()), RowValues::Int(1)]);
    }

    #[test]
    fn bind_reports_missing_names() {
        let stmt = NamedStatement::parse("select :Id, :name").unwrap();
        let err = stmt.bind(&params! { "id" => 1_i64 }).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(":Id"));
        assert!(message.contains(":name"));
    }

    #[test]
    fn returning_keyword_only_counts_at_top_level() {
        let plain = NamedStatement::parse("insert into t (a) values (:a) Returning id").unwrap();
        assert!(plain.has_returning());

        for sql in [
            "insert into t (note) values ('returning customer')",
            "insert into t (\"returning\") values (:a)",
            "insert into t (a) values (:a) -- returning id",
            "insert into t (a) values (:a) /* returning */",
            "insert into t (a) values ($$returning$$)",
            "insert into t (a) values (:returning)",
            "insert into t (returning_user) values (:a)",
            "with x as (insert into s default values returning id) insert into t select id from x",
        ] {
            assert!(!NamedStatement::parse(sql).unwrap().has_returning(), "{sql}");
        }
    }

    #[test]
    fn template_without_placeholders_binds_empty_map() {
        let stmt = NamedStatement::parse("select 1").unwrap();
        assert_eq!(stmt.sql(), "select 1");
        assert!(stmt.bind(&QueryParameters::new()).unwrap().is_empty());
    }
}
