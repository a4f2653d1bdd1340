use std::borrow::Cow;

use crate::types::DatabaseType;

/// Native placeholder syntax of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`; identifiers quoted with `"`.
    Postgres,
    /// SQLite-style placeholders like `?1`; backtick identifiers are native.
    Sqlite,
}

impl From<DatabaseType> for PlaceholderStyle {
    fn from(db_type: DatabaseType) -> Self {
        match db_type {
            DatabaseType::Sqlite => PlaceholderStyle::Sqlite,
            DatabaseType::Postgres => PlaceholderStyle::Postgres,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backticked,
    LineComment,
    BlockComment(usize),
}

/// Rewrite the generic `?` marker into the driver's numbered placeholder.
///
/// Bare `?` markers are numbered left to right (`?1`, `?2`, ... for SQLite, `$1`, `$2`, ...
/// for Postgres). Markers that already carry a number keep it. For Postgres, backtick-quoted
/// identifiers are re-quoted with double quotes. Text inside single-quoted strings,
/// double-quoted identifiers, `--` line comments and (nested) block comments is copied as is.
///
/// Returns a borrowed `Cow` when nothing changed.
///
/// ```rust
/// use sql_model_orm::prelude::*;
///
/// let sql = "select `id`, `name` from `user` where `id` = ?";
/// assert_eq!(
///     translate_statement(sql, PlaceholderStyle::Postgres),
///     r#"select "id", "name" from "user" where "id" = $1"#
/// );
/// ```
#[must_use]
pub fn translate_statement(sql: &str, target: PlaceholderStyle) -> Cow<'_, str> {
    let postgres = target == PlaceholderStyle::Postgres;
    let marker = if postgres { '$' } else { '?' };
    let mut out = String::with_capacity(sql.len() + 8);
    let mut state = State::Normal;
    let mut next_index = 1usize;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '\'' => {
                    state = State::SingleQuoted;
                    out.push(c);
                }
                '"' => {
                    state = State::DoubleQuoted;
                    out.push(c);
                }
                '`' => {
                    state = State::Backticked;
                    out.push(if postgres { '"' } else { '`' });
                }
                '-' if chars.peek() == Some(&'-') => {
                    state = State::LineComment;
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment(1);
                    out.push_str("/*");
                }
                '?' => {
                    out.push(marker);
                    let mut digits = String::new();
                    while let Some(d) = chars.next_if(char::is_ascii_digit) {
                        digits.push(d);
                    }
                    if digits.is_empty() {
                        out.push_str(&next_index.to_string());
                        next_index += 1;
                    } else {
                        // later bare markers continue after the highest explicit number
                        if let Ok(n) = digits.parse::<usize>() {
                            next_index = next_index.max(n + 1);
                        }
                        out.push_str(&digits);
                    }
                }
                _ => out.push(c),
            },
            State::SingleQuoted | State::DoubleQuoted => {
                let quote = if state == State::SingleQuoted { '\'' } else { '"' };
                out.push(c);
                if c == quote {
                    if chars.peek() == Some(&quote) {
                        // escaped quote
                        chars.next();
                        out.push(quote);
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Backticked => {
                if c == '`' {
                    if chars.peek() == Some(&'`') {
                        chars.next();
                        out.push_str(if postgres { "`" } else { "``" });
                    } else {
                        state = State::Normal;
                        out.push(if postgres { '"' } else { '`' });
                    }
                } else if postgres && c == '"' {
                    out.push_str("\"\"");
                } else {
                    out.push(c);
                }
            }
            State::LineComment => {
                out.push(c);
                if c == '\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if c == '/' && chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str("/*");
                    state = State::BlockComment(depth + 1);
                } else if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("*/");
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                } else {
                    out.push(c);
                }
            }
        }
    }

    if out == sql {
        Cow::Borrowed(sql)
    } else {
        Cow::Owned(out)
    }
}
