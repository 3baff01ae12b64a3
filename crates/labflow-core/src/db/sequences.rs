//! Identifier sequence storage.
//!
//! Two sources for the next sequence number of a `(prefix, date)` scope:
//! a persistent counter row bumped atomically by an upsert, or a count of the
//! identifiers already stored with the scope's stem.

use rusqlite::{params, Connection};

use super::{DbError, DbResult};

/// Atomically increment and return the counter for a prefix and `YYYYMMDD` scope.
///
/// The first call for a scope returns 1. The upsert takes the write lock, so two
/// open transactions can never both observe the same value.
pub fn next_counter_value(conn: &Connection, prefix: &str, scope_date: &str) -> DbResult<i64> {
    let value = conn.query_row(
        r#"
        INSERT INTO identifier_sequences (prefix, scope_date, last_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT(prefix, scope_date) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
        params![prefix, scope_date],
        |row| row.get(0),
    )?;
    Ok(value)
}

/// Count rows whose `column` starts with `stem`.
///
/// `table` and `column` are interpolated into the statement, so only plain
/// identifiers are accepted.
pub fn count_with_stem(conn: &Connection, table: &str, column: &str, stem: &str) -> DbResult<i64> {
    for name in [table, column] {
        if !is_identifier(name) {
            return Err(DbError::Constraint(format!("invalid identifier {:?}", name)));
        }
    }
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE substr({}, 1, ?2) = ?1",
        table, column
    );
    let count = conn.query_row(&sql, params![stem, stem.chars().count() as i64], |row| {
        row.get(0)
    })?;
    Ok(count)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
