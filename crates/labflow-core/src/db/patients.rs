//! Patient database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Patient;

/// Insert a new patient and return its store ID.
pub fn insert_patient(conn: &Connection, patient: &Patient) -> DbResult<i64> {
    conn.execute(
        r#"
        INSERT INTO patients (document_number, first_name, last_name, is_active, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            patient.document_number,
            patient.first_name,
            patient.last_name,
            patient.is_active,
            patient.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get a patient by ID.
pub fn get_patient(conn: &Connection, id: i64) -> DbResult<Option<Patient>> {
    conn.query_row(
        r#"
        SELECT id, document_number, first_name, last_name, is_active, created_at
        FROM patients
        WHERE id = ?
        "#,
        [id],
        |row| {
            Ok(Patient {
                id: row.get(0)?,
                document_number: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                is_active: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

/// Deactivate a patient. Existing orders are unaffected.
pub fn deactivate_patient(conn: &Connection, id: i64) -> DbResult<bool> {
    let rows_affected = conn.execute("UPDATE patients SET is_active = 0 WHERE id = ?", [id])?;
    Ok(rows_affected > 0)
}

impl Database {
    /// Register a patient, returning it with its assigned ID.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<Patient> {
        let id = insert_patient(&self.conn, patient)?;
        Ok(Patient {
            id,
            ..patient.clone()
        })
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: i64) -> DbResult<Option<Patient>> {
        get_patient(&self.conn, id)
    }
}
