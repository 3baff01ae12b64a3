//! Exam catalog database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{ExamParameter, ExamType};

/// Insert or update an exam type and its parameters (keyed by code).
///
/// Returns the exam type's store ID.
pub fn upsert_exam_type(conn: &Connection, exam_type: &ExamType) -> DbResult<i64> {
    let exam_type_id: i64 = conn.query_row(
        r#"
        INSERT INTO exam_types (code, name, base_price, is_active, updated_at)
        VALUES (?1, ?2, ?3, ?4, datetime('now'))
        ON CONFLICT(code) DO UPDATE SET
            name = excluded.name,
            base_price = excluded.base_price,
            is_active = excluded.is_active,
            updated_at = datetime('now')
        RETURNING id
        "#,
        params![
            exam_type.code,
            exam_type.name,
            exam_type.base_price,
            exam_type.is_active,
        ],
        |row| row.get(0),
    )?;

    for param in &exam_type.parameters {
        let options_json = serde_json::to_string(&param.select_options)?;
        conn.execute(
            r#"
            INSERT INTO exam_parameters (
                exam_type_id, code, name, unit, data_type, reference_min, reference_max,
                reference_text, select_options, is_critical, is_required, display_order
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(exam_type_id, code) DO UPDATE SET
                name = excluded.name,
                unit = excluded.unit,
                data_type = excluded.data_type,
                reference_min = excluded.reference_min,
                reference_max = excluded.reference_max,
                reference_text = excluded.reference_text,
                select_options = excluded.select_options,
                is_critical = excluded.is_critical,
                is_required = excluded.is_required,
                display_order = excluded.display_order
            "#,
            params![
                exam_type_id,
                param.code,
                param.name,
                param.unit,
                param.data_type.as_str(),
                param.reference_min,
                param.reference_max,
                param.reference_text,
                options_json,
                param.is_critical,
                param.is_required,
                param.display_order,
            ],
        )?;
    }

    Ok(exam_type_id)
}

/// Get an exam type with its parameters (ordered by display order).
pub fn get_exam_type(conn: &Connection, id: i64) -> DbResult<Option<ExamType>> {
    let exam_type = conn
        .query_row(
            "SELECT id, code, name, base_price, is_active FROM exam_types WHERE id = ?",
            [id],
            |row| {
                Ok(ExamType {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    name: row.get(2)?,
                    base_price: row.get(3)?,
                    is_active: row.get(4)?,
                    parameters: Vec::new(),
                })
            },
        )
        .optional()?;

    match exam_type {
        Some(mut exam_type) => {
            exam_type.parameters = list_parameters(conn, exam_type.id)?;
            Ok(Some(exam_type))
        }
        None => Ok(None),
    }
}

/// List the parameters of an exam type.
pub fn list_parameters(conn: &Connection, exam_type_id: i64) -> DbResult<Vec<ExamParameter>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, exam_type_id, code, name, unit, data_type, reference_min, reference_max,
               reference_text, select_options, is_critical, is_required, display_order
        FROM exam_parameters
        WHERE exam_type_id = ?
        ORDER BY display_order, id
        "#,
    )?;

    let rows = stmt.query_map([exam_type_id], ParameterRow::from_row)?;

    let mut params = Vec::new();
    for row in rows {
        params.push(row?.try_into()?);
    }
    Ok(params)
}

/// Get a single parameter by ID.
pub fn get_parameter(conn: &Connection, id: i64) -> DbResult<Option<ExamParameter>> {
    conn.query_row(
        r#"
        SELECT id, exam_type_id, code, name, unit, data_type, reference_min, reference_max,
               reference_text, select_options, is_critical, is_required, display_order
        FROM exam_parameters
        WHERE id = ?
        "#,
        [id],
        ParameterRow::from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

impl Database {
    /// Insert or update an exam type, returning it as stored.
    pub fn upsert_exam_type(&self, exam_type: &ExamType) -> DbResult<ExamType> {
        let tx = self.transaction()?;
        let id = upsert_exam_type(&tx, exam_type)?;
        let stored = get_exam_type(&tx, id)?
            .ok_or_else(|| DbError::NotFound(format!("exam type {}", id)))?;
        tx.commit()?;
        Ok(stored)
    }

    /// Get an exam type with its parameters.
    pub fn get_exam_type(&self, id: i64) -> DbResult<Option<ExamType>> {
        get_exam_type(&self.conn, id)
    }
}

/// Intermediate row struct for database mapping.
struct ParameterRow {
    id: i64,
    exam_type_id: i64,
    code: String,
    name: String,
    unit: Option<String>,
    data_type: String,
    reference_min: Option<f64>,
    reference_max: Option<f64>,
    reference_text: Option<String>,
    select_options: String,
    is_critical: bool,
    is_required: bool,
    display_order: i32,
}

impl ParameterRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            exam_type_id: row.get(1)?,
            code: row.get(2)?,
            name: row.get(3)?,
            unit: row.get(4)?,
            data_type: row.get(5)?,
            reference_min: row.get(6)?,
            reference_max: row.get(7)?,
            reference_text: row.get(8)?,
            select_options: row.get(9)?,
            is_critical: row.get(10)?,
            is_required: row.get(11)?,
            display_order: row.get(12)?,
        })
    }
}

impl TryFrom<ParameterRow> for ExamParameter {
    type Error = DbError;

    fn try_from(row: ParameterRow) -> Result<Self, Self::Error> {
        Ok(ExamParameter {
            id: row.id,
            exam_type_id: row.exam_type_id,
            code: row.code,
            name: row.name,
            unit: row.unit,
            data_type: row.data_type.parse()?,
            reference_min: row.reference_min,
            reference_max: row.reference_max,
            reference_text: row.reference_text,
            select_options: serde_json::from_str(&row.select_options)?,
            is_critical: row.is_critical,
            is_required: row.is_required,
            display_order: row.display_order,
        })
    }
}
