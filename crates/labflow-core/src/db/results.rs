//! Exam result database operations.
//!
//! A result's value occupies exactly one of three slot columns. Corrections never
//! overwrite a row: the old version is flipped to `is_current = 0` and a new row
//! is inserted, so [`supersede`] must run before the replacement insert.

use rusqlite::{params, Connection, OptionalExtension};

use super::{DbError, DbResult};
use crate::models::{ActorId, ExamResult, ResultValue};

const RESULT_COLUMNS: &str = r#"
    id, order_exam_id, parameter_id, value_numeric, value_text, value_boolean,
    is_abnormal, abnormality, is_critical, flags, technician_notes, version,
    is_current, entered_by, entered_at, validated_by, validated_at
"#;

/// Insert a result row and return its store ID.
pub fn insert_result(conn: &Connection, result: &mut ExamResult) -> DbResult<i64> {
    let (numeric, text, boolean) = match &result.value {
        ResultValue::Numeric(v) => (Some(*v), None, None),
        ResultValue::Text(s) => (None, Some(s.as_str()), None),
        ResultValue::Boolean(b) => (None, None, Some(*b)),
    };

    conn.execute(
        r#"
        INSERT INTO exam_results (
            order_exam_id, parameter_id, value_numeric, value_text, value_boolean,
            is_abnormal, abnormality, is_critical, flags, technician_notes, version,
            is_current, entered_by, entered_at, validated_by, validated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
        params![
            result.order_exam_id,
            result.parameter_id,
            numeric,
            text,
            boolean,
            result.is_abnormal,
            result.abnormality.as_str(),
            result.is_critical,
            result.flags,
            result.technician_notes,
            result.version,
            result.is_current,
            result.entered_by,
            result.entered_at,
            result.validated_by,
            result.validated_at,
        ],
    )?;
    result.id = conn.last_insert_rowid();
    Ok(result.id)
}

/// Get a result by ID, current or superseded.
pub fn get_result(conn: &Connection, id: i64) -> DbResult<Option<ExamResult>> {
    let sql = format!("SELECT {} FROM exam_results WHERE id = ?", RESULT_COLUMNS);
    conn.query_row(&sql, [id], ResultRow::from_row)
        .optional()?
        .map(|row| row.try_into())
        .transpose()
}

/// Current results of an exam, in entry order.
pub fn list_current_for_exam(conn: &Connection, order_exam_id: i64) -> DbResult<Vec<ExamResult>> {
    let sql = format!(
        "SELECT {} FROM exam_results WHERE order_exam_id = ? AND is_current = 1 ORDER BY id",
        RESULT_COLUMNS
    );
    query_results(conn, &sql, params![order_exam_id])
}

/// Every version recorded for one parameter of an exam, oldest first.
pub fn list_history(
    conn: &Connection,
    order_exam_id: i64,
    parameter_id: i64,
) -> DbResult<Vec<ExamResult>> {
    let sql = format!(
        "SELECT {} FROM exam_results WHERE order_exam_id = ? AND parameter_id = ? ORDER BY version",
        RESULT_COLUMNS
    );
    query_results(conn, &sql, params![order_exam_id, parameter_id])
}

/// Mark a current result as superseded. Returns false if it was not current.
pub fn supersede(conn: &Connection, id: i64) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE exam_results SET is_current = 0 WHERE id = ? AND is_current = 1",
        [id],
    )?;
    Ok(rows_affected > 0)
}

/// Attribute validation to every current result of an exam.
///
/// Returns the number of rows stamped.
pub fn stamp_validation(
    conn: &Connection,
    order_exam_id: i64,
    actor: ActorId,
    at: &str,
) -> DbResult<usize> {
    let rows_affected = conn.execute(
        r#"
        UPDATE exam_results SET validated_by = ?2, validated_at = ?3
        WHERE order_exam_id = ?1 AND is_current = 1
        "#,
        params![order_exam_id, actor, at],
    )?;
    Ok(rows_affected)
}

fn query_results(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> DbResult<Vec<ExamResult>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, ResultRow::from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?.try_into()?);
    }
    Ok(results)
}

/// Intermediate row struct for database mapping.
struct ResultRow {
    id: i64,
    order_exam_id: i64,
    parameter_id: i64,
    value_numeric: Option<f64>,
    value_text: Option<String>,
    value_boolean: Option<bool>,
    is_abnormal: bool,
    abnormality: String,
    is_critical: bool,
    flags: String,
    technician_notes: Option<String>,
    version: u32,
    is_current: bool,
    entered_by: i64,
    entered_at: String,
    validated_by: Option<i64>,
    validated_at: Option<String>,
}

impl ResultRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            order_exam_id: row.get(1)?,
            parameter_id: row.get(2)?,
            value_numeric: row.get(3)?,
            value_text: row.get(4)?,
            value_boolean: row.get(5)?,
            is_abnormal: row.get(6)?,
            abnormality: row.get(7)?,
            is_critical: row.get(8)?,
            flags: row.get(9)?,
            technician_notes: row.get(10)?,
            version: row.get(11)?,
            is_current: row.get(12)?,
            entered_by: row.get(13)?,
            entered_at: row.get(14)?,
            validated_by: row.get(15)?,
            validated_at: row.get(16)?,
        })
    }
}

impl TryFrom<ResultRow> for ExamResult {
    type Error = DbError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        let value = match (row.value_numeric, row.value_text, row.value_boolean) {
            (Some(v), None, None) => ResultValue::Numeric(v),
            (None, Some(s), None) => ResultValue::Text(s),
            (None, None, Some(b)) => ResultValue::Boolean(b),
            _ => {
                return Err(DbError::Constraint(format!(
                    "result {} must hold exactly one value",
                    row.id
                )))
            }
        };

        Ok(ExamResult {
            id: row.id,
            order_exam_id: row.order_exam_id,
            parameter_id: row.parameter_id,
            value,
            is_abnormal: row.is_abnormal,
            abnormality: row.abnormality.parse()?,
            is_critical: row.is_critical,
            flags: row.flags,
            technician_notes: row.technician_notes,
            entered_by: row.entered_by,
            entered_at: row.entered_at,
            validated_by: row.validated_by,
            validated_at: row.validated_at,
            version: row.version,
            is_current: row.is_current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::AbnormalityDirection;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch(
                r#"
                INSERT INTO patients (id, document_number, first_name, last_name, created_at)
                VALUES (1, 'V-1', 'Ana', 'Pérez', 't');
                INSERT INTO exam_types (id, code, name, base_price) VALUES (1, 'HB', 'Hemoglobin', 10);
                INSERT INTO exam_parameters (id, exam_type_id, code, name, data_type)
                VALUES (1, 1, 'HGB', 'Hemoglobin', 'numeric'), (2, 1, 'OBS', 'Notes', 'text');
                INSERT INTO orders (id, order_number, patient_id, order_date, created_by, created_at, updated_at)
                VALUES (1, 'ORD-20261016-000001', 1, '2026-10-16 09:00:00', 1, 't', 't');
                INSERT INTO order_exams (id, order_id, exam_type_id, price, final_price, created_at, updated_at)
                VALUES (1, 1, 1, 10, 10, 't', 't');
                "#,
            )
            .unwrap();
        db
    }

    fn make_result(parameter_id: i64, value: ResultValue, version: u32) -> ExamResult {
        ExamResult {
            id: 0,
            order_exam_id: 1,
            parameter_id,
            value,
            is_abnormal: false,
            abnormality: AbnormalityDirection::None,
            is_critical: false,
            flags: String::new(),
            technician_notes: None,
            entered_by: 3,
            entered_at: "2026-10-16T10:00:00.000000Z".into(),
            validated_by: None,
            validated_at: None,
            version,
            is_current: true,
        }
    }

    #[test]
    fn test_insert_and_get_each_slot() {
        let db = setup_db();
        let values = [
            ResultValue::Numeric(9.5),
            ResultValue::Text("hemolyzed".into()),
            ResultValue::Boolean(false),
        ];
        for (i, value) in values.into_iter().enumerate() {
            // One current row per parameter, so alternate and supersede as we go
            let mut result = make_result(1, value.clone(), i as u32 + 1);
            if i > 0 {
                let previous = list_current_for_exam(db.conn(), 1).unwrap();
                supersede(db.conn(), previous[0].id).unwrap();
            }
            let id = insert_result(db.conn(), &mut result).unwrap();
            let stored = get_result(db.conn(), id).unwrap().unwrap();
            assert_eq!(stored.value, value);
            assert_eq!(stored, result);
        }
    }

    #[test]
    fn test_second_current_row_rejected() {
        let db = setup_db();
        insert_result(db.conn(), &mut make_result(1, ResultValue::Numeric(9.5), 1)).unwrap();
        assert!(
            insert_result(db.conn(), &mut make_result(1, ResultValue::Numeric(11.0), 2)).is_err()
        );
    }

    #[test]
    fn test_supersede_keeps_history() {
        let db = setup_db();
        let mut first = make_result(1, ResultValue::Numeric(9.5), 1);
        insert_result(db.conn(), &mut first).unwrap();

        assert!(supersede(db.conn(), first.id).unwrap());
        assert!(!supersede(db.conn(), first.id).unwrap());
        insert_result(db.conn(), &mut make_result(1, ResultValue::Numeric(10.5), 2)).unwrap();

        let history = list_history(db.conn(), 1, 1).unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].is_current);
        assert_eq!(history[0].value, ResultValue::Numeric(9.5));
        assert!(history[1].is_current);

        let current = list_current_for_exam(db.conn(), 1).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].version, 2);
    }

    #[test]
    fn test_stamp_validation_only_current() {
        let db = setup_db();
        let mut old = make_result(1, ResultValue::Numeric(9.5), 1);
        insert_result(db.conn(), &mut old).unwrap();
        supersede(db.conn(), old.id).unwrap();
        insert_result(db.conn(), &mut make_result(1, ResultValue::Numeric(10.5), 2)).unwrap();
        insert_result(db.conn(), &mut make_result(2, ResultValue::Text("ok".into()), 1)).unwrap();

        let stamped = stamp_validation(db.conn(), 1, 8, "2026-10-16T12:00:00.000000Z").unwrap();
        assert_eq!(stamped, 2);

        assert!(list_current_for_exam(db.conn(), 1)
            .unwrap()
            .iter()
            .all(|r| r.is_validated() && r.validated_by == Some(8)));
        assert!(!get_result(db.conn(), old.id).unwrap().unwrap().is_validated());
    }
}
