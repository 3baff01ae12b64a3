//! Ordered exam database operations.
//!
//! Both write paths recompute `final_price` before touching the row.

use rusqlite::{params, Connection, OptionalExtension};

use super::{DbError, DbResult};
use crate::models::OrderExam;

const EXAM_COLUMNS: &str = r#"
    id, order_id, exam_type_id, status, sample_collected_at, sample_collected_by,
    sample_barcode, analyzed_at, analyzed_by, validated_at, validated_by, price,
    discount, final_price, notes, rejection_reason, created_at, updated_at
"#;

/// Insert an exam row and return its store ID.
pub fn insert_order_exam(conn: &Connection, exam: &mut OrderExam) -> DbResult<i64> {
    exam.recompute_final_price();
    conn.execute(
        r#"
        INSERT INTO order_exams (
            order_id, exam_type_id, status, sample_collected_at, sample_collected_by,
            sample_barcode, analyzed_at, analyzed_by, validated_at, validated_by, price,
            discount, final_price, notes, rejection_reason, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        "#,
        params![
            exam.order_id,
            exam.exam_type_id,
            exam.status.as_str(),
            exam.sample_collected_at,
            exam.sample_collected_by,
            exam.sample_barcode,
            exam.analyzed_at,
            exam.analyzed_by,
            exam.validated_at,
            exam.validated_by,
            exam.price,
            exam.discount,
            exam.final_price,
            exam.notes,
            exam.rejection_reason,
            exam.created_at,
            exam.updated_at,
        ],
    )?;
    exam.id = conn.last_insert_rowid();
    Ok(exam.id)
}

/// Persist every mutable column of an exam. Returns false if the row is gone.
pub fn update_order_exam(conn: &Connection, exam: &mut OrderExam) -> DbResult<bool> {
    exam.recompute_final_price();
    let rows_affected = conn.execute(
        r#"
        UPDATE order_exams SET
            status = ?2,
            sample_collected_at = ?3,
            sample_collected_by = ?4,
            sample_barcode = ?5,
            analyzed_at = ?6,
            analyzed_by = ?7,
            validated_at = ?8,
            validated_by = ?9,
            price = ?10,
            discount = ?11,
            final_price = ?12,
            notes = ?13,
            rejection_reason = ?14,
            updated_at = ?15
        WHERE id = ?1
        "#,
        params![
            exam.id,
            exam.status.as_str(),
            exam.sample_collected_at,
            exam.sample_collected_by,
            exam.sample_barcode,
            exam.analyzed_at,
            exam.analyzed_by,
            exam.validated_at,
            exam.validated_by,
            exam.price,
            exam.discount,
            exam.final_price,
            exam.notes,
            exam.rejection_reason,
            exam.updated_at,
        ],
    )?;
    Ok(rows_affected > 0)
}

/// Get an exam by ID.
pub fn get_order_exam(conn: &Connection, id: i64) -> DbResult<Option<OrderExam>> {
    let sql = format!("SELECT {} FROM order_exams WHERE id = ?", EXAM_COLUMNS);
    conn.query_row(&sql, [id], OrderExamRow::from_row)
        .optional()?
        .map(|row| row.try_into())
        .transpose()
}

/// List the exams of an order in creation order.
pub fn list_for_order(conn: &Connection, order_id: i64) -> DbResult<Vec<OrderExam>> {
    let sql = format!(
        "SELECT {} FROM order_exams WHERE order_id = ? ORDER BY id",
        EXAM_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([order_id], OrderExamRow::from_row)?;

    let mut exams = Vec::new();
    for row in rows {
        exams.push(row?.try_into()?);
    }
    Ok(exams)
}

/// Intermediate row struct for database mapping.
struct OrderExamRow {
    id: i64,
    order_id: i64,
    exam_type_id: i64,
    status: String,
    sample_collected_at: Option<String>,
    sample_collected_by: Option<i64>,
    sample_barcode: Option<String>,
    analyzed_at: Option<String>,
    analyzed_by: Option<i64>,
    validated_at: Option<String>,
    validated_by: Option<i64>,
    price: f64,
    discount: f64,
    final_price: f64,
    notes: Option<String>,
    rejection_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl OrderExamRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            order_id: row.get(1)?,
            exam_type_id: row.get(2)?,
            status: row.get(3)?,
            sample_collected_at: row.get(4)?,
            sample_collected_by: row.get(5)?,
            sample_barcode: row.get(6)?,
            analyzed_at: row.get(7)?,
            analyzed_by: row.get(8)?,
            validated_at: row.get(9)?,
            validated_by: row.get(10)?,
            price: row.get(11)?,
            discount: row.get(12)?,
            final_price: row.get(13)?,
            notes: row.get(14)?,
            rejection_reason: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }
}

impl TryFrom<OrderExamRow> for OrderExam {
    type Error = DbError;

    fn try_from(row: OrderExamRow) -> Result<Self, Self::Error> {
        Ok(OrderExam {
            id: row.id,
            order_id: row.order_id,
            exam_type_id: row.exam_type_id,
            status: row.status.parse()?,
            sample_collected_at: row.sample_collected_at,
            sample_collected_by: row.sample_collected_by,
            sample_barcode: row.sample_barcode,
            analyzed_at: row.analyzed_at,
            analyzed_by: row.analyzed_by,
            validated_at: row.validated_at,
            validated_by: row.validated_by,
            price: row.price,
            discount: row.discount,
            final_price: row.final_price,
            notes: row.notes,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ExamStatus, ExamType};

    fn setup_db() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch(
                r#"
                INSERT INTO patients (id, document_number, first_name, last_name, created_at)
                VALUES (1, 'V-1', 'Ana', 'Pérez', 't');
                INSERT INTO orders (id, order_number, patient_id, order_date, created_by, created_at, updated_at)
                VALUES (1, 'ORD-20261016-000001', 1, '2026-10-16 09:00:00', 1, 't', 't');
                "#,
            )
            .unwrap();
        let exam_type = db.upsert_exam_type(&ExamType::new("HB", "Hemoglobin", 10.0)).unwrap();
        (db, 1, exam_type.id)
    }

    #[test]
    fn test_insert_recomputes_final_price() {
        let (db, order_id, exam_type_id) = setup_db();
        let mut exam = OrderExam::new(order_id, exam_type_id, 30.0, 4.0);
        exam.final_price = 999.0; // stale value must not reach the store

        let id = insert_order_exam(db.conn(), &mut exam).unwrap();
        let stored = get_order_exam(db.conn(), id).unwrap().unwrap();
        assert_eq!(stored.final_price, 26.0);
        assert_eq!(stored.final_price, stored.price - stored.discount);
        assert_eq!(stored.status, ExamStatus::Pending);
    }

    #[test]
    fn test_update_recomputes_final_price() {
        let (db, order_id, exam_type_id) = setup_db();
        let mut exam = OrderExam::new(order_id, exam_type_id, 30.0, 0.0);
        insert_order_exam(db.conn(), &mut exam).unwrap();

        exam.discount = 7.5;
        assert!(update_order_exam(db.conn(), &mut exam).unwrap());

        let stored = get_order_exam(db.conn(), exam.id).unwrap().unwrap();
        assert_eq!(stored.final_price, 22.5);
        assert_eq!(stored, exam);
    }

    #[test]
    fn test_update_missing_exam() {
        let (db, order_id, exam_type_id) = setup_db();
        let mut exam = OrderExam::new(order_id, exam_type_id, 30.0, 0.0);
        exam.id = 404;
        assert!(!update_order_exam(db.conn(), &mut exam).unwrap());
    }

    #[test]
    fn test_list_for_order() {
        let (db, order_id, exam_type_id) = setup_db();
        for price in [10.0, 20.0, 30.0] {
            insert_order_exam(db.conn(), &mut OrderExam::new(order_id, exam_type_id, price, 0.0))
                .unwrap();
        }
        let exams = list_for_order(db.conn(), order_id).unwrap();
        let prices: Vec<f64> = exams.iter().map(|e| e.price).collect();
        assert_eq!(prices, vec![10.0, 20.0, 30.0]);
        assert!(list_for_order(db.conn(), order_id + 1).unwrap().is_empty());
    }

    #[test]
    fn test_non_positive_price_rejected_by_store() {
        let (db, order_id, exam_type_id) = setup_db();
        let mut exam = OrderExam::new(order_id, exam_type_id, 0.0, 0.0);
        assert!(insert_order_exam(db.conn(), &mut exam).is_err());
    }
}
