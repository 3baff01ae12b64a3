//! Order database operations.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::{order_exams, DbError, DbResult};
use crate::models::{ActorId, Order, OrderFilter, OrderStatus};

const ORDER_COLUMNS: &str = r#"
    id, order_number, patient_id, order_date, status, priority, referring_doctor,
    diagnosis, clinical_notes, subtotal, discount_amount, tax_amount, total_amount,
    created_by, cancelled_at, cancelled_by, cancellation_reason, created_at, updated_at
"#;

/// Insert an order row (without its exams) and return its store ID.
pub fn insert_order(conn: &Connection, order: &Order) -> DbResult<i64> {
    conn.execute(
        r#"
        INSERT INTO orders (
            order_number, patient_id, order_date, status, priority, referring_doctor,
            diagnosis, clinical_notes, subtotal, discount_amount, tax_amount, total_amount,
            created_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
        params![
            order.order_number,
            order.patient_id,
            order.order_date,
            order.status.as_str(),
            order.priority.as_str(),
            order.referring_doctor,
            order.diagnosis,
            order.clinical_notes,
            order.subtotal,
            order.discount_amount,
            order.tax_amount,
            order.total_amount,
            order.created_by,
            order.created_at,
            order.updated_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get an order with its exams.
pub fn get_order(conn: &Connection, id: i64) -> DbResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS);
    let order: Option<Order> = conn
        .query_row(&sql, [id], OrderRow::from_row)
        .optional()?
        .map(|row| row.try_into())
        .transpose()?;

    match order {
        Some(mut order) => {
            order.exams = order_exams::list_for_order(conn, order.id)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

/// List orders matching every set filter, most recent first.
pub fn list_orders(conn: &Connection, filter: &OrderFilter) -> DbResult<Vec<Order>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("status = ?");
        values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(priority) = filter.priority {
        clauses.push("priority = ?");
        values.push(Value::Text(priority.as_str().to_string()));
    }
    if let Some(patient_id) = filter.patient_id {
        clauses.push("patient_id = ?");
        values.push(Value::Integer(patient_id));
    }
    if let Some(range) = &filter.date_range {
        clauses.push("order_date BETWEEN ? AND ?");
        values.push(Value::Text(range.lower_bound()));
        values.push(Value::Text(range.upper_bound()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {} FROM orders {} ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS, where_clause
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), OrderRow::from_row)?;

    let mut orders = Vec::new();
    for row in rows {
        let mut order: Order = row?.try_into()?;
        order.exams = order_exams::list_for_order(conn, order.id)?;
        orders.push(order);
    }
    Ok(orders)
}

/// Mark a pending order cancelled. Returns false if no pending order matched.
pub fn cancel_order(
    conn: &Connection,
    id: i64,
    actor: ActorId,
    reason: &str,
    at: &str,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE orders SET
            status = 'cancelled',
            cancelled_at = ?2,
            cancelled_by = ?3,
            cancellation_reason = ?4,
            updated_at = ?2
        WHERE id = ?1 AND status = 'pending'
        "#,
        params![id, at, actor, reason],
    )?;
    Ok(rows_affected > 0)
}

/// Intermediate row struct for database mapping.
struct OrderRow {
    id: i64,
    order_number: String,
    patient_id: i64,
    order_date: String,
    status: String,
    priority: String,
    referring_doctor: Option<String>,
    diagnosis: Option<String>,
    clinical_notes: Option<String>,
    subtotal: f64,
    discount_amount: f64,
    tax_amount: f64,
    total_amount: f64,
    created_by: i64,
    cancelled_at: Option<String>,
    cancelled_by: Option<i64>,
    cancellation_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl OrderRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            order_number: row.get(1)?,
            patient_id: row.get(2)?,
            order_date: row.get(3)?,
            status: row.get(4)?,
            priority: row.get(5)?,
            referring_doctor: row.get(6)?,
            diagnosis: row.get(7)?,
            clinical_notes: row.get(8)?,
            subtotal: row.get(9)?,
            discount_amount: row.get(10)?,
            tax_amount: row.get(11)?,
            total_amount: row.get(12)?,
            created_by: row.get(13)?,
            cancelled_at: row.get(14)?,
            cancelled_by: row.get(15)?,
            cancellation_reason: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row.status.parse()?;
        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            patient_id: row.patient_id,
            order_date: row.order_date,
            status,
            priority: row.priority.parse()?,
            referring_doctor: row.referring_doctor,
            diagnosis: row.diagnosis,
            clinical_notes: row.clinical_notes,
            subtotal: row.subtotal,
            discount_amount: row.discount_amount,
            tax_amount: row.tax_amount,
            total_amount: row.total_amount,
            created_by: row.created_by,
            cancelled_at: row.cancelled_at,
            cancelled_by: row.cancelled_by,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
            exams: Vec::new(),
        })
    }
}
