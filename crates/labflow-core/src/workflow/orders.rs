//! Order creation, listing and cancellation.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{IdentifierGenerator, IdentifierTarget, WorkflowError, WorkflowResult};
use crate::config::IdentifierConfig;
use crate::db::{self, Database};
use crate::models::{
    format_order_date, format_timestamp, ActorId, NewOrder, Order, OrderExam, OrderFilter,
    OrderStatus,
};

/// Creates orders together with their exams, atomically.
pub struct OrderCoordinator<'a> {
    db: &'a Database,
    generator: IdentifierGenerator,
    target: IdentifierTarget,
}

impl<'a> OrderCoordinator<'a> {
    pub fn new(db: &'a Database, config: &IdentifierConfig) -> Self {
        Self {
            db,
            generator: IdentifierGenerator::new(config.strategy),
            target: IdentifierTarget::orders(config.order_prefix.clone()),
        }
    }

    /// Create an order and its pending exams.
    pub fn create_order(&self, request: NewOrder, actor: ActorId) -> WorkflowResult<Order> {
        self.create_order_at(request, actor, Utc::now())
    }

    /// Create an order placed at `now`.
    ///
    /// Either the order and every exam are stored, or nothing is.
    pub fn create_order_at(
        &self,
        request: NewOrder,
        actor: ActorId,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Order> {
        validate_request(&request)?;

        let tx = self.db.transaction()?;

        match db::patients::get_patient(&tx, request.patient_id)? {
            Some(patient) if patient.is_active => {}
            Some(_) => {
                return Err(WorkflowError::Validation(format!(
                    "patient {} is inactive",
                    request.patient_id
                )))
            }
            None => {
                return Err(WorkflowError::Validation(format!(
                    "unknown patient {}",
                    request.patient_id
                )))
            }
        }

        let order_number = self.generator.next(&tx, &self.target, now.date_naive())?;
        let timestamp = format_timestamp(&now);
        let mut order = Order {
            id: 0,
            order_number,
            patient_id: request.patient_id,
            order_date: format_order_date(&now),
            status: OrderStatus::Pending,
            priority: request.priority,
            referring_doctor: request.referring_doctor,
            diagnosis: request.diagnosis,
            clinical_notes: request.clinical_notes,
            subtotal: 0.0,
            discount_amount: 0.0,
            tax_amount: 0.0,
            total_amount: 0.0,
            created_by: actor,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: timestamp.clone(),
            updated_at: timestamp.clone(),
            exams: Vec::with_capacity(request.exams.len()),
        };
        order.id = db::orders::insert_order(&tx, &order)?;

        for line in &request.exams {
            match db::catalog::get_exam_type(&tx, line.exam_type_id)? {
                Some(exam_type) if exam_type.is_active => {}
                Some(exam_type) => {
                    return Err(WorkflowError::Validation(format!(
                        "exam type {} is inactive",
                        exam_type.code
                    )))
                }
                None => {
                    return Err(WorkflowError::Validation(format!(
                        "unknown exam type {}",
                        line.exam_type_id
                    )))
                }
            }

            let mut exam = OrderExam::new(order.id, line.exam_type_id, line.price, line.discount);
            exam.created_at = timestamp.clone();
            exam.updated_at = timestamp.clone();
            db::order_exams::insert_order_exam(&tx, &mut exam)?;
            order.exams.push(exam);
        }

        tx.commit()?;

        info!(
            order_number = %order.order_number,
            patient_id = order.patient_id,
            exams = order.exams.len(),
            actor,
            "order created"
        );
        Ok(order)
    }

    /// Orders matching every set filter, most recent first.
    pub fn list_orders(&self, filter: &OrderFilter) -> WorkflowResult<Vec<Order>> {
        if let Some(range) = &filter.date_range {
            if !range.is_valid() {
                return Err(WorkflowError::Validation(format!(
                    "date range starts after it ends ({} > {})",
                    range.start, range.end
                )));
            }
        }
        let orders = db::orders::list_orders(self.db.conn(), filter)?;
        debug!(count = orders.len(), "orders listed");
        Ok(orders)
    }

    pub fn get_order(&self, order_id: i64) -> WorkflowResult<Order> {
        db::orders::get_order(self.db.conn(), order_id)?
            .ok_or_else(|| WorkflowError::not_found("order", order_id))
    }

    /// Cancel a pending order. Its exams are left as they are.
    pub fn cancel_order(
        &self,
        order_id: i64,
        actor: ActorId,
        reason: &str,
    ) -> WorkflowResult<Order> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::Validation(
                "cancellation reason must not be empty".to_string(),
            ));
        }

        let tx = self.db.transaction()?;
        let order = db::orders::get_order(&tx, order_id)?
            .ok_or_else(|| WorkflowError::not_found("order", order_id))?;
        if !order.is_cancellable() {
            return Err(WorkflowError::StateTransition {
                from: order.status.to_string(),
                event: "Cancel".to_string(),
            });
        }

        let now = format_timestamp(&Utc::now());
        db::orders::cancel_order(&tx, order_id, actor, reason, &now)?;
        let cancelled = db::orders::get_order(&tx, order_id)?
            .ok_or_else(|| WorkflowError::not_found("order", order_id))?;
        tx.commit()?;

        info!(order_number = %cancelled.order_number, actor, reason, "order cancelled");
        Ok(cancelled)
    }
}

fn validate_request(request: &NewOrder) -> WorkflowResult<()> {
    if request.exams.is_empty() {
        return Err(WorkflowError::Validation(
            "an order needs at least one exam".to_string(),
        ));
    }
    for (i, line) in request.exams.iter().enumerate() {
        if !line.price.is_finite() || line.price <= 0.0 {
            return Err(WorkflowError::Validation(format!(
                "exam {}: price must be positive, got {}",
                i + 1,
                line.price
            )));
        }
        if !line.discount.is_finite() || line.discount < 0.0 || line.discount > line.price {
            return Err(WorkflowError::Validation(format!(
                "exam {}: discount must be within 0..={}, got {}",
                i + 1,
                line.price,
                line.discount
            )));
        }
    }
    Ok(())
}
