//! Sample intake and exam lookups.

use chrono::Utc;
use rusqlite::Connection;
use tracing::info;

use super::{ExamEvent, WorkflowError, WorkflowResult};
use crate::db::{self, Database};
use crate::models::{ActorId, ExamDetail, OrderExam};

/// Drives individual exams through intake.
pub struct ExamWorkflow<'a> {
    db: &'a Database,
}

impl<'a> ExamWorkflow<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record sample collection, optionally with the tube barcode.
    pub fn collect_sample(
        &self,
        order_exam_id: i64,
        actor: ActorId,
        barcode: Option<String>,
    ) -> WorkflowResult<OrderExam> {
        self.advance(order_exam_id, ExamEvent::CollectSample { barcode }, actor)
    }

    /// Move a collected sample into analysis.
    pub fn begin_analysis(&self, order_exam_id: i64, actor: ActorId) -> WorkflowResult<OrderExam> {
        self.advance(order_exam_id, ExamEvent::BeginAnalysis, actor)
    }

    /// Reject an exam before analysis starts.
    pub fn reject_exam(
        &self,
        order_exam_id: i64,
        actor: ActorId,
        reason: &str,
    ) -> WorkflowResult<OrderExam> {
        self.advance(
            order_exam_id,
            ExamEvent::Reject {
                reason: reason.to_string(),
            },
            actor,
        )
    }

    /// An exam with its catalog definition and current results.
    pub fn get_order_exam(&self, order_exam_id: i64) -> WorkflowResult<ExamDetail> {
        let exam = load_exam(self.db.conn(), order_exam_id)?;
        load_detail(self.db.conn(), exam)
    }

    fn advance(
        &self,
        order_exam_id: i64,
        event: ExamEvent,
        actor: ActorId,
    ) -> WorkflowResult<OrderExam> {
        let tx = self.db.transaction()?;
        let mut exam = load_exam(&tx, order_exam_id)?;
        let from = exam.status;

        exam.apply(&event, actor, &Utc::now())?;
        db::order_exams::update_order_exam(&tx, &mut exam)?;
        tx.commit()?;

        info!(
            order_exam_id,
            event = event.name(),
            from = %from,
            to = %exam.status,
            terminal = exam.status.is_terminal(),
            actor,
            "exam advanced"
        );
        Ok(exam)
    }
}

pub(crate) fn load_exam(conn: &Connection, order_exam_id: i64) -> WorkflowResult<OrderExam> {
    db::order_exams::get_order_exam(conn, order_exam_id)?
        .ok_or_else(|| WorkflowError::not_found("order exam", order_exam_id))
}

pub(crate) fn load_detail(conn: &Connection, exam: OrderExam) -> WorkflowResult<ExamDetail> {
    let exam_type = db::catalog::get_exam_type(conn, exam.exam_type_id)?
        .ok_or_else(|| WorkflowError::not_found("exam type", exam.exam_type_id))?;
    let results = db::results::list_current_for_exam(conn, exam.id)?;
    Ok(ExamDetail {
        exam,
        exam_type,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentifierConfig;
    use crate::models::{ExamRequest, ExamStatus, ExamType, NewOrder, Patient};
    use crate::workflow::OrderCoordinator;

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let patient = db.insert_patient(&Patient::new("V-1", "Ana", "Pérez")).unwrap();
        let hb = db.upsert_exam_type(&ExamType::new("HB", "Hemoglobin", 10.0)).unwrap();
        let order = OrderCoordinator::new(&db, &IdentifierConfig::default())
            .create_order(NewOrder::new(patient.id, vec![ExamRequest::new(hb.id, 10.0)]), 1)
            .unwrap();
        let exam_id = order.exams[0].id;
        (db, exam_id)
    }

    #[test]
    fn test_collect_then_analyze() {
        let (db, exam_id) = setup();
        let workflow = ExamWorkflow::new(&db);

        let exam = workflow
            .collect_sample(exam_id, 3, Some("BC-0001".into()))
            .unwrap();
        assert_eq!(exam.status, ExamStatus::SampleCollected);

        let exam = workflow.begin_analysis(exam_id, 4).unwrap();
        assert_eq!(exam.status, ExamStatus::InAnalysis);

        let stored = workflow.get_order_exam(exam_id).unwrap();
        assert_eq!(stored.exam, exam);
        assert_eq!(stored.exam.sample_barcode.as_deref(), Some("BC-0001"));
        assert_eq!(stored.exam_type.code, "HB");
        assert!(stored.results.is_empty());
    }

    #[test]
    fn test_illegal_event_persists_nothing() {
        let (db, exam_id) = setup();
        let workflow = ExamWorkflow::new(&db);

        let err = workflow.begin_analysis(exam_id, 4).unwrap_err();
        assert!(matches!(err, WorkflowError::StateTransition { .. }));
        assert_eq!(
            workflow.get_order_exam(exam_id).unwrap().exam.status,
            ExamStatus::Pending
        );
    }

    #[test]
    fn test_reject_after_collection() {
        let (db, exam_id) = setup();
        let workflow = ExamWorkflow::new(&db);
        workflow.collect_sample(exam_id, 3, None).unwrap();

        let exam = workflow.reject_exam(exam_id, 3, "hemolyzed sample").unwrap();
        assert_eq!(exam.status, ExamStatus::Rejected);
        assert_eq!(exam.rejection_reason.as_deref(), Some("hemolyzed sample"));

        // Terminal
        assert!(workflow.collect_sample(exam_id, 3, None).is_err());
    }

    #[test]
    fn test_missing_exam() {
        let (db, exam_id) = setup();
        let workflow = ExamWorkflow::new(&db);
        assert!(matches!(
            workflow.collect_sample(exam_id + 1, 3, None),
            Err(WorkflowError::NotFound(_))
        ));
        assert!(matches!(
            workflow.get_order_exam(exam_id + 1),
            Err(WorkflowError::NotFound(_))
        ));
    }
}
