//! Result recording, validation and correction.
//!
//! Every recorded value passes through [`classify`] before it is stored, so the
//! abnormality fields of a row always reflect the reference interval in force
//! when the row was written.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use super::exams::{load_detail, load_exam};
use super::{classify, transition, ExamEvent, WorkflowError, WorkflowResult};
use crate::db::{self, Database};
use crate::models::{
    format_timestamp, ActorId, DataType, ExamDetail, ExamParameter, ExamResult, ExamStatus,
    OrderExam, ResultSubmission, ResultValue,
};

/// Records, validates and corrects exam results.
pub struct ResultPipeline<'a> {
    db: &'a Database,
}

impl<'a> ResultPipeline<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a complete batch of results and mark the exam completed.
    ///
    /// The batch is all-or-nothing.
    pub fn submit_results(
        &self,
        order_exam_id: i64,
        actor: ActorId,
        submissions: &[ResultSubmission],
    ) -> WorkflowResult<ExamDetail> {
        let tx = self.db.transaction()?;
        let mut exam = load_exam(&tx, order_exam_id)?;
        transition(exam.status, &ExamEvent::SubmitResults)?;

        let values = validate_batch(&tx, &exam, submissions)?;

        let now = Utc::now();
        let entered_at = format_timestamp(&now);
        for (parameter, value, submission) in values {
            let mut result = build_result(
                exam.id,
                &parameter,
                value,
                submission.technician_notes.clone(),
                actor,
                &entered_at,
                1,
            );
            db::results::insert_result(&tx, &mut result)?;
            log_critical(&result, &parameter);
        }

        exam.apply(&ExamEvent::SubmitResults, actor, &now)?;
        db::order_exams::update_order_exam(&tx, &mut exam)?;
        let detail = load_detail(&tx, exam)?;
        tx.commit()?;

        info!(
            order_exam_id,
            results = detail.results.len(),
            abnormal = detail.results.iter().filter(|r| r.is_abnormal).count(),
            actor,
            "results submitted"
        );
        Ok(detail)
    }

    /// Validate a completed exam and attribute its current results.
    ///
    /// Does not re-check result completeness and leaves the parent order alone.
    pub fn validate_results(
        &self,
        order_exam_id: i64,
        actor: ActorId,
    ) -> WorkflowResult<ExamDetail> {
        let tx = self.db.transaction()?;
        let mut exam = load_exam(&tx, order_exam_id)?;

        exam.apply(&ExamEvent::Validate, actor, &Utc::now())?;
        db::order_exams::update_order_exam(&tx, &mut exam)?;
        let validated_at = exam.validated_at.clone().unwrap_or_default();
        let stamped = db::results::stamp_validation(&tx, exam.id, actor, &validated_at)?;
        let detail = load_detail(&tx, exam)?;
        tx.commit()?;

        info!(order_exam_id, results = stamped, actor, "results validated");
        Ok(detail)
    }

    /// Supersede a current result with a corrected value.
    ///
    /// The correction is recorded against the parameter of the superseded row;
    /// `submission.parameter_id` is not consulted. Only results of completed
    /// (not yet validated) exams can be corrected.
    pub fn correct_result(
        &self,
        result_id: i64,
        actor: ActorId,
        submission: &ResultSubmission,
    ) -> WorkflowResult<ExamResult> {
        let tx = self.db.transaction()?;
        let previous = db::results::get_result(&tx, result_id)?
            .ok_or_else(|| WorkflowError::not_found("result", result_id))?;
        if !previous.is_current {
            return Err(WorkflowError::Validation(format!(
                "result {} has already been superseded",
                result_id
            )));
        }

        let exam = load_exam(&tx, previous.order_exam_id)?;
        if exam.status != ExamStatus::Completed {
            return Err(WorkflowError::StateTransition {
                from: exam.status.to_string(),
                event: "CorrectResult".to_string(),
            });
        }

        let parameter = db::catalog::get_parameter(&tx, previous.parameter_id)?
            .ok_or_else(|| WorkflowError::not_found("parameter", previous.parameter_id))?;
        let value = extract_value(submission, &parameter)?;

        db::results::supersede(&tx, previous.id)?;
        let mut corrected = build_result(
            exam.id,
            &parameter,
            value,
            submission.technician_notes.clone(),
            actor,
            &format_timestamp(&Utc::now()),
            previous.version + 1,
        );
        db::results::insert_result(&tx, &mut corrected)?;
        tx.commit()?;

        info!(
            result_id = corrected.id,
            supersedes = previous.id,
            version = corrected.version,
            actor,
            "result corrected"
        );
        log_critical(&corrected, &parameter);
        Ok(corrected)
    }
}

/// Check a batch against the exam's type and resolve each typed value.
fn validate_batch<'s>(
    conn: &Connection,
    exam: &OrderExam,
    submissions: &'s [ResultSubmission],
) -> WorkflowResult<Vec<(ExamParameter, ResultValue, &'s ResultSubmission)>> {
    if submissions.is_empty() {
        return Err(WorkflowError::Validation(
            "a results batch needs at least one value".to_string(),
        ));
    }

    let exam_type = db::catalog::get_exam_type(conn, exam.exam_type_id)?
        .ok_or_else(|| WorkflowError::not_found("exam type", exam.exam_type_id))?;

    let mut seen = HashSet::new();
    let mut values = Vec::with_capacity(submissions.len());
    for submission in submissions {
        if !seen.insert(submission.parameter_id) {
            return Err(WorkflowError::Validation(format!(
                "parameter {} appears more than once",
                submission.parameter_id
            )));
        }

        let parameter = match exam_type.parameter(submission.parameter_id) {
            Some(parameter) => parameter.clone(),
            None => {
                return match db::catalog::get_parameter(conn, submission.parameter_id)? {
                    Some(other) => Err(WorkflowError::Validation(format!(
                        "parameter {} does not belong to exam type {}",
                        other.code, exam_type.code
                    ))),
                    None => Err(WorkflowError::not_found("parameter", submission.parameter_id)),
                };
            }
        };

        let value = extract_value(submission, &parameter)?;
        values.push((parameter, value, submission));
    }

    let missing: Vec<&str> = exam_type
        .required_parameters()
        .filter(|p| !seen.contains(&p.id))
        .map(|p| p.code.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(WorkflowError::Validation(format!(
            "missing required parameters: {}",
            missing.join(", ")
        )));
    }

    Ok(values)
}

/// Take the value slot matching the parameter's data type.
fn extract_value(
    submission: &ResultSubmission,
    parameter: &ExamParameter,
) -> WorkflowResult<ResultValue> {
    let missing = || {
        WorkflowError::Validation(format!(
            "parameter {} expects a {} value",
            parameter.code, parameter.data_type
        ))
    };

    match parameter.data_type {
        DataType::Numeric => {
            let v = submission.value_numeric.ok_or_else(missing)?;
            if !v.is_finite() {
                return Err(WorkflowError::Validation(format!(
                    "parameter {} got a non-finite value",
                    parameter.code
                )));
            }
            Ok(ResultValue::Numeric(v))
        }
        DataType::Text => submission
            .value_text
            .clone()
            .map(ResultValue::Text)
            .ok_or_else(missing),
        DataType::Boolean => submission
            .value_boolean
            .map(ResultValue::Boolean)
            .ok_or_else(missing),
        DataType::Select => {
            let choice = submission.value_text.clone().ok_or_else(missing)?;
            if !parameter.accepts_option(&choice) {
                return Err(WorkflowError::Validation(format!(
                    "{:?} is not an option of parameter {}",
                    choice, parameter.code
                )));
            }
            Ok(ResultValue::Text(choice))
        }
    }
}

fn build_result(
    order_exam_id: i64,
    parameter: &ExamParameter,
    value: ResultValue,
    technician_notes: Option<String>,
    actor: ActorId,
    entered_at: &str,
    version: u32,
) -> ExamResult {
    let classification = classify(&value, parameter);
    ExamResult {
        id: 0,
        order_exam_id,
        parameter_id: parameter.id,
        value,
        is_abnormal: classification.is_abnormal,
        abnormality: classification.direction,
        is_critical: classification.is_critical,
        flags: classification.flags,
        technician_notes,
        entered_by: actor,
        entered_at: entered_at.to_string(),
        validated_by: None,
        validated_at: None,
        version,
        is_current: true,
    }
}

fn log_critical(result: &ExamResult, parameter: &ExamParameter) {
    if result.is_critical {
        warn!(
            order_exam_id = result.order_exam_id,
            parameter = %parameter.code,
            value = %result.value.display_value(),
            flags = %result.flags,
            "critical result recorded"
        );
    }
}
