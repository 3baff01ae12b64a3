//! Exam status state machine.
//!
//! ```text
//! pending ──CollectSample──▶ sample_collected ──BeginAnalysis──▶ in_analysis
//!    │                             │    └──────────SubmitResults──────┐   │
//!    └──Reject──▶ rejected ◀──Reject┘                                ▼   ▼ SubmitResults
//!                                                                   completed ──Validate──▶ validated
//! ```
//!
//! [`transition`] is the only place a status changes; [`OrderExam::apply`] pairs it
//! with the audit stamps of each event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{WorkflowError, WorkflowResult};
use crate::models::{format_timestamp, ActorId, ExamStatus, OrderExam};

/// Event driving an exam forward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExamEvent {
    CollectSample { barcode: Option<String> },
    BeginAnalysis,
    SubmitResults,
    Validate,
    Reject { reason: String },
}

impl ExamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ExamEvent::CollectSample { .. } => "CollectSample",
            ExamEvent::BeginAnalysis => "BeginAnalysis",
            ExamEvent::SubmitResults => "SubmitResults",
            ExamEvent::Validate => "Validate",
            ExamEvent::Reject { .. } => "Reject",
        }
    }
}

/// Compute the status reached from `from` on `event`.
pub fn transition(from: ExamStatus, event: &ExamEvent) -> WorkflowResult<ExamStatus> {
    use crate::models::ExamStatus::*;

    let to = match (from, event) {
        (Pending, ExamEvent::CollectSample { .. }) => SampleCollected,
        (SampleCollected, ExamEvent::BeginAnalysis) => InAnalysis,
        (SampleCollected | InAnalysis, ExamEvent::SubmitResults) => Completed,
        (Completed, ExamEvent::Validate) => Validated,
        (Pending | SampleCollected, ExamEvent::Reject { .. }) => Rejected,
        _ => {
            return Err(WorkflowError::StateTransition {
                from: from.to_string(),
                event: event.name().to_string(),
            })
        }
    };
    Ok(to)
}

/// Whether `event` is legal from `from`.
pub fn can_transition(from: ExamStatus, event: &ExamEvent) -> bool {
    transition(from, event).is_ok()
}

impl OrderExam {
    /// Apply an event: move the status and stamp the acting user.
    ///
    /// Leaves the exam untouched on error.
    pub fn apply(
        &mut self,
        event: &ExamEvent,
        actor: ActorId,
        at: &DateTime<Utc>,
    ) -> WorkflowResult<()> {
        let next = transition(self.status, event)?;
        let now = format_timestamp(at);

        match event {
            ExamEvent::CollectSample { barcode } => {
                self.sample_collected_at = Some(now.clone());
                self.sample_collected_by = Some(actor);
                if barcode.is_some() {
                    self.sample_barcode = barcode.clone();
                }
            }
            ExamEvent::BeginAnalysis => {
                if !self.can_be_analyzed() {
                    return Err(WorkflowError::Validation(format!(
                        "exam {} has no collected sample",
                        self.id
                    )));
                }
                self.analyzed_at = Some(now.clone());
                self.analyzed_by = Some(actor);
            }
            ExamEvent::SubmitResults => {
                if self.analyzed_at.is_none() {
                    self.analyzed_at = Some(now.clone());
                    self.analyzed_by = Some(actor);
                }
            }
            ExamEvent::Validate => {
                self.validated_at = Some(now.clone());
                self.validated_by = Some(actor);
            }
            ExamEvent::Reject { reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(WorkflowError::Validation(
                        "rejection reason must not be empty".to_string(),
                    ));
                }
                self.rejection_reason = Some(reason.to_string());
            }
        }

        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}
