//! Ordered exam models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ActorId, ExamResult, ExamType, UnknownVariant};

/// Progress of one ordered exam.
///
/// Transitions are governed by [`crate::workflow::state_machine`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExamStatus {
    /// Ordered, waiting for sample collection
    Pending,
    SampleCollected,
    InAnalysis,
    /// Results recorded, awaiting validation
    Completed,
    /// Results validated (terminal)
    Validated,
    /// Sample or exam rejected (terminal)
    Rejected,
}

impl ExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamStatus::Pending => "pending",
            ExamStatus::SampleCollected => "sample_collected",
            ExamStatus::InAnalysis => "in_analysis",
            ExamStatus::Completed => "completed",
            ExamStatus::Validated => "validated",
            ExamStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExamStatus::Validated | ExamStatus::Rejected)
    }
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExamStatus::Pending),
            "sample_collected" => Ok(ExamStatus::SampleCollected),
            "in_analysis" => Ok(ExamStatus::InAnalysis),
            "completed" => Ok(ExamStatus::Completed),
            "validated" => Ok(ExamStatus::Validated),
            "rejected" => Ok(ExamStatus::Rejected),
            _ => Err(UnknownVariant::new("exam status", s)),
        }
    }
}

/// One exam instance bound to an order and an exam type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderExam {
    /// Store ID (0 until persisted)
    pub id: i64,
    pub order_id: i64,
    pub exam_type_id: i64,
    pub status: ExamStatus,
    pub sample_collected_at: Option<String>,
    pub sample_collected_by: Option<ActorId>,
    pub sample_barcode: Option<String>,
    pub analyzed_at: Option<String>,
    pub analyzed_by: Option<ActorId>,
    pub validated_at: Option<String>,
    pub validated_by: Option<ActorId>,
    pub price: f64,
    pub discount: f64,
    /// Always `price - discount` at rest
    pub final_price: f64,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl OrderExam {
    /// Create a pending exam for an order.
    pub fn new(order_id: i64, exam_type_id: i64, price: f64, discount: f64) -> Self {
        let now = super::format_timestamp(&chrono::Utc::now());
        let mut exam = Self {
            id: 0,
            order_id,
            exam_type_id,
            status: ExamStatus::Pending,
            sample_collected_at: None,
            sample_collected_by: None,
            sample_barcode: None,
            analyzed_at: None,
            analyzed_by: None,
            validated_at: None,
            validated_by: None,
            price,
            discount,
            final_price: 0.0,
            notes: None,
            rejection_reason: None,
            created_at: now.clone(),
            updated_at: now,
        };
        exam.recompute_final_price();
        exam
    }

    /// Derive `final_price` from price and discount.
    ///
    /// Every store write of an exam goes through this.
    pub fn recompute_final_price(&mut self) {
        self.final_price = self.price - self.discount;
    }

    /// Sample collected and not yet in analysis.
    pub fn can_be_analyzed(&self) -> bool {
        self.status == ExamStatus::SampleCollected && self.sample_collected_at.is_some()
    }

    /// Validated with an attributed validator.
    pub fn is_validated(&self) -> bool {
        self.status == ExamStatus::Validated && self.validated_at.is_some()
    }
}

/// An exam together with its catalog definition and current results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamDetail {
    pub exam: OrderExam,
    pub exam_type: ExamType,
    /// Current (non-superseded) results
    pub results: Vec<ExamResult>,
}
