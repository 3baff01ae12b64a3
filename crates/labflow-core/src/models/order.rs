//! Order models.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ActorId, OrderExam, UnknownVariant};

/// Order status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, exams in progress
    Pending,
    /// All work finished
    Completed,
    /// Explicitly cancelled (terminal)
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(UnknownVariant::new("order status", s)),
        }
    }
}

/// Clinical priority of an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
    /// Immediate processing
    Stat,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Urgent => "urgent",
            Priority::Stat => "stat",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Priority::Normal),
            "urgent" => Ok(Priority::Urgent),
            "stat" => Ok(Priority::Stat),
            _ => Err(UnknownVariant::new("priority", s)),
        }
    }
}

/// One clinical request by one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Store ID
    pub id: i64,
    /// Human-readable identifier (e.g., "ORD-20261016-000001"), immutable
    pub order_number: String,
    pub patient_id: i64,
    /// When the order was placed (`YYYY-MM-DD HH:MM:SS`, UTC)
    pub order_date: String,
    pub status: OrderStatus,
    pub priority: Priority,
    pub referring_doctor: Option<String>,
    pub diagnosis: Option<String>,
    pub clinical_notes: Option<String>,
    // Billing aggregates are stored alongside the order but computed elsewhere.
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub created_by: ActorId,
    pub cancelled_at: Option<String>,
    pub cancelled_by: Option<ActorId>,
    pub cancellation_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Child exams, in creation order
    pub exams: Vec<OrderExam>,
}

impl Order {
    /// Only pending orders may be cancelled.
    pub fn is_cancellable(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// Request to create an order with its exams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOrder {
    pub patient_id: i64,
    pub priority: Priority,
    pub referring_doctor: Option<String>,
    pub diagnosis: Option<String>,
    pub clinical_notes: Option<String>,
    pub exams: Vec<ExamRequest>,
}

impl NewOrder {
    /// Create a normal-priority order request.
    pub fn new(patient_id: i64, exams: Vec<ExamRequest>) -> Self {
        Self {
            patient_id,
            priority: Priority::Normal,
            referring_doctor: None,
            diagnosis: None,
            clinical_notes: None,
            exams,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// One exam line of a new order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamRequest {
    pub exam_type_id: i64,
    /// Must be > 0
    pub price: f64,
    /// Must be within `0..=price`
    pub discount: f64,
}

impl ExamRequest {
    pub fn new(exam_type_id: i64, price: f64) -> Self {
        Self {
            exam_type_id,
            price,
            discount: 0.0,
        }
    }
}

/// Inclusive calendar-day range applied to the order date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A range covering a single day.
    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// First instant of the range as stored (`start 00:00:00`).
    pub fn lower_bound(&self) -> String {
        format!("{} 00:00:00", self.start.format("%Y-%m-%d"))
    }

    /// Last instant of the range as stored (`end 23:59:59`).
    pub fn upper_bound(&self) -> String {
        format!("{} 23:59:59", self.end.format("%Y-%m-%d"))
    }
}

/// Composable order filters. `None` means no constraint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub priority: Option<Priority>,
    pub patient_id: Option<i64>,
    pub date_range: Option<DateRange>,
}

impl OrderFilter {
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_patient(mut self, patient_id: i64) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parsing() {
        assert_eq!("stat".parse::<Priority>().unwrap(), Priority::Stat);
        assert_eq!(Priority::default(), Priority::Normal);
        let err = "urgente".parse::<Priority>().unwrap_err();
        assert_eq!(err.kind, "priority");
    }

    #[test]
    fn test_order_status_parsing() {
        assert_eq!("cancelled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("cancelado".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_date_range_bounds() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        );
        assert!(range.is_valid());
        assert_eq!(range.lower_bound(), "2026-10-01 00:00:00");
        assert_eq!(range.upper_bound(), "2026-10-16 23:59:59");

        let inverted = DateRange::new(range.end, range.start);
        assert!(!inverted.is_valid());
    }

    #[test]
    fn test_filter_builder() {
        let filter = OrderFilter::default()
            .with_status(OrderStatus::Pending)
            .with_patient(7);
        assert_eq!(filter.status, Some(OrderStatus::Pending));
        assert_eq!(filter.patient_id, Some(7));
        assert!(filter.priority.is_none());
        assert!(filter.date_range.is_none());
    }
}
