//! Exam result models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ActorId, UnknownVariant};

/// The authoritative value of a result, one slot per parameter data type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResultValue {
    Numeric(f64),
    /// Text and select parameters
    Text(String),
    Boolean(bool),
}

impl ResultValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            ResultValue::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Value formatted for reports.
    pub fn display_value(&self) -> String {
        match self {
            ResultValue::Numeric(v) => format!("{:.2}", v),
            ResultValue::Text(s) => s.clone(),
            ResultValue::Boolean(true) => "Positive".to_string(),
            ResultValue::Boolean(false) => "Negative".to_string(),
        }
    }
}

/// Direction of an out-of-range value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AbnormalityDirection {
    #[default]
    None,
    Low,
    High,
    /// Abnormal without a direction (qualitative results)
    Abnormal,
}

impl AbnormalityDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbnormalityDirection::None => "none",
            AbnormalityDirection::Low => "low",
            AbnormalityDirection::High => "high",
            AbnormalityDirection::Abnormal => "abnormal",
        }
    }
}

impl fmt::Display for AbnormalityDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbnormalityDirection {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AbnormalityDirection::None),
            "low" => Ok(AbnormalityDirection::Low),
            "high" => Ok(AbnormalityDirection::High),
            "abnormal" => Ok(AbnormalityDirection::Abnormal),
            _ => Err(UnknownVariant::new("abnormality direction", s)),
        }
    }
}

/// One recorded parameter value for an ordered exam.
///
/// Abnormality fields are derived by the classifier when the row is recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamResult {
    /// Store ID (0 until persisted)
    pub id: i64,
    pub order_exam_id: i64,
    pub parameter_id: i64,
    pub value: ResultValue,
    pub is_abnormal: bool,
    pub abnormality: AbnormalityDirection,
    pub is_critical: bool,
    /// Compact flag string: "L", "H", "LC", "HC" or empty
    pub flags: String,
    pub technician_notes: Option<String>,
    pub entered_by: ActorId,
    pub entered_at: String,
    pub validated_by: Option<ActorId>,
    pub validated_at: Option<String>,
    /// Starts at 1, incremented by each correction
    pub version: u32,
    /// False once superseded by a correction
    pub is_current: bool,
}

impl ExamResult {
    pub fn is_validated(&self) -> bool {
        self.validated_at.is_some() && self.validated_by.is_some()
    }
}

/// A caller-supplied result value. Carries no abnormality fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultSubmission {
    pub parameter_id: i64,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub value_boolean: Option<bool>,
    pub technician_notes: Option<String>,
}

impl ResultSubmission {
    pub fn numeric(parameter_id: i64, value: f64) -> Self {
        Self {
            parameter_id,
            value_numeric: Some(value),
            ..Default::default()
        }
    }

    pub fn text(parameter_id: i64, value: impl Into<String>) -> Self {
        Self {
            parameter_id,
            value_text: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn boolean(parameter_id: i64, value: bool) -> Self {
        Self {
            parameter_id,
            value_boolean: Some(value),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_value() {
        assert_eq!(ResultValue::Numeric(9.5).display_value(), "9.50");
        assert_eq!(ResultValue::Boolean(true).display_value(), "Positive");
        assert_eq!(ResultValue::Text("ambar".into()).display_value(), "ambar");
    }

    #[test]
    fn test_direction_strings() {
        assert_eq!(AbnormalityDirection::default(), AbnormalityDirection::None);
        assert_eq!("high".parse::<AbnormalityDirection>().unwrap(), AbnormalityDirection::High);
        assert!("".parse::<AbnormalityDirection>().is_err());
    }

    #[test]
    fn test_submission_constructors() {
        let sub = ResultSubmission::numeric(3, 14.2);
        assert_eq!(sub.value_numeric, Some(14.2));
        assert!(sub.value_text.is_none());
        assert!(sub.value_boolean.is_none());
    }
}
