//! Exam catalog models (read-only reference data for the workflow).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UnknownVariant;

/// Declared data type of an exam parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Numeric,
    Text,
    Boolean,
    /// Free text restricted to `select_options`
    Select,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Numeric => "numeric",
            DataType::Text => "text",
            DataType::Boolean => "boolean",
            DataType::Select => "select",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "numeric" => Ok(DataType::Numeric),
            "text" => Ok(DataType::Text),
            "boolean" => Ok(DataType::Boolean),
            "select" => Ok(DataType::Select),
            _ => Err(UnknownVariant::new("data type", s)),
        }
    }
}

/// A measurable parameter of an exam type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamParameter {
    /// Store ID (0 until persisted)
    pub id: i64,
    /// Owning exam type
    pub exam_type_id: i64,
    /// Short code, unique within the exam type (e.g., "HGB")
    pub code: String,
    /// Display name
    pub name: String,
    /// Unit of measure (e.g., "g/dL")
    pub unit: Option<String>,
    pub data_type: DataType,
    /// Lower bound of the normal interval
    pub reference_min: Option<f64>,
    /// Upper bound of the normal interval
    pub reference_max: Option<f64>,
    /// Human-readable reference (e.g., "Negative")
    pub reference_text: Option<String>,
    /// Allowed values for select parameters
    pub select_options: Vec<String>,
    /// Out-of-range values on this parameter are flagged critical
    pub is_critical: bool,
    /// A results batch must include this parameter
    pub is_required: bool,
    pub display_order: i32,
}

impl ExamParameter {
    /// Create a parameter with required fields.
    pub fn new(code: impl Into<String>, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: 0,
            exam_type_id: 0,
            code: code.into(),
            name: name.into(),
            unit: None,
            data_type,
            reference_min: None,
            reference_max: None,
            reference_text: None,
            select_options: Vec::new(),
            is_critical: false,
            is_required: true,
            display_order: 0,
        }
    }

    /// Create a numeric parameter with a reference interval.
    pub fn numeric(
        code: impl Into<String>,
        name: impl Into<String>,
        reference_min: Option<f64>,
        reference_max: Option<f64>,
    ) -> Self {
        let mut param = Self::new(code, name, DataType::Numeric);
        param.reference_min = reference_min;
        param.reference_max = reference_max;
        param
    }

    /// Check whether a select value is allowed.
    ///
    /// Parameters without declared options accept anything.
    pub fn accepts_option(&self, value: &str) -> bool {
        self.select_options.is_empty() || self.select_options.iter().any(|o| o == value)
    }
}

/// A type of exam offered by the laboratory, with its parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamType {
    /// Store ID (0 until persisted)
    pub id: i64,
    /// Unique catalog code (e.g., "HB")
    pub code: String,
    pub name: String,
    pub base_price: f64,
    /// Inactive exam types cannot be ordered
    pub is_active: bool,
    pub parameters: Vec<ExamParameter>,
}

impl ExamType {
    /// Create a new exam type with required fields.
    pub fn new(code: impl Into<String>, name: impl Into<String>, base_price: f64) -> Self {
        Self {
            id: 0,
            code: code.into(),
            name: name.into(),
            base_price,
            is_active: true,
            parameters: Vec::new(),
        }
    }

    /// Add a parameter definition.
    pub fn with_parameter(mut self, parameter: ExamParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Look up a parameter by store ID.
    pub fn parameter(&self, parameter_id: i64) -> Option<&ExamParameter> {
        self.parameters.iter().find(|p| p.id == parameter_id)
    }

    /// Look up a parameter by code.
    pub fn parameter_by_code(&self, code: &str) -> Option<&ExamParameter> {
        self.parameters.iter().find(|p| p.code == code)
    }

    /// Parameters every results batch must contain.
    pub fn required_parameters(&self) -> impl Iterator<Item = &ExamParameter> {
        self.parameters.iter().filter(|p| p.is_required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_round_trip_strings() {
        for dt in [
            DataType::Numeric,
            DataType::Text,
            DataType::Boolean,
            DataType::Select,
        ] {
            assert_eq!(dt.as_str().parse::<DataType>().unwrap(), dt);
        }
        assert!("decimal".parse::<DataType>().is_err());
    }

    #[test]
    fn test_select_options() {
        let mut param = ExamParameter::new("COL", "Color", DataType::Select);
        assert!(param.accepts_option("anything"));

        param.select_options = vec!["amarillo".into(), "ambar".into()];
        assert!(param.accepts_option("ambar"));
        assert!(!param.accepts_option("rojo"));
    }

    #[test]
    fn test_required_parameters() {
        let mut optional = ExamParameter::new("NOTE", "Observations", DataType::Text);
        optional.is_required = false;
        let exam_type = ExamType::new("HB", "Hemoglobin", 10.0)
            .with_parameter(ExamParameter::numeric("HGB", "Hemoglobin", Some(12.0), Some(16.0)))
            .with_parameter(optional);

        let required: Vec<_> = exam_type.required_parameters().map(|p| p.code.as_str()).collect();
        assert_eq!(required, vec!["HGB"]);
        assert!(exam_type.parameter_by_code("NOTE").is_some());
    }
}
