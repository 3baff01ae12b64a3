//! Abnormality classification of result values.
//!
//! Only numeric values on numeric parameters are classified. Everything else is
//! recorded as normal.

use serde::{Deserialize, Serialize};

use crate::models::{AbnormalityDirection, DataType, ExamParameter, ResultValue};

/// Derived abnormality fields of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub is_abnormal: bool,
    pub direction: AbnormalityDirection,
    pub is_critical: bool,
    /// "L" or "H", followed by "C" when critical
    pub flags: String,
}

impl Classification {
    pub fn normal() -> Self {
        Self {
            is_abnormal: false,
            direction: AbnormalityDirection::None,
            is_critical: false,
            flags: String::new(),
        }
    }

    fn out_of_range(direction: AbnormalityDirection, critical: bool) -> Self {
        let mut flags = match direction {
            AbnormalityDirection::Low => "L",
            AbnormalityDirection::High => "H",
            _ => "",
        }
        .to_string();
        if critical {
            flags.push('C');
        }
        Self {
            is_abnormal: true,
            direction,
            is_critical: critical,
            flags,
        }
    }
}

/// Classify a value against the parameter's reference interval.
///
/// The reference interval is inclusive: a value equal to `reference_min` or
/// `reference_max` is normal. The lower bound is checked first.
pub fn classify(value: &ResultValue, parameter: &ExamParameter) -> Classification {
    let v = match (parameter.data_type, value) {
        (DataType::Numeric, ResultValue::Numeric(v)) => *v,
        _ => return Classification::normal(),
    };

    if matches!(parameter.reference_min, Some(min) if v < min) {
        Classification::out_of_range(AbnormalityDirection::Low, parameter.is_critical)
    } else if matches!(parameter.reference_max, Some(max) if v > max) {
        Classification::out_of_range(AbnormalityDirection::High, parameter.is_critical)
    } else {
        Classification::normal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hemoglobin() -> ExamParameter {
        ExamParameter::numeric("HGB", "Hemoglobin", Some(12.0), Some(16.0))
    }

    #[test]
    fn test_low_value() {
        let c = classify(&ResultValue::Numeric(9.5), &hemoglobin());
        assert!(c.is_abnormal);
        assert_eq!(c.direction, AbnormalityDirection::Low);
        assert_eq!(c.flags, "L");
        assert!(!c.is_critical);
    }

    #[test]
    fn test_bounds_are_normal() {
        assert_eq!(classify(&ResultValue::Numeric(12.0), &hemoglobin()), Classification::normal());
        assert_eq!(classify(&ResultValue::Numeric(16.0), &hemoglobin()), Classification::normal());
    }

    #[test]
    fn test_critical_high() {
        let mut param = hemoglobin();
        param.is_critical = true;
        let c = classify(&ResultValue::Numeric(21.0), &param);
        assert_eq!(c.direction, AbnormalityDirection::High);
        assert!(c.is_critical);
        assert_eq!(c.flags, "HC");
    }

    #[test]
    fn test_open_ended_intervals() {
        let min_only = ExamParameter::numeric("FE", "Iron", Some(60.0), None);
        assert_eq!(classify(&ResultValue::Numeric(1e9), &min_only), Classification::normal());
        assert_eq!(classify(&ResultValue::Numeric(10.0), &min_only).flags, "L");

        let no_range = ExamParameter::numeric("X", "Unbounded", None, None);
        assert_eq!(classify(&ResultValue::Numeric(-5.0), &no_range), Classification::normal());
    }

    #[test]
    fn test_non_numeric_always_normal() {
        let mut text = ExamParameter::new("OBS", "Observation", DataType::Text);
        text.reference_min = Some(1.0);
        text.is_critical = true;
        assert_eq!(classify(&ResultValue::Text("0".into()), &text), Classification::normal());

        let flag = ExamParameter::new("HIV", "HIV", DataType::Boolean);
        assert_eq!(classify(&ResultValue::Boolean(true), &flag), Classification::normal());

        // Numeric value stored against a non-numeric parameter
        assert_eq!(classify(&ResultValue::Numeric(-1.0), &text), Classification::normal());
    }

    proptest! {
        #[test]
        fn prop_below_min_is_low(min in -1e6f64..1e6, delta in 1e-3f64..1e6, max_gap in 0f64..1e6) {
            let param = ExamParameter::numeric("P", "P", Some(min), Some(min + max_gap));
            let c = classify(&ResultValue::Numeric(min - delta), &param);
            prop_assert!(c.is_abnormal);
            prop_assert_eq!(c.direction, AbnormalityDirection::Low);
            prop_assert_eq!(c.flags, "L");
        }

        #[test]
        fn prop_above_max_is_high(min in -1e6f64..1e6, max_gap in 0f64..1e6, delta in 1e-3f64..1e6) {
            let max = min + max_gap;
            let param = ExamParameter::numeric("P", "P", Some(min), Some(max));
            let c = classify(&ResultValue::Numeric(max + delta), &param);
            prop_assert!(c.is_abnormal);
            prop_assert_eq!(c.direction, AbnormalityDirection::High);
            prop_assert_eq!(c.flags, "H");
        }

        #[test]
        fn prop_within_range_is_normal(min in -1e6f64..1e6, max_gap in 0f64..1e6, t in 0f64..=1.0) {
            let max = min + max_gap;
            let value = (min + max_gap * t).clamp(min, max);
            let param = ExamParameter::numeric("P", "P", Some(min), Some(max));
            prop_assert_eq!(classify(&ResultValue::Numeric(value), &param), Classification::normal());
        }

        #[test]
        fn prop_critical_iff_abnormal_on_critical_parameter(
            value in -1e3f64..1e3,
            critical in any::<bool>(),
        ) {
            let mut param = ExamParameter::numeric("P", "P", Some(-10.0), Some(10.0));
            param.is_critical = critical;
            let c = classify(&ResultValue::Numeric(value), &param);
            prop_assert_eq!(c.is_critical, critical && c.is_abnormal);
            prop_assert_eq!(c.flags.ends_with('C'), c.is_critical);
            prop_assert_eq!(c.is_abnormal, !(-10.0..=10.0).contains(&value));
        }
    }
}
