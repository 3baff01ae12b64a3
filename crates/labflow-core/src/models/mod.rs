//! Domain models for the labflow system.

mod catalog;
mod order;
mod order_exam;
mod patient;
mod result;

pub use catalog::*;
pub use order::*;
pub use order_exam::*;
pub use patient::*;
pub use result::*;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Identity of the user performing a mutation, as issued by the identity provider.
pub type ActorId = i64;

/// A string that does not name any variant of a closed enumeration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Format an audit timestamp.
///
/// Fixed microsecond precision keeps stored values lexicographically ordered.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Format the calendar-comparable order date (`YYYY-MM-DD HH:MM:SS`).
pub fn format_order_date(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
