//! Patient models.

use serde::{Deserialize, Serialize};

/// A laboratory patient. The workflow only needs existence and activeness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Store ID (0 until persisted)
    pub id: i64,
    /// National ID / passport number
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    /// Inactive patients cannot receive new orders
    pub is_active: bool,
    pub created_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(
        document_number: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            document_number: document_number.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            is_active: true,
            created_at: super::format_timestamp(&chrono::Utc::now()),
        }
    }
}
