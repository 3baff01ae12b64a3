//! Labflow Core Library
//!
//! Clinical laboratory order, exam and result workflow engine.
//!
//! # Architecture
//!
//! ```text
//!   create_order ──▶ Order Coordinator ──▶ Identifier Generator
//!                          │                 (PREFIX-YYYYMMDD-NNNNNN)
//!                          ▼
//!                 [order + exams: pending]
//!                          │
//!               collect_sample / begin_analysis
//!                          │
//!                          ▼
//!   submit_results ──▶ Result Pipeline ──▶ Abnormality Classifier (L/H/C)
//!                          │
//!                          ▼
//!                 [exam: completed] ──validate_results──▶ [exam: validated]
//! ```
//!
//! Exam statuses only move through [`workflow::state_machine`]. Every multi-step
//! operation is one SQLite transaction: it either commits entirely or leaves
//! the store untouched.
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence layer
//! - [`models`]: Domain types (Order, OrderExam, ExamResult, ExamType, etc.)
//! - [`workflow`]: Order coordinator, exam state machine, result pipeline
//! - [`config`]: TOML engine configuration

pub mod config;
pub mod db;
pub mod models;
pub mod workflow;

// Re-export commonly used types
pub use config::{EngineConfig, SequenceStrategy};
pub use db::Database;
pub use models::{
    ExamDetail, ExamResult, ExamStatus, ExamType, NewOrder, Order, OrderExam, OrderFilter,
    Patient, Priority, ResultSubmission,
};
pub use workflow::{
    ErrorKind, ExamWorkflow, OrderCoordinator, ResultPipeline, WorkflowError, WorkflowResult,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use models::{DateRange, ExamParameter, ExamRequest, OrderStatus, UnknownVariant};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum LabflowError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state transition: {0}")]
    StateTransition(String),
}

impl From<WorkflowError> for LabflowError {
    fn from(e: WorkflowError) -> Self {
        let message = e.to_string();
        match e.kind() {
            ErrorKind::Validation => LabflowError::InvalidInput(message),
            ErrorKind::NotFound => LabflowError::NotFound(message),
            ErrorKind::Persistence => LabflowError::DatabaseError(message),
            ErrorKind::StateTransition => LabflowError::StateTransition(message),
        }
    }
}

impl From<db::DbError> for LabflowError {
    fn from(e: db::DbError) -> Self {
        LabflowError::DatabaseError(e.to_string())
    }
}

impl From<config::ConfigError> for LabflowError {
    fn from(e: config::ConfigError) -> Self {
        LabflowError::InvalidInput(e.to_string())
    }
}

impl From<UnknownVariant> for LabflowError {
    fn from(e: UnknownVariant) -> Self {
        LabflowError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for LabflowError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        LabflowError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path with default settings.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<LabflowCore>, LabflowError> {
    let db = Database::open(&path)?;
    Ok(LabflowCore::wrap(db, EngineConfig::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<LabflowCore>, LabflowError> {
    let db = Database::open_in_memory()?;
    Ok(LabflowCore::wrap(db, EngineConfig::default()))
}

/// Open the database described by a TOML configuration document.
#[uniffi::export]
pub fn open_database_with_config(config_toml: String) -> Result<Arc<LabflowCore>, LabflowError> {
    let config = EngineConfig::from_toml_str(&config_toml)?;
    let db = Database::open_with_config(&config.database)?;
    Ok(LabflowCore::wrap(db, config))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe engine wrapper for FFI.
///
/// Calls are serialized through one connection.
#[derive(uniffi::Object)]
pub struct LabflowCore {
    db: Arc<Mutex<Database>>,
    config: EngineConfig,
}

impl LabflowCore {
    fn wrap(db: Database, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }
}

#[uniffi::export]
impl LabflowCore {
    // =========================================================================
    // Catalog and Patient Operations
    // =========================================================================

    /// Register a patient.
    pub fn register_patient(
        &self,
        document_number: String,
        first_name: String,
        last_name: String,
    ) -> Result<FfiPatient, LabflowError> {
        let db = self.db.lock()?;
        let patient = db.insert_patient(&Patient::new(document_number, first_name, last_name))?;
        Ok(patient.into())
    }

    /// Add or update an exam type and its parameters.
    pub fn upsert_exam_type(&self, exam_type: FfiExamType) -> Result<FfiExamType, LabflowError> {
        let db = self.db.lock()?;
        let exam_type = ExamType::try_from(exam_type)?;
        let stored = db.upsert_exam_type(&exam_type)?;
        Ok(stored.into())
    }

    /// Get an exam type by ID.
    pub fn get_exam_type(&self, exam_type_id: i64) -> Result<Option<FfiExamType>, LabflowError> {
        let db = self.db.lock()?;
        let exam_type = db.get_exam_type(exam_type_id)?;
        Ok(exam_type.map(|t| t.into()))
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    /// Create an order with its exams.
    pub fn create_order(&self, order: FfiNewOrder, actor_id: i64) -> Result<FfiOrder, LabflowError> {
        let db = self.db.lock()?;
        let request = NewOrder::try_from(order)?;
        let order = OrderCoordinator::new(&db, &self.config.identifiers).create_order(request, actor_id)?;
        Ok(order.into())
    }

    /// List orders, most recent first.
    pub fn list_orders(&self, filter: FfiOrderFilter) -> Result<Vec<FfiOrder>, LabflowError> {
        let db = self.db.lock()?;
        let filter = OrderFilter::try_from(filter)?;
        let orders = OrderCoordinator::new(&db, &self.config.identifiers).list_orders(&filter)?;
        Ok(orders.into_iter().map(|o| o.into()).collect())
    }

    /// Get an order with its exams.
    pub fn get_order(&self, order_id: i64) -> Result<FfiOrder, LabflowError> {
        let db = self.db.lock()?;
        let order = OrderCoordinator::new(&db, &self.config.identifiers).get_order(order_id)?;
        Ok(order.into())
    }

    /// Cancel a pending order.
    pub fn cancel_order(
        &self,
        order_id: i64,
        actor_id: i64,
        reason: String,
    ) -> Result<FfiOrder, LabflowError> {
        let db = self.db.lock()?;
        let order = OrderCoordinator::new(&db, &self.config.identifiers)
            .cancel_order(order_id, actor_id, &reason)?;
        Ok(order.into())
    }

    // =========================================================================
    // Exam Operations
    // =========================================================================

    /// Record sample collection.
    pub fn collect_sample(
        &self,
        order_exam_id: i64,
        actor_id: i64,
        barcode: Option<String>,
    ) -> Result<FfiOrderExam, LabflowError> {
        let db = self.db.lock()?;
        let exam = ExamWorkflow::new(&db).collect_sample(order_exam_id, actor_id, barcode)?;
        Ok(exam.into())
    }

    /// Start analysis of a collected sample.
    pub fn begin_analysis(
        &self,
        order_exam_id: i64,
        actor_id: i64,
    ) -> Result<FfiOrderExam, LabflowError> {
        let db = self.db.lock()?;
        let exam = ExamWorkflow::new(&db).begin_analysis(order_exam_id, actor_id)?;
        Ok(exam.into())
    }

    /// Reject an exam before analysis.
    pub fn reject_exam(
        &self,
        order_exam_id: i64,
        actor_id: i64,
        reason: String,
    ) -> Result<FfiOrderExam, LabflowError> {
        let db = self.db.lock()?;
        let exam = ExamWorkflow::new(&db).reject_exam(order_exam_id, actor_id, &reason)?;
        Ok(exam.into())
    }

    /// Get an exam with its type and current results.
    pub fn get_order_exam(&self, order_exam_id: i64) -> Result<FfiExamDetail, LabflowError> {
        let db = self.db.lock()?;
        let detail = ExamWorkflow::new(&db).get_order_exam(order_exam_id)?;
        Ok(detail.into())
    }

    // =========================================================================
    // Result Operations
    // =========================================================================

    /// Record a batch of results and complete the exam.
    pub fn submit_results(
        &self,
        order_exam_id: i64,
        actor_id: i64,
        results: Vec<FfiResultSubmission>,
    ) -> Result<FfiExamDetail, LabflowError> {
        let db = self.db.lock()?;
        let submissions: Vec<ResultSubmission> = results.into_iter().map(|r| r.into()).collect();
        let detail = ResultPipeline::new(&db).submit_results(order_exam_id, actor_id, &submissions)?;
        Ok(detail.into())
    }

    /// Validate a completed exam.
    pub fn validate_results(
        &self,
        order_exam_id: i64,
        actor_id: i64,
    ) -> Result<FfiExamDetail, LabflowError> {
        let db = self.db.lock()?;
        let detail = ResultPipeline::new(&db).validate_results(order_exam_id, actor_id)?;
        Ok(detail.into())
    }

    /// Supersede a current result with a corrected value.
    pub fn correct_result(
        &self,
        result_id: i64,
        actor_id: i64,
        value: FfiResultSubmission,
    ) -> Result<FfiExamResult, LabflowError> {
        let db = self.db.lock()?;
        let corrected = ResultPipeline::new(&db).correct_result(result_id, actor_id, &value.into())?;
        Ok(corrected.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: i64,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            document_number: patient.document_number,
            first_name: patient.first_name,
            last_name: patient.last_name,
            is_active: patient.is_active,
        }
    }
}

/// FFI-safe exam parameter.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExamParameter {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub unit: Option<String>,
    /// "numeric", "text", "boolean" or "select"
    pub data_type: String,
    pub reference_min: Option<f64>,
    pub reference_max: Option<f64>,
    pub reference_text: Option<String>,
    pub select_options: Vec<String>,
    pub is_critical: bool,
    pub is_required: bool,
    pub display_order: i32,
}

impl From<ExamParameter> for FfiExamParameter {
    fn from(param: ExamParameter) -> Self {
        Self {
            id: param.id,
            code: param.code,
            name: param.name,
            unit: param.unit,
            data_type: param.data_type.as_str().to_string(),
            reference_min: param.reference_min,
            reference_max: param.reference_max,
            reference_text: param.reference_text,
            select_options: param.select_options,
            is_critical: param.is_critical,
            is_required: param.is_required,
            display_order: param.display_order,
        }
    }
}

impl TryFrom<FfiExamParameter> for ExamParameter {
    type Error = LabflowError;

    fn try_from(param: FfiExamParameter) -> Result<Self, Self::Error> {
        let mut parameter = ExamParameter::new(param.code, param.name, param.data_type.parse()?);
        parameter.id = param.id;
        parameter.unit = param.unit;
        parameter.reference_min = param.reference_min;
        parameter.reference_max = param.reference_max;
        parameter.reference_text = param.reference_text;
        parameter.select_options = param.select_options;
        parameter.is_critical = param.is_critical;
        parameter.is_required = param.is_required;
        parameter.display_order = param.display_order;
        Ok(parameter)
    }
}

/// FFI-safe exam type.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExamType {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub base_price: f64,
    pub is_active: bool,
    pub parameters: Vec<FfiExamParameter>,
}

impl From<ExamType> for FfiExamType {
    fn from(exam_type: ExamType) -> Self {
        Self {
            id: exam_type.id,
            code: exam_type.code,
            name: exam_type.name,
            base_price: exam_type.base_price,
            is_active: exam_type.is_active,
            parameters: exam_type.parameters.into_iter().map(|p| p.into()).collect(),
        }
    }
}

impl TryFrom<FfiExamType> for ExamType {
    type Error = LabflowError;

    fn try_from(exam_type: FfiExamType) -> Result<Self, Self::Error> {
        let parameters = exam_type
            .parameters
            .into_iter()
            .map(ExamParameter::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExamType {
            id: exam_type.id,
            code: exam_type.code,
            name: exam_type.name,
            base_price: exam_type.base_price,
            is_active: exam_type.is_active,
            parameters,
        })
    }
}

/// FFI-safe exam line of a new order.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExamRequest {
    pub exam_type_id: i64,
    pub price: f64,
    pub discount: f64,
}

/// FFI-safe order request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewOrder {
    pub patient_id: i64,
    /// "normal", "urgent" or "stat"
    pub priority: String,
    pub referring_doctor: Option<String>,
    pub diagnosis: Option<String>,
    pub clinical_notes: Option<String>,
    pub exams: Vec<FfiExamRequest>,
}

impl TryFrom<FfiNewOrder> for NewOrder {
    type Error = LabflowError;

    fn try_from(order: FfiNewOrder) -> Result<Self, Self::Error> {
        Ok(NewOrder {
            patient_id: order.patient_id,
            priority: order.priority.parse()?,
            referring_doctor: order.referring_doctor,
            diagnosis: order.diagnosis,
            clinical_notes: order.clinical_notes,
            exams: order
                .exams
                .into_iter()
                .map(|e| ExamRequest {
                    exam_type_id: e.exam_type_id,
                    price: e.price,
                    discount: e.discount,
                })
                .collect(),
        })
    }
}

/// FFI-safe order filter. Dates are `YYYY-MM-DD`; the range applies only when both
/// ends are given.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiOrderFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub patient_id: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl TryFrom<FfiOrderFilter> for OrderFilter {
    type Error = LabflowError;

    fn try_from(filter: FfiOrderFilter) -> Result<Self, Self::Error> {
        let start = filter.start_date.as_deref().map(parse_date).transpose()?;
        let end = filter.end_date.as_deref().map(parse_date).transpose()?;
        // A half-open range places no constraint
        let date_range = match (start, end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            _ => None,
        };
        Ok(OrderFilter {
            status: filter.status.map(|s| s.parse::<OrderStatus>()).transpose()?,
            priority: filter.priority.map(|p| p.parse::<Priority>()).transpose()?,
            patient_id: filter.patient_id,
            date_range,
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, LabflowError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| LabflowError::InvalidInput(format!("invalid date {:?}: {}", s, e)))
}

/// FFI-safe ordered exam.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOrderExam {
    pub id: i64,
    pub order_id: i64,
    pub exam_type_id: i64,
    pub status: String,
    pub sample_collected_at: Option<String>,
    pub sample_barcode: Option<String>,
    pub analyzed_at: Option<String>,
    pub validated_at: Option<String>,
    pub validated_by: Option<i64>,
    pub price: f64,
    pub discount: f64,
    pub final_price: f64,
    pub rejection_reason: Option<String>,
}

impl From<OrderExam> for FfiOrderExam {
    fn from(exam: OrderExam) -> Self {
        Self {
            id: exam.id,
            order_id: exam.order_id,
            exam_type_id: exam.exam_type_id,
            status: exam.status.as_str().to_string(),
            sample_collected_at: exam.sample_collected_at,
            sample_barcode: exam.sample_barcode,
            analyzed_at: exam.analyzed_at,
            validated_at: exam.validated_at,
            validated_by: exam.validated_by,
            price: exam.price,
            discount: exam.discount,
            final_price: exam.final_price,
            rejection_reason: exam.rejection_reason,
        }
    }
}

/// FFI-safe order.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOrder {
    pub id: i64,
    pub order_number: String,
    pub patient_id: i64,
    pub order_date: String,
    pub status: String,
    pub priority: String,
    pub referring_doctor: Option<String>,
    pub diagnosis: Option<String>,
    pub created_by: i64,
    pub cancellation_reason: Option<String>,
    pub created_at: String,
    pub exams: Vec<FfiOrderExam>,
}

impl From<Order> for FfiOrder {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            patient_id: order.patient_id,
            order_date: order.order_date,
            status: order.status.as_str().to_string(),
            priority: order.priority.as_str().to_string(),
            referring_doctor: order.referring_doctor,
            diagnosis: order.diagnosis,
            created_by: order.created_by,
            cancellation_reason: order.cancellation_reason,
            created_at: order.created_at,
            exams: order.exams.into_iter().map(|e| e.into()).collect(),
        }
    }
}

/// FFI-safe result submission. Set the slot matching the parameter's data type.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiResultSubmission {
    pub parameter_id: i64,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub value_boolean: Option<bool>,
    pub technician_notes: Option<String>,
}

impl From<FfiResultSubmission> for ResultSubmission {
    fn from(sub: FfiResultSubmission) -> Self {
        ResultSubmission {
            parameter_id: sub.parameter_id,
            value_numeric: sub.value_numeric,
            value_text: sub.value_text,
            value_boolean: sub.value_boolean,
            technician_notes: sub.technician_notes,
        }
    }
}

/// FFI-safe recorded result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExamResult {
    pub id: i64,
    pub order_exam_id: i64,
    pub parameter_id: i64,
    pub display_value: String,
    pub value_numeric: Option<f64>,
    pub is_abnormal: bool,
    /// "none", "low", "high" or "abnormal"
    pub abnormality: String,
    pub is_critical: bool,
    pub flags: String,
    pub entered_by: i64,
    pub validated_by: Option<i64>,
    pub version: u32,
    pub is_current: bool,
}

impl From<ExamResult> for FfiExamResult {
    fn from(result: ExamResult) -> Self {
        Self {
            id: result.id,
            order_exam_id: result.order_exam_id,
            parameter_id: result.parameter_id,
            display_value: result.value.display_value(),
            value_numeric: result.value.as_numeric(),
            is_abnormal: result.is_abnormal,
            abnormality: result.abnormality.as_str().to_string(),
            is_critical: result.is_critical,
            flags: result.flags,
            entered_by: result.entered_by,
            validated_by: result.validated_by,
            version: result.version,
            is_current: result.is_current,
        }
    }
}

/// FFI-safe exam detail.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExamDetail {
    pub exam: FfiOrderExam,
    pub exam_type: FfiExamType,
    pub results: Vec<FfiExamResult>,
}

impl From<ExamDetail> for FfiExamDetail {
    fn from(detail: ExamDetail) -> Self {
        Self {
            exam: detail.exam.into(),
            exam_type: detail.exam_type.into(),
            results: detail.results.into_iter().map(|r| r.into()).collect(),
        }
    }
}
