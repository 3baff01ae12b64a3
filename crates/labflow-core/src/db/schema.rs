//! SQLite schema definition.

/// Complete database schema for labflow.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_number TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

-- ============================================================================
-- Exam Catalog (reference data, read-only to the workflow)
-- ============================================================================

CREATE TABLE IF NOT EXISTS exam_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    base_price REAL NOT NULL CHECK (base_price > 0),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS exam_parameters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exam_type_id INTEGER NOT NULL REFERENCES exam_types(id),
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    unit TEXT,
    data_type TEXT NOT NULL CHECK (data_type IN ('numeric', 'text', 'boolean', 'select')),
    reference_min REAL,
    reference_max REAL,
    reference_text TEXT,
    select_options TEXT NOT NULL DEFAULT '[]',    -- JSON array of strings
    is_critical INTEGER NOT NULL DEFAULT 0,
    is_required INTEGER NOT NULL DEFAULT 1,
    display_order INTEGER NOT NULL DEFAULT 0,
    UNIQUE (exam_type_id, code)
);

CREATE INDEX IF NOT EXISTS idx_parameters_exam_type ON exam_parameters(exam_type_id);

-- ============================================================================
-- Orders
-- ============================================================================

CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_number TEXT NOT NULL UNIQUE,            -- PREFIX-YYYYMMDD-NNNNNN
    patient_id INTEGER NOT NULL REFERENCES patients(id),
    order_date TEXT NOT NULL,                     -- YYYY-MM-DD HH:MM:SS (UTC)
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'completed', 'cancelled')),
    priority TEXT NOT NULL DEFAULT 'normal'
        CHECK (priority IN ('normal', 'urgent', 'stat')),
    referring_doctor TEXT,
    diagnosis TEXT,
    clinical_notes TEXT,
    subtotal REAL NOT NULL DEFAULT 0,
    discount_amount REAL NOT NULL DEFAULT 0,
    tax_amount REAL NOT NULL DEFAULT 0,
    total_amount REAL NOT NULL DEFAULT 0,
    created_by INTEGER NOT NULL,
    cancelled_at TEXT,
    cancelled_by INTEGER,
    cancellation_reason TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
CREATE INDEX IF NOT EXISTS idx_orders_patient ON orders(patient_id);
CREATE INDEX IF NOT EXISTS idx_orders_order_date ON orders(order_date);
CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at);

-- Order numbers are assigned once
CREATE TRIGGER IF NOT EXISTS orders_number_immutable BEFORE UPDATE OF order_number ON orders
WHEN new.order_number <> old.order_number
BEGIN
    SELECT RAISE(ABORT, 'order_number is immutable');
END;

-- ============================================================================
-- Ordered Exams
-- ============================================================================

CREATE TABLE IF NOT EXISTS order_exams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id INTEGER NOT NULL REFERENCES orders(id),
    exam_type_id INTEGER NOT NULL REFERENCES exam_types(id),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'sample_collected', 'in_analysis',
                          'completed', 'validated', 'rejected')),
    sample_collected_at TEXT,
    sample_collected_by INTEGER,
    sample_barcode TEXT,
    analyzed_at TEXT,
    analyzed_by INTEGER,
    validated_at TEXT,
    validated_by INTEGER,
    price REAL NOT NULL CHECK (price > 0),
    discount REAL NOT NULL DEFAULT 0,
    final_price REAL NOT NULL,
    notes TEXT,
    rejection_reason TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_order_exams_order ON order_exams(order_id);
CREATE INDEX IF NOT EXISTS idx_order_exams_status ON order_exams(status);

-- ============================================================================
-- Exam Results (corrections supersede, never overwrite)
-- ============================================================================

CREATE TABLE IF NOT EXISTS exam_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_exam_id INTEGER NOT NULL REFERENCES order_exams(id),
    parameter_id INTEGER NOT NULL REFERENCES exam_parameters(id),
    value_numeric REAL,
    value_text TEXT,
    value_boolean INTEGER,
    is_abnormal INTEGER NOT NULL DEFAULT 0,
    abnormality TEXT NOT NULL DEFAULT 'none'
        CHECK (abnormality IN ('none', 'low', 'high', 'abnormal')),
    is_critical INTEGER NOT NULL DEFAULT 0,
    flags TEXT NOT NULL DEFAULT '',
    technician_notes TEXT,
    version INTEGER NOT NULL DEFAULT 1,
    is_current INTEGER NOT NULL DEFAULT 1,
    entered_by INTEGER NOT NULL,
    entered_at TEXT NOT NULL,
    validated_by INTEGER,
    validated_at TEXT,
    CHECK ((value_numeric IS NOT NULL) + (value_text IS NOT NULL) + (value_boolean IS NOT NULL) = 1)
);

CREATE INDEX IF NOT EXISTS idx_results_order_exam ON exam_results(order_exam_id);

-- At most one current value per parameter of an exam
CREATE UNIQUE INDEX IF NOT EXISTS idx_results_current
    ON exam_results(order_exam_id, parameter_id) WHERE is_current = 1;

-- ============================================================================
-- Identifier Sequences
-- ============================================================================

CREATE TABLE IF NOT EXISTS identifier_sequences (
    prefix TEXT NOT NULL,
    scope_date TEXT NOT NULL,                     -- YYYYMMDD
    last_value INTEGER NOT NULL,
    PRIMARY KEY (prefix, scope_date)
);
"#;
