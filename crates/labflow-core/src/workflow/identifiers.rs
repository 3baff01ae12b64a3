//! Human-readable identifiers of the form `PREFIX-YYYYMMDD-NNNNNN`.

use chrono::NaiveDate;
use rusqlite::Connection;

use super::{WorkflowError, WorkflowResult};
use crate::config::SequenceStrategy;
use crate::db::sequences;

/// Where identifiers of one kind are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierTarget {
    pub prefix: String,
    /// Owning table, consulted by [`SequenceStrategy::CountExisting`]
    pub table: &'static str,
    pub column: &'static str,
}

impl IdentifierTarget {
    /// Order numbers.
    pub fn orders(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            table: "orders",
            column: "order_number",
        }
    }

    /// Payment receipt numbers.
    ///
    /// Payments are stored outside this database, so only
    /// [`SequenceStrategy::Counter`] can issue them.
    pub fn payments(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            table: "payments",
            column: "payment_number",
        }
    }

    /// Invoice numbers. Counter strategy only, as with [`IdentifierTarget::payments`].
    pub fn invoices(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            table: "invoices",
            column: "invoice_number",
        }
    }
}

/// Issues identifiers inside the caller's transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierGenerator {
    strategy: SequenceStrategy,
}

impl IdentifierGenerator {
    pub fn new(strategy: SequenceStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SequenceStrategy {
        self.strategy
    }

    /// Produce the next identifier for `target` on `scope_date`.
    ///
    /// Must run on the transaction that inserts the owning row.
    pub fn next(
        &self,
        conn: &Connection,
        target: &IdentifierTarget,
        scope_date: NaiveDate,
    ) -> WorkflowResult<String> {
        let prefix = &target.prefix;
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(WorkflowError::Validation(format!(
                "identifier prefix must be non-empty ASCII alphanumeric, got {:?}",
                prefix
            )));
        }

        let day = scope_date.format("%Y%m%d").to_string();
        let sequence = match self.strategy {
            SequenceStrategy::Counter => sequences::next_counter_value(conn, prefix, &day)?,
            SequenceStrategy::CountExisting => {
                let stem = format!("{}-{}-", prefix, day);
                sequences::count_with_stem(conn, target.table, target.column, &stem)? + 1
            }
        };

        Ok(format_identifier(prefix, scope_date, sequence))
    }
}

/// Render an identifier. Sequences are zero-padded to six digits.
pub fn format_identifier(prefix: &str, scope_date: NaiveDate, sequence: i64) -> String {
    format!("{}-{}-{:06}", prefix, scope_date.format("%Y%m%d"), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentifierConfig;
    use crate::db::Database;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn test_format_identifier() {
        assert_eq!(format_identifier("ORD", day(16), 1), "ORD-20261016-000001");
        assert_eq!(format_identifier("PAY", day(5), 123456), "PAY-20261005-123456");
    }

    #[test]
    fn test_counter_sequence() {
        let db = Database::open_in_memory().unwrap();
        let generator = IdentifierGenerator::default();
        let target = IdentifierTarget::orders("ORD");

        assert_eq!(generator.next(db.conn(), &target, day(16)).unwrap(), "ORD-20261016-000001");
        assert_eq!(generator.next(db.conn(), &target, day(16)).unwrap(), "ORD-20261016-000002");
        // New day, new sequence
        assert_eq!(generator.next(db.conn(), &target, day(17)).unwrap(), "ORD-20261017-000001");
    }

    #[test]
    fn test_count_existing_reads_stored_rows() {
        let db = Database::open_in_memory().unwrap();
        let generator = IdentifierGenerator::new(SequenceStrategy::CountExisting);
        let target = IdentifierTarget::orders("ORD");

        // Nothing stored: repeated calls return the same value
        assert_eq!(generator.next(db.conn(), &target, day(16)).unwrap(), "ORD-20261016-000001");
        assert_eq!(generator.next(db.conn(), &target, day(16)).unwrap(), "ORD-20261016-000001");

        db.conn()
            .execute_batch(
                r#"
                INSERT INTO patients (id, document_number, first_name, last_name, created_at)
                VALUES (1, 'V-1', 'Ana', 'Pérez', 't');
                INSERT INTO orders (order_number, patient_id, order_date, created_by, created_at, updated_at)
                VALUES ('ORD-20261016-000001', 1, 'd', 1, 't', 't');
                "#,
            )
            .unwrap();
        assert_eq!(generator.next(db.conn(), &target, day(16)).unwrap(), "ORD-20261016-000002");
    }

    #[test]
    fn test_billing_prefixes_have_own_sequences() {
        let db = Database::open_in_memory().unwrap();
        let generator = IdentifierGenerator::default();
        let config = IdentifierConfig::default();
        let orders = IdentifierTarget::orders(config.order_prefix.clone());
        let payments = IdentifierTarget::payments(config.payment_prefix.clone());
        let invoices = IdentifierTarget::invoices(config.invoice_prefix.clone());

        assert_eq!(generator.next(db.conn(), &orders, day(16)).unwrap(), "ORD-20261016-000001");
        assert_eq!(generator.next(db.conn(), &payments, day(16)).unwrap(), "PAY-20261016-000001");
        assert_eq!(generator.next(db.conn(), &payments, day(16)).unwrap(), "PAY-20261016-000002");
        assert_eq!(generator.next(db.conn(), &invoices, day(16)).unwrap(), "INV-20261016-000001");
        assert_eq!(generator.next(db.conn(), &orders, day(16)).unwrap(), "ORD-20261016-000002");
    }

    #[test]
    fn test_count_existing_needs_owning_table() {
        let db = Database::open_in_memory().unwrap();
        let generator = IdentifierGenerator::new(SequenceStrategy::CountExisting);
        let err = generator
            .next(db.conn(), &IdentifierTarget::payments("PAY"), day(16))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Persistence(_)), "{:?}", err);
    }

    #[test]
    fn test_invalid_prefix() {
        let db = Database::open_in_memory().unwrap();
        let generator = IdentifierGenerator::default();
        for prefix in ["", "OR-D", "ÓRD"] {
            let err = generator
                .next(db.conn(), &IdentifierTarget::orders(prefix), day(16))
                .unwrap_err();
            assert!(matches!(err, WorkflowError::Validation(_)), "{:?}", prefix);
        }
    }
}
