//! Column family layout for the `RocksDB` database.

/// Column family names.
pub mod cf {
    /// Catalog cards, keyed by `card_id`.
    pub const CARDS: &str = "cards";

    /// Index: card id by feed external id, keyed by big-endian `external_id`.
    /// Value is the 16-byte `card_id`.
    pub const CARDS_BY_EXTERNAL: &str = "cards_by_external";

    /// User card registrations, keyed by `user_id || card_id`.
    pub const USER_CARDS: &str = "user_cards";

    /// Performance rows, keyed by `user_id || card_id`.
    pub const PERFORMANCES: &str = "performances";

    /// Append-only benefit usage rows, keyed by
    /// `user_id || card_id || kind || usage_id`. The scope prefix makes the
    /// per-kind running sum a single prefix scan.
    pub const BENEFIT_USAGES: &str = "benefit_usages";

    /// Expense records, keyed by `user_id || expense_id` (ULID-ordered).
    pub const EXPENSES: &str = "expenses";

    /// Idempotency index, keyed by the ingestion fingerprint. Value is
    /// `user_id || expense_id` (32 bytes) pointing at the record created
    /// for that delivery.
    pub const EXPENSE_FINGERPRINTS: &str = "expense_fingerprints";

    /// Lease lock keys with embedded owner token and expiry.
    pub const LEASES: &str = "leases";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::CARDS,
        cf::CARDS_BY_EXTERNAL,
        cf::USER_CARDS,
        cf::PERFORMANCES,
        cf::BENEFIT_USAGES,
        cf::EXPENSES,
        cf::EXPENSE_FINGERPRINTS,
        cf::LEASES,
    ]
}
