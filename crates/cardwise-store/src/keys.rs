//! Key encoding for the `RocksDB` column families.
//!
//! Composite keys concatenate fixed-width components so prefix scans line up
//! with the access patterns: all ledger reads are either point lookups or
//! scans over a `(user, card[, kind])` prefix.

use cardwise_core::{BenefitKind, CardId, ExpenseId, UsageId, UserId};

/// Card key: `card_id` (16 bytes).
#[must_use]
pub fn card_key(card_id: &CardId) -> Vec<u8> {
    card_id.as_bytes().to_vec()
}

/// External-id index key: big-endian `external_id` (8 bytes).
#[must_use]
pub fn card_external_key(external_id: i64) -> Vec<u8> {
    external_id.to_be_bytes().to_vec()
}

/// User card key: `user_id || card_id` (32 bytes).
#[must_use]
pub fn user_card_key(user_id: &UserId, card_id: &CardId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(card_id.as_bytes());
    key
}

/// Prefix for all of a user's card registrations.
#[must_use]
pub fn user_cards_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Performance key: `user_id || card_id` (32 bytes).
#[must_use]
pub fn performance_key(user_id: &UserId, card_id: &CardId) -> Vec<u8> {
    user_card_key(user_id, card_id)
}

/// Usage row key: `user_id || card_id || kind || usage_id` (49 bytes).
///
/// ULID ordering keeps rows within a scope chronological.
#[must_use]
pub fn usage_key(
    user_id: &UserId,
    card_id: &CardId,
    kind: BenefitKind,
    usage_id: &UsageId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(49);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(card_id.as_bytes());
    key.push(kind.code());
    key.extend_from_slice(&usage_id.to_bytes());
    key
}

/// Prefix for all usage rows in a `(user, card, kind)` scope.
#[must_use]
pub fn usage_scope_prefix(user_id: &UserId, card_id: &CardId, kind: BenefitKind) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(card_id.as_bytes());
    key.push(kind.code());
    key
}

/// Expense key: `user_id || expense_id` (32 bytes).
#[must_use]
pub fn expense_key(user_id: &UserId, expense_id: &ExpenseId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&expense_id.to_bytes());
    key
}

/// Prefix for all of a user's expenses.
#[must_use]
pub fn user_expenses_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Fingerprint index key: the raw ingestion fingerprint bytes.
#[must_use]
pub fn fingerprint_key(fingerprint: &str) -> Vec<u8> {
    fingerprint.as_bytes().to_vec()
}

/// Lease key: the raw lock key bytes.
#[must_use]
pub fn lease_key(lock_key: &str) -> Vec<u8> {
    lock_key.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_key_widths() {
        let user = UserId::generate();
        let card = CardId::generate();
        let usage = UsageId::generate();

        assert_eq!(user_card_key(&user, &card).len(), 32);
        assert_eq!(
            usage_key(&user, &card, BenefitKind::Point, &usage).len(),
            49
        );
        assert_eq!(usage_scope_prefix(&user, &card, BenefitKind::Point).len(), 33);
    }

    #[test]
    fn usage_key_starts_with_scope_prefix() {
        let user = UserId::generate();
        let card = CardId::generate();
        let usage = UsageId::generate();

        let key = usage_key(&user, &card, BenefitKind::Cashback, &usage);
        let prefix = usage_scope_prefix(&user, &card, BenefitKind::Cashback);
        assert!(key.starts_with(&prefix));

        let other = usage_scope_prefix(&user, &card, BenefitKind::Discount);
        assert!(!key.starts_with(&other));
    }

    #[test]
    fn external_key_orders_by_id() {
        assert!(card_external_key(1) < card_external_key(2));
        assert!(card_external_key(2) < card_external_key(300));
    }
}
