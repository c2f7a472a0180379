//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use cardwise_core::{
    BenefitKind, BenefitUsage, Card, CardId, CardPerformance, Expense, ExpenseId, UserCard, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::lease::RocksLeaseLock;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// A lease lock sharing this store's database (the `leases` column
    /// family is the shared key space the coordinator spins on).
    #[must_use]
    pub fn lease_lock(&self) -> RocksLeaseLock {
        RocksLeaseLock::new(Arc::clone(&self.db))
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_raw(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Collect all keys under `prefix` in a column family, in key order.
    fn prefix_keys(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));

        let mut rows = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    fn put_card(&self, card: &Card) -> Result<()> {
        let cf_cards = self.cf(cf::CARDS)?;
        let cf_external = self.cf(cf::CARDS_BY_EXTERNAL)?;

        let value = Self::serialize(card)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_cards, keys::card_key(&card.id), &value);
        batch.put_cf(
            &cf_external,
            keys::card_external_key(card.external_id),
            card.id.as_bytes(),
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn get_card(&self, card_id: &CardId) -> Result<Option<Card>> {
        self.get_raw(cf::CARDS, &keys::card_key(card_id))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_card_by_external(&self, external_id: i64) -> Result<Option<Card>> {
        let Some(id_bytes) = self.get_raw(cf::CARDS_BY_EXTERNAL, &keys::card_external_key(external_id))?
        else {
            return Ok(None);
        };

        let mut bytes = [0u8; 16];
        if id_bytes.len() != 16 {
            return Err(StoreError::Serialization(
                "malformed card id in external index".into(),
            ));
        }
        bytes.copy_from_slice(&id_bytes);
        let card_id = CardId::from_uuid(uuid_from_bytes(bytes));

        self.get_card(&card_id)
    }

    fn list_cards(&self) -> Result<Vec<Card>> {
        let cf = self.cf(cf::CARDS)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);

        let mut cards = Vec::new();
        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            cards.push(Self::deserialize(&value)?);
        }
        Ok(cards)
    }

    // =========================================================================
    // User Card Operations
    // =========================================================================

    fn put_user_card(&self, user_card: &UserCard) -> Result<()> {
        let cf = self.cf(cf::USER_CARDS)?;
        let key = keys::user_card_key(&user_card.user_id, &user_card.card_id);
        let value = Self::serialize(user_card)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn get_user_card(&self, user_id: &UserId, card_id: &CardId) -> Result<Option<UserCard>> {
        self.get_raw(cf::USER_CARDS, &keys::user_card_key(user_id, card_id))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_user_cards(&self, user_id: &UserId) -> Result<Vec<UserCard>> {
        let rows = self.prefix_keys(cf::USER_CARDS, &keys::user_cards_prefix(user_id))?;
        rows.iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    // =========================================================================
    // Performance Ledger
    // =========================================================================

    fn get_performance(
        &self,
        user_id: &UserId,
        card_id: &CardId,
    ) -> Result<Option<CardPerformance>> {
        self.get_raw(cf::PERFORMANCES, &keys::performance_key(user_id, card_id))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_performance(&self, performance: &CardPerformance) -> Result<()> {
        let cf = self.cf(cf::PERFORMANCES)?;
        let key = keys::performance_key(&performance.user_id, &performance.card_id);
        let value = Self::serialize(performance)?;

        // Single-row replace: both currentAmount and the achieved flag land
        // in one write, so no partial state is observable.
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    // =========================================================================
    // Benefit Usage Ledger (append-only)
    // =========================================================================

    fn append_usage(&self, usage: &BenefitUsage) -> Result<()> {
        let cf = self.cf(cf::BENEFIT_USAGES)?;
        let key = keys::usage_key(&usage.user_id, &usage.card_id, usage.kind, &usage.id);
        let value = Self::serialize(usage)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn sum_usage(&self, user_id: &UserId, card_id: &CardId, kind: BenefitKind) -> Result<i64> {
        let rows = self.prefix_keys(
            cf::BENEFIT_USAGES,
            &keys::usage_scope_prefix(user_id, card_id, kind),
        )?;

        let mut sum = 0i64;
        for (_, value) in rows {
            let usage: BenefitUsage = Self::deserialize(&value)?;
            sum = sum.saturating_add(usage.used_amount);
        }
        Ok(sum)
    }

    fn list_usage(
        &self,
        user_id: &UserId,
        card_id: &CardId,
        kind: BenefitKind,
    ) -> Result<Vec<BenefitUsage>> {
        let rows = self.prefix_keys(
            cf::BENEFIT_USAGES,
            &keys::usage_scope_prefix(user_id, card_id, kind),
        )?;
        rows.iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    // =========================================================================
    // Expense Records
    // =========================================================================

    fn put_expense(&self, expense: &Expense) -> Result<()> {
        let cf_expenses = self.cf(cf::EXPENSES)?;
        let cf_fingerprints = self.cf(cf::EXPENSE_FINGERPRINTS)?;

        let key = keys::expense_key(&expense.user_id, &expense.id);
        let value = Self::serialize(expense)?;

        // Fingerprint index value: user_id || expense_id, enough to load the
        // record back on a replayed delivery.
        let mut pointer = Vec::with_capacity(32);
        pointer.extend_from_slice(expense.user_id.as_bytes());
        pointer.extend_from_slice(&expense.id.to_bytes());

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_expenses, &key, &value);
        batch.put_cf(
            &cf_fingerprints,
            keys::fingerprint_key(&expense.fingerprint()),
            &pointer,
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn get_expense(&self, user_id: &UserId, expense_id: &ExpenseId) -> Result<Option<Expense>> {
        self.get_raw(cf::EXPENSES, &keys::expense_key(user_id, expense_id))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_expense_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Expense>> {
        let Some(pointer) = self.get_raw(
            cf::EXPENSE_FINGERPRINTS,
            &keys::fingerprint_key(fingerprint),
        )?
        else {
            return Ok(None);
        };

        if pointer.len() != 32 {
            return Err(StoreError::Serialization(
                "malformed fingerprint pointer".into(),
            ));
        }

        let mut user_bytes = [0u8; 16];
        user_bytes.copy_from_slice(&pointer[..16]);
        let mut expense_bytes = [0u8; 16];
        expense_bytes.copy_from_slice(&pointer[16..]);

        let user_id = UserId::from_uuid(uuid_from_bytes(user_bytes));
        let expense_id = ExpenseId::from_bytes(expense_bytes);

        self.get_expense(&user_id, &expense_id)
    }

    fn list_expenses(&self, user_id: &UserId, limit: usize, offset: usize) -> Result<Vec<Expense>> {
        let mut rows = self.prefix_keys(cf::EXPENSES, &keys::user_expenses_prefix(user_id))?;

        // ULID keys are chronological; reverse for newest-first listings.
        rows.reverse();

        rows.iter()
            .skip(offset)
            .take(limit)
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }
}

fn uuid_from_bytes(bytes: [u8; 16]) -> uuid::Uuid {
    uuid::Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardwise_core::{Benefit, BenefitTerms, Channel};
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn sample_card(external_id: i64) -> Card {
        Card {
            id: CardId::generate(),
            external_id,
            name: "Daily Check".into(),
            issuer: "Hana".into(),
            image_url: None,
            card_type: Some("CHECK".into()),
            benefits: vec![Benefit {
                external_id: external_id * 10,
                applicable_categories: vec![],
                applicable_targets: vec!["스타벅스".into()],
                discounts: vec![BenefitTerms {
                    external_id: external_id * 100,
                    rate: 0.05,
                    amount: 0,
                    minimum_amount: 300_000,
                    benefit_limit: 10_000,
                    channel: Channel::Both,
                }],
                points: vec![],
                cashbacks: vec![],
            }],
        }
    }

    #[test]
    fn card_upsert_and_external_lookup() {
        let (store, _dir) = create_test_store();
        let card = sample_card(7);

        store.put_card(&card).unwrap();

        let by_id = store.get_card(&card.id).unwrap().unwrap();
        assert_eq!(by_id, card);

        let by_external = store.get_card_by_external(7).unwrap().unwrap();
        assert_eq!(by_external.id, card.id);

        // re-put with updated fields keeps the same internal id
        let mut updated = card.clone();
        updated.name = "Daily Check v2".into();
        store.put_card(&updated).unwrap();
        let again = store.get_card_by_external(7).unwrap().unwrap();
        assert_eq!(again.id, card.id);
        assert_eq!(again.name, "Daily Check v2");
    }

    #[test]
    fn user_card_listing_is_scoped_to_user() {
        let (store, _dir) = create_test_store();
        let alice = UserId::generate();
        let bob = UserId::generate();

        let card_a = CardId::generate();
        let card_b = CardId::generate();

        store.put_user_card(&UserCard::register(alice, card_a)).unwrap();
        store.put_user_card(&UserCard::register(alice, card_b)).unwrap();
        store.put_user_card(&UserCard::register(bob, card_a)).unwrap();

        assert_eq!(store.list_user_cards(&alice).unwrap().len(), 2);
        assert_eq!(store.list_user_cards(&bob).unwrap().len(), 1);
    }

    #[test]
    fn performance_row_replace() {
        let (store, _dir) = create_test_store();
        let user = UserId::generate();
        let card = CardId::generate();

        assert!(store.get_performance(&user, &card).unwrap().is_none());

        let mut perf = CardPerformance::new(user, card, 300_000);
        perf.accrue(120_000);
        store.put_performance(&perf).unwrap();

        let read = store.get_performance(&user, &card).unwrap().unwrap();
        assert_eq!(read.current_amount, 120_000);
        assert!(!read.target_achieved);
        assert_eq!(read.target_achieved, read.current_amount >= read.target_amount);
    }

    #[test]
    fn usage_sum_is_scoped_by_kind() {
        let (store, _dir) = create_test_store();
        let user = UserId::generate();
        let card = CardId::generate();

        for (kind, amount) in [
            (BenefitKind::Discount, 500),
            (BenefitKind::Discount, 250),
            (BenefitKind::Point, 90),
        ] {
            store
                .append_usage(&BenefitUsage::new(
                    user,
                    card,
                    70,
                    kind,
                    amount,
                    "스타벅스".into(),
                    Utc::now(),
                ))
                .unwrap();
        }

        assert_eq!(store.sum_usage(&user, &card, BenefitKind::Discount).unwrap(), 750);
        assert_eq!(store.sum_usage(&user, &card, BenefitKind::Point).unwrap(), 90);
        assert_eq!(store.sum_usage(&user, &card, BenefitKind::Cashback).unwrap(), 0);
        assert_eq!(store.list_usage(&user, &card, BenefitKind::Discount).unwrap().len(), 2);
    }

    #[test]
    fn expense_fingerprint_lookup() {
        let (store, _dir) = create_test_store();
        let user = UserId::generate();

        let parsed = cardwise_core::parse_notification("스타벅스에서 4,500원 결제").unwrap();
        let expense = Expense::from_parsed(user, parsed, Utc::now());
        store.put_expense(&expense).unwrap();

        let found = store
            .get_expense_by_fingerprint(&expense.fingerprint())
            .unwrap()
            .unwrap();
        assert_eq!(found.id, expense.id);

        assert!(store
            .get_expense_by_fingerprint("someone:else")
            .unwrap()
            .is_none());
    }

    #[test]
    fn expense_listing_newest_first_with_pagination() {
        let (store, _dir) = create_test_store();
        let user = UserId::generate();

        for i in 0..3 {
            let parsed =
                cardwise_core::parse_notification(&format!("가게{i}에서 1,000원 결제")).unwrap();
            store
                .put_expense(&Expense::from_parsed(user, parsed, Utc::now()))
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2)); // distinct ULID timestamps
        }

        let all = store.list_expenses(&user, 10, 0).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].place, "가게2");
        assert_eq!(all[2].place, "가게0");

        let page = store.list_expenses(&user, 1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].place, "가게1");
    }
}
