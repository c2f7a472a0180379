//! Persistent storage for cardwise.
//!
//! This crate provides the [`Store`] trait and its `RocksDB` implementation.
//! Records are serialized with CBOR; composite keys are laid out so every
//! ledger read is a point lookup or a single prefix scan (see [`keys`]).
//! The same database also backs the durable lease lock used by the accrual
//! pipeline (see [`RocksLeaseLock`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod lease;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use lease::RocksLeaseLock;
pub use rocks::RocksStore;

use cardwise_core::{
    BenefitKind, BenefitUsage, Card, CardId, CardPerformance, Expense, ExpenseId, UserCard, UserId,
};

/// Storage operations for the card catalog, registrations, ledgers and
/// expense records.
///
/// The trait is deliberately read-modify-write free: callers that need
/// atomicity across a read and a write (performance accrual, usage limit
/// checks) hold the corresponding lease while calling into it.
pub trait Store: Send + Sync {
    // -- catalog ------------------------------------------------------------

    /// Write a card and its external-id index entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_card(&self, card: &Card) -> Result<()>;

    /// Load a card by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decode fails.
    fn get_card(&self, card_id: &CardId) -> Result<Option<Card>>;

    /// Load a card by its catalog feed id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decode fails.
    fn get_card_by_external(&self, external_id: i64) -> Result<Option<Card>>;

    /// All catalog cards.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan or decode fails.
    fn list_cards(&self) -> Result<Vec<Card>>;

    // -- user cards ---------------------------------------------------------

    /// Write a user card registration row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_user_card(&self, user_card: &UserCard) -> Result<()>;

    /// Load a single registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decode fails.
    fn get_user_card(&self, user_id: &UserId, card_id: &CardId) -> Result<Option<UserCard>>;

    /// All of a user's registrations, active and deactivated.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan or decode fails.
    fn list_user_cards(&self, user_id: &UserId) -> Result<Vec<UserCard>>;

    // -- performance ledger -------------------------------------------------

    /// Load a user's performance row for one card.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decode fails.
    fn get_performance(&self, user_id: &UserId, card_id: &CardId)
        -> Result<Option<CardPerformance>>;

    /// Replace a performance row. Callers hold the performance lease for
    /// the scope while reading and writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_performance(&self, performance: &CardPerformance) -> Result<()>;

    // -- benefit usage ledger -----------------------------------------------

    /// Append one usage row. Rows are never updated or deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append_usage(&self, usage: &BenefitUsage) -> Result<()>;

    /// Running total of used amounts in a `(user, card, kind)` scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan or decode fails.
    fn sum_usage(&self, user_id: &UserId, card_id: &CardId, kind: BenefitKind) -> Result<i64>;

    /// All usage rows in a scope, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan or decode fails.
    fn list_usage(
        &self,
        user_id: &UserId,
        card_id: &CardId,
        kind: BenefitKind,
    ) -> Result<Vec<BenefitUsage>>;

    // -- expenses -----------------------------------------------------------

    /// Write an expense record and its fingerprint index entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_expense(&self, expense: &Expense) -> Result<()>;

    /// Load one expense record.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decode fails.
    fn get_expense(&self, user_id: &UserId, expense_id: &ExpenseId) -> Result<Option<Expense>>;

    /// Look up the expense created for a previously seen delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decode fails.
    fn get_expense_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Expense>>;

    /// A user's expenses, newest first, with offset pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan or decode fails.
    fn list_expenses(&self, user_id: &UserId, limit: usize, offset: usize) -> Result<Vec<Expense>>;
}
