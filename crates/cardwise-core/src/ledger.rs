//! Ledger row types for performance and benefit usage.
//!
//! Performance is a mutable per-`(user, card)` counter and therefore only
//! ever written under the coordinator lock for that scope. Benefit usage is
//! an append-only log; the authoritative usage figure for a
//! `(user, card, kind)` scope is the running sum of its rows, so there is no
//! mutable counter to drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BenefitKind, CardId, UsageId, UserId};

/// Cumulative qualifying spend on a card, tracked against the target that
/// unlocks its benefits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardPerformance {
    /// The owning user.
    pub user_id: UserId,

    /// The card being tracked.
    pub card_id: CardId,

    /// Accrued spend in won. Monotonically non-decreasing.
    pub current_amount: i64,

    /// Spend threshold that unlocks benefits.
    pub target_amount: i64,

    /// Cached `current_amount >= target_amount`. Recomputed on every write,
    /// never set independently.
    pub target_achieved: bool,

    /// Last accrual time.
    pub updated_at: DateTime<Utc>,
}

impl CardPerformance {
    /// Create a fresh row with zero accrued spend.
    #[must_use]
    pub fn new(user_id: UserId, card_id: CardId, target_amount: i64) -> Self {
        Self {
            user_id,
            card_id,
            current_amount: 0,
            target_amount,
            target_achieved: 0 >= target_amount,
            updated_at: Utc::now(),
        }
    }

    /// Add `amount` to the accrued spend and recompute the achieved flag.
    ///
    /// Amounts are saturating so a hostile feed cannot wrap the counter.
    pub fn accrue(&mut self, amount: i64) {
        self.current_amount = self.current_amount.saturating_add(amount);
        self.target_achieved = self.current_amount >= self.target_amount;
        self.updated_at = Utc::now();
    }
}

/// One applied benefit instance: a single append-only usage row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitUsage {
    /// Row identifier (ULID, time-ordered).
    pub id: UsageId,

    /// The user the benefit was applied for.
    pub user_id: UserId,

    /// The card the benefit belongs to.
    pub card_id: CardId,

    /// The synced benefit row the accrual came from.
    pub benefit_external_id: i64,

    /// Accrual track the row belongs to.
    pub kind: BenefitKind,

    /// Benefit amount accrued, in won.
    pub used_amount: i64,

    /// Place the underlying expense occurred at.
    pub place: String,

    /// When the benefit applied (the expense's posted time).
    pub used_at: DateTime<Utc>,
}

impl BenefitUsage {
    /// Build a new usage row.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        card_id: CardId,
        benefit_external_id: i64,
        kind: BenefitKind,
        used_amount: i64,
        place: String,
        used_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UsageId::generate(),
            user_id,
            card_id,
            benefit_external_id,
            kind,
            used_amount,
            place,
            used_at,
        }
    }
}

/// Outcome of a guarded usage accrual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accrual {
    /// The accrual was written; carries the amount applied.
    Applied {
        /// Benefit amount written to the ledger, in won.
        amount: i64,
    },

    /// The accrual would breach the kind's limit; nothing was written.
    LimitExceeded {
        /// Usage sum already on the ledger for the scope.
        existing: i64,
        /// Amount that was refused.
        requested: i64,
        /// The kind's aggregate limit.
        limit: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accrue_recomputes_achieved() {
        let mut perf = CardPerformance::new(UserId::generate(), CardId::generate(), 300_000);
        assert!(!perf.target_achieved);

        perf.accrue(150_000);
        assert_eq!(perf.current_amount, 150_000);
        assert!(!perf.target_achieved);

        perf.accrue(150_000);
        assert_eq!(perf.current_amount, 300_000);
        assert!(perf.target_achieved);
    }

    #[test]
    fn achieved_flag_always_matches_invariant() {
        let mut perf = CardPerformance::new(UserId::generate(), CardId::generate(), 1000);
        for amount in [100, 0, 899, 1, 5000] {
            perf.accrue(amount);
            assert_eq!(
                perf.target_achieved,
                perf.current_amount >= perf.target_amount
            );
        }
    }

    #[test]
    fn zero_target_is_achieved_from_creation() {
        let perf = CardPerformance::new(UserId::generate(), CardId::generate(), 0);
        assert!(perf.target_achieved);
    }

    #[test]
    fn accrue_saturates_instead_of_wrapping() {
        let mut perf = CardPerformance::new(UserId::generate(), CardId::generate(), 1000);
        perf.accrue(i64::MAX);
        perf.accrue(i64::MAX);
        assert_eq!(perf.current_amount, i64::MAX);
        assert!(perf.target_achieved);
    }
}
