//! The expense accrual pipeline.
//!
//! An inbound notification moves through parse → expense record →
//! per-card performance accrual → benefit evaluation → per-kind usage
//! accrual. The expense record is persisted before any accrual runs, so a
//! downstream failure never loses the underlying transaction. Per-card and
//! per-kind failures are logged and contained; they never abort siblings.
//!
//! Every read-modify-write runs inside a lease scope:
//!
//! - ingestion: `expense:{fingerprint}` — dedups retransmitted deliveries
//! - performance: `performance:{user}:{card}`
//! - usage: `benefit:{user}:{card}:{KIND}`

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use cardwise_core::{
    card_kind_reward, Accrual, BenefitKind, BenefitUsage, Card, CardId, CardPerformance, Expense,
    UserId,
};
use cardwise_lock::{LockCoordinator, LockOptions};
use cardwise_store::{RocksStore, Store};

use crate::error::ApiError;

/// Lock tuning for the ingestion scope. Generous TTL: the window doubles
/// as the dedup horizon for retransmitted deliveries racing each other.
const INGEST_LOCK: LockOptions = LockOptions {
    ttl: Duration::from_secs(30),
    max_retries: 3,
    retry_interval: Duration::from_millis(100),
};

/// Lock tuning for the `(user, card)` performance scope.
const PERFORMANCE_LOCK: LockOptions = LockOptions {
    ttl: Duration::from_secs(10),
    max_retries: 2,
    retry_interval: Duration::from_millis(50),
};

/// Lock tuning for the `(user, card, kind)` usage scope.
const BENEFIT_LOCK: LockOptions = LockOptions {
    ttl: Duration::from_secs(5),
    max_retries: 1,
    retry_interval: Duration::from_millis(50),
};

/// Result of ingesting one notification.
#[derive(Debug)]
pub struct IngestOutcome {
    /// The expense record for this delivery.
    pub expense: Expense,
    /// True when the fingerprint was already indexed and `expense` is the
    /// record created by the first delivery.
    pub replayed: bool,
}

/// Outcome of processing one owned card for one expense.
#[derive(Debug)]
pub struct CardOutcome {
    /// The card that was processed.
    pub card_id: CardId,
    /// How far processing got.
    pub stage: CardStage,
}

/// Terminal stage of per-card processing.
#[derive(Debug)]
pub enum CardStage {
    /// The card declares no spend floor, so no performance target is
    /// derivable; accrual skipped.
    NoTarget,
    /// Performance accrued but the target is not yet achieved.
    NotAchieved,
    /// Target achieved but no benefit covers the expense place.
    NoMatchingBenefit,
    /// Benefit accrual ran; one outcome per evaluated kind.
    Evaluated(Vec<KindOutcome>),
    /// Processing failed; siblings were unaffected.
    Failed(String),
}

/// Outcome of one kind's usage accrual.
#[derive(Debug)]
pub struct KindOutcome {
    /// The benefit kind.
    pub kind: BenefitKind,
    /// Applied or limit-exceeded.
    pub accrual: Accrual,
}

/// The expense accrual pipeline.
#[derive(Clone)]
pub struct ExpensePipeline {
    store: Arc<RocksStore>,
    locks: LockCoordinator,
}

impl ExpensePipeline {
    /// Create a pipeline over the given store and lock coordinator.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, locks: LockCoordinator) -> Self {
        Self { store, locks }
    }

    /// Ingest a raw notification for a user.
    ///
    /// Parses the text, persists the expense record and kicks off detached
    /// per-card accrual. Runs under the ingestion lease keyed by the
    /// `(text, posted_at)` fingerprint; a replayed delivery returns the
    /// original record instead of creating a second one.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] for blank text,
    /// [`ApiError::LockBusy`] when the ingestion scope stays contended, and
    /// [`ApiError::Internal`] for storage failures.
    pub async fn ingest(
        &self,
        user_id: UserId,
        text: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<IngestOutcome, ApiError> {
        let parsed = cardwise_core::parse_notification(text)?;
        let fingerprint = cardwise_core::ingest_fingerprint(text, posted_at);
        let lock_key = format!("expense:{fingerprint}");

        let store = Arc::clone(&self.store);
        let outcome = self
            .locks
            .with_lock(&lock_key, INGEST_LOCK, || async move {
                if let Some(existing) = store.get_expense_by_fingerprint(&fingerprint)? {
                    tracing::info!(
                        user_id = %existing.user_id,
                        expense_id = %existing.id,
                        "replayed notification, returning original expense"
                    );
                    return Ok(IngestOutcome {
                        expense: existing,
                        replayed: true,
                    });
                }

                let expense = Expense::from_parsed(user_id, parsed, posted_at);
                store.put_expense(&expense)?;
                Ok::<_, ApiError>(IngestOutcome {
                    expense,
                    replayed: false,
                })
            })
            .await??;

        if !outcome.replayed {
            // Accrual is detached from the caller's return path; the
            // notification source is acknowledged once the record exists.
            let pipeline = self.clone();
            let expense = outcome.expense.clone();
            tokio::spawn(async move {
                pipeline.process_expense(&expense).await;
            });
        }

        Ok(outcome)
    }

    /// Run per-card accrual for a persisted expense.
    ///
    /// Fans out over the user's active cards; cards are independent scopes
    /// and process concurrently. Returns one outcome per card.
    pub async fn process_expense(&self, expense: &Expense) -> Vec<CardOutcome> {
        let user_cards = match self.store.list_user_cards(&expense.user_id) {
            Ok(cards) => cards,
            Err(e) => {
                tracing::error!(
                    user_id = %expense.user_id,
                    expense_id = %expense.id,
                    error = %e,
                    "failed to list user cards, expense accrual skipped"
                );
                return Vec::new();
            }
        };

        let futures = user_cards
            .iter()
            .filter(|uc| uc.is_active)
            .map(|uc| self.process_card(expense, uc.card_id));

        let outcomes = futures::future::join_all(futures).await;

        for outcome in &outcomes {
            if let CardStage::Failed(reason) = &outcome.stage {
                tracing::error!(
                    user_id = %expense.user_id,
                    card_id = %outcome.card_id,
                    expense_id = %expense.id,
                    reason,
                    "card accrual failed"
                );
            }
        }
        outcomes
    }

    /// Process one card: performance accrual, then benefit evaluation.
    async fn process_card(&self, expense: &Expense, card_id: CardId) -> CardOutcome {
        let stage = match self.process_card_inner(expense, card_id).await {
            Ok(stage) => stage,
            Err(e) => CardStage::Failed(e.to_string()),
        };
        CardOutcome { card_id, stage }
    }

    async fn process_card_inner(
        &self,
        expense: &Expense,
        card_id: CardId,
    ) -> Result<CardStage, ApiError> {
        let card = self
            .store
            .get_card(&card_id)?
            .ok_or_else(|| ApiError::NotFound(format!("card not found: {card_id}")))?;

        let Some(performance) = self.accrue_performance(expense, &card).await? else {
            return Ok(CardStage::NoTarget);
        };

        if !performance.target_achieved {
            return Ok(CardStage::NotAchieved);
        }

        if card.benefits_for_place(&expense.place).next().is_none() {
            return Ok(CardStage::NoMatchingBenefit);
        }

        let mut kinds = Vec::new();
        for kind in BenefitKind::ALL {
            let computed = card_kind_reward(&card, kind, &expense.place, expense.amount);
            if computed <= 0 {
                continue;
            }

            // One kind's limit breach or lock timeout must not block the
            // other kinds.
            match self.try_accrue_usage(expense, &card, kind, computed).await {
                Ok(accrual) => kinds.push(KindOutcome { kind, accrual }),
                Err(e) => {
                    tracing::error!(
                        user_id = %expense.user_id,
                        card_id = %card.id,
                        kind = kind.as_str(),
                        error = %e,
                        "usage accrual failed"
                    );
                }
            }
        }

        Ok(CardStage::Evaluated(kinds))
    }

    /// Accrue the expense amount onto the card's performance row, creating
    /// it lazily from the card's spend floor on first sight.
    ///
    /// Returns `None` when the card declares no floor, so no target is
    /// derivable.
    async fn accrue_performance(
        &self,
        expense: &Expense,
        card: &Card,
    ) -> Result<Option<CardPerformance>, ApiError> {
        let Some(target_amount) = card.target_amount() else {
            tracing::warn!(
                user_id = %expense.user_id,
                card_id = %card.id,
                "card has no spend floor, performance accrual skipped"
            );
            return Ok(None);
        };

        let lock_key = format!("performance:{}:{}", expense.user_id, card.id);
        let store = Arc::clone(&self.store);
        let user_id = expense.user_id;
        let card_id = card.id;
        let amount = expense.amount;

        let performance = self
            .locks
            .with_lock(&lock_key, PERFORMANCE_LOCK, || async move {
                let mut performance = store
                    .get_performance(&user_id, &card_id)?
                    .unwrap_or_else(|| CardPerformance::new(user_id, card_id, target_amount));

                performance.accrue(amount);
                store.put_performance(&performance)?;

                tracing::debug!(
                    user_id = %user_id,
                    card_id = %card_id,
                    current_amount = performance.current_amount,
                    target_achieved = performance.target_achieved,
                    "performance accrued"
                );
                Ok::<_, ApiError>(performance)
            })
            .await??;

        Ok(Some(performance))
    }

    /// Accrue one kind's computed benefit amount against its limit sum.
    ///
    /// Under the `(user, card, kind)` lease: sum the existing usage rows,
    /// append only if the new total stays within the limit.
    async fn try_accrue_usage(
        &self,
        expense: &Expense,
        card: &Card,
        kind: BenefitKind,
        computed: i64,
    ) -> Result<Accrual, ApiError> {
        let lock_key = format!("benefit:{}:{}:{}", expense.user_id, card.id, kind.as_str());
        let limit = card.limit_sum(kind);

        let store = Arc::clone(&self.store);
        let user_id = expense.user_id;
        let card_id = card.id;
        let place = expense.place.clone();
        let used_at = expense.posted_at;
        let benefit_external_id = card
            .benefits_for_place(&expense.place)
            .next()
            .map_or(0, |b| b.external_id);

        let accrual = self
            .locks
            .with_lock(&lock_key, BENEFIT_LOCK, || async move {
                let existing = store.sum_usage(&user_id, &card_id, kind)?;

                if existing.saturating_add(computed) > limit {
                    tracing::info!(
                        user_id = %user_id,
                        card_id = %card_id,
                        kind = kind.as_str(),
                        existing,
                        requested = computed,
                        limit,
                        "benefit limit reached, accrual withheld"
                    );
                    return Ok(Accrual::LimitExceeded {
                        existing,
                        requested: computed,
                        limit,
                    });
                }

                let usage = BenefitUsage::new(
                    user_id,
                    card_id,
                    benefit_external_id,
                    kind,
                    computed,
                    place,
                    used_at,
                );
                store.append_usage(&usage)?;

                tracing::info!(
                    user_id = %user_id,
                    card_id = %card_id,
                    kind = kind.as_str(),
                    used_amount = computed,
                    "benefit usage accrued"
                );
                Ok::<_, ApiError>(Accrual::Applied { amount: computed })
            })
            .await??;

        Ok(accrual)
    }
}
