//! Real-time "which card can I use here" filter.
//!
//! Read-only over the two ledgers, no locks: results are eventually
//! consistent with in-flight accrual, which is acceptable for a display
//! surface.

use std::sync::Arc;

use serde::Serialize;

use cardwise_core::{
    card_kind_reward, is_applicable, BenefitKind, Card, Channel, UserId,
};
use cardwise_store::{RocksStore, Store};

use crate::error::ApiError;

/// Query narrowing the candidate set.
#[derive(Debug, Clone, Default)]
pub struct EligibilityQuery {
    /// Place the user is about to pay at. When set, cards without a
    /// benefit covering the place are not candidates.
    pub place: Option<String>,
    /// Prospective spend, used to project per-kind benefit amounts.
    pub amount: i64,
    /// Optional category narrowing.
    pub category_code: Option<String>,
    /// Optional channel narrowing.
    pub channel: Option<Channel>,
}

/// Performance snapshot attached to a surviving card.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    /// Accumulated qualifying spend.
    pub current_amount: i64,
    /// Spend floor that unlocks benefits.
    pub target_amount: i64,
    /// Whether the floor is met.
    pub target_achieved: bool,
}

/// Per-kind limit snapshot attached to a surviving card.
#[derive(Debug, Clone, Serialize)]
pub struct LimitSnapshot {
    /// The benefit kind.
    pub kind: BenefitKind,
    /// Sum of usage rows already accrued this scope.
    pub used_sum: i64,
    /// Aggregated limit across the card's benefits of this kind.
    pub limit_sum: i64,
    /// Projected benefit amount for the queried spend.
    pub prospective_amount: i64,
}

/// A card that survived the filter, annotated for display.
#[derive(Debug, Clone, Serialize)]
pub struct EligibleCard {
    /// The catalog card.
    pub card: Card,
    /// Performance state backing the inclusion.
    pub performance: PerformanceSnapshot,
    /// Limit state per kind present on the card.
    pub limits: Vec<LimitSnapshot>,
}

/// Combines the performance and usage ledgers into the usable-right-now
/// card set.
#[derive(Clone)]
pub struct EligibilityFilter {
    store: Arc<RocksStore>,
}

impl EligibilityFilter {
    /// Create a filter over the given store.
    #[must_use]
    pub fn new(store: Arc<RocksStore>) -> Self {
        Self { store }
    }

    /// Filter the user's active cards down to the ones usable right now.
    ///
    /// Exclusions, in order: deactivated registration; no benefit matching
    /// the queried place/category/channel; performance not achieved (an
    /// absent row counts as unachieved); limit breach for any kind present
    /// on the card. The limit comparison keeps the original policy split:
    /// discount and cashback project the prospective amount on top of the
    /// accrued sum, point compares the accrued sum alone.
    ///
    /// # Errors
    ///
    /// Returns an error when a ledger read fails.
    pub async fn filter(
        &self,
        user_id: UserId,
        query: &EligibilityQuery,
    ) -> Result<Vec<EligibleCard>, ApiError> {
        let mut eligible = Vec::new();

        for user_card in self.store.list_user_cards(&user_id)? {
            if !user_card.is_active {
                continue;
            }
            let Some(card) = self.store.get_card(&user_card.card_id)? else {
                tracing::warn!(
                    user_id = %user_id,
                    card_id = %user_card.card_id,
                    "registered card missing from catalog, skipped"
                );
                continue;
            };

            if !self.card_matches(&card, query) {
                continue;
            }

            let performance = match self.store.get_performance(&user_id, &card.id)? {
                Some(p) => PerformanceSnapshot {
                    current_amount: p.current_amount,
                    target_amount: p.target_amount,
                    target_achieved: p.target_achieved,
                },
                // no accrual yet: unachieved with zero amounts
                None => PerformanceSnapshot {
                    current_amount: 0,
                    target_amount: card.target_amount().unwrap_or(0),
                    target_achieved: false,
                },
            };

            if !performance.target_achieved {
                continue;
            }

            if let Some(limits) = self.limit_snapshots(user_id, &card, query).await? {
                eligible.push(EligibleCard {
                    card,
                    performance,
                    limits,
                });
            }
        }

        Ok(eligible)
    }

    /// Whether the card has at least one benefit applicable to the query.
    fn card_matches(&self, card: &Card, query: &EligibilityQuery) -> bool {
        card.benefits.iter().any(|benefit| {
            let place_ok = query
                .place
                .as_deref()
                .map_or(true, |place| benefit.targets_place(place));
            place_ok && is_applicable(benefit, query.category_code.as_deref(), query.channel)
        })
    }

    /// Limit snapshots for every kind present on the card, or `None` when
    /// any kind breaches its limit.
    async fn limit_snapshots(
        &self,
        user_id: UserId,
        card: &Card,
        query: &EligibilityQuery,
    ) -> Result<Option<Vec<LimitSnapshot>>, ApiError> {
        let place = query.place.as_deref().unwrap_or("");
        let mut snapshots = Vec::new();

        for kind in BenefitKind::ALL {
            let present = card.benefits.iter().any(|b| !b.terms(kind).is_empty());
            if !present {
                continue;
            }

            let limit_sum = card.limit_sum(kind);
            let used_sum = self.store.sum_usage(&user_id, &card.id, kind)?;
            let prospective_amount = if query.place.is_some() {
                card_kind_reward(card, kind, place, query.amount)
            } else {
                0
            };

            let breached = match kind {
                BenefitKind::Discount | BenefitKind::Cashback => {
                    used_sum.saturating_add(prospective_amount) > limit_sum
                }
                // point intentionally ignores the prospective amount
                BenefitKind::Point => used_sum > limit_sum,
            };
            if breached {
                return Ok(None);
            }

            snapshots.push(LimitSnapshot {
                kind,
                used_sum,
                limit_sum,
                prospective_amount,
            });
        }

        Ok(Some(snapshots))
    }
}
