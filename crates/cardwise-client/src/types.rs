//! Request and response types mirroring the service API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cardwise_core::Benefit;

/// A card record for the catalog sync feed.
#[derive(Debug, Clone, Serialize)]
pub struct CardRecord {
    /// Feed identifier, the upsert key.
    pub external_id: i64,
    /// Card display name.
    pub name: String,
    /// Issuing company.
    pub issuer: String,
    /// Optional artwork URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Optional card type tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    /// Benefits, replacing the stored set wholesale.
    pub benefits: Vec<Benefit>,
}

/// Catalog sync result.
#[derive(Debug, Deserialize)]
pub struct SyncCatalogResponse {
    /// Records that created a new card.
    pub created: usize,
    /// Records that updated an existing card.
    pub updated: usize,
}

/// Result of delivering one expense notification.
#[derive(Debug, Deserialize)]
pub struct NotifyResponse {
    /// Identifier of the expense record for this delivery.
    pub expense_id: String,
    /// Parsed place.
    pub place: String,
    /// Parsed amount in won.
    pub amount: i64,
    /// True when the delivery was a replay of an earlier one.
    pub replayed: bool,
}

/// One expense in a history listing.
#[derive(Debug, Deserialize)]
pub struct ExpenseView {
    /// Record identifier.
    pub expense_id: String,
    /// Parsed place.
    pub place: String,
    /// Parsed amount in won.
    pub amount: i64,
    /// Raw notification text.
    pub original_text: String,
    /// When the payment was posted.
    pub posted_at: DateTime<Utc>,
}

/// Expense history listing.
#[derive(Debug, Deserialize)]
pub struct ListExpensesResponse {
    /// Expenses, newest first.
    pub expenses: Vec<ExpenseView>,
}

/// Card registration result.
#[derive(Debug, Deserialize)]
pub struct RegisterCardResponse {
    /// The registered card.
    pub card_id: String,
    /// Always true after registration.
    pub is_active: bool,
}

/// Performance snapshot attached to an eligible card.
#[derive(Debug, Deserialize)]
pub struct PerformanceSnapshot {
    /// Accumulated qualifying spend.
    pub current_amount: i64,
    /// Spend floor that unlocks benefits.
    pub target_amount: i64,
    /// Whether the floor is met.
    pub target_achieved: bool,
}

/// Per-kind limit snapshot attached to an eligible card.
#[derive(Debug, Deserialize)]
pub struct LimitSnapshot {
    /// The benefit kind tag.
    pub kind: String,
    /// Sum already accrued in this scope.
    pub used_sum: i64,
    /// Aggregated limit for the kind.
    pub limit_sum: i64,
    /// Projected amount for the queried spend.
    pub prospective_amount: i64,
}

/// One usable-right-now card.
#[derive(Debug, Deserialize)]
pub struct EligibleCard {
    /// The catalog card.
    pub card: cardwise_core::Card,
    /// Performance state backing the inclusion.
    pub performance: PerformanceSnapshot,
    /// Limit state per kind present on the card.
    pub limits: Vec<LimitSnapshot>,
}

/// Eligibility listing.
#[derive(Debug, Deserialize)]
pub struct EligibleCardsResponse {
    /// Cards usable right now.
    pub cards: Vec<EligibleCard>,
}

/// One card in a per-store benefit listing.
#[derive(Debug, Deserialize)]
pub struct StoreCardView {
    /// Internal identifier.
    pub card_id: String,
    /// Card display name.
    pub name: String,
    /// Issuing company.
    pub issuer: String,
    /// Benefit info for the queried place/channel.
    pub benefits: Vec<cardwise_core::BenefitInfo>,
}

/// Per-store listing.
#[derive(Debug, Deserialize)]
pub struct StoreCardsResponse {
    /// Cards with at least one applicable benefit.
    pub cards: Vec<StoreCardView>,
}
