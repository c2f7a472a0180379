//! User card registration and read-side card listings.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use cardwise_core::{list_benefit_info, is_applicable, BenefitInfo, CardId, Channel, UserCard, UserId};
use cardwise_store::Store;

use crate::auth::ServiceAuth;
use crate::eligibility::{EligibilityQuery, EligibleCard};
use crate::error::ApiError;
use crate::state::AppState;

/// Card registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterCardRequest {
    /// The catalog card to register.
    pub card_id: CardId,
}

/// Card registration response.
#[derive(Debug, Serialize)]
pub struct RegisterCardResponse {
    /// The registered card.
    pub card_id: String,
    /// Always true after registration.
    pub is_active: bool,
}

/// `POST /v1/users/{user_id}/cards`
///
/// Registers a catalog card for the user. Re-registering a deactivated
/// card reactivates the existing row, keeping its usage history.
pub async fn register_card(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<UserId>,
    Json(body): Json<RegisterCardRequest>,
) -> Result<Json<RegisterCardResponse>, ApiError> {
    if state.store.get_card(&body.card_id)?.is_none() {
        return Err(ApiError::NotFound(format!("card not found: {}", body.card_id)));
    }

    let user_card = match state.store.get_user_card(&user_id, &body.card_id)? {
        Some(mut existing) => {
            existing.reactivate();
            existing
        }
        None => UserCard::register(user_id, body.card_id),
    };
    state.store.put_user_card(&user_card)?;

    tracing::info!(
        service = %auth.service_name,
        user_id = %user_id,
        card_id = %body.card_id,
        "card registered"
    );

    Ok(Json(RegisterCardResponse {
        card_id: body.card_id.to_string(),
        is_active: true,
    }))
}

/// `DELETE /v1/users/{user_id}/cards/{card_id}`
///
/// Soft delete: the registration row flips inactive, ledger history stays.
pub async fn deactivate_card(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((user_id, card_id)): Path<(UserId, CardId)>,
) -> Result<StatusCode, ApiError> {
    let Some(mut user_card) = state.store.get_user_card(&user_id, &card_id)? else {
        return Err(ApiError::NotFound(format!(
            "registration not found: {user_id}/{card_id}"
        )));
    };

    user_card.deactivate();
    state.store.put_user_card(&user_card)?;

    tracing::info!(user_id = %user_id, card_id = %card_id, "card deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// Query for eligibility and store listings.
#[derive(Debug, Deserialize)]
pub struct CardMatchQuery {
    /// Place being paid at.
    pub place: Option<String>,
    /// Prospective spend in won.
    pub amount: Option<i64>,
    /// Optional category narrowing.
    pub category_code: Option<String>,
    /// Optional channel narrowing (`ONLINE`, `OFFLINE`, `BOTH`).
    pub channel: Option<Channel>,
}

/// Eligibility listing response.
#[derive(Debug, Serialize)]
pub struct EligibleCardsResponse {
    /// Cards usable right now, annotated with ledger snapshots.
    pub cards: Vec<EligibleCard>,
}

/// `GET /v1/users/{user_id}/cards/eligible`
pub async fn eligible_cards(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<UserId>,
    Query(query): Query<CardMatchQuery>,
) -> Result<Json<EligibleCardsResponse>, ApiError> {
    let query = EligibilityQuery {
        place: query.place,
        amount: query.amount.unwrap_or(0),
        category_code: query.category_code,
        channel: query.channel,
    };

    let cards = state.eligibility.filter(user_id, &query).await?;
    Ok(Json(EligibleCardsResponse { cards }))
}

/// One card in a per-store benefit listing.
#[derive(Debug, Serialize)]
pub struct StoreCardView {
    /// Internal identifier.
    pub card_id: String,
    /// Card display name.
    pub name: String,
    /// Issuing company.
    pub issuer: String,
    /// Benefit info for the queried place/channel.
    pub benefits: Vec<BenefitInfo>,
}

/// Per-store listing response.
#[derive(Debug, Serialize)]
pub struct StoreCardsResponse {
    /// The user's cards with at least one applicable benefit.
    pub cards: Vec<StoreCardView>,
}

/// Query for the per-store listing; `user_id` arrives as a parameter since
/// the route is not user-scoped.
#[derive(Debug, Deserialize)]
pub struct StoreCardsQuery {
    /// Whose cards to list.
    pub user_id: UserId,
    /// Place being paid at.
    pub place: Option<String>,
    /// Optional category narrowing.
    pub category_code: Option<String>,
    /// Optional channel narrowing.
    pub channel: Option<Channel>,
}

/// `GET /v1/stores/cards`
///
/// Matcher-derived listing: which of the user's cards carry a benefit for
/// this place, without consulting the ledgers.
pub async fn store_cards(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Query(query): Query<StoreCardsQuery>,
) -> Result<Json<StoreCardsResponse>, ApiError> {
    let mut views = Vec::new();

    for user_card in state.store.list_user_cards(&query.user_id)? {
        if !user_card.is_active {
            continue;
        }
        let Some(card) = state.store.get_card(&user_card.card_id)? else {
            continue;
        };

        let benefits: Vec<BenefitInfo> = card
            .benefits
            .iter()
            .filter(|benefit| {
                let place_ok = query
                    .place
                    .as_deref()
                    .map_or(true, |place| benefit.targets_place(place));
                place_ok
                    && is_applicable(benefit, query.category_code.as_deref(), query.channel)
            })
            .flat_map(|benefit| list_benefit_info(benefit, query.channel))
            .collect();

        if benefits.is_empty() {
            continue;
        }

        views.push(StoreCardView {
            card_id: card.id.to_string(),
            name: card.name,
            issuer: card.issuer,
            benefits,
        });
    }

    Ok(Json(StoreCardsResponse { cards: views }))
}
