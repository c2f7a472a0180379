//! Card catalog sync handlers.
//!
//! The external sync collaborator delivers batches of card/benefit records
//! matched by feed id; the upsert is create-or-update and idempotent.
//! Diffing against the previous feed state stays on the collaborator side.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use cardwise_core::{Benefit, Card, CardId};
use cardwise_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// One card record from the sync feed.
#[derive(Debug, Deserialize)]
pub struct CardRecord {
    /// Feed identifier, the upsert key.
    pub external_id: i64,
    /// Card display name.
    pub name: String,
    /// Issuing company.
    pub issuer: String,
    /// Optional artwork URL.
    pub image_url: Option<String>,
    /// Optional card type tag (e.g. `"CREDIT"`, `"CHECK"`).
    pub card_type: Option<String>,
    /// Benefits, replacing the stored set wholesale.
    #[serde(default)]
    pub benefits: Vec<Benefit>,
}

/// Catalog sync request.
#[derive(Debug, Deserialize)]
pub struct SyncCatalogRequest {
    /// The batch of records to upsert.
    pub cards: Vec<CardRecord>,
}

/// Catalog sync response.
#[derive(Debug, Serialize)]
pub struct SyncCatalogResponse {
    /// Records that created a new card.
    pub created: usize,
    /// Records that updated an existing card.
    pub updated: usize,
}

/// `POST /v1/catalog/cards`
pub async fn sync_catalog(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<SyncCatalogRequest>,
) -> Result<Json<SyncCatalogResponse>, ApiError> {
    let mut created = 0;
    let mut updated = 0;

    for record in body.cards {
        // the internal id survives updates so ledger keys stay stable
        let (id, existed) = match state.store.get_card_by_external(record.external_id)? {
            Some(existing) => (existing.id, true),
            None => (CardId::generate(), false),
        };

        let card = Card {
            id,
            external_id: record.external_id,
            name: record.name,
            issuer: record.issuer,
            image_url: record.image_url,
            card_type: record.card_type,
            benefits: record.benefits,
        };
        state.store.put_card(&card)?;

        if existed {
            updated += 1;
        } else {
            created += 1;
        }
    }

    tracing::info!(
        service = %auth.service_name,
        created,
        updated,
        "catalog sync applied"
    );

    Ok(Json(SyncCatalogResponse { created, updated }))
}

/// One card in a catalog listing.
#[derive(Debug, Serialize)]
pub struct CatalogCardView {
    /// Internal identifier.
    pub card_id: String,
    /// Feed identifier.
    pub external_id: i64,
    /// Card display name.
    pub name: String,
    /// Issuing company.
    pub issuer: String,
}

/// Catalog listing response.
#[derive(Debug, Serialize)]
pub struct ListCatalogResponse {
    /// All catalog cards.
    pub cards: Vec<CatalogCardView>,
}

/// `GET /v1/catalog/cards`
pub async fn list_catalog(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<Json<ListCatalogResponse>, ApiError> {
    let cards = state
        .store
        .list_cards()?
        .into_iter()
        .map(|c| CatalogCardView {
            card_id: c.id.to_string(),
            external_id: c.external_id,
            name: c.name,
            issuer: c.issuer,
        })
        .collect();

    Ok(Json(ListCatalogResponse { cards }))
}
