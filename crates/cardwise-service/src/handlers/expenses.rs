//! Expense ingestion and history handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cardwise_core::UserId;
use cardwise_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for expense listings.
const DEFAULT_PAGE_LIMIT: usize = 50;

/// Largest accepted page size.
const MAX_PAGE_LIMIT: usize = 200;

/// Notification ingestion request.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    /// Raw notification text.
    pub text: String,
    /// When the payment was posted.
    pub posted_at: DateTime<Utc>,
}

/// Notification ingestion response.
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    /// Identifier of the expense record for this delivery.
    pub expense_id: String,
    /// Parsed place (sentinel when the text carried none).
    pub place: String,
    /// Parsed amount in won.
    pub amount: i64,
    /// True when this delivery was a replay of an earlier one.
    pub replayed: bool,
}

/// `POST /v1/users/{user_id}/expenses`
///
/// Accepts a raw expense notification. Accrual runs detached; the 202
/// acknowledges that the expense record exists.
pub async fn notify_expense(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<UserId>,
    Json(body): Json<NotifyRequest>,
) -> Result<(StatusCode, Json<NotifyResponse>), ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        "processing expense notification"
    );

    let outcome = state
        .pipeline
        .ingest(user_id, &body.text, body.posted_at)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(NotifyResponse {
            expense_id: outcome.expense.id.to_string(),
            place: outcome.expense.place.clone(),
            amount: outcome.expense.amount,
            replayed: outcome.replayed,
        }),
    ))
}

/// Pagination query for expense listings.
#[derive(Debug, Deserialize)]
pub struct ListExpensesQuery {
    /// Page size, capped at 200.
    pub limit: Option<usize>,
    /// Rows to skip.
    pub offset: Option<usize>,
}

/// One expense in a listing.
#[derive(Debug, Serialize)]
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

/// Expense listing response.
#[derive(Debug, Serialize)]
pub struct ListExpensesResponse {
    /// Expenses, newest first.
    pub expenses: Vec<ExpenseView>,
}

/// `GET /v1/users/{user_id}/expenses`
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<UserId>,
    Query(query): Query<ListExpensesQuery>,
) -> Result<Json<ListExpensesResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let expenses = state
        .store
        .list_expenses(&user_id, limit, offset)?
        .into_iter()
        .map(|e| ExpenseView {
            expense_id: e.id.to_string(),
            place: e.place,
            amount: e.amount,
            original_text: e.original_text,
            posted_at: e.posted_at,
        })
        .collect();

    Ok(Json(ListExpensesResponse { expenses }))
}
