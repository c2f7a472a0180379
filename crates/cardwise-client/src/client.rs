//! The HTTP client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::ClientError;
use crate::types::{
    CardRecord, EligibleCardsResponse, ListExpensesResponse, NotifyResponse,
    RegisterCardResponse, StoreCardsResponse, SyncCatalogResponse,
};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for constructing a [`CardwiseClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout.
    pub timeout: Duration,
    /// Value sent in `X-Service-Name` for log attribution.
    pub service_name: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            service_name: None,
        }
    }
}

/// Client for the cardwise service API.
#[derive(Debug, Clone)]
pub struct CardwiseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    service_name: Option<String>,
}

/// Error envelope returned by the service.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl CardwiseClient {
    /// Create a client with default options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when the base URL is empty and
    /// [`ClientError::Http`] when the underlying client cannot be built.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a client with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when the base URL is empty and
    /// [`ClientError::Http`] when the underlying client cannot be built.
    pub fn with_options(
        base_url: &str,
        api_key: &str,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base URL is empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            service_name: options.service_name,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key);
        if let Some(name) = &self.service_name {
            builder = builder.header("x-service-name", name);
        }
        builder
    }

    async fn handle<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ClientError::Busy);
        }

        let body: Result<ErrorResponse, _> = response.json().await;
        match body {
            Ok(envelope) => Err(ClientError::Api {
                code: envelope.error.code,
                message: envelope.error.message,
                status: status.as_u16(),
            }),
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("unexpected status {status}"),
                status: status.as_u16(),
            }),
        }
    }

    /// Upsert a batch of catalog card records.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or API failure.
    pub async fn sync_catalog(
        &self,
        cards: Vec<CardRecord>,
    ) -> Result<SyncCatalogResponse, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/v1/catalog/cards")
            .json(&serde_json::json!({ "cards": cards }))
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Deliver an expense notification for a user.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Busy`] when the ingestion scope is contended
    /// and the delivery should be retried.
    pub async fn notify_expense(
        &self,
        user_id: &str,
        text: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<NotifyResponse, ClientError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/v1/users/{user_id}/expenses"))
            .json(&serde_json::json!({ "text": text, "posted_at": posted_at }))
            .send()
            .await?;
        Self::handle(response).await
    }

    /// List a user's expenses, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or API failure.
    pub async fn list_expenses(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<ListExpensesResponse, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/v1/users/{user_id}/expenses"))
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Register a catalog card for a user.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or API failure.
    pub async fn register_card(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<RegisterCardResponse, ClientError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/v1/users/{user_id}/cards"))
            .json(&serde_json::json!({ "card_id": card_id }))
            .send()
            .await?;
        Self::handle(response).await
    }

    /// Deactivate a user's card registration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or API failure.
    pub async fn deactivate_card(&self, user_id: &str, card_id: &str) -> Result<(), ClientError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/v1/users/{user_id}/cards/{card_id}"),
            )
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Self::handle::<serde_json::Value>(response).await.map(|_| ())
    }

    /// The usable-right-now card set for a user at a place.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or API failure.
    pub async fn eligible_cards(
        &self,
        user_id: &str,
        place: Option<&str>,
        amount: i64,
    ) -> Result<EligibleCardsResponse, ClientError> {
        let mut builder = self
            .request(
                reqwest::Method::GET,
                &format!("/v1/users/{user_id}/cards/eligible"),
            )
            .query(&[("amount", amount)]);
        if let Some(place) = place {
            builder = builder.query(&[("place", place)]);
        }

        let response = builder.send().await?;
        Self::handle(response).await
    }

    /// Per-store benefit listing for a user's cards.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or API failure.
    pub async fn store_cards(
        &self,
        user_id: &str,
        place: Option<&str>,
    ) -> Result<StoreCardsResponse, ClientError> {
        let mut builder = self
            .request(reqwest::Method::GET, "/v1/stores/cards")
            .query(&[("user_id", user_id)]);
        if let Some(place) = place {
            builder = builder.query(&[("place", place)]);
        }

        let response = builder.send().await?;
        Self::handle(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CardwiseClient {
        CardwiseClient::new(&server.uri(), "test-key").unwrap()
    }

    #[tokio::test]
    async fn notify_expense_sends_api_key_and_parses_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/users/u-1/expenses"))
            .and(header("x-api-key", "test-key"))
            .and(body_partial_json(
                serde_json::json!({ "text": "스타벅스에서 4,500원 결제" }),
            ))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "expense_id": "01JABCDEFGHJKMNPQRSTVWXYZ0",
                "place": "스타벅스",
                "amount": 4500,
                "replayed": false
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .notify_expense("u-1", "스타벅스에서 4,500원 결제", Utc::now())
            .await
            .unwrap();

        assert_eq!(result.place, "스타벅스");
        assert_eq!(result.amount, 4500);
        assert!(!result.replayed);
    }

    #[tokio::test]
    async fn busy_response_maps_to_typed_retry_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/users/u-1/expenses"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": { "code": "lock_busy", "message": "scope is busy" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .notify_expense("u-1", "스타벅스에서 4,500원 결제", Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Busy));
    }

    #[tokio::test]
    async fn api_errors_carry_code_and_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/users/u-1/cards"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": { "code": "not_found", "message": "card not found" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.register_card("u-1", "c-1").await.unwrap_err();

        match err {
            ClientError::Api { code, status, .. } => {
                assert_eq!(code, "not_found");
                assert_eq!(status, 404);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn eligible_cards_passes_query_params() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/users/u-1/cards/eligible"))
            .and(query_param("place", "스타벅스"))
            .and(query_param("amount", "10000"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "cards": [] })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .eligible_cards("u-1", Some("스타벅스"), 10_000)
            .await
            .unwrap();

        assert!(result.cards.is_empty());
    }
}
