//! Shared integration test harness.

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use cardwise_core::UserId;
use cardwise_service::{create_router, AppState, ServiceConfig};
use cardwise_store::{RocksStore, Store};

/// A running service over a throwaway database.
pub struct TestHarness {
    pub server: TestServer,
    pub state: AppState,
    pub service_api_key: String,
    pub test_user_id: UserId,
    _data_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let data_dir = TempDir::new().unwrap();
        let service_api_key = "test-service-key".to_string();

        let config = ServiceConfig {
            service_api_key: Some(service_api_key.clone()),
            data_dir: data_dir.path().to_path_buf(),
            ..ServiceConfig::default()
        };

        let store = Arc::new(RocksStore::open(data_dir.path()).unwrap());
        let state = AppState::new(store, config);
        let server = TestServer::new(create_router(state.clone())).unwrap();

        Self {
            server,
            state,
            service_api_key,
            test_user_id: UserId::generate(),
            _data_dir: data_dir,
        }
    }

    /// Upsert a one-benefit card into the catalog and return its internal id.
    ///
    /// The benefit targets `place` with a single rate-based term of `kind`
    /// (`"DISCOUNT"`, `"POINT"` or `"CASHBACK"`).
    pub async fn seed_card(
        &self,
        external_id: i64,
        place: &str,
        kind: &str,
        rate: f64,
        minimum_amount: i64,
        benefit_limit: i64,
    ) -> String {
        let term = json!({
            "external_id": external_id * 100,
            "rate": rate,
            "amount": 0,
            "minimum_amount": minimum_amount,
            "benefit_limit": benefit_limit,
            "channel": "BOTH"
        });
        let (discounts, points, cashbacks) = match kind {
            "DISCOUNT" => (json!([term]), json!([]), json!([])),
            "POINT" => (json!([]), json!([term]), json!([])),
            "CASHBACK" => (json!([]), json!([]), json!([term])),
            other => panic!("unknown kind {other}"),
        };

        self.server
            .post("/v1/catalog/cards")
            .add_header("x-api-key", &self.service_api_key)
            .json(&json!({
                "cards": [{
                    "external_id": external_id,
                    "name": format!("Test Card {external_id}"),
                    "issuer": "TestBank",
                    "benefits": [{
                        "external_id": external_id * 10,
                        "applicable_categories": [],
                        "applicable_targets": [place],
                        "discounts": discounts,
                        "points": points,
                        "cashbacks": cashbacks
                    }]
                }]
            }))
            .await
            .assert_status_ok();

        let card = self
            .state
            .store
            .get_card_by_external(external_id)
            .unwrap()
            .unwrap();
        card.id.to_string()
    }

    /// Register a catalog card for the test user.
    pub async fn register_card(&self, card_id: &str) {
        self.server
            .post(&format!("/v1/users/{}/cards", self.test_user_id))
            .add_header("x-api-key", &self.service_api_key)
            .json(&json!({ "card_id": card_id }))
            .await
            .assert_status_ok();
    }

    /// Ingest a notification and return the response body.
    pub async fn notify(&self, text: &str, posted_at: &str) -> serde_json::Value {
        let response = self
            .server
            .post(&format!("/v1/users/{}/expenses", self.test_user_id))
            .add_header("x-api-key", &self.service_api_key)
            .json(&json!({ "text": text, "posted_at": posted_at }))
            .await;
        response.assert_status(axum::http::StatusCode::ACCEPTED);
        response.json()
    }

    /// Poll until `condition` holds; accrual is detached from the ingest
    /// response, so observable ledger state lags the 202.
    pub async fn wait_until(&self, condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within deadline");
    }
}
