//! API Routes

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Full application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/connections", post(handlers::create_connection))
        .route("/connections/:id/budget", get(handlers::get_budget))
        .route(
            "/connections/:id/limit",
            axum::routing::put(handlers::update_limit).delete(handlers::disable_limit),
        )
        .route("/connections/:id/limits", get(handlers::list_limits))
        .route("/connections/:id/payments", get(handlers::list_payments))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use nwc_budget::{
        BudgetConfig, BudgetService, CollaboratorError, CurrencyConverter, MemoryStore,
        WalletConnection,
    };
    use nwc_types::Currency;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::state::ConverterProvider;

    /// Prices every amount at a fixed number of sats
    struct FixedRate(i64);

    #[async_trait]
    impl CurrencyConverter for FixedRate {
        async fn estimate(&self, _: &Currency, _: i64, _: &Currency) -> Result<i64, CollaboratorError> {
            Ok(self.0)
        }
    }

    impl ConverterProvider for FixedRate {
        fn converter(&self, _: &WalletConnection) -> Box<dyn CurrencyConverter> {
            Box::new(FixedRate(self.0))
        }
    }

    fn app() -> Router {
        let service = BudgetService::new(Arc::new(MemoryStore::new()), BudgetConfig::default());
        create_router(AppState::new(service, Arc::new(FixedRate(2000)), None))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(app: &Router, body: Value) -> String {
        let (status, connection) = send(app, Method::POST, "/api/v1/connections", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        connection["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["storage"], "memory");
    }

    #[tokio::test]
    async fn test_sat_budget_lifecycle() {
        let app = app();
        let id = create(&app, json!({ "limit": { "budget": "1000.SAT/weekly" } })).await;

        let (status, view) = send(&app, Method::GET, &format!("/api/v1/connections/{}/budget", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["total_budget_msats"], 1_000_000);
        assert_eq!(view["remaining_budget_msats"], 1_000_000);
        assert!(view["renews_at"].is_i64());

        let (status, change) = send(
            &app,
            Method::PUT,
            &format!("/api/v1/connections/{}/limit", id),
            Some(json!({ "amount": 2000, "currency": "SAT", "frequency": "weekly" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(change["change"], "amount_changed");
        assert_eq!(change["limit"]["amount"], 2000);

        let (status, change) = send(&app, Method::DELETE, &format!("/api/v1/connections/{}/limit", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(change["change"], "disabled");

        let (_, view) = send(&app, Method::GET, &format!("/api/v1/connections/{}/budget", id), None).await;
        assert_eq!(view, json!({}));

        let (_, limits) = send(&app, Method::GET, &format!("/api/v1/connections/{}/limits", id), None).await;
        let limits = limits.as_array().unwrap();
        assert_eq!(limits.len(), 1);
        assert!(!limits[0]["end_time"].is_null());
    }

    #[tokio::test]
    async fn test_fiat_budget_view() {
        let app = app();
        let id = create(
            &app,
            json!({ "budget_currency": "USD", "limit": { "budget": "500.USD/daily" } }),
        )
        .await;

        let (status, view) = send(&app, Method::GET, &format!("/api/v1/connections/{}/budget", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["total_budget_msats"], 2_000_000);
        assert_eq!(view["currency"]["code"], "USD");
        assert_eq!(view["currency"]["total_budget"], 500);
    }

    #[tokio::test]
    async fn test_frequency_change_replaces_limit() {
        let app = app();
        let id = create(&app, json!({ "limit": { "budget": "1000/daily" } })).await;

        let (_, change) = send(
            &app,
            Method::PUT,
            &format!("/api/v1/connections/{}/limit", id),
            Some(json!({ "budget": "1000/weekly" })),
        )
        .await;
        assert_eq!(change["change"], "replaced");
        assert_eq!(change["previous"]["frequency"], "daily");
        assert_eq!(change["limit"]["frequency"], "weekly");

        let (_, payments) = send(&app, Method::GET, &format!("/api/v1/connections/{}/payments", id), None).await;
        assert_eq!(payments, json!([]));
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = app();

        let (status, body) = send(&app, Method::GET, "/api/v1/connections/not-an-id/budget", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "OTHER");

        let unknown = nwc_types::ConnectionId::new();
        let (status, _) = send(&app, Method::GET, &format!("/api/v1/connections/{}/budget", unknown), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let id = create(&app, json!({})).await;
        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/v1/connections/{}/limit", id),
            Some(json!({ "amount": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
