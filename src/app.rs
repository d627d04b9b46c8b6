use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::JwtAuthenticator;
use crate::config::{AppConfig, SecurityConfig};
use crate::database::ProductStore;
use crate::handlers::{protected, public};
use crate::middleware::require_auth;

/// Shared per-request state; cloning is cheap
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProductStore>,
    pub auth: Arc<JwtAuthenticator>,
    /// Restrict update/delete to the product's owner
    pub enforce_ownership: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn ProductStore>, auth: Arc<JwtAuthenticator>, enforce_ownership: bool) -> Self {
        Self {
            store,
            auth,
            enforce_ownership,
        }
    }
}

pub fn router(state: AppState, config: &AppConfig) -> Router {
    let mut app = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(product_routes(state.clone()))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    // Global middleware
    if config.security.enable_cors {
        app = app.layer(cors_layer(&config.security));
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

fn product_routes(state: AppState) -> Router<AppState> {
    let reads = Router::new()
        .route("/products", get(public::list_products))
        .route("/products/:id", get(public::get_product));

    let writes = Router::new()
        .route("/products", post(protected::create_product))
        .route(
            "/products/:id",
            put(protected::update_product).delete(protected::delete_product),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    reads.merge(writes)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Secret;
    use crate::database::{DatabaseError, MemoryProductStore, NewProduct, Product, ProductChanges};

    const SECRET: &str = "router-test-secret";

    struct Harness {
        app: Router,
        store: Arc<MemoryProductStore>,
        auth: Arc<JwtAuthenticator>,
    }

    fn harness(enforce_ownership: bool) -> Harness {
        harness_with(enforce_ownership, &[])
    }

    fn config_with(extra: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = [
            ("JWT_SECRET", SECRET),
            ("PRODUCT_STORE", "memory"),
            ("API_ENABLE_REQUEST_LOGGING", "false"),
        ]
        .iter()
        .chain(extra)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        AppConfig::from_map(&vars).unwrap()
    }

    fn harness_with(enforce_ownership: bool, extra: &[(&str, &str)]) -> Harness {
        let config = config_with(extra);

        let store = Arc::new(MemoryProductStore::new());
        let auth = Arc::new(JwtAuthenticator::new(&config.security).unwrap());
        let state = AppState::new(store.clone(), auth.clone(), enforce_ownership);

        Harness {
            app: router(state, &config),
            store,
            auth,
        }
    }

    impl Harness {
        async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {}", token));
            }
            let body = match body {
                Some(v) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(v.to_string())
                }
                None => Body::empty(),
            };
            let resp = self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
            let status = resp.status();
            let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }

        async fn stored(&self) -> usize {
            self.store.list().await.unwrap().len()
        }
    }

    #[tokio::test]
    async fn create_assigns_owner_from_token() {
        let h = harness(false);
        let token = h.auth.issue(42).unwrap();

        let (status, body) = h
            .send(
                "POST",
                "/products",
                Some(&token),
                Some(json!({ "name": "Widget", "price": 9.99, "user_id": 7, "id": 500 })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].as_i64().unwrap() > 0);
        assert_ne!(body["id"], json!(500));
        assert_eq!(body["user_id"], json!(42));
        assert_eq!(body["name"], json!("Widget"));
        assert_eq!(body["price"], json!(9.99));
    }

    #[tokio::test]
    async fn create_with_empty_name_is_rejected_without_insert() {
        let h = harness(false);
        let token = h.auth.issue(1).unwrap();

        let (status, body) = h
            .send("POST", "/products", Some(&token), Some(json!({ "name": "", "price": 1.0 })))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("BAD_REQUEST"));
        assert_eq!(h.stored().await, 0);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let h = harness(false);
        let token = h.auth.issue(1).unwrap();

        let resp = h
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/products")
                    .header("authorization", format!("Bearer {}", token))
                    .header("content-type", "application/json")
                    .body(Body::from("{\"name\": \"Widget\", "))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let (status, body) = h
            .send("POST", "/products", Some(&token), Some(json!({ "name": "Widget" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("INVALID_JSON"));
        assert_eq!(h.stored().await, 0);
    }

    #[tokio::test]
    async fn mutations_without_valid_token_are_unauthorized() {
        let h = harness(false);
        let owner = h.auth.issue(1).unwrap();
        let (_, created) = h
            .send("POST", "/products", Some(&owner), Some(json!({ "name": "Widget", "price": 2.0 })))
            .await;
        let path = format!("/products/{}", created["id"]);

        let expired = h.auth.issue_with_expiry(1, Utc::now() - Duration::hours(1)).unwrap();
        let foreign = JwtAuthenticator::new(&SecurityConfig {
            jwt_secret: Secret::new("some-other-secret"),
            jwt_expiry_hours: 1,
            jwt_leeway_secs: 0,
            enforce_ownership: false,
            enable_cors: false,
            cors_origins: vec![],
        })
        .unwrap()
        .issue(1)
        .unwrap();

        for token in [None, Some("garbage"), Some(expired.as_str()), Some(foreign.as_str())] {
            let payload = json!({ "name": "Changed", "price": 99.0 });
            let (status, body) = h.send("POST", "/products", token, Some(payload.clone())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["code"], json!("UNAUTHORIZED"));

            let (status, _) = h.send("PUT", &path, token, Some(payload)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);

            let (status, _) = h.send("DELETE", &path, token, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let products = h.store.list().await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Widget");
        assert_eq!(products[0].price, 2.0);
    }

    #[tokio::test]
    async fn get_missing_product_is_not_found() {
        let h = harness(false);
        let (status, body) = h.send("GET", "/products/12345", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], json!("NOT_FOUND"));

        let (status, _) = h.send("GET", "/products/abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_changes_only_name_and_price() {
        let h = harness(false);
        let owner = h.auth.issue(10).unwrap();
        let other = h.auth.issue(20).unwrap();

        let (_, created) = h
            .send(
                "POST",
                "/products",
                Some(&owner),
                Some(json!({ "name": "Widget", "description": "Blue", "price": 9.99 })),
            )
            .await;
        let path = format!("/products/{}", created["id"]);

        // Ownership is not enforced by default
        let (status, updated) = h
            .send(
                "PUT",
                &path,
                Some(&other),
                Some(json!({ "name": "Gadget", "price": 5.0, "user_id": 20, "description": "Red" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["user_id"], json!(10));
        assert_eq!(updated["name"], json!("Gadget"));
        assert_eq!(updated["price"], json!(5.0));
        assert_eq!(updated["description"], json!("Blue"));

        let (_, fetched) = h.send("GET", &path, None, None).await;
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn update_missing_or_blank_is_rejected() {
        let h = harness(false);
        let token = h.auth.issue(1).unwrap();

        let (status, _) = h
            .send("PUT", "/products/77", Some(&token), Some(json!({ "name": "X", "price": 1.0 })))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = h
            .send("PUT", "/products/77", Some(&token), Some(json!({ "name": "", "price": 1.0 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let h = harness(false);
        let token = h.auth.issue(3).unwrap();

        let (status, _) = h.send("DELETE", "/products/999", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, created) = h
            .send("POST", "/products", Some(&token), Some(json!({ "name": "Widget", "price": 1.0 })))
            .await;
        let path = format!("/products/{}", created["id"]);

        let (status, body) = h.send("DELETE", &path, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], json!(true));

        let (status, _) = h.send("GET", &path, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_returns_all_products() {
        let h = harness(false);
        let token = h.auth.issue(3).unwrap();
        for name in ["A", "B", "C"] {
            h.send("POST", "/products", Some(&token), Some(json!({ "name": name, "price": 1.0 })))
                .await;
        }

        let (status, body) = h.send("GET", "/products", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn ownership_enforcement_blocks_other_users() {
        let h = harness(true);
        let owner = h.auth.issue(10).unwrap();
        let other = h.auth.issue(20).unwrap();

        let (_, created) = h
            .send("POST", "/products", Some(&owner), Some(json!({ "name": "Widget", "price": 9.99 })))
            .await;
        let path = format!("/products/{}", created["id"]);

        let (status, body) = h
            .send("PUT", &path, Some(&other), Some(json!({ "name": "Hijacked", "price": 0.0 })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], json!("FORBIDDEN"));

        let (status, _) = h.send("DELETE", &path, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, fetched) = h.send("GET", &path, None, None).await;
        assert_eq!(fetched["name"], json!("Widget"));

        let (status, _) = h
            .send("PUT", &path, Some(&owner), Some(json!({ "name": "Renamed", "price": 1.0 })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = h.send("DELETE", &path, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_ok_for_memory_store() {
        let h = harness(false);
        let (status, body) = h.send("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
    }

    #[tokio::test]
    async fn oversized_body_is_payload_too_large() {
        let h = harness_with(false, &[("API_MAX_REQUEST_SIZE_BYTES", "16")]);
        let token = h.auth.issue(1).unwrap();

        let (status, body) = h
            .send(
                "POST",
                "/products",
                Some(&token),
                Some(json!({ "name": "A name well past sixteen bytes", "price": 1.0 })),
            )
            .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], json!("PAYLOAD_TOO_LARGE"));
        assert_eq!(h.stored().await, 0);
    }

    /// Store whose backing database never answers
    struct UnreachableStore;

    #[async_trait::async_trait]
    impl ProductStore for UnreachableStore {
        async fn list(&self) -> Result<Vec<Product>, DatabaseError> {
            Ok(vec![])
        }

        async fn get(&self, _id: i64) -> Result<Option<Product>, DatabaseError> {
            Ok(None)
        }

        async fn insert(&self, _product: NewProduct) -> Result<Product, DatabaseError> {
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        }

        async fn update(&self, _id: i64, _changes: ProductChanges) -> Result<Option<Product>, DatabaseError> {
            Ok(None)
        }

        async fn delete(&self, _id: i64) -> Result<bool, DatabaseError> {
            Ok(false)
        }

        async fn health_check(&self) -> Result<(), DatabaseError> {
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        }
    }

    #[tokio::test]
    async fn health_is_unavailable_when_store_fails() {
        let config = config_with(&[]);
        let auth = Arc::new(JwtAuthenticator::new(&config.security).unwrap());
        let app = router(AppState::new(Arc::new(UnreachableStore), auth, false), &config);

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], json!(true));
        assert_eq!(body["code"], json!("SERVICE_UNAVAILABLE"));
    }
}
