use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use shopkeep_api::config::{AdminSeed, ApiConfig};
use shopkeep_auth::{CategoryWritePolicy, JwtClaims};
use shopkeep_core::UserId;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(CategoryWritePolicy::Authenticated).await
    }

    async fn spawn_with(category_writes: CategoryWritePolicy) -> Self {
        let mut config = ApiConfig::new(JWT_SECRET);
        config.category_writes = category_writes;
        config.admin = Some(AdminSeed {
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password: "admin123".to_string(),
        });

        // Same router as prod, bound to an ephemeral port.
        let app = shopkeep_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, username: &str, password: &str) -> (UserId, String) {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "login as {username}");
        session(res.json().await.unwrap())
    }

    async fn admin_token(&self) -> String {
        self.login("admin", "admin123").await.1
    }

    async fn register(&self, username: &str) -> (UserId, String) {
        let res = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "secret1",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED, "register {username}");
        session(res.json().await.unwrap())
    }

    /// Registers a user and has the admin promote them to merchant.
    async fn merchant(&self, admin: &str, username: &str) -> (UserId, String) {
        let (id, token) = self.register(username).await;
        let res = self
            .client
            .put(self.url(&format!("/users/{id}")))
            .bearer_auth(admin)
            .json(&json!({ "role": "merchant" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "promote {username}");
        (id, token)
    }

    async fn category(&self, token: &str, name: &str) -> i64 {
        let res = self
            .client
            .post(self.url("/categories"))
            .bearer_auth(token)
            .json(&json!({ "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED, "create category {name}");
        let body: Value = res.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    async fn product(&self, token: &str, owner: UserId, category: i64, name: &str) -> i64 {
        let res = self
            .client
            .post(self.url("/products"))
            .bearer_auth(token)
            .json(&json!({
                "name": name,
                "price_cents": 1999,
                "category_id": category,
                "user_id": owner,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED, "create product {name}");
        let body: Value = res.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn session(body: Value) -> (UserId, String) {
    let id = UserId::new(body["user"]["id"].as_i64().unwrap());
    let token = body["token"].as_str().unwrap().to_string();
    (id, token)
}

fn mint_jwt(sub: UserId, issued_at: chrono::DateTime<Utc>, ttl: ChronoDuration) -> String {
    let claims = JwtClaims::new(sub, issued_at, ttl);
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn error_code(res: reqwest::Response) -> String {
    let body: Value = res.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn health_and_anonymous_access() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/auth/profile")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "unauthenticated");
}

#[tokio::test]
async fn bad_tokens_are_rejected_even_on_public_routes() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/products"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (id, _) = srv.register("shopper").await;
    let expired = mint_jwt(id, Utc::now() - ChronoDuration::hours(2), ChronoDuration::hours(1));
    let res = srv
        .client
        .get(srv.url("/auth/profile"))
        .bearer_auth(expired)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let ghost = mint_jwt(UserId::new(999), Utc::now(), ChronoDuration::minutes(10));
    let res = srv
        .client
        .get(srv.url("/auth/profile"))
        .bearer_auth(ghost)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_reflects_token_subject() {
    let srv = TestServer::spawn().await;
    let (id, token) = srv.register("shopper").await;

    let res = srv
        .client
        .get(srv.url("/auth/profile"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], json!(id));
    assert_eq!(body["role"], "user");
    assert_eq!(body["nickname"], "shopper");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn merchant_listing_is_scoped_to_own_products() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;
    let (m1, t1) = srv.merchant(&admin, "merchant1").await;
    let (m2, t2) = srv.merchant(&admin, "merchant2").await;
    let tools = srv.category(&admin, "Tools").await;
    srv.product(&t1, m1, tools, "Hammer").await;
    srv.product(&t2, m2, tools, "Saw").await;

    let res = srv
        .client
        .get(srv.url(&format!("/products?merchant_id={m2}")))
        .bearer_auth(&t1)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["user_id"], json!(m1));
    assert_eq!(page["items"][0]["merchant"]["username"], "merchant1");
    assert_eq!(page["items"][0]["category"]["name"], "Tools");

    let res = srv
        .client
        .get(srv.url(&format!("/products?merchant_id={m2}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["user_id"], json!(m2));
}

#[tokio::test]
async fn foreign_product_update_is_forbidden() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;
    let (_, t1) = srv.merchant(&admin, "merchant1").await;
    let (m2, t2) = srv.merchant(&admin, "merchant2").await;
    let tools = srv.category(&admin, "Tools").await;
    let saw = srv.product(&t2, m2, tools, "Saw").await;

    let res = srv
        .client
        .put(srv.url(&format!("/products/{saw}")))
        .bearer_auth(&t1)
        .json(&json!({ "price_cents": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(res).await, "forbidden");

    let res = srv
        .client
        .put(srv.url(&format!("/products/{saw}")))
        .bearer_auth(&t2)
        .json(&json!({ "price_cents": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["price_cents"], 1);
}

#[tokio::test]
async fn category_delete_conflicts_then_succeeds() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;
    let (m, token) = srv.merchant(&admin, "merchant").await;
    let tools = srv.category(&admin, "Tools").await;
    let a = srv.product(&token, m, tools, "Hammer").await;
    let b = srv.product(&token, m, tools, "Saw").await;

    let res = srv
        .client
        .delete(srv.url(&format!("/categories/{tools}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
    assert!(body["message"].as_str().unwrap().contains('2'));

    for id in [a, b] {
        let res = srv
            .client
            .delete(srv.url(&format!("/products/{id}")))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    let res = srv
        .client
        .delete(srv.url(&format!("/categories/{tools}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn admin_only_category_writes() {
    let srv = TestServer::spawn_with(CategoryWritePolicy::AdminOnly).await;
    let (_, shopper) = srv.register("shopper").await;

    let res = srv
        .client
        .post(srv.url("/categories"))
        .bearer_auth(&shopper)
        .json(&json!({ "name": "Garden" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .post(srv.url("/categories"))
        .json(&json!({ "name": "Garden" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let admin = srv.admin_token().await;
    srv.category(&admin, "Garden").await;
}

#[tokio::test]
async fn admin_cannot_delete_or_toggle_self() {
    let srv = TestServer::spawn().await;
    let (admin_id, admin) = srv.login("admin", "admin123").await;

    let res = srv
        .client
        .delete(srv.url(&format!("/users/{admin_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "self_action_forbidden");

    let res = srv
        .client
        .patch(srv.url(&format!("/users/{admin_id}/status")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deactivated_account_is_locked_out() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;
    let (id, token) = srv.register("shopper").await;

    let res = srv
        .client
        .patch(srv.url(&format!("/users/{id}/status")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "inactive");

    let res = srv
        .client
        .get(srv.url("/auth/profile"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(res).await, "inactive_account");

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "username": "shopper", "password": "secret1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn validation_errors_carry_details() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/auth/register"))
        .json(&json!({ "username": "x", "email": "nope", "password": "123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["field"].as_str())
        .collect();
    assert!(fields.contains(&"username"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn users_list_is_admin_only() {
    let srv = TestServer::spawn().await;
    let (_, shopper) = srv.register("shopper").await;

    let res = srv
        .client
        .get(srv.url("/users"))
        .bearer_auth(&shopper)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let admin = srv.admin_token().await;
    let res = srv
        .client
        .get(srv.url("/users?role=user"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["username"], "shopper");
}

#[tokio::test]
async fn product_create_checks_caller_before_body() {
    let srv = TestServer::spawn().await;

    for body in [
        json!({}),
        json!({ "name": "Lamp", "price_cents": 500 }),
        json!({ "name": "Lamp", "price_cents": "cheap" }),
    ] {
        let res = srv
            .client
            .post(srv.url("/products"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "anonymous create with {body}");
        assert_eq!(error_code(res).await, "unauthenticated");
    }

    let admin = srv.admin_token().await;
    let (m, token) = srv.merchant(&admin, "merchant").await;

    let res = srv
        .client
        .post(srv.url("/products"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Lamp", "price_cents": 500, "user_id": m }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_reference");

    let res = srv
        .client
        .post(srv.url("/products"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Lamp", "price_cents": "cheap" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn unreadable_bodies_use_json_envelope() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let res = srv
        .client
        .post(srv.url("/categories"))
        .bearer_auth(&admin)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_body");
}

#[tokio::test]
async fn category_listing_reads_sort_by() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;
    srv.category(&admin, "Apparel").await;
    srv.category(&admin, "Zinc").await;

    let res = srv
        .client
        .get(srv.url("/categories?sortBy=name&order=desc"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["items"][0]["name"], "Zinc");
    assert_eq!(page["items"][1]["name"], "Apparel");
}
