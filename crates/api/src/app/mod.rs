//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: use cases over the store and the access policy
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: query-string DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Extension, Router};
use chrono::Utc;
use tower::ServiceBuilder;

use shopkeep_auth::{Hs256Jwt, NewUser, Policy, Role, hash_password};
use shopkeep_core::Status;
use shopkeep_infra::{InMemoryStore, SharedStore};

use crate::config::{AdminSeed, ApiConfig};
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router over a fresh in-memory store.
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    build_app_with_store(config, Arc::new(InMemoryStore::new())).await
}

pub async fn build_app_with_store(config: &ApiConfig, store: SharedStore) -> anyhow::Result<Router> {
    if let Some(seed) = &config.admin {
        seed_admin(&store, seed).context("failed to seed admin account")?;
    }

    let jwt = Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes(), config.jwt_ttl));
    let auth_state = middleware::AuthState {
        jwt: jwt.clone(),
        store: store.clone(),
    };

    let policy = Policy::new(config.category_writes);
    tracing::info!(category_writes = ?policy.category_writes(), "access policy configured");
    let services = Arc::new(services::AppServices::new(store, policy, jwt));

    // Every route sees an optional principal; each use case decides whether
    // it needs one.
    let api = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::principal_middleware,
        ));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(api)
        .layer(ServiceBuilder::new()))
}

fn seed_admin(store: &SharedStore, seed: &AdminSeed) -> anyhow::Result<()> {
    if store.find_user_by_login(&seed.username)?.is_some() {
        tracing::debug!(username = %seed.username, "admin account already present");
        return Ok(());
    }
    let admin = store.insert_user(
        NewUser {
            username: seed.username.clone(),
            email: seed.email.clone(),
            password_hash: hash_password(&seed.password)?,
            nickname: Some(seed.username.clone()),
            role: Role::Admin,
            status: Status::Active,
        },
        Utc::now(),
    )?;
    tracing::info!(user_id = %admin.id, username = %admin.username, "seeded admin account");
    Ok(())
}
