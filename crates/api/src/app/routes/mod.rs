use axum::Router;

pub mod auth;
pub mod categories;
pub mod products;
pub mod system;
pub mod users;

/// Router for every endpoint behind the principal middleware.
pub fn router() -> Router {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/categories", categories::router())
        .nest("/products", products::router())
}
