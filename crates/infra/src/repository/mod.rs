//! Storage seams for users, categories, and products.
//!
//! Traits are synchronous and object safe so services can hold an
//! `Arc<dyn Store>`. Every write that depends on another record (a product's
//! category, a category's remaining products) is checked inside the same
//! critical section as the write itself.

pub mod in_memory;
pub mod query;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use shopkeep_auth::{NewUser, User};
use shopkeep_catalog::{Category, NewCategory, NewProduct, Product};
use shopkeep_core::{CategoryId, ProductId, UserId};

pub use in_memory::InMemoryStore;
pub use query::{
    CategoryQuery, CategorySort, Page, PageRequest, ProductQuery, ProductSort, SortOrder,
    UserQuery,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{field} is already taken")]
    Duplicate { field: &'static str },

    #[error("record not found")]
    NotFound,

    #[error("referenced {entity} does not exist")]
    MissingReference { entity: &'static str },

    #[error("still referenced by {referencing} record(s)")]
    Referenced { referencing: u64 },

    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait UserRepository: Send + Sync {
    fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Look up by username or email, case-insensitively.
    fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>>;

    /// Fails with `Duplicate` when the username or email is taken.
    fn insert_user(&self, new: NewUser, now: DateTime<Utc>) -> StoreResult<User>;

    fn save_user(&self, user: &User) -> StoreResult<()>;

    /// Removes the user and every product they own. Returns the number of
    /// products removed.
    fn delete_user(&self, id: UserId) -> StoreResult<u64>;

    fn list_users(&self, query: &UserQuery) -> StoreResult<Page<User>>;
}

pub trait CategoryRepository: Send + Sync {
    fn find_category(&self, id: CategoryId) -> StoreResult<Option<Category>>;

    /// Fails with `Duplicate` when the name is taken.
    fn insert_category(&self, new: NewCategory, now: DateTime<Utc>) -> StoreResult<Category>;

    fn save_category(&self, category: &Category) -> StoreResult<()>;

    fn count_products_in(&self, id: CategoryId) -> StoreResult<u64>;

    /// Deletes the category only if no product references it at the moment
    /// of deletion; otherwise fails with `Referenced`.
    fn delete_category_if_unreferenced(&self, id: CategoryId) -> StoreResult<()>;

    fn list_categories(&self, query: &CategoryQuery) -> StoreResult<Page<Category>>;
}

pub trait ProductRepository: Send + Sync {
    fn find_product(&self, id: ProductId) -> StoreResult<Option<Product>>;

    /// Fails with `MissingReference` when the category or owner is gone.
    fn insert_product(&self, new: NewProduct, now: DateTime<Utc>) -> StoreResult<Product>;

    /// Fails with `MissingReference` when the (possibly new) category is gone.
    fn save_product(&self, product: &Product) -> StoreResult<()>;

    fn delete_product(&self, id: ProductId) -> StoreResult<()>;

    fn list_products(&self, query: &ProductQuery) -> StoreResult<Page<Product>>;
}

/// Everything the application needs from storage.
pub trait Store: UserRepository + CategoryRepository + ProductRepository {}

impl<S> Store for S where S: UserRepository + CategoryRepository + ProductRepository {}

/// Shared handle used by services and middleware.
pub type SharedStore = Arc<dyn Store>;
