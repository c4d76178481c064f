//! Infrastructure layer: storage for users, categories, and products.

pub mod repository;

pub use repository::{
    CategoryRepository, InMemoryStore, ProductRepository, SharedStore, Store, StoreError,
    StoreResult, UserRepository,
};
