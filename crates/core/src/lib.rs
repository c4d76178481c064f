//! Domain foundation building blocks: ids, errors, entity traits.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod status;

pub use entity::{Entity, Owned};
pub use error::{DomainError, DomainResult, FieldError};
pub use id::{CategoryId, ProductId, UserId};
pub use status::Status;
