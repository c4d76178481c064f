//! Catalog domain module: products and the categories they are filed under.
//!
//! Records, create/patch inputs, and field validation. Pure domain logic
//! (no IO, no HTTP, no storage); authorization lives in `shopkeep-auth`.

pub mod category;
pub mod product;

pub use category::{Category, CategoryDraft, CategoryPatch, NewCategory};
pub use product::{NewProduct, Product, ProductDraft, ProductPatch};
