//! Authentication and authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: the access
//! policy is pure, token and password helpers are self-contained.

pub mod claims;
pub mod jwt;
pub mod password;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtValidator, TokenIssuer, TokenSigningError};
pub use password::{PasswordHashError, hash_password, verify_password};
pub use policy::{
    Action, CategoryUsage, CategoryWritePolicy, Decision, DenyReason, Grant, Policy,
    ProductCreation, ProductScope, TargetUser, UnknownCategoryWritePolicy,
};
pub use principal::Principal;
pub use roles::Role;
pub use user::{Credentials, NewUser, PasswordChange, PublicUser, Registration, User, UserPatch};
