//! Use cases: resolve referenced rows, ask the policy, validate, persist.
//!
//! Every operation takes the request principal explicitly. Ownership and role
//! rules live in [`Policy`]; this layer only gathers the facts the policy
//! needs and turns its decision into a result.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use shopkeep_auth::{
    CategoryUsage, Credentials, Decision, DenyReason, NewUser, PasswordChange, PasswordHashError,
    Policy, Principal, ProductCreation, PublicUser, Registration, Role, TargetUser, TokenIssuer,
    TokenSigningError, User, UserPatch, hash_password, verify_password,
};
use shopkeep_catalog::{Category, CategoryDraft, CategoryPatch, Product, ProductDraft, ProductPatch};
use shopkeep_core::{CategoryId, DomainError, ProductId, Status, UserId};
use shopkeep_infra::repository::{CategoryQuery, Page, ProductQuery, UserQuery};
use shopkeep_infra::{SharedStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Denied(DenyReason),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{field} is already taken")]
    Duplicate { field: &'static str },

    #[error("invalid username/email or password")]
    InvalidCredentials,

    #[error("old password is incorrect")]
    InvalidOldPassword,

    #[error("storage failure: {0}")]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<DenyReason> for ServiceError {
    fn from(reason: DenyReason) -> Self {
        ServiceError::Denied(reason)
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field } => ServiceError::Duplicate { field },
            StoreError::NotFound => ServiceError::NotFound("record"),
            StoreError::MissingReference { .. } => ServiceError::Denied(DenyReason::InvalidReference),
            StoreError::Referenced { referencing } => {
                ServiceError::Denied(DenyReason::Conflict { referencing })
            }
            StoreError::Poisoned => ServiceError::Store(err),
        }
    }
}

impl From<PasswordHashError> for ServiceError {
    fn from(err: PasswordHashError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<TokenSigningError> for ServiceError {
    fn from(err: TokenSigningError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

/// A signed-in user and their bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MerchantRef {
    pub id: UserId,
    pub username: String,
    pub nickname: Option<String>,
}

/// A product joined with its category and owning merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<CategoryRef>,
    pub merchant: Option<MerchantRef>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppServices {
    store: SharedStore,
    policy: Policy,
    tokens: Arc<dyn TokenIssuer>,
}

impl AppServices {
    pub fn new(store: SharedStore, policy: Policy, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self {
            store,
            policy,
            tokens,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    // ── auth ────────────────────────────────────────────────────────────────

    #[tracing::instrument(skip_all, fields(username = %registration.username))]
    pub fn register(&self, registration: Registration) -> ServiceResult<AuthSession> {
        registration.validate()?;
        let user = self.store.insert_user(
            NewUser {
                username: registration.username.trim().to_string(),
                email: registration.email.trim().to_string(),
                password_hash: hash_password(&registration.password)?,
                nickname: Some(registration.effective_nickname()),
                role: Role::User,
                status: Status::Active,
            },
            Utc::now(),
        )?;
        tracing::info!(user_id = %user.id, "user registered");
        self.session(&user)
    }

    #[tracing::instrument(skip_all)]
    pub fn login(&self, credentials: Credentials) -> ServiceResult<AuthSession> {
        credentials.validate()?;
        let user = self
            .store
            .find_user_by_login(&credentials.username)?
            .filter(|u| verify_password(&credentials.password, &u.password_hash))
            .ok_or(ServiceError::InvalidCredentials)?;
        if !user.status.is_active() {
            tracing::warn!(user_id = %user.id, "login refused for inactive account");
            return Err(ServiceError::Denied(DenyReason::InactiveAccount));
        }
        tracing::info!(user_id = %user.id, "user logged in");
        self.session(&user)
    }

    pub fn profile(&self, principal: Option<&Principal>) -> ServiceResult<PublicUser> {
        allow(self.policy.view_profile(principal), principal, "view-profile")?;
        let id = principal
            .map(|p| p.id)
            .ok_or(ServiceError::Denied(DenyReason::Unauthenticated))?;
        Ok(self.load_user(id)?.to_public())
    }

    /// Caller check alone, for requests rejected before the full use case runs.
    pub fn require_caller(&self, principal: Option<&Principal>, action: &'static str) -> ServiceResult<()> {
        allow(self.policy.authenticate(principal), principal, action)
    }

    /// Tokens are stateless; logging out only requires a valid session.
    pub fn logout(&self, principal: Option<&Principal>) -> ServiceResult<()> {
        allow(self.policy.view_profile(principal), principal, "logout")?;
        if let Some(p) = principal {
            tracing::info!(user_id = %p.id, "user logged out");
        }
        Ok(())
    }

    fn session(&self, user: &User) -> ServiceResult<AuthSession> {
        let token = self.tokens.issue(user.id, Utc::now())?;
        Ok(AuthSession {
            user: user.to_public(),
            token,
        })
    }

    // ── users ───────────────────────────────────────────────────────────────

    pub fn list_users(
        &self,
        principal: Option<&Principal>,
        query: &UserQuery,
    ) -> ServiceResult<Page<PublicUser>> {
        allow(self.policy.list_users(principal), principal, "list-users")?;
        Ok(self.store.list_users(query)?.map(|u| u.to_public()))
    }

    pub fn get_user(&self, principal: Option<&Principal>, id: UserId) -> ServiceResult<PublicUser> {
        allow(self.policy.read_user(principal, id), principal, "read-user")?;
        Ok(self.load_user(id)?.to_public())
    }

    #[tracing::instrument(skip(self, principal, patch))]
    pub fn update_user(
        &self,
        principal: Option<&Principal>,
        id: UserId,
        patch: UserPatch,
    ) -> ServiceResult<PublicUser> {
        allow(self.policy.update_user(principal, id), principal, "update-user")?;
        if patch.changes_role() {
            allow(self.policy.set_user_role(principal, id), principal, "set-user-role")?;
        }
        patch.validate()?;

        let mut user = self.load_user(id)?;
        patch.apply(&mut user, Utc::now());
        self.store.save_user(&user)?;
        if let Some(role) = patch.role {
            tracing::info!(user_id = %id, %role, "user role changed");
        }
        Ok(user.to_public())
    }

    #[tracing::instrument(skip(self, principal, change))]
    pub fn update_password(
        &self,
        principal: Option<&Principal>,
        id: UserId,
        change: PasswordChange,
    ) -> ServiceResult<()> {
        allow(self.policy.update_password(principal, id), principal, "update-password")?;
        change.validate()?;

        let mut user = self.load_user(id)?;
        if !verify_password(&change.old_password, &user.password_hash) {
            return Err(ServiceError::InvalidOldPassword);
        }
        user.password_hash = hash_password(&change.new_password)?;
        user.updated_at = Utc::now();
        self.store.save_user(&user)?;
        tracing::info!(user_id = %id, "password changed");
        Ok(())
    }

    #[tracing::instrument(skip(self, principal))]
    pub fn delete_user(&self, principal: Option<&Principal>, id: UserId) -> ServiceResult<()> {
        allow(self.policy.delete_user(principal, id), principal, "delete-user")?;
        let removed_products = self.store.delete_user(id).map_err(not_found("user"))?;
        tracing::info!(user_id = %id, removed_products, "user deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self, principal))]
    pub fn toggle_user_status(
        &self,
        principal: Option<&Principal>,
        id: UserId,
    ) -> ServiceResult<PublicUser> {
        allow(self.policy.toggle_user_status(principal, id), principal, "toggle-user-status")?;
        let mut user = self.load_user(id)?;
        user.status = user.status.toggled();
        user.updated_at = Utc::now();
        self.store.save_user(&user)?;
        tracing::info!(user_id = %id, status = %user.status, "user status changed");
        Ok(user.to_public())
    }

    fn load_user(&self, id: UserId) -> ServiceResult<User> {
        self.store.find_user(id)?.ok_or(ServiceError::NotFound("user"))
    }

    // ── categories ──────────────────────────────────────────────────────────

    /// The category list is public.
    pub fn list_categories(&self, query: &CategoryQuery) -> ServiceResult<Page<Category>> {
        Ok(self.store.list_categories(query)?)
    }

    #[tracing::instrument(skip_all, fields(name = %draft.name))]
    pub fn create_category(
        &self,
        principal: Option<&Principal>,
        draft: CategoryDraft,
    ) -> ServiceResult<Category> {
        allow(self.policy.write_category(principal), principal, "create-category")?;
        draft.validate()?;
        let category = self.store.insert_category(draft.into_new(), Utc::now())?;
        tracing::info!(category_id = %category.id, "category created");
        Ok(category)
    }

    #[tracing::instrument(skip(self, principal, patch))]
    pub fn update_category(
        &self,
        principal: Option<&Principal>,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> ServiceResult<Category> {
        allow(self.policy.write_category(principal), principal, "update-category")?;
        patch.validate()?;
        let mut category = self.load_category(id)?;
        patch.apply(&mut category, Utc::now());
        self.store.save_category(&category)?;
        Ok(category)
    }

    /// The reference count is checked twice: once for the decision, and
    /// again by the store under its write lock.
    #[tracing::instrument(skip(self, principal))]
    pub fn delete_category(&self, principal: Option<&Principal>, id: CategoryId) -> ServiceResult<()> {
        allow(self.policy.write_category(principal), principal, "delete-category")?;
        self.load_category(id)?;
        let usage = CategoryUsage {
            id,
            referencing_products: self.store.count_products_in(id)?,
        };
        allow(self.policy.delete_category(principal, &usage), principal, "delete-category")?;

        self.store
            .delete_category_if_unreferenced(id)
            .map_err(not_found("category"))?;
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }

    fn load_category(&self, id: CategoryId) -> ServiceResult<Category> {
        self.store.find_category(id)?.ok_or(ServiceError::NotFound("category"))
    }

    // ── products ────────────────────────────────────────────────────────────

    /// `merchant_id` narrows the listing for admins and anonymous callers;
    /// everyone else only sees their own products.
    pub fn list_products(
        &self,
        principal: Option<&Principal>,
        merchant_id: Option<UserId>,
        query: ProductQuery,
    ) -> ServiceResult<Page<ProductView>> {
        let scope = allow(
            self.policy.list_products(principal, merchant_id),
            principal,
            "list-products",
        )?;
        let query = ProductQuery {
            owner: scope.owner,
            ..query
        };
        let Page {
            items,
            total,
            page,
            limit,
            total_pages,
        } = self.store.list_products(&query)?;
        let items = items
            .into_iter()
            .map(|p| self.view(p))
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(Page {
            items,
            total,
            page,
            limit,
            total_pages,
        })
    }

    pub fn get_product(&self, principal: Option<&Principal>, id: ProductId) -> ServiceResult<ProductView> {
        let product = self.load_product(id)?;
        allow(self.policy.read_product(principal, &product), principal, "read-product")?;
        self.view(product)
    }

    #[tracing::instrument(skip_all, fields(category_id = ?draft.category_id))]
    pub fn create_product(
        &self,
        principal: Option<&Principal>,
        draft: ProductDraft,
    ) -> ServiceResult<ProductView> {
        let category = match draft.category_id {
            Some(id) => self.store.find_category(id)?.map(|c| c.id),
            None => None,
        };
        let creation = ProductCreation {
            category_exists: category.is_some(),
            target_user: match draft.user_id {
                None => TargetUser::Omitted,
                Some(id) => match self.store.find_user(id)? {
                    Some(user) => TargetUser::Found { id, role: user.role },
                    None => TargetUser::NotFound(id),
                },
            },
        };
        let owner = allow(
            self.policy.create_product(principal, &creation),
            principal,
            "create-product",
        )?;
        draft.validate()?;
        let category = category.ok_or(ServiceError::Denied(DenyReason::InvalidReference))?;

        let product = self
            .store
            .insert_product(draft.into_new(owner, category), Utc::now())?;
        tracing::info!(product_id = %product.id, owner = %owner, "product created");
        self.view(product)
    }

    #[tracing::instrument(skip(self, principal, patch))]
    pub fn update_product(
        &self,
        principal: Option<&Principal>,
        id: ProductId,
        patch: ProductPatch,
    ) -> ServiceResult<ProductView> {
        let mut product = self.load_product(id)?;
        let category_exists = match patch.category_change(&product) {
            Some(category) => Some(self.store.find_category(category)?.is_some()),
            None => None,
        };
        allow(
            self.policy.update_product(principal, &product, category_exists),
            principal,
            "update-product",
        )?;
        patch.validate()?;

        patch.apply(&mut product, Utc::now());
        self.store.save_product(&product)?;
        self.view(product)
    }

    #[tracing::instrument(skip(self, principal))]
    pub fn delete_product(&self, principal: Option<&Principal>, id: ProductId) -> ServiceResult<()> {
        let product = self.load_product(id)?;
        allow(self.policy.delete_product(principal, &product), principal, "delete-product")?;
        self.store.delete_product(id).map_err(not_found("product"))?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    fn load_product(&self, id: ProductId) -> ServiceResult<Product> {
        self.store.find_product(id)?.ok_or(ServiceError::NotFound("product"))
    }

    fn view(&self, product: Product) -> ServiceResult<ProductView> {
        let category = self
            .store
            .find_category(product.category_id)?
            .map(|c| CategoryRef { id: c.id, name: c.name });
        let merchant = self.store.find_user(product.user_id)?.map(|u| MerchantRef {
            id: u.id,
            username: u.username,
            nickname: u.nickname,
        });
        Ok(ProductView {
            product,
            category,
            merchant,
        })
    }
}

/// Turn a decision into a result, logging denials.
fn allow<T>(decision: Decision<T>, principal: Option<&Principal>, action: &'static str) -> ServiceResult<T> {
    decision.into_result().map_err(|reason| {
        tracing::warn!(
            action,
            actor = ?principal.map(|p| p.id),
            reason = reason.code(),
            "access denied"
        );
        ServiceError::Denied(reason)
    })
}

fn not_found(entity: &'static str) -> impl Fn(StoreError) -> ServiceError {
    move |err| match err {
        StoreError::NotFound => ServiceError::NotFound(entity),
        other => other.into(),
    }
}
