//! Access policy: who may do what to which row.
//!
//! Every check is a pure function of the acting principal, the action, and a
//! snapshot of the resource it touches. Callers load referenced rows first
//! (product, category, target user, reference counts) and hand the loaded
//! state in; the policy itself performs no IO and never panics.
//!
//! A denial is a normal return value, not an error path: see [`Decision`].

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shopkeep_core::{CategoryId, Owned, UserId};

use crate::{Principal, Role};

// ─────────────────────────────────────────────────────────────────────────────
// Decision
// ─────────────────────────────────────────────────────────────────────────────

/// Why an action was denied.
///
/// [`DenyReason::code`] is stable and safe to show to clients.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    /// No (valid) credential was presented.
    #[error("authentication required")]
    Unauthenticated,

    /// Valid credential, but the account is disabled.
    #[error("account is inactive")]
    InactiveAccount,

    /// Authenticated, but without rights over this resource.
    #[error("insufficient permissions")]
    Forbidden,

    /// A referenced entity is missing (or was not supplied).
    #[error("referenced entity does not exist")]
    InvalidReference,

    /// A referenced entity exists but has the wrong role.
    #[error("referenced user is not a merchant")]
    InvalidRole,

    /// A state precondition failed; `referencing` rows still point at the target.
    #[error("category is still referenced by {referencing} product(s)")]
    Conflict { referencing: u64 },

    /// The action targets the acting principal, which is not allowed here.
    #[error("this action cannot target your own account")]
    SelfActionForbidden,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::InactiveAccount => "inactive_account",
            DenyReason::Forbidden => "forbidden",
            DenyReason::InvalidReference => "invalid_reference",
            DenyReason::InvalidRole => "invalid_role",
            DenyReason::Conflict { .. } => "conflict",
            DenyReason::SelfActionForbidden => "self_action_forbidden",
        }
    }
}

/// Outcome of an authorization check.
///
/// `Allow` carries whatever the caller needs to proceed: the effective listing
/// scope, the owner to stamp on a new product, or `()` for plain yes/no checks.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision<T = ()> {
    Allow(T),
    Deny(DenyReason),
}

impl<T> Decision<T> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow(_) => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decision<U> {
        match self {
            Decision::Allow(value) => Decision::Allow(f(value)),
            Decision::Deny(reason) => Decision::Deny(reason),
        }
    }

    /// Discard the payload, keeping only allow/deny.
    pub fn unit(self) -> Decision {
        self.map(|_| ())
    }

    pub fn into_result(self) -> Result<T, DenyReason> {
        match self {
            Decision::Allow(value) => Ok(value),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

impl<T> From<Result<T, DenyReason>> for Decision<T> {
    fn from(value: Result<T, DenyReason>) -> Self {
        match value {
            Ok(v) => Decision::Allow(v),
            Err(reason) => Decision::Deny(reason),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource snapshots
// ─────────────────────────────────────────────────────────────────────────────

/// Effective owner filter for a product listing. `None` means all owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProductScope {
    pub owner: Option<UserId>,
}

/// The `user_id` a caller put on a product-creation request, resolved by the
/// caller against user storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetUser {
    /// The request carried no `user_id`.
    Omitted,
    /// A `user_id` was supplied but no such user exists.
    NotFound(UserId),
    /// A `user_id` was supplied and resolved to this user.
    Found { id: UserId, role: Role },
}

impl TargetUser {
    pub fn is_supplied(&self) -> bool {
        !matches!(self, TargetUser::Omitted)
    }
}

/// Loaded state needed to decide a product creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductCreation {
    pub category_exists: bool,
    pub target_user: TargetUser,
}

/// Reference state of a category about to be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryUsage {
    pub id: CategoryId,
    pub referencing_products: u64,
}

/// Who may create, update, or delete categories.
///
/// Categories are global rather than owned, so the guard is a deployment
/// choice rather than an ownership rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryWritePolicy {
    /// Anyone, including anonymous callers.
    Public,
    /// Any active, authenticated principal.
    #[default]
    Authenticated,
    /// Admins only.
    AdminOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category write policy '{0}' (expected public, authenticated or admin_only)")]
pub struct UnknownCategoryWritePolicy(pub String);

impl FromStr for CategoryWritePolicy {
    type Err = UnknownCategoryWritePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "public" => Ok(Self::Public),
            "authenticated" => Ok(Self::Authenticated),
            "admin_only" | "admin" => Ok(Self::AdminOnly),
            other => Err(UnknownCategoryWritePolicy(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────────────────

/// Every gated operation, with the resource snapshot it needs.
#[derive(Clone, Copy)]
pub enum Action<'a> {
    ViewProfile,
    ListProducts { merchant_id: Option<UserId> },
    ReadProduct(&'a dyn Owned),
    CreateProduct(&'a ProductCreation),
    /// `category_exists` is `Some` only when the update changes the category.
    UpdateProduct {
        product: &'a dyn Owned,
        category_exists: Option<bool>,
    },
    DeleteProduct(&'a dyn Owned),
    CreateCategory,
    UpdateCategory,
    DeleteCategory(&'a CategoryUsage),
    ListUsers,
    ReadUser(UserId),
    UpdateUser(UserId),
    UpdatePassword(UserId),
    SetUserRole(UserId),
    DeleteUser(UserId),
    ToggleUserStatus(UserId),
}

impl Action<'_> {
    /// Stable, kebab-case action name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::ViewProfile => "view-profile",
            Action::ListProducts { .. } => "list-products",
            Action::ReadProduct(_) => "read-product",
            Action::CreateProduct(_) => "create-product",
            Action::UpdateProduct { .. } => "update-product",
            Action::DeleteProduct(_) => "delete-product",
            Action::CreateCategory => "create-category",
            Action::UpdateCategory => "update-category",
            Action::DeleteCategory(_) => "delete-category",
            Action::ListUsers => "list-users",
            Action::ReadUser(_) => "read-user",
            Action::UpdateUser(_) => "update-user",
            Action::UpdatePassword(_) => "update-password",
            Action::SetUserRole(_) => "set-user-role",
            Action::DeleteUser(_) => "delete-user",
            Action::ToggleUserStatus(_) => "toggle-user-status",
        }
    }
}

impl core::fmt::Debug for Action<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload of an allowed [`Action`] when decided through [`Policy::authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Proceed,
    Scope(ProductScope),
    Owner(UserId),
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// The access policy evaluator.
///
/// Holds only configuration; all decisions are pure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    category_writes: CategoryWritePolicy,
}

impl Policy {
    pub fn new(category_writes: CategoryWritePolicy) -> Self {
        Self { category_writes }
    }

    pub fn category_writes(&self) -> CategoryWritePolicy {
        self.category_writes
    }

    /// Decide any action. The typed methods below are the same decisions with
    /// a narrower payload type.
    pub fn authorize(&self, principal: Option<&Principal>, action: Action<'_>) -> Decision<Grant> {
        match action {
            Action::ViewProfile => self.view_profile(principal).map(|_| Grant::Proceed),
            Action::ListProducts { merchant_id } => {
                self.list_products(principal, merchant_id).map(Grant::Scope)
            }
            Action::ReadProduct(product) => self.read_product(principal, product).map(|_| Grant::Proceed),
            Action::CreateProduct(creation) => self.create_product(principal, creation).map(Grant::Owner),
            Action::UpdateProduct {
                product,
                category_exists,
            } => self
                .update_product(principal, product, category_exists)
                .map(|_| Grant::Proceed),
            Action::DeleteProduct(product) => {
                self.delete_product(principal, product).map(|_| Grant::Proceed)
            }
            Action::CreateCategory | Action::UpdateCategory => {
                self.write_category(principal).map(|_| Grant::Proceed)
            }
            Action::DeleteCategory(usage) => {
                self.delete_category(principal, usage).map(|_| Grant::Proceed)
            }
            Action::ListUsers => self.list_users(principal).map(|_| Grant::Proceed),
            Action::ReadUser(target) => self.read_user(principal, target).map(|_| Grant::Proceed),
            Action::UpdateUser(target) => self.update_user(principal, target).map(|_| Grant::Proceed),
            Action::UpdatePassword(target) => {
                self.update_password(principal, target).map(|_| Grant::Proceed)
            }
            Action::SetUserRole(target) => self.set_user_role(principal, target).map(|_| Grant::Proceed),
            Action::DeleteUser(target) => self.delete_user(principal, target).map(|_| Grant::Proceed),
            Action::ToggleUserStatus(target) => {
                self.toggle_user_status(principal, target).map(|_| Grant::Proceed)
            }
        }
    }

    /// The gate every non-public action starts with: present and active.
    pub fn authenticate(&self, principal: Option<&Principal>) -> Decision {
        acting(principal).map(|_| ()).into()
    }

    pub fn view_profile(&self, principal: Option<&Principal>) -> Decision {
        self.authenticate(principal)
    }

    /// Non-admins only ever see their own inventory; `merchant_id` is honored
    /// for admins and anonymous catalog browsing.
    pub fn list_products(
        &self,
        principal: Option<&Principal>,
        merchant_id: Option<UserId>,
    ) -> Decision<ProductScope> {
        let decide = || -> Result<ProductScope, DenyReason> {
            let owner = match optional_acting(principal)? {
                Some(p) if !p.is_admin() => Some(p.id),
                _ => merchant_id,
            };
            Ok(ProductScope { owner })
        };
        decide().into()
    }

    /// Anonymous reads are allowed; an authenticated non-owner is not.
    pub fn read_product(&self, principal: Option<&Principal>, product: &dyn Owned) -> Decision {
        let decide = || -> Result<(), DenyReason> {
            match optional_acting(principal)? {
                Some(p) => owner_or_admin(p, product),
                None => Ok(()),
            }
        };
        decide().into()
    }

    /// Returns the user the new product must be owned by.
    ///
    /// Non-admins must still supply a `user_id`, but the product is always
    /// owned by the caller whatever value they sent.
    pub fn create_product(
        &self,
        principal: Option<&Principal>,
        creation: &ProductCreation,
    ) -> Decision<UserId> {
        let decide = || -> Result<UserId, DenyReason> {
            let p = acting(principal)?;
            if !creation.category_exists {
                return Err(DenyReason::InvalidReference);
            }
            if !p.is_admin() {
                return if creation.target_user.is_supplied() {
                    Ok(p.id)
                } else {
                    Err(DenyReason::InvalidReference)
                };
            }
            match creation.target_user {
                TargetUser::Omitted | TargetUser::NotFound(_) => Err(DenyReason::InvalidReference),
                TargetUser::Found { role, .. } if role != Role::Merchant => Err(DenyReason::InvalidRole),
                TargetUser::Found { id, .. } => Ok(id),
            }
        };
        decide().into()
    }

    pub fn update_product(
        &self,
        principal: Option<&Principal>,
        product: &dyn Owned,
        category_exists: Option<bool>,
    ) -> Decision {
        let decide = || -> Result<(), DenyReason> {
            let p = acting(principal)?;
            owner_or_admin(p, product)?;
            if category_exists == Some(false) {
                return Err(DenyReason::InvalidReference);
            }
            Ok(())
        };
        decide().into()
    }

    pub fn delete_product(&self, principal: Option<&Principal>, product: &dyn Owned) -> Decision {
        acting(principal)
            .and_then(|p| owner_or_admin(p, product))
            .into()
    }

    /// Create and update share one gate.
    pub fn write_category(&self, principal: Option<&Principal>) -> Decision {
        self.category_gate(principal).into()
    }

    pub fn delete_category(&self, principal: Option<&Principal>, usage: &CategoryUsage) -> Decision {
        let decide = || -> Result<(), DenyReason> {
            self.category_gate(principal)?;
            if usage.referencing_products > 0 {
                return Err(DenyReason::Conflict {
                    referencing: usage.referencing_products,
                });
            }
            Ok(())
        };
        decide().into()
    }

    pub fn list_users(&self, principal: Option<&Principal>) -> Decision {
        acting(principal).and_then(admin).map(|_| ()).into()
    }

    pub fn read_user(&self, principal: Option<&Principal>, _target: UserId) -> Decision {
        acting(principal).map(|_| ()).into()
    }

    pub fn update_user(&self, principal: Option<&Principal>, target: UserId) -> Decision {
        let decide = || -> Result<(), DenyReason> {
            let p = acting(principal)?;
            if p.is(target) || p.is_admin() {
                Ok(())
            } else {
                Err(DenyReason::Forbidden)
            }
        };
        decide().into()
    }

    /// Self only; admins get no override.
    pub fn update_password(&self, principal: Option<&Principal>, target: UserId) -> Decision {
        let decide = || -> Result<(), DenyReason> {
            let p = acting(principal)?;
            if p.is(target) {
                Ok(())
            } else {
                Err(DenyReason::Forbidden)
            }
        };
        decide().into()
    }

    pub fn set_user_role(&self, principal: Option<&Principal>, target: UserId) -> Decision {
        self.admin_on_other(principal, target).into()
    }

    pub fn delete_user(&self, principal: Option<&Principal>, target: UserId) -> Decision {
        self.admin_on_other(principal, target).into()
    }

    pub fn toggle_user_status(&self, principal: Option<&Principal>, target: UserId) -> Decision {
        self.admin_on_other(principal, target).into()
    }

    fn category_gate(&self, principal: Option<&Principal>) -> Result<(), DenyReason> {
        match self.category_writes {
            CategoryWritePolicy::Public => optional_acting(principal).map(|_| ()),
            CategoryWritePolicy::Authenticated => acting(principal).map(|_| ()),
            CategoryWritePolicy::AdminOnly => acting(principal).and_then(admin).map(|_| ()),
        }
    }

    // The self check runs before the role check: targeting yourself is
    // reported as such whatever your role.
    fn admin_on_other(&self, principal: Option<&Principal>, target: UserId) -> Result<(), DenyReason> {
        let p = acting(principal)?;
        if p.is(target) {
            return Err(DenyReason::SelfActionForbidden);
        }
        admin(p).map(|_| ())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Building blocks
// ─────────────────────────────────────────────────────────────────────────────

/// A principal must be present and active.
fn acting(principal: Option<&Principal>) -> Result<&Principal, DenyReason> {
    let p = principal.ok_or(DenyReason::Unauthenticated)?;
    if !p.is_active() {
        return Err(DenyReason::InactiveAccount);
    }
    Ok(p)
}

/// Anonymous is fine, but a present principal must be active.
fn optional_acting(principal: Option<&Principal>) -> Result<Option<&Principal>, DenyReason> {
    principal.map(|p| acting(Some(p))).transpose()
}

fn admin(p: &Principal) -> Result<&Principal, DenyReason> {
    if p.is_admin() {
        Ok(p)
    } else {
        Err(DenyReason::Forbidden)
    }
}

fn owner_or_admin(p: &Principal, resource: &dyn Owned) -> Result<(), DenyReason> {
    if p.is_admin() || p.is(resource.owner_id()) {
        Ok(())
    } else {
        Err(DenyReason::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopkeep_core::Status;

    fn uid(n: i64) -> UserId {
        UserId::new(n)
    }

    fn admin_p(n: i64) -> Principal {
        Principal::active(uid(n), Role::Admin)
    }

    fn merchant(n: i64) -> Principal {
        Principal::active(uid(n), Role::Merchant)
    }

    fn user(n: i64) -> Principal {
        Principal::active(uid(n), Role::User)
    }

    fn policy() -> Policy {
        Policy::default()
    }

    #[test]
    fn admin_listing_honors_merchant_filter() {
        let scope = policy().list_products(Some(&admin_p(1)), Some(uid(7)));
        assert_eq!(scope, Decision::Allow(ProductScope { owner: Some(uid(7)) }));
    }

    #[test]
    fn non_admin_listing_is_forced_to_self() {
        let scope = policy().list_products(Some(&user(3)), Some(uid(7)));
        assert_eq!(scope, Decision::Allow(ProductScope { owner: Some(uid(3)) }));
    }

    #[test]
    fn anonymous_listing_is_public() {
        assert_eq!(
            policy().list_products(None, None),
            Decision::Allow(ProductScope { owner: None })
        );
        assert_eq!(
            policy().list_products(None, Some(uid(4))),
            Decision::Allow(ProductScope { owner: Some(uid(4)) })
        );
    }

    #[test]
    fn inactive_principal_cannot_list() {
        let p = Principal::new(uid(3), Role::Merchant, Status::Inactive);
        assert_eq!(
            policy().list_products(Some(&p), None).reason(),
            Some(DenyReason::InactiveAccount)
        );
    }

    #[test]
    fn read_product_allows_anonymous_owner_and_admin() {
        let product = uid(9);
        assert!(policy().read_product(None, &product).is_allowed());
        assert!(policy().read_product(Some(&merchant(9)), &product).is_allowed());
        assert!(policy().read_product(Some(&admin_p(1)), &product).is_allowed());
    }

    #[test]
    fn read_product_denies_authenticated_non_owner() {
        assert_eq!(
            policy().read_product(Some(&merchant(5)), &uid(9)),
            Decision::Deny(DenyReason::Forbidden)
        );
    }

    #[test]
    fn authenticate_checks_presence_then_status() {
        let mut inactive = merchant(3);
        inactive.status = Status::Inactive;
        assert_eq!(policy().authenticate(None), Decision::Deny(DenyReason::Unauthenticated));
        assert_eq!(
            policy().authenticate(Some(&inactive)),
            Decision::Deny(DenyReason::InactiveAccount)
        );
        assert!(policy().authenticate(Some(&user(4))).is_allowed());
    }

    #[test]
    fn create_product_requires_principal() {
        let creation = ProductCreation {
            category_exists: true,
            target_user: TargetUser::Found {
                id: uid(2),
                role: Role::Merchant,
            },
        };
        assert_eq!(
            policy().create_product(None, &creation),
            Decision::Deny(DenyReason::Unauthenticated)
        );
    }

    #[test]
    fn create_product_requires_existing_category() {
        let creation = ProductCreation {
            category_exists: false,
            target_user: TargetUser::Found {
                id: uid(2),
                role: Role::Merchant,
            },
        };
        assert_eq!(
            policy().create_product(Some(&admin_p(1)), &creation),
            Decision::Deny(DenyReason::InvalidReference)
        );
    }

    #[test]
    fn admin_creates_on_behalf_of_merchant() {
        let creation = ProductCreation {
            category_exists: true,
            target_user: TargetUser::Found {
                id: uid(2),
                role: Role::Merchant,
            },
        };
        assert_eq!(
            policy().create_product(Some(&admin_p(1)), &creation),
            Decision::Allow(uid(2))
        );
    }

    #[test]
    fn admin_target_must_exist_and_be_merchant() {
        let p = admin_p(1);
        let missing = ProductCreation {
            category_exists: true,
            target_user: TargetUser::NotFound(uid(99)),
        };
        let omitted = ProductCreation {
            category_exists: true,
            target_user: TargetUser::Omitted,
        };
        let wrong_role = ProductCreation {
            category_exists: true,
            target_user: TargetUser::Found {
                id: uid(2),
                role: Role::User,
            },
        };
        assert_eq!(
            policy().create_product(Some(&p), &missing).reason(),
            Some(DenyReason::InvalidReference)
        );
        assert_eq!(
            policy().create_product(Some(&p), &omitted).reason(),
            Some(DenyReason::InvalidReference)
        );
        assert_eq!(
            policy().create_product(Some(&p), &wrong_role).reason(),
            Some(DenyReason::InvalidRole)
        );
    }

    #[test]
    fn non_admin_owns_what_they_create() {
        let creation = ProductCreation {
            category_exists: true,
            target_user: TargetUser::Found {
                id: uid(42),
                role: Role::Merchant,
            },
        };
        assert_eq!(
            policy().create_product(Some(&merchant(5)), &creation),
            Decision::Allow(uid(5))
        );
    }

    #[test]
    fn non_admin_must_still_supply_target_user() {
        let creation = ProductCreation {
            category_exists: true,
            target_user: TargetUser::Omitted,
        };
        assert_eq!(
            policy().create_product(Some(&merchant(5)), &creation),
            Decision::Deny(DenyReason::InvalidReference)
        );
    }

    #[test]
    fn merchant_cannot_update_foreign_product() {
        assert_eq!(
            policy().update_product(Some(&merchant(5)), &uid(9), None),
            Decision::Deny(DenyReason::Forbidden)
        );
    }

    #[test]
    fn update_product_checks_new_category() {
        let p = merchant(5);
        assert!(policy().update_product(Some(&p), &uid(5), None).is_allowed());
        assert!(policy().update_product(Some(&p), &uid(5), Some(true)).is_allowed());
        assert_eq!(
            policy().update_product(Some(&p), &uid(5), Some(false)).reason(),
            Some(DenyReason::InvalidReference)
        );
    }

    #[test]
    fn delete_product_requires_owner_or_admin() {
        assert_eq!(
            policy().delete_product(None, &uid(5)).reason(),
            Some(DenyReason::Unauthenticated)
        );
        assert!(policy().delete_product(Some(&merchant(5)), &uid(5)).is_allowed());
        assert!(policy().delete_product(Some(&admin_p(1)), &uid(5)).is_allowed());
        assert_eq!(
            policy().delete_product(Some(&user(6)), &uid(5)).reason(),
            Some(DenyReason::Forbidden)
        );
    }

    #[test]
    fn delete_category_conflict_then_allow() {
        let p = admin_p(1);
        let used = CategoryUsage {
            id: CategoryId::new(2),
            referencing_products: 3,
        };
        assert_eq!(
            policy().delete_category(Some(&p), &used),
            Decision::Deny(DenyReason::Conflict { referencing: 3 })
        );

        let unused = CategoryUsage {
            referencing_products: 0,
            ..used
        };
        assert!(policy().delete_category(Some(&p), &unused).is_allowed());
    }

    #[test]
    fn category_write_policy_variants() {
        let public = Policy::new(CategoryWritePolicy::Public);
        let authenticated = Policy::new(CategoryWritePolicy::Authenticated);
        let admin_only = Policy::new(CategoryWritePolicy::AdminOnly);

        assert!(public.write_category(None).is_allowed());
        assert_eq!(
            authenticated.write_category(None).reason(),
            Some(DenyReason::Unauthenticated)
        );
        assert!(authenticated.write_category(Some(&user(3))).is_allowed());
        assert_eq!(
            admin_only.write_category(Some(&merchant(3))).reason(),
            Some(DenyReason::Forbidden)
        );
        assert!(admin_only.write_category(Some(&admin_p(1))).is_allowed());
    }

    #[test]
    fn user_updates_self_or_admin() {
        assert!(policy().update_user(Some(&user(3)), uid(3)).is_allowed());
        assert!(policy().update_user(Some(&admin_p(1)), uid(3)).is_allowed());
        assert_eq!(
            policy().update_user(Some(&merchant(4)), uid(3)).reason(),
            Some(DenyReason::Forbidden)
        );
    }

    #[test]
    fn password_change_is_self_only() {
        assert!(policy().update_password(Some(&user(3)), uid(3)).is_allowed());
        assert_eq!(
            policy().update_password(Some(&admin_p(1)), uid(3)).reason(),
            Some(DenyReason::Forbidden)
        );
    }

    #[test]
    fn admin_cannot_delete_or_disable_self() {
        let p = admin_p(1);
        assert_eq!(
            policy().delete_user(Some(&p), uid(1)).reason(),
            Some(DenyReason::SelfActionForbidden)
        );
        assert_eq!(
            policy().toggle_user_status(Some(&p), uid(1)).reason(),
            Some(DenyReason::SelfActionForbidden)
        );
        assert!(policy().delete_user(Some(&p), uid(2)).is_allowed());
        assert!(policy().toggle_user_status(Some(&p), uid(2)).is_allowed());
    }

    #[test]
    fn non_admin_cannot_manage_other_users() {
        assert_eq!(
            policy().delete_user(Some(&merchant(5)), uid(2)).reason(),
            Some(DenyReason::Forbidden)
        );
        assert_eq!(policy().list_users(Some(&merchant(5))).reason(), Some(DenyReason::Forbidden));
        assert!(policy().list_users(Some(&admin_p(1))).is_allowed());
    }

    #[test]
    fn role_changes_need_admin_and_another_account() {
        assert!(policy().set_user_role(Some(&admin_p(1)), uid(2)).is_allowed());
        assert_eq!(
            policy().set_user_role(Some(&admin_p(1)), uid(1)).reason(),
            Some(DenyReason::SelfActionForbidden)
        );
        assert_eq!(
            policy().set_user_role(Some(&user(2)), uid(3)).reason(),
            Some(DenyReason::Forbidden)
        );
    }

    #[test]
    fn authorize_dispatches_to_typed_checks() {
        let p = user(3);
        assert_eq!(
            policy().authorize(Some(&p), Action::ListProducts { merchant_id: Some(uid(7)) }),
            Decision::Allow(Grant::Scope(ProductScope { owner: Some(uid(3)) }))
        );
        let creation = ProductCreation {
            category_exists: true,
            target_user: TargetUser::NotFound(uid(8)),
        };
        assert_eq!(
            policy().authorize(Some(&p), Action::CreateProduct(&creation)),
            Decision::Allow(Grant::Owner(uid(3)))
        );
        assert_eq!(
            policy().authorize(None, Action::ViewProfile),
            Decision::Deny(DenyReason::Unauthenticated)
        );
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(DenyReason::Conflict { referencing: 1 }.code(), "conflict");
        assert_eq!(DenyReason::SelfActionForbidden.code(), "self_action_forbidden");
        assert_eq!(
            DenyReason::Conflict { referencing: 3 }.to_string(),
            "category is still referenced by 3 product(s)"
        );
    }

    #[test]
    fn category_write_policy_parses_config_values() {
        assert_eq!("public".parse::<CategoryWritePolicy>(), Ok(CategoryWritePolicy::Public));
        assert_eq!("admin-only".parse::<CategoryWritePolicy>(), Ok(CategoryWritePolicy::AdminOnly));
        assert_eq!(
            "Authenticated".parse::<CategoryWritePolicy>(),
            Ok(CategoryWritePolicy::Authenticated)
        );
        assert!("nobody".parse::<CategoryWritePolicy>().is_err());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn role() -> impl Strategy<Value = Role> {
            prop_oneof![Just(Role::Admin), Just(Role::Merchant), Just(Role::User)]
        }

        fn non_admin_role() -> impl Strategy<Value = Role> {
            prop_oneof![Just(Role::Merchant), Just(Role::User)]
        }

        fn principal() -> impl Strategy<Value = Principal> {
            (1i64..50, role()).prop_map(|(id, role)| Principal::active(UserId::new(id), role))
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: read-product denies exactly authenticated, non-admin non-owners.
            #[test]
            fn read_product_denial_is_exact(
                p in proptest::option::of(principal()),
                owner in 1i64..50,
            ) {
                let owner = UserId::new(owner);
                let decision = Policy::default().read_product(p.as_ref(), &owner);
                let should_deny = matches!(p, Some(p) if !p.is_admin() && p.id != owner);
                if should_deny {
                    prop_assert_eq!(decision, Decision::Deny(DenyReason::Forbidden));
                } else {
                    prop_assert!(decision.is_allowed());
                }
            }

            /// Property: a non-admin's product is always owned by the non-admin.
            #[test]
            fn non_admin_creation_is_self_owned(
                id in 1i64..50,
                role in non_admin_role(),
                target in 1i64..50,
                target_role in role(),
                found in any::<bool>(),
            ) {
                let p = Principal::active(UserId::new(id), role);
                let target_user = if found {
                    TargetUser::Found { id: UserId::new(target), role: target_role }
                } else {
                    TargetUser::NotFound(UserId::new(target))
                };
                let creation = ProductCreation { category_exists: true, target_user };
                prop_assert_eq!(
                    Policy::default().create_product(Some(&p), &creation),
                    Decision::Allow(p.id)
                );
            }

            /// Property: admins may target merchants, never plain users.
            #[test]
            fn admin_creation_requires_merchant_target(admin in 1i64..50, target in 1i64..50) {
                let p = Principal::active(UserId::new(admin), Role::Admin);
                let merchant = ProductCreation {
                    category_exists: true,
                    target_user: TargetUser::Found { id: UserId::new(target), role: Role::Merchant },
                };
                let plain = ProductCreation {
                    category_exists: true,
                    target_user: TargetUser::Found { id: UserId::new(target), role: Role::User },
                };
                prop_assert_eq!(
                    Policy::default().create_product(Some(&p), &merchant),
                    Decision::Allow(UserId::new(target))
                );
                prop_assert_eq!(
                    Policy::default().create_product(Some(&p), &plain),
                    Decision::Deny(DenyReason::InvalidRole)
                );
            }

            /// Property: delete-category conflicts with exactly the reference count.
            #[test]
            fn delete_category_reports_exact_count(p in principal(), n in 0u64..10_000) {
                let usage = CategoryUsage { id: CategoryId::new(1), referencing_products: n };
                let decision = Policy::default().delete_category(Some(&p), &usage);
                if n > 0 {
                    prop_assert_eq!(decision, Decision::Deny(DenyReason::Conflict { referencing: n }));
                } else {
                    prop_assert!(decision.is_allowed());
                }
            }

            /// Property: nobody deletes or disables their own account here.
            #[test]
            fn self_targeting_is_always_refused(p in principal()) {
                let policy = Policy::default();
                prop_assert_eq!(
                    policy.delete_user(Some(&p), p.id),
                    Decision::Deny(DenyReason::SelfActionForbidden)
                );
                prop_assert_eq!(
                    policy.toggle_user_status(Some(&p), p.id),
                    Decision::Deny(DenyReason::SelfActionForbidden)
                );
            }

            /// Property: password changes on others are refused for every role;
            /// profile updates on others are allowed for admins.
            #[test]
            fn password_has_no_admin_override(p in principal(), other in 1i64..50) {
                let target = UserId::new(other);
                prop_assume!(target != p.id);
                let policy = Policy::default();
                prop_assert_eq!(
                    policy.update_password(Some(&p), target),
                    Decision::Deny(DenyReason::Forbidden)
                );
                prop_assert_eq!(policy.update_user(Some(&p), target).is_allowed(), p.is_admin());
            }

            /// Property: every decision is a pure function of its inputs.
            #[test]
            fn decisions_are_deterministic(p in principal(), owner in 1i64..50, merchant_id in 1i64..50) {
                let policy = Policy::default();
                let owner = UserId::new(owner);
                let action = Action::ListProducts { merchant_id: Some(UserId::new(merchant_id)) };
                prop_assert_eq!(policy.authorize(Some(&p), action), policy.authorize(Some(&p), action));
                prop_assert_eq!(
                    policy.update_product(Some(&p), &owner, None),
                    policy.update_product(Some(&p), &owner, None)
                );
            }
        }
    }
}
