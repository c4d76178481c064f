use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopkeep_core::{
    CategoryId, DomainError, DomainResult, Entity, FieldError, Owned, ProductId, Status, UserId,
};

const NAME_MAX: usize = 100;
const IMAGE_MAX: usize = 255;
/// Largest price representable as DECIMAL(10, 2), in cents.
const PRICE_MAX_CENTS: i64 = 9_999_999_999;

/// A listed product, owned by the merchant in `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    /// Price in the smallest currency unit.
    pub price_cents: i64,
    pub status: Status,
    pub category_id: CategoryId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Owned for Product {
    fn owner_id(&self) -> UserId {
        self.user_id
    }
}

/// Insert payload; storage assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub image: Option<String>,
    pub price_cents: i64,
    pub status: Status,
    pub category_id: CategoryId,
    pub user_id: UserId,
}

/// A product-creation request as submitted.
///
/// `user_id` is the requested owner and `category_id` the requested category.
/// Whether either resolves is an authorization decision, so both stay optional
/// here. Missing `name` and `price_cents` surface from [`ProductDraft::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl ProductDraft {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();
        check_name(&self.name, &mut errors);
        if let Some(image) = &self.image {
            check_image(image, &mut errors);
        }
        match self.price_cents {
            Some(price) => check_price(price, &mut errors),
            None => errors.push(FieldError::new("price_cents", "is required")),
        }
        DomainError::check(errors)
    }

    /// Build the insert payload for the owner and category the policy accepted.
    /// Call after [`ProductDraft::validate`].
    pub fn into_new(self, owner: UserId, category_id: CategoryId) -> NewProduct {
        NewProduct {
            name: self.name.trim().to_string(),
            image: self.image.filter(|i| !i.trim().is_empty()),
            price_cents: self.price_cents.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            category_id,
            user_id: owner,
        }
    }
}

/// Partial update. Ownership is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl ProductPatch {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            check_name(name, &mut errors);
        }
        if let Some(image) = &self.image {
            check_image(image, &mut errors);
        }
        if let Some(price) = self.price_cents {
            check_price(price, &mut errors);
        }
        DomainError::check(errors)
    }

    /// The new category, if this patch moves the product.
    pub fn category_change(&self, product: &Product) -> Option<CategoryId> {
        self.category_id.filter(|c| *c != product.category_id)
    }

    pub fn apply(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            product.name = name.trim().to_string();
        }
        if let Some(image) = &self.image {
            let image = image.trim();
            product.image = (!image.is_empty()).then(|| image.to_string());
        }
        if let Some(price) = self.price_cents {
            product.price_cents = price;
        }
        if let Some(status) = self.status {
            product.status = status;
        }
        if let Some(category_id) = self.category_id {
            product.category_id = category_id;
        }
        product.updated_at = now;
    }
}

fn check_name(name: &str, errors: &mut Vec<FieldError>) {
    let len = name.trim().chars().count();
    if len == 0 {
        errors.push(FieldError::new("name", "must not be empty"));
    } else if len > NAME_MAX {
        errors.push(FieldError::new("name", format!("must be at most {NAME_MAX} characters")));
    }
}

fn check_image(image: &str, errors: &mut Vec<FieldError>) {
    if image.chars().count() > IMAGE_MAX {
        errors.push(FieldError::new("image", format!("must be at most {IMAGE_MAX} characters")));
    }
}

fn check_price(price_cents: i64, errors: &mut Vec<FieldError>) {
    if price_cents < 0 {
        errors.push(FieldError::new("price_cents", "must not be negative"));
    } else if price_cents > PRICE_MAX_CENTS {
        errors.push(FieldError::new("price_cents", "is too large"));
    }
}
