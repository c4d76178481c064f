//! Query-string DTOs and their mapping onto repository queries.
//!
//! Request bodies deserialize straight into the domain input types
//! (`Registration`, `ProductDraft`, ...), so only listings need DTOs here.

use serde::Deserialize;

use shopkeep_auth::Role;
use shopkeep_core::{CategoryId, UserId};
use shopkeep_infra::repository::{
    CategoryQuery, CategorySort, PageRequest, ProductQuery, ProductSort, SortOrder, UserQuery,
};

#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub role: Option<Role>,
}

impl UserListParams {
    pub fn into_query(self) -> UserQuery {
        UserQuery {
            search: self.search,
            role: self.role,
            page: PageRequest::new(self.page, self.limit),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    #[serde(rename = "sortBy", alias = "sort")]
    pub sort: Option<CategorySort>,
    pub order: Option<SortOrder>,
}

impl CategoryListParams {
    pub fn into_query(self) -> CategoryQuery {
        CategoryQuery {
            search: self.search,
            sort: self.sort.unwrap_or_default(),
            order: self.order.unwrap_or(SortOrder::Asc),
            page: PageRequest::new(self.page, self.limit),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Honored for admins and anonymous callers only.
    pub merchant_id: Option<UserId>,
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    #[serde(rename = "sortBy", alias = "sort")]
    pub sort: Option<ProductSort>,
    pub order: Option<SortOrder>,
}

impl ProductListParams {
    /// Splits off the requested merchant filter; the owner scope itself is
    /// decided by the policy.
    pub fn into_query(self) -> (Option<UserId>, ProductQuery) {
        let query = ProductQuery {
            owner: None,
            category_id: self.category_id,
            name: self.name,
            sort: self.sort.unwrap_or_default(),
            order: self.order.unwrap_or(SortOrder::Desc),
            page: PageRequest::new(self.page, self.limit),
        };
        (self.merchant_id, query)
    }
}
