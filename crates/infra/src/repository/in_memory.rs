use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use shopkeep_auth::{NewUser, User};
use shopkeep_catalog::{Category, NewCategory, NewProduct, Product};
use shopkeep_core::{CategoryId, ProductId, UserId};

use super::query::{contains_ci, CategorySort, ProductSort};
use super::{
    CategoryQuery, CategoryRepository, Page, ProductQuery, ProductRepository, StoreError,
    StoreResult, UserQuery, UserRepository,
};

#[derive(Debug)]
struct Tables {
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    next_user: i64,
    next_category: i64,
    next_product: i64,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            categories: BTreeMap::new(),
            products: BTreeMap::new(),
            next_user: 1,
            next_category: 1,
            next_product: 1,
        }
    }
}

impl Tables {
    fn user_conflict(&self, username: &str, email: &str, except: Option<UserId>) -> Option<&'static str> {
        self.users
            .values()
            .filter(|u| Some(u.id) != except)
            .find_map(|u| {
                if u.username.eq_ignore_ascii_case(username) {
                    Some("username")
                } else if u.email.eq_ignore_ascii_case(email) {
                    Some("email")
                } else {
                    None
                }
            })
    }

    fn category_name_taken(&self, name: &str, except: Option<CategoryId>) -> bool {
        self.categories
            .values()
            .any(|c| Some(c.id) != except && c.name.eq_ignore_ascii_case(name))
    }

    fn products_in(&self, id: CategoryId) -> u64 {
        self.products.values().filter(|p| p.category_id == id).count() as u64
    }
}

/// Single-process store backed by ordered maps behind one lock.
///
/// Suitable for development and tests. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl UserRepository for InMemoryStore {
    fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let tables = self.read()?;
        let login = login.trim();
        Ok(tables
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(login) || u.email.eq_ignore_ascii_case(login))
            .cloned())
    }

    fn insert_user(&self, new: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        let mut tables = self.write()?;
        if let Some(field) = tables.user_conflict(&new.username, &new.email, None) {
            return Err(StoreError::Duplicate { field });
        }

        let id = UserId::new(tables.next_user);
        tables.next_user += 1;
        let user = User {
            id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            nickname: new.nickname,
            avatar: None,
            role: new.role,
            status: new.status,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    fn save_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        if let Some(field) = tables.user_conflict(&user.username, &user.email, Some(user.id)) {
            return Err(StoreError::Duplicate { field });
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    fn delete_user(&self, id: UserId) -> StoreResult<u64> {
        let mut tables = self.write()?;
        if tables.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        let before = tables.products.len();
        tables.products.retain(|_, p| p.user_id != id);
        let removed = (before - tables.products.len()) as u64;
        if removed > 0 {
            tracing::debug!(user_id = %id, removed, "removed products owned by deleted user");
        }
        Ok(removed)
    }

    fn list_users(&self, query: &UserQuery) -> StoreResult<Page<User>> {
        let tables = self.read()?;
        let search = query.search.as_deref();
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| query.role.is_none_or(|r| u.role == r))
            .filter(|u| {
                contains_ci(&u.username, search)
                    || contains_ci(&u.email, search)
                    || u.nickname.as_deref().is_some_and(|n| contains_ci(n, search))
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::from_sorted(users, query.page))
    }
}

impl CategoryRepository for InMemoryStore {
    fn find_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    fn insert_category(&self, new: NewCategory, now: DateTime<Utc>) -> StoreResult<Category> {
        let mut tables = self.write()?;
        if tables.category_name_taken(&new.name, None) {
            return Err(StoreError::Duplicate { field: "name" });
        }

        let id = CategoryId::new(tables.next_category);
        tables.next_category += 1;
        let category = Category {
            id,
            name: new.name,
            description: new.description,
            sort: new.sort,
            status: new.status,
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(id, category.clone());
        Ok(category)
    }

    fn save_category(&self, category: &Category) -> StoreResult<()> {
        let mut tables = self.write()?;
        if !tables.categories.contains_key(&category.id) {
            return Err(StoreError::NotFound);
        }
        if tables.category_name_taken(&category.name, Some(category.id)) {
            return Err(StoreError::Duplicate { field: "name" });
        }
        tables.categories.insert(category.id, category.clone());
        Ok(())
    }

    fn count_products_in(&self, id: CategoryId) -> StoreResult<u64> {
        Ok(self.read()?.products_in(id))
    }

    fn delete_category_if_unreferenced(&self, id: CategoryId) -> StoreResult<()> {
        let mut tables = self.write()?;
        if !tables.categories.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        let referencing = tables.products_in(id);
        if referencing > 0 {
            return Err(StoreError::Referenced { referencing });
        }
        tables.categories.remove(&id);
        Ok(())
    }

    fn list_categories(&self, query: &CategoryQuery) -> StoreResult<Page<Category>> {
        let tables = self.read()?;
        let mut categories: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| contains_ci(&c.name, query.search.as_deref()))
            .cloned()
            .collect();
        categories.sort_by(|a, b| {
            let primary = match query.sort {
                CategorySort::Id => Ordering::Equal,
                CategorySort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                CategorySort::Sort => a.sort.cmp(&b.sort),
                CategorySort::CreatedAt => a.created_at.cmp(&b.created_at),
                CategorySort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            query.order.apply(primary.then(a.id.cmp(&b.id)))
        });
        Ok(Page::from_sorted(categories, query.page))
    }
}

impl ProductRepository for InMemoryStore {
    fn find_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    fn insert_product(&self, new: NewProduct, now: DateTime<Utc>) -> StoreResult<Product> {
        let mut tables = self.write()?;
        if !tables.categories.contains_key(&new.category_id) {
            return Err(StoreError::MissingReference { entity: "category" });
        }
        if !tables.users.contains_key(&new.user_id) {
            return Err(StoreError::MissingReference { entity: "user" });
        }

        let id = ProductId::new(tables.next_product);
        tables.next_product += 1;
        let product = Product {
            id,
            name: new.name,
            image: new.image,
            price_cents: new.price_cents,
            status: new.status,
            category_id: new.category_id,
            user_id: new.user_id,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    fn save_product(&self, product: &Product) -> StoreResult<()> {
        let mut tables = self.write()?;
        if !tables.products.contains_key(&product.id) {
            return Err(StoreError::NotFound);
        }
        if !tables.categories.contains_key(&product.category_id) {
            return Err(StoreError::MissingReference { entity: "category" });
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        self.write()?
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn list_products(&self, query: &ProductQuery) -> StoreResult<Page<Product>> {
        let tables = self.read()?;
        let mut products: Vec<Product> = tables
            .products
            .values()
            .filter(|p| query.owner.is_none_or(|o| p.user_id == o))
            .filter(|p| query.category_id.is_none_or(|c| p.category_id == c))
            .filter(|p| contains_ci(&p.name, query.name.as_deref()))
            .cloned()
            .collect();
        products.sort_by(|a, b| {
            let primary = match query.sort {
                ProductSort::Id => Ordering::Equal,
                ProductSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                ProductSort::Price => a.price_cents.cmp(&b.price_cents),
                ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
                ProductSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            query.order.apply(primary.then(a.id.cmp(&b.id)))
        });
        Ok(Page::from_sorted(products, query.page))
    }
}
