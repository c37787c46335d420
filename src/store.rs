//! Repository contract consumed from the external store
//!
//! The core treats these as synchronous, strongly consistent single-row
//! operations with read-your-write visibility per user. No cross-row
//! transactions happen here; every mutation in the transition table is a
//! single call.

use crate::date::Ymd;
use crate::ids::{ProductId, RecipeId, TermKey, UserId};
use crate::model::{NewProduct, Product, Recipe, User};
use crate::state::ConversationState;

/// Repository storage trait
pub trait Repository: Send + Sync + 'static {
    fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;
    fn upsert_user(&self, user: User) -> Result<(), StoreError>;

    fn get_state(&self, id: &UserId) -> Result<Option<ConversationState>, StoreError>;
    fn save_state(&self, state: ConversationState) -> Result<(), StoreError>;
    fn delete_state(&self, id: &UserId) -> Result<(), StoreError>;

    fn create_product(&self, product: NewProduct) -> Result<ProductId, StoreError>;
    fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
    fn update_product_expiry(&self, id: ProductId, expires_on: Ymd) -> Result<(), StoreError>;
    fn delete_product(&self, id: ProductId) -> Result<(), StoreError>;
    /// All products of one user, ordered by expiry then ID
    fn products_by_user(&self, id: &UserId) -> Result<Vec<Product>, StoreError>;
    /// Purge every product expiring strictly before the cutoff; returns
    /// the number removed
    fn delete_products_expiring_before(&self, cutoff: Ymd) -> Result<u64, StoreError>;

    /// Comma-joined recipe IDs for a term key, absent when never indexed
    fn get_term_entry(&self, key: &TermKey) -> Result<Option<Box<str>>, StoreError>;
    /// Append a recipe ID to a term entry, creating the entry on first use.
    ///
    /// Dedupe is tail-only: the ID is skipped when it already sits at the
    /// end of the entry. An ID recurring non-consecutively is appended
    /// again, so indexing jobs must not rely on full-membership idempotence.
    fn append_term_entry(&self, key: &TermKey, recipe: RecipeId) -> Result<(), StoreError>;

    fn get_recipe(&self, id: RecipeId) -> Result<Option<Recipe>, StoreError>;

    /// Users whose subscription flag is on
    fn subscribed_users(&self) -> Result<Vec<UserId>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(Box<str>),
    #[error("not found: {0}")]
    NotFound(Box<str>),
}

/// In-memory repository for testing
pub struct InMemoryStore {
    users: std::sync::RwLock<std::collections::HashMap<UserId, User>>,
    states: std::sync::RwLock<std::collections::HashMap<UserId, ConversationState>>,
    products: std::sync::RwLock<std::collections::BTreeMap<u64, Product>>,
    terms: std::sync::RwLock<std::collections::HashMap<TermKey, String>>,
    recipes: std::sync::RwLock<std::collections::HashMap<u64, Recipe>>,
    next_product: std::sync::atomic::AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: std::sync::RwLock::new(std::collections::HashMap::new()),
            states: std::sync::RwLock::new(std::collections::HashMap::new()),
            products: std::sync::RwLock::new(std::collections::BTreeMap::new()),
            terms: std::sync::RwLock::new(std::collections::HashMap::new()),
            recipes: std::sync::RwLock::new(std::collections::HashMap::new()),
            next_product: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Seed a catalog recipe; the catalog is immutable at runtime so this
    /// has no counterpart on the trait
    pub fn insert_recipe(&self, recipe: Recipe) {
        if let Ok(mut recipes) = self.recipes.write() {
            recipes.insert(recipe.id.0, recipe);
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned(e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(e.to_string().into())
}

impl Repository for InMemoryStore {
    fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(id).cloned())
    }

    fn upsert_user(&self, user: User) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        users.insert(user.id.clone(), user);
        Ok(())
    }

    fn get_state(&self, id: &UserId) -> Result<Option<ConversationState>, StoreError> {
        let states = self.states.read().map_err(poisoned)?;
        Ok(states.get(id).cloned())
    }

    fn save_state(&self, state: ConversationState) -> Result<(), StoreError> {
        let mut states = self.states.write().map_err(poisoned)?;
        states.insert(state.user_id.clone(), state);
        Ok(())
    }

    fn delete_state(&self, id: &UserId) -> Result<(), StoreError> {
        let mut states = self.states.write().map_err(poisoned)?;
        states.remove(id);
        Ok(())
    }

    fn create_product(&self, product: NewProduct) -> Result<ProductId, StoreError> {
        let id = ProductId::new(
            self.next_product
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        );
        let mut products = self.products.write().map_err(poisoned)?;
        products.insert(
            id.0,
            Product {
                id,
                name: product.name,
                key: product.key,
                owner: product.owner,
                registered_on: product.registered_on,
                expires_on: product.expires_on,
            },
        );
        Ok(id)
    }

    fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let products = self.products.read().map_err(poisoned)?;
        Ok(products.get(&id.0).cloned())
    }

    fn update_product_expiry(&self, id: ProductId, expires_on: Ymd) -> Result<(), StoreError> {
        let mut products = self.products.write().map_err(poisoned)?;
        let product = products
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::NotFound(id.to_string().into()))?;
        product.expires_on = expires_on;
        Ok(())
    }

    fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut products = self.products.write().map_err(poisoned)?;
        products.remove(&id.0);
        Ok(())
    }

    fn products_by_user(&self, id: &UserId) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().map_err(poisoned)?;
        let mut owned: Vec<Product> = products
            .values()
            .filter(|p| &p.owner == id)
            .cloned()
            .collect();
        owned.sort_by_key(|p| (p.expires_on, p.id));
        Ok(owned)
    }

    fn delete_products_expiring_before(&self, cutoff: Ymd) -> Result<u64, StoreError> {
        let mut products = self.products.write().map_err(poisoned)?;
        let before = products.len();
        products.retain(|_, p| p.expires_on >= cutoff);
        Ok((before - products.len()) as u64)
    }

    fn get_term_entry(&self, key: &TermKey) -> Result<Option<Box<str>>, StoreError> {
        let terms = self.terms.read().map_err(poisoned)?;
        Ok(terms.get(key).map(|entry| entry.as_str().into()))
    }

    fn append_term_entry(&self, key: &TermKey, recipe: RecipeId) -> Result<(), StoreError> {
        let mut terms = self.terms.write().map_err(poisoned)?;
        let id = recipe.to_string();
        match terms.get_mut(key) {
            Some(entry) => {
                if entry.rsplit(',').next() != Some(id.as_str()) {
                    entry.push(',');
                    entry.push_str(&id);
                }
            }
            None => {
                terms.insert(key.clone(), id);
            }
        }
        Ok(())
    }

    fn get_recipe(&self, id: RecipeId) -> Result<Option<Recipe>, StoreError> {
        let recipes = self.recipes.read().map_err(poisoned)?;
        Ok(recipes.get(&id.0).cloned())
    }

    fn subscribed_users(&self) -> Result<Vec<UserId>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        let mut ids: Vec<UserId> = users
            .values()
            .filter(|u| u.subscribed)
            .map(|u| u.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(owner: &str, name: &str, expires_on: Ymd) -> NewProduct {
        NewProduct {
            name: name.into(),
            key: TermKey::new(name),
            owner: UserId::new(owner),
            registered_on: 20240101,
            expires_on,
        }
    }

    #[test]
    fn test_products_ordered_by_expiry() {
        let store = InMemoryStore::new();
        store.create_product(product("u1", "cheese", 20240520)).unwrap();
        store.create_product(product("u1", "milk", 20240505)).unwrap();
        store.create_product(product("u2", "eggs", 20240501)).unwrap();

        let owned = store.products_by_user(&UserId::new("u1")).unwrap();
        let names: Vec<&str> = owned.iter().map(|p| p.name.as_ref()).collect();
        assert_eq!(names, vec!["milk", "cheese"]);
    }

    #[test]
    fn test_expiry_purge() {
        let store = InMemoryStore::new();
        store.create_product(product("u1", "old", 20240401)).unwrap();
        store.create_product(product("u1", "edge", 20240501)).unwrap();
        store.create_product(product("u1", "fresh", 20240601)).unwrap();

        let purged = store.delete_products_expiring_before(20240501).unwrap();
        assert_eq!(purged, 1);
        let left = store.products_by_user(&UserId::new("u1")).unwrap();
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn test_term_append_tail_dedupe() {
        let store = InMemoryStore::new();
        let key = TermKey::new("milk");

        store.append_term_entry(&key, RecipeId::new(4)).unwrap();
        store.append_term_entry(&key, RecipeId::new(4)).unwrap();
        store.append_term_entry(&key, RecipeId::new(9)).unwrap();
        assert_eq!(store.get_term_entry(&key).unwrap().as_deref(), Some("4,9"));

        // Non-consecutive repeat slips past the tail check
        store.append_term_entry(&key, RecipeId::new(4)).unwrap();
        assert_eq!(
            store.get_term_entry(&key).unwrap().as_deref(),
            Some("4,9,4")
        );
    }

    #[test]
    fn test_state_round_trip_and_delete() {
        let store = InMemoryStore::new();
        let id = UserId::new("u1");
        store.save_state(ConversationState::new(id.clone())).unwrap();
        assert!(store.get_state(&id).unwrap().is_some());

        store.delete_state(&id).unwrap();
        assert!(store.get_state(&id).unwrap().is_none());
    }
}
