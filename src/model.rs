//! Persisted records owned through the repository contract

use crate::date::Ymd;
use crate::ids::{ProductId, RecipeId, TermKey, UserId};
use serde::{Deserialize, Serialize};

/// A chat user. Created on the first subscribe event; the subscription
/// flag is flipped on unsubscribe, the row is never hard-deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub subscribed: bool,
    /// Packed date of the first subscribe
    pub registered_on: Ymd,
    /// Packed date of the last unsubscribe, 0 while never unsubscribed
    #[serde(default)]
    pub removed_on: Ymd,
}

/// User-owned perishable item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Free-text name, at most 15 characters enforced at entry
    pub name: Box<str>,
    /// Canonical phonetic key derived from the name
    pub key: TermKey,
    pub owner: UserId,
    pub registered_on: Ymd,
    pub expires_on: Ymd,
}

/// Product fields supplied at creation; the repository assigns the ID
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewProduct {
    pub name: Box<str>,
    pub key: TermKey,
    pub owner: UserId,
    pub registered_on: Ymd,
    pub expires_on: Ymd,
}

/// Immutable catalog entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: Box<str>,
    pub link: Box<str>,
    pub photo: Box<str>,
    /// Raw ingredient text as collected
    pub ingredients: Box<str>,
    /// Category path in the source catalog
    pub category: Box<str>,
    pub collected_on: Ymd,
}
