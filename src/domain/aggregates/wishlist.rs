//! Wishlist Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WishlistItem { pub id: String, pub name: String, #[serde(default)] pub image: String, pub price: Decimal }

/// Ordered, unique by `id`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WishlistState { #[serde(default)] pub items: Vec<WishlistItem> }

#[derive(Clone, Debug, PartialEq)]
pub enum WishlistAction { Add(WishlistItem), Remove(String), Clear, Load(WishlistState) }

impl WishlistState {
    pub fn contains(&self, id: &str) -> bool { self.items.iter().any(|i| i.id == id) }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn reduce(mut self, action: WishlistAction) -> Self {
        match action {
            WishlistAction::Add(item) => if !self.contains(&item.id) { self.items.push(item) },
            WishlistAction::Remove(id) => self.items.retain(|i| i.id != id),
            WishlistAction::Clear => self.items.clear(),
            WishlistAction::Load(state) => self = state,
        }
        self
    }
}
