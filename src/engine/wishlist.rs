//! Wishlist engine. Local persistence only, nothing is sent to the backend.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::aggregates::{WishlistAction, WishlistItem, WishlistState};
use crate::domain::events::{DomainEvent, WishlistEvent};
use crate::store::{self, LocalStore, WISHLIST_KEY};

pub struct WishlistEngine {
    state: WishlistState,
    store: Arc<dyn LocalStore>,
    events: Vec<DomainEvent>,
}

impl std::fmt::Debug for WishlistEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistEngine").field("state", &self.state).finish_non_exhaustive()
    }
}

impl WishlistEngine {
    pub fn load(store: Arc<dyn LocalStore>) -> Self {
        let state = store::load::<WishlistState>(store.as_ref(), WISHLIST_KEY)
            .map(|stored| WishlistState::default().reduce(WishlistAction::Load(stored)))
            .unwrap_or_default();
        Self { state, store, events: vec![] }
    }

    pub fn items(&self) -> &[WishlistItem] { &self.state.items }
    pub fn contains(&self, id: &str) -> bool { self.state.contains(id) }
    pub fn len(&self) -> usize { self.state.len() }
    pub fn is_empty(&self) -> bool { self.state.is_empty() }

    pub fn add_to_wishlist(&mut self, item: WishlistItem) {
        if self.state.contains(&item.id) { return; }
        let id = item.id.clone();
        self.dispatch(WishlistAction::Add(item));
        self.events.push(DomainEvent::Wishlist(WishlistEvent::Added { id }));
    }

    pub fn remove_from_wishlist(&mut self, id: &str) {
        if !self.state.contains(id) { return; }
        self.dispatch(WishlistAction::Remove(id.to_string()));
        self.events.push(DomainEvent::Wishlist(WishlistEvent::Removed { id: id.to_string() }));
    }

    pub fn clear(&mut self) {
        self.dispatch(WishlistAction::Clear);
        self.events.push(DomainEvent::Wishlist(WishlistEvent::Cleared));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn dispatch(&mut self, action: WishlistAction) {
        debug!(?action, "wishlist action");
        self.state = std::mem::take(&mut self.state).reduce(action);
        if let Err(e) = store::save(self.store.as_ref(), WISHLIST_KEY, &self.state) {
            warn!(error = %e, "failed to persist wishlist");
        }
    }
}
