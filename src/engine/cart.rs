//! Cart engine
//!
//! Owns the live [`CartState`], pushes every transition through the pure reducer,
//! writes the result to the local store and then mirrors it to the backend
//! without waiting for or retrying the upload.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::{ApiError, CartBackend, CouponValidationRequest};
use crate::domain::aggregates::{AppliedCoupon, CartAction, CartItem, CartState, Product, ShippingConfig};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{CouponCode, DEFAULT_MAX_STOCK};
use crate::store::{self, LocalStore, CART_KEY};

/// Outcome of applying a coupon, shown to the shopper as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CouponResult { pub success: bool, pub message: String }

impl CouponResult {
    fn ok(message: impl Into<String>) -> Self { Self { success: true, message: message.into() } }
    fn failed(message: impl Into<String>) -> Self { Self { success: false, message: message.into() } }
}

pub struct CartEngine {
    state: CartState,
    shipping: ShippingConfig,
    store: Arc<dyn LocalStore>,
    backend: Arc<dyn CartBackend>,
    events: Vec<DomainEvent>,
}

impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine").field("state", &self.state).field("shipping", &self.shipping).finish_non_exhaustive()
    }
}

impl CartEngine {
    /// Rehydrate from the local store, starting empty if nothing usable is stored.
    pub fn load(store: Arc<dyn LocalStore>, backend: Arc<dyn CartBackend>) -> Self {
        let stored: Option<CartState> = store::load(store.as_ref(), CART_KEY);
        let mut engine = Self { state: CartState::default(), shipping: ShippingConfig::default(), store, backend, events: vec![] };
        if let Some(stored) = stored {
            let had_coupon = stored.applied_coupon.as_ref().map(|c| c.code.clone());
            engine.state = CartState::default().reduce(CartAction::Load(stored));
            if let Some(code) = had_coupon.filter(|_| engine.state.applied_coupon.is_none()) {
                engine.record_eviction(code);
                engine.persist();
            }
        }
        debug!(items = engine.state.items.len(), "cart rehydrated");
        engine
    }

    /// Re-read shipping fee settings. Keeps the previous snapshot if the backend is unavailable.
    pub async fn refresh_shipping(&mut self) {
        match self.backend.shipping_config().await {
            Ok(config) => self.shipping = config,
            Err(e) => warn!(error = %e, "failed to fetch shipping config, keeping current values"),
        }
    }

    pub fn state(&self) -> &CartState { &self.state }
    pub fn items(&self) -> &[CartItem] { &self.state.items }
    pub fn applied_coupon(&self) -> Option<&AppliedCoupon> { self.state.applied_coupon.as_ref() }
    pub fn shipping_config(&self) -> &ShippingConfig { &self.shipping }
    pub fn is_empty(&self) -> bool { self.state.is_empty() }

    pub fn add_to_cart(&mut self, product: &Product, selected_size: &str, quantity: u32) {
        let before = self.state.item(&product.id, selected_size).map(|i| i.quantity);
        self.dispatch(CartAction::Add { product: product.clone(), selected_size: selected_size.to_string(), quantity });
        if let Some(item) = self.state.item(&product.id, selected_size).filter(|i| Some(i.quantity) != before) {
            let event = CartEvent::ItemAdded { id: item.id.clone(), selected_size: item.selected_size.clone(), quantity: item.quantity };
            self.events.push(DomainEvent::Cart(event));
        }
    }

    pub fn remove_from_cart(&mut self, id: &str, selected_size: &str) {
        let existed = self.state.item(id, selected_size).is_some();
        self.dispatch(CartAction::Remove { id: id.to_string(), selected_size: selected_size.to_string() });
        if existed {
            self.events.push(DomainEvent::Cart(CartEvent::ItemRemoved { id: id.to_string(), selected_size: selected_size.to_string() }));
        }
    }

    /// `max_stock` defaults to 99. A quantity of zero or below removes the line.
    pub fn update_quantity(&mut self, id: &str, selected_size: &str, quantity: i64, max_stock: Option<u32>) {
        let existed = self.state.item(id, selected_size).is_some();
        let max_stock = max_stock.unwrap_or(DEFAULT_MAX_STOCK);
        self.dispatch(CartAction::UpdateQuantity { id: id.to_string(), selected_size: selected_size.to_string(), quantity, max_stock });
        let event = match self.state.item(id, selected_size) {
            Some(item) => CartEvent::QuantityChanged { id: id.to_string(), selected_size: selected_size.to_string(), quantity: item.quantity },
            None if existed => CartEvent::ItemRemoved { id: id.to_string(), selected_size: selected_size.to_string() },
            None => return,
        };
        self.events.push(DomainEvent::Cart(event));
    }

    /// Empties the cart and drops the coupon together.
    pub fn clear_cart(&mut self) {
        self.dispatch(CartAction::Clear);
        self.events.push(DomainEvent::Cart(CartEvent::Cleared));
    }

    /// Validate `code` against the current cart with the backend and apply it.
    /// Never fails: every problem comes back as an unsuccessful [`CouponResult`].
    pub async fn apply_coupon(&mut self, code: &str) -> CouponResult {
        let code = match CouponCode::new(code) {
            Ok(code) => code,
            Err(e) => return CouponResult::failed(e.to_string()),
        };
        let request = CouponValidationRequest { code: code.to_string(), order_amount: self.subtotal(), items: self.state.items.clone() };
        let validated = match self.backend.validate_coupon(&request).await {
            Ok(validated) => validated,
            Err(ApiError::Rejected { message, .. }) => return CouponResult::failed(message),
            Err(e) => {
                warn!(code = %code, error = %e, "coupon validation failed");
                return CouponResult::failed("Failed to apply coupon. Please try again.");
            }
        };
        let Some(coupon) = validated.coupon else {
            return CouponResult::failed(validated.message.unwrap_or_else(|| "Invalid coupon code".to_string()));
        };
        self.dispatch(CartAction::ApplyCoupon(coupon.into_applied(code.clone())));
        if self.state.applied_coupon.is_none() {
            return CouponResult::failed("Your order does not meet the minimum amount for this coupon");
        }
        if let Some(remote) = validated.discount_amount.filter(|d| *d != self.discount()) {
            debug!(code = %code, remote = %remote, local = %self.discount(), "backend discount differs from local pricing");
        }
        self.events.push(DomainEvent::Cart(CartEvent::CouponApplied { code }));
        CouponResult::ok(validated.message.unwrap_or_else(|| "Coupon applied successfully!".to_string()))
    }

    pub fn remove_coupon(&mut self) {
        let removed = self.state.applied_coupon.as_ref().map(|c| c.code.clone());
        self.dispatch(CartAction::RemoveCoupon);
        if let Some(code) = removed {
            self.events.push(DomainEvent::Cart(CartEvent::CouponRemoved { code }));
        }
    }

    pub fn subtotal(&self) -> Decimal { self.state.subtotal() }
    pub fn discount(&self) -> Decimal { self.state.discount() }
    pub fn shipping_cost(&self) -> Decimal { self.state.shipping_cost(&self.shipping) }
    pub fn cart_total(&self) -> Decimal { self.state.total(&self.shipping) }
    pub fn cart_count(&self) -> u32 { self.state.count() }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn dispatch(&mut self, action: CartAction) {
        let expected_coupon = match &action {
            CartAction::ApplyCoupon(coupon) => Some(coupon.code.clone()),
            CartAction::RemoveCoupon | CartAction::Clear => None,
            CartAction::Load(state) => state.applied_coupon.as_ref().map(|c| c.code.clone()),
            _ => self.state.applied_coupon.as_ref().map(|c| c.code.clone()),
        };
        debug!(?action, "cart action");
        self.state = std::mem::take(&mut self.state).reduce(action);
        if let Some(code) = expected_coupon.filter(|_| self.state.applied_coupon.is_none()) {
            self.record_eviction(code);
        }
        self.persist();
        self.sync();
    }

    fn record_eviction(&mut self, code: CouponCode) {
        let subtotal = self.state.subtotal();
        debug!(code = %code, %subtotal, "coupon evicted below minimum order amount");
        self.events.push(DomainEvent::Cart(CartEvent::CouponEvicted { code, subtotal }));
    }

    fn persist(&self) {
        if let Err(e) = store::save(self.store.as_ref(), CART_KEY, &self.state) {
            warn!(error = %e, "failed to persist cart");
        }
    }

    /// Fire-and-forget upload of the current state. Skipped outside a runtime.
    fn sync(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, skipping cart sync");
            return;
        };
        let backend = Arc::clone(&self.backend);
        let state = self.state.clone();
        runtime.spawn(async move {
            if let Err(e) = backend.sync_cart(&state).await {
                debug!(error = %e, "cart sync failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockCartBackend, RemoteCoupon, ValidatedCoupon};
    use crate::domain::aggregates::{CouponType, ProductSize};
    use crate::store::MemoryStore;
    use tokio::sync::mpsc;

    fn dec(v: i64) -> Decimal { Decimal::new(v, 0) }

    fn product(id: &str, price: i64) -> Product {
        Product {
            id: id.into(), name: format!("Snack {id}"), image: String::new(), category: Some("chips".into()),
            sizes: vec![ProductSize { size: "100g".into(), price: dec(price), stock: Some(10) }],
        }
    }

    fn backend() -> MockCartBackend {
        let mut backend = MockCartBackend::new();
        backend.expect_sync_cart().returning(|_| Ok(()));
        backend
    }

    fn coupon(min: Option<i64>) -> RemoteCoupon {
        RemoteCoupon { code: None, kind: CouponType::Percentage, discount: dec(10), category: None, max_discount: None, min_order_amount: min.map(dec) }
    }

    fn engine(store: Arc<MemoryStore>, backend: MockCartBackend) -> CartEngine { CartEngine::load(store, Arc::new(backend)) }

    #[test]
    fn test_mutations_without_runtime_still_persist() {
        let store = Arc::new(MemoryStore::new());
        let mut cart = engine(store.clone(), MockCartBackend::new());
        cart.add_to_cart(&product("P1", 120), "100g", 2);
        cart.add_to_cart(&product("P1", 120), "100g", 20);
        assert_eq!(cart.cart_count(), 10);
        let reloaded = engine(store, MockCartBackend::new());
        assert_eq!(reloaded.items(), cart.items());
    }

    #[tokio::test]
    async fn test_apply_coupon_success() {
        let mut backend = backend();
        backend.expect_validate_coupon()
            .withf(|r| r.code == "VIBE10" && r.order_amount == Decimal::new(600, 0))
            .returning(|_| Ok(ValidatedCoupon { coupon: Some(coupon(None)), discount_amount: Some(Decimal::new(60, 0)), message: None }));
        let mut cart = engine(Arc::new(MemoryStore::new()), backend);
        cart.add_to_cart(&product("P1", 300), "100g", 2);
        let result = cart.apply_coupon(" vibe10 ").await;
        assert_eq!(result, CouponResult { success: true, message: "Coupon applied successfully!".into() });
        assert_eq!(cart.applied_coupon().map(|c| c.code.as_str()), Some("VIBE10"));
        assert_eq!(cart.cart_total(), dec(540));
    }

    #[tokio::test]
    async fn test_apply_coupon_rejected_leaves_state() {
        let mut backend = backend();
        backend.expect_validate_coupon().returning(|_| Err(ApiError::Rejected { status: 400, message: "Coupon has expired".into() }));
        let mut cart = engine(Arc::new(MemoryStore::new()), backend);
        cart.add_to_cart(&product("P1", 300), "100g", 1);
        let before = cart.state().clone();
        let result = cart.apply_coupon("OLD").await;
        assert_eq!(result, CouponResult { success: false, message: "Coupon has expired".into() });
        assert_eq!(cart.state(), &before);
    }

    #[tokio::test]
    async fn test_apply_coupon_missing_coupon_or_network_error() {
        let mut backend = backend();
        backend.expect_validate_coupon().times(1).returning(|_| Ok(ValidatedCoupon::default()));
        backend.expect_validate_coupon().returning(|_| Err(ApiError::MissingData("coupon")));
        let mut cart = engine(Arc::new(MemoryStore::new()), backend);
        assert_eq!(cart.apply_coupon("A").await.message, "Invalid coupon code");
        assert_eq!(cart.apply_coupon("B").await.message, "Failed to apply coupon. Please try again.");
        assert!(!cart.apply_coupon("   ").await.success);
        assert!(cart.applied_coupon().is_none());
    }

    #[tokio::test]
    async fn test_coupon_evicted_when_subtotal_drops() {
        let mut backend = backend();
        backend.expect_validate_coupon().returning(|_| Ok(ValidatedCoupon { coupon: Some(coupon(Some(500))), ..Default::default() }));
        let mut cart = engine(Arc::new(MemoryStore::new()), backend);
        cart.add_to_cart(&product("P1", 300), "100g", 2);
        assert!(cart.apply_coupon("BIG").await.success);
        cart.take_events();
        cart.update_quantity("P1", "100g", 1, None);
        assert!(cart.applied_coupon().is_none());
        let events = cart.take_events();
        assert!(events.contains(&DomainEvent::Cart(CartEvent::CouponEvicted { code: CouponCode::new("BIG").unwrap(), subtotal: dec(300) })));
    }

    #[tokio::test]
    async fn test_round_trip_through_store() {
        let store = Arc::new(MemoryStore::new());
        let mut backend = backend();
        backend.expect_validate_coupon().returning(|_| Ok(ValidatedCoupon { coupon: Some(coupon(Some(100))), ..Default::default() }));
        let mut cart = engine(store.clone(), backend);
        cart.add_to_cart(&product("P1", 150), "100g", 2);
        cart.add_to_cart(&product("P2", 75), "100g", 1);
        assert!(cart.apply_coupon("SAVE").await.success);
        let reloaded = engine(store, MockCartBackend::new());
        assert_eq!(reloaded.state(), cart.state());
    }

    #[tokio::test]
    async fn test_every_mutation_is_mirrored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend = MockCartBackend::new();
        backend.expect_sync_cart().returning(move |state| {
            let _ = tx.send(state.clone());
            Err(ApiError::Timeout)
        });
        let store = Arc::new(MemoryStore::new());
        let mut cart = engine(store.clone(), backend);
        cart.add_to_cart(&product("P1", 50), "100g", 3);
        let mirrored = rx.recv().await.unwrap();
        assert_eq!(mirrored.count(), 3);
        cart.clear_cart();
        assert!(rx.recv().await.unwrap().is_empty());
        assert!(store::load::<CartState>(store.as_ref(), CART_KEY).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_shipping_falls_back() {
        let mut backend = backend();
        backend.expect_shipping_config().times(1).returning(|| Ok(ShippingConfig { shipping_fee: Decimal::new(60, 0), free_shipping_threshold: Decimal::new(800, 0) }));
        backend.expect_shipping_config().returning(|| Err(ApiError::Timeout));
        let mut cart = engine(Arc::new(MemoryStore::new()), backend);
        cart.add_to_cart(&product("P1", 700), "100g", 1);
        cart.refresh_shipping().await;
        assert_eq!(cart.shipping_cost(), dec(60));
        cart.refresh_shipping().await;
        assert_eq!(cart.shipping_config().free_shipping_threshold, dec(800));
    }

    #[test]
    fn test_events_for_add_update_remove() {
        let mut cart = engine(Arc::new(MemoryStore::new()), MockCartBackend::new());
        cart.add_to_cart(&product("P1", 10), "100g", 2);
        cart.update_quantity("P1", "100g", 4, Some(3));
        cart.update_quantity("P1", "100g", 0, None);
        cart.remove_from_cart("P1", "100g");
        let events = cart.take_events();
        assert_eq!(events, vec![
            DomainEvent::Cart(CartEvent::ItemAdded { id: "P1".into(), selected_size: "100g".into(), quantity: 2 }),
            DomainEvent::Cart(CartEvent::QuantityChanged { id: "P1".into(), selected_size: "100g".into(), quantity: 3 }),
            DomainEvent::Cart(CartEvent::ItemRemoved { id: "P1".into(), selected_size: "100g".into() }),
        ]);
    }

    #[test]
    fn test_add_at_stock_ceiling_records_nothing() {
        let mut cart = engine(Arc::new(MemoryStore::new()), MockCartBackend::new());
        cart.add_to_cart(&product("P1", 10), "100g", 10);
        cart.add_to_cart(&product("P1", 10), "100g", 1);
        assert_eq!(cart.cart_count(), 10);
        assert_eq!(cart.take_events(), vec![
            DomainEvent::Cart(CartEvent::ItemAdded { id: "P1".into(), selected_size: "100g".into(), quantity: 10 }),
        ]);
    }
}
