//! Cart Aggregate
//!
//! `CartState` is a plain value; every change goes through [`CartState::reduce`],
//! which also enforces the coupon minimum-order rule after each transition.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::CouponCode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub selected_size: String,
    pub price: Decimal,
    pub quantity: u32,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.quantity) }
    fn is(&self, id: &str, size: &str) -> bool { self.id == id && self.selected_size == size }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponType { Percentage, Fixed }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    pub code: CouponCode,
    #[serde(rename = "type")]
    pub kind: CouponType,
    pub discount: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    /// `-1` means no cap.
    #[serde(default)]
    pub max_discount: Option<Decimal>,
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,
}

impl AppliedCoupon {
    pub fn cap(&self) -> Option<Decimal> { self.max_discount.filter(|m| *m != Decimal::NEGATIVE_ONE) }

    pub fn allows(&self, subtotal: Decimal) -> bool { self.min_order_amount.map_or(true, |min| subtotal >= min) }

    pub fn discount_for(&self, items: &[CartItem]) -> Decimal {
        let amount = match self.kind {
            CouponType::Percentage => {
                let base: Decimal = match &self.category {
                    Some(category) => items.iter().filter(|i| i.category.as_ref() == Some(category)).map(CartItem::line_total).sum(),
                    None => items.iter().map(CartItem::line_total).sum(),
                };
                base * self.discount / Decimal::ONE_HUNDRED
            }
            CouponType::Fixed => self.discount,
        };
        match self.cap() {
            Some(cap) if amount > cap => cap,
            _ => amount,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingConfig { pub shipping_fee: Decimal, pub free_shipping_threshold: Decimal }

impl Default for ShippingConfig {
    fn default() -> Self { Self { shipping_fee: Decimal::new(49, 0), free_shipping_threshold: Decimal::new(500, 0) } }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub applied_coupon: Option<AppliedCoupon>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CartAction {
    Add { product: Product, selected_size: String, quantity: u32 },
    Remove { id: String, selected_size: String },
    /// A quantity of zero or below removes the line.
    UpdateQuantity { id: String, selected_size: String, quantity: i64, max_stock: u32 },
    Clear,
    ApplyCoupon(AppliedCoupon),
    RemoveCoupon,
    Load(CartState),
}

impl CartState {
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn item(&self, id: &str, size: &str) -> Option<&CartItem> { self.items.iter().find(|i| i.is(id, size)) }

    pub fn reduce(mut self, action: CartAction) -> Self {
        match action {
            CartAction::Add { product, selected_size, quantity } => self.add(product, selected_size, quantity),
            CartAction::Remove { id, selected_size } => self.items.retain(|i| !i.is(&id, &selected_size)),
            CartAction::UpdateQuantity { id, selected_size, quantity, max_stock } => {
                let clamped = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX).min(max_stock);
                if clamped == 0 {
                    self.items.retain(|i| !i.is(&id, &selected_size));
                } else if let Some(item) = self.items.iter_mut().find(|i| i.is(&id, &selected_size)) {
                    item.quantity = clamped;
                }
            }
            CartAction::Clear => { self.items.clear(); self.applied_coupon = None; }
            CartAction::ApplyCoupon(coupon) => self.applied_coupon = Some(coupon),
            CartAction::RemoveCoupon => self.applied_coupon = None,
            CartAction::Load(state) => self = state,
        }
        self.enforce_coupon_minimum();
        self
    }

    fn add(&mut self, product: Product, selected_size: String, quantity: u32) {
        let quote = product.quote(&selected_size);
        if let Some(pos) = self.items.iter().position(|i| i.is(&product.id, &selected_size)) {
            let merged = self.items[pos].quantity.saturating_add(quantity).min(quote.max_stock);
            if merged == 0 { self.items.remove(pos); } else { self.items[pos].quantity = merged; }
            return;
        }
        let quantity = quantity.min(quote.max_stock);
        if quantity == 0 { return; }
        self.items.push(CartItem {
            id: product.id, selected_size, price: quote.price, quantity,
            name: product.name, image: product.image, category: product.category,
        });
    }

    fn enforce_coupon_minimum(&mut self) {
        let subtotal = self.subtotal();
        if self.applied_coupon.as_ref().is_some_and(|c| !c.allows(subtotal)) {
            self.applied_coupon = None;
        }
    }

    pub fn subtotal(&self) -> Decimal { self.items.iter().map(CartItem::line_total).sum() }
    pub fn count(&self) -> u32 { self.items.iter().map(|i| i.quantity).fold(0, u32::saturating_add) }
    pub fn discount(&self) -> Decimal { self.applied_coupon.as_ref().map_or(Decimal::ZERO, |c| c.discount_for(&self.items)) }

    pub fn shipping_cost(&self, config: &ShippingConfig) -> Decimal {
        if self.is_empty() || self.subtotal() >= config.free_shipping_threshold { Decimal::ZERO } else { config.shipping_fee }
    }

    pub fn total(&self, config: &ShippingConfig) -> Decimal { self.subtotal() - self.discount() + self.shipping_cost(config) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::ProductSize;
    use crate::domain::value_objects::DEFAULT_MAX_STOCK;

    fn dec(v: i64) -> Decimal { Decimal::new(v, 0) }

    fn product(id: &str, category: &str, price: i64, stock: Option<u32>) -> Product {
        Product {
            id: id.into(), name: format!("Snack {id}"), image: format!("{id}.png"), category: Some(category.into()),
            sizes: vec![ProductSize { size: "100g".into(), price: dec(price), stock }],
        }
    }

    fn add(state: CartState, p: &Product, quantity: u32) -> CartState {
        state.reduce(CartAction::Add { product: p.clone(), selected_size: "100g".into(), quantity })
    }

    fn coupon(kind: CouponType, discount: i64) -> AppliedCoupon {
        AppliedCoupon { code: CouponCode::new("VIBE").unwrap(), kind, discount: dec(discount), category: None, max_discount: None, min_order_amount: None }
    }

    #[test]
    fn test_add_same_pair_merges() {
        let p = product("P1", "chips", 100, Some(10));
        let cart = add(add(CartState::default(), &p, 3), &p, 4);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 7);
        let cart = add(cart, &p, 8);
        assert_eq!(cart.items[0].quantity, 10);
    }

    #[test]
    fn test_add_clamps_new_line_to_stock() {
        let cart = add(CartState::default(), &product("P1", "chips", 100, Some(2)), 5);
        assert_eq!(cart.items[0].quantity, 2);
    }

    #[test]
    fn test_add_unknown_size_uses_zero_price() {
        let cart = CartState::default().reduce(CartAction::Add { product: product("P1", "chips", 100, Some(2)), selected_size: "1kg".into(), quantity: 150 });
        let item = cart.item("P1", "1kg").unwrap();
        assert_eq!(item.price, Decimal::ZERO);
        assert_eq!(item.quantity, DEFAULT_MAX_STOCK);
    }

    #[test]
    fn test_different_sizes_are_separate_lines() {
        let mut p = product("P1", "chips", 100, None);
        p.sizes.push(ProductSize { size: "250g".into(), price: dec(220), stock: None });
        let cart = add(CartState::default(), &p, 1).reduce(CartAction::Add { product: p.clone(), selected_size: "250g".into(), quantity: 1 });
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.subtotal(), dec(320));
        assert_eq!(cart.count(), 2);
    }

    #[test]
    fn test_update_quantity_clamps_and_removes() {
        let cart = add(CartState::default(), &product("P1", "chips", 100, None), 1);
        let cart = cart.reduce(CartAction::UpdateQuantity { id: "P1".into(), selected_size: "100g".into(), quantity: 40, max_stock: 12 });
        assert_eq!(cart.items[0].quantity, 12);
        let cart = cart.reduce(CartAction::UpdateQuantity { id: "P1".into(), selected_size: "100g".into(), quantity: -1, max_stock: 12 });
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_missing_line_is_noop() {
        let cart = add(CartState::default(), &product("P1", "chips", 100, None), 1);
        let after = cart.clone().reduce(CartAction::UpdateQuantity { id: "P9".into(), selected_size: "100g".into(), quantity: 3, max_stock: 99 });
        assert_eq!(after, cart);
    }

    #[test]
    fn test_remove_and_clear() {
        let cart = add(add(CartState::default(), &product("P1", "chips", 100, None), 1), &product("P2", "nuts", 50, None), 1);
        let cart = cart.reduce(CartAction::Remove { id: "P1".into(), selected_size: "100g".into() });
        assert_eq!(cart.items.len(), 1);
        let cart = cart.reduce(CartAction::ApplyCoupon(coupon(CouponType::Fixed, 10))).reduce(CartAction::Clear);
        assert!(cart.is_empty());
        assert!(cart.applied_coupon.is_none());
    }

    #[test]
    fn test_coupon_evicted_below_minimum() {
        let p = product("P1", "chips", 150, None);
        let mut c = coupon(CouponType::Fixed, 50);
        c.min_order_amount = Some(dec(300));
        let cart = add(CartState::default(), &p, 2).reduce(CartAction::ApplyCoupon(c));
        assert!(cart.applied_coupon.is_some());
        let cart = cart.reduce(CartAction::UpdateQuantity { id: "P1".into(), selected_size: "100g".into(), quantity: 1, max_stock: 99 });
        assert!(cart.applied_coupon.is_none());
    }

    #[test]
    fn test_total_without_coupon() {
        let cart = add(CartState::default(), &product("P1", "chips", 120, None), 2);
        let config = ShippingConfig::default();
        assert_eq!(cart.discount(), Decimal::ZERO);
        assert_eq!(cart.total(&config), dec(240) + dec(49));
    }

    #[test]
    fn test_total_with_percentage_coupon() {
        let cart = add(CartState::default(), &product("P1", "chips", 300, None), 2).reduce(CartAction::ApplyCoupon(coupon(CouponType::Percentage, 10)));
        let config = ShippingConfig::default();
        assert_eq!(cart.discount(), dec(60));
        assert_eq!(cart.total(&config), dec(600) - dec(60));
    }

    #[test]
    fn test_total_with_category_percentage_coupon() {
        let mut c = coupon(CouponType::Percentage, 20);
        c.category = Some("nuts".into());
        let cart = add(add(CartState::default(), &product("P1", "chips", 100, None), 1), &product("P2", "nuts", 200, None), 1).reduce(CartAction::ApplyCoupon(c));
        let config = ShippingConfig::default();
        assert_eq!(cart.discount(), dec(40));
        assert_eq!(cart.total(&config), dec(300) - dec(40) + dec(49));
    }

    #[test]
    fn test_total_with_fixed_coupon() {
        let cart = add(CartState::default(), &product("P1", "chips", 250, None), 2).reduce(CartAction::ApplyCoupon(coupon(CouponType::Fixed, 75)));
        assert_eq!(cart.total(&ShippingConfig::default()), dec(500) - dec(75));
    }

    #[test]
    fn test_discount_capped_by_max_discount() {
        let mut c = coupon(CouponType::Percentage, 50);
        c.max_discount = Some(dec(100));
        let cart = add(CartState::default(), &product("P1", "chips", 400, None), 1).reduce(CartAction::ApplyCoupon(c.clone()));
        assert_eq!(cart.discount(), dec(100));
        c.max_discount = Some(Decimal::NEGATIVE_ONE);
        let cart = cart.reduce(CartAction::ApplyCoupon(c));
        assert_eq!(cart.discount(), dec(200));
        assert_eq!(cart.total(&ShippingConfig::default()), dec(400) - dec(200) + dec(49));
    }

    #[test]
    fn test_shipping_threshold_boundary() {
        let config = ShippingConfig { shipping_fee: dec(49), free_shipping_threshold: dec(500) };
        assert_eq!(CartState::default().shipping_cost(&config), Decimal::ZERO);
        let below = add(CartState::default(), &product("P1", "chips", 499, None), 1);
        assert_eq!(below.shipping_cost(&config), dec(49));
        let at = add(CartState::default(), &product("P1", "chips", 500, None), 1);
        assert_eq!(at.shipping_cost(&config), Decimal::ZERO);
    }

    #[test]
    fn test_state_serializes_with_wire_names() {
        let cart = add(CartState::default(), &product("P1", "chips", 99, None), 1).reduce(CartAction::ApplyCoupon(coupon(CouponType::Percentage, 5)));
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["items"][0]["selectedSize"], "100g");
        assert_eq!(json["appliedCoupon"]["type"], "percentage");
        let back: CartState = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }

    #[test]
    fn test_count_saturates_with_huge_stock() {
        let cart = add(CartState::default(), &product("P1", "chips", 1, Some(u32::MAX)), u32::MAX);
        let cart = add(cart, &product("P2", "chips", 1, Some(u32::MAX)), u32::MAX);
        assert_eq!(cart.count(), u32::MAX);
    }
}
