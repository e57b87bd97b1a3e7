//! Domain events recorded by the cart and wishlist engines
use rust_decimal::Decimal;
use crate::domain::value_objects::CouponCode;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Cart(CartEvent),
    Wishlist(WishlistEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CartEvent {
    ItemAdded { id: String, selected_size: String, quantity: u32 },
    ItemRemoved { id: String, selected_size: String },
    QuantityChanged { id: String, selected_size: String, quantity: u32 },
    Cleared,
    CouponApplied { code: CouponCode },
    CouponRemoved { code: CouponCode },
    /// The subtotal fell below the coupon's minimum order amount.
    CouponEvicted { code: CouponCode, subtotal: Decimal },
}

#[derive(Clone, Debug, PartialEq)]
pub enum WishlistEvent {
    Added { id: String },
    Removed { id: String },
    Cleared,
}
