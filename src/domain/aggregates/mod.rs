//! Aggregates module
pub mod product;
pub mod cart;
pub mod wishlist;
pub mod order;

pub use product::{Product, ProductSize, SizeQuote};
pub use cart::{AppliedCoupon, CartAction, CartItem, CartState, CouponType, ShippingConfig};
pub use wishlist::{WishlistAction, WishlistItem, WishlistState};
pub use order::{CustomerDetails, GatewayPayment, OrderDraft, OrderPayload, PaymentMethod, ShippingAddress};
