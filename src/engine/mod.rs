//! Stateful engines over the pure cart and wishlist reducers
pub mod cart;
pub mod wishlist;

pub use cart::{CartEngine, CouponResult};
pub use wishlist::WishlistEngine;
