//! VIBE BITES storefront core
//!
//! The stateful part of the storefront, independent of any UI framework.
//!
//! ## Features
//! - Shopping cart with size variants, stock ceilings and coupon pricing
//! - Shipping fee with a free-shipping threshold
//! - Wishlist
//! - Local persistence with best-effort backend mirroring
//! - Razorpay checkout handshake (prefetch, open, verify, create order)
//! - Backend keep-alive and warm-up for a cold-starting host

use thiserror::Error;

pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod payment;
pub mod store;
pub mod toast;
pub mod warmup;

pub use api::{ApiClient, ApiError, BackendProbe, CartBackend, PaymentBackend};
pub use config::{ConfigError, StorefrontConfig};
pub use domain::aggregates::{AppliedCoupon, CartItem, CartState, CouponType, Product, ProductSize, ShippingConfig, WishlistItem, WishlistState};
pub use engine::{CartEngine, CouponResult, WishlistEngine};
pub use payment::{CheckoutRequest, PaymentError, PaymentOrchestrator, PaymentOutcome};
pub use store::{FileStore, LocalStore, MemoryStore, StoreError};
pub use warmup::{check_backend_status, warm_up_backend, KeepAlive, WarmUpPolicy};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
