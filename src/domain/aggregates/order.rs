//! Order payload handed to the backend once a payment is verified

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::domain::aggregates::cart::{CartItem, CartState, ShippingConfig};
use crate::domain::value_objects::CouponCode;

/// Prefilled into the gateway widget.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CustomerDetails {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 10, max = 15, message = "Enter a valid phone number"))]
    pub phone: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(equal = 6, message = "Enter a valid 6 digit pincode"))]
    pub pincode: String,
    #[validate(length(min = 10, max = 15, message = "Enter a valid phone number"))]
    pub phone: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { #[default] Razorpay, Cod }

/// Everything about the order that is known before the gateway opens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub items: Vec<CartItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<CouponCode>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderDraft {
    pub fn from_cart(cart: &CartState, shipping: &ShippingConfig, address: ShippingAddress) -> Self {
        Self {
            items: cart.items.clone(), shipping_address: address, payment_method: PaymentMethod::Razorpay,
            coupon_code: cart.applied_coupon.as_ref().map(|c| c.code.clone()),
            subtotal: cart.subtotal(), discount: cart.discount(), shipping: cart.shipping_cost(shipping), total: cart.total(shipping),
        }
    }
}

/// Identifiers returned by the gateway after the customer pays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPayment { pub order_id: String, pub payment_id: String, pub signature: String }

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    #[serde(flatten)]
    pub draft: OrderDraft,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
    pub client_reference: Uuid,
    pub placed_at: DateTime<Utc>,
}

impl OrderPayload {
    pub fn new(draft: OrderDraft, payment: &GatewayPayment) -> Self {
        Self {
            draft, razorpay_order_id: payment.order_id.clone(), razorpay_payment_id: payment.payment_id.clone(),
            razorpay_signature: payment.signature.clone(), client_reference: Uuid::now_v7(), placed_at: Utc::now(),
        }
    }
}
