//! HTTP client for the storefront backend
//!
//! The backend owns products, coupons, orders and the payment gateway account.
//! The engines only see it through the [`CartBackend`], [`PaymentBackend`] and
//! [`BackendProbe`] seams so they can be driven without a network in tests.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::domain::aggregates::{AppliedCoupon, CartItem, CartState, CouponType, GatewayPayment, OrderPayload, ShippingConfig};
use crate::domain::value_objects::CouponCode;

/// Lightweight catalog endpoint used to check the backend is awake.
pub const PROBE_PATH: &str = "/products?limit=1";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("response is missing {0}")]
    MissingData(&'static str),

    #[error("request timed out")]
    Timeout,
}

/// The `{success, message, data}` wrapper every JSON endpoint answers with.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponValidationRequest { pub code: String, pub order_amount: Decimal, pub items: Vec<CartItem> }

/// A coupon as the validation endpoint describes it.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCoupon {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(rename = "type", alias = "discountType")]
    pub kind: CouponType,
    pub discount: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub max_discount: Option<Decimal>,
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,
}

impl RemoteCoupon {
    pub fn into_applied(self, code: CouponCode) -> AppliedCoupon {
        AppliedCoupon {
            code, kind: self.kind, discount: self.discount, category: self.category,
            max_discount: self.max_discount, min_order_amount: self.min_order_amount,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedCoupon {
    #[serde(default)]
    pub coupon: Option<RemoteCoupon>,
    #[serde(default)]
    pub discount_amount: Option<Decimal>,
    #[serde(skip)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOrder { pub order_id: String, pub amount: Decimal, pub currency: String }

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayKey { key_id: String }

#[derive(Debug, Deserialize)]
struct CreatedOrder { order: serde_json::Value }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeMethod { Head, Get }

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Ask the backend whether a coupon applies to the given cart.
    async fn validate_coupon(&self, request: &CouponValidationRequest) -> Result<ValidatedCoupon, ApiError>;

    /// Mirror the cart to the backend. Callers ignore the result.
    async fn sync_cart(&self, state: &CartState) -> Result<(), ApiError>;

    async fn shipping_config(&self) -> Result<ShippingConfig, ApiError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// Public key id of the gateway account.
    async fn gateway_key(&self) -> Result<String, ApiError>;

    async fn create_gateway_order(&self, amount: Decimal, currency: &str) -> Result<GatewayOrder, ApiError>;

    /// Check the gateway signature. A rejected signature is an `ApiError::Rejected`.
    async fn verify_payment(&self, payment: &GatewayPayment) -> Result<(), ApiError>;

    /// Create the authoritative order record and return it as the backend sent it.
    async fn create_order(&self, payload: &OrderPayload) -> Result<serde_json::Value, ApiError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackendProbe: Send + Sync {
    async fn probe(&self, method: ProbeMethod) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, token: None, http: Client::new() }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<Envelope<T>, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&text)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("request failed with status {status}"));
            return Err(ApiError::Rejected { status: status.as_u16(), message });
        }
        let envelope: Envelope<T> = response.json().await?;
        if !envelope.success {
            let message = envelope.message.unwrap_or_else(|| "request was not successful".to_string());
            return Err(ApiError::Rejected { status: status.as_u16(), message });
        }
        Ok(envelope)
    }
}

#[async_trait]
impl CartBackend for ApiClient {
    async fn validate_coupon(&self, request: &CouponValidationRequest) -> Result<ValidatedCoupon, ApiError> {
        debug!(code = %request.code, amount = %request.order_amount, "validating coupon");
        let response = self.request(Method::POST, "/coupons/validate").json(request).send().await?;
        let envelope = Self::read::<ValidatedCoupon>(response).await?;
        let mut validated = envelope.data.unwrap_or_default();
        validated.message = envelope.message;
        Ok(validated)
    }

    async fn sync_cart(&self, state: &CartState) -> Result<(), ApiError> {
        let response = self.request(Method::PUT, "/cart/sync").json(state).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Rejected { status: response.status().as_u16(), message: "cart sync rejected".to_string() });
        }
        Ok(())
    }

    async fn shipping_config(&self) -> Result<ShippingConfig, ApiError> {
        let response = self.request(Method::GET, "/admin/shipping-fee").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Rejected { status: status.as_u16(), message: "shipping fee unavailable".to_string() });
        }
        let body: serde_json::Value = response.json().await?;
        let config = body.get("data").unwrap_or(&body);
        serde_json::from_value(config.clone()).map_err(|_| ApiError::MissingData("shipping fee configuration"))
    }
}

#[async_trait]
impl PaymentBackend for ApiClient {
    async fn gateway_key(&self) -> Result<String, ApiError> {
        let response = self.request(Method::GET, "/payments/razorpay/keys").send().await?;
        let key = Self::read::<GatewayKey>(response).await?.data.ok_or(ApiError::MissingData("gateway key"))?;
        Ok(key.key_id)
    }

    async fn create_gateway_order(&self, amount: Decimal, currency: &str) -> Result<GatewayOrder, ApiError> {
        let body = serde_json::json!({ "amount": amount, "currency": currency });
        let response = self.request(Method::POST, "/payments/razorpay/create-order").json(&body).send().await?;
        Self::read::<GatewayOrder>(response).await?.data.ok_or(ApiError::MissingData("gateway order"))
    }

    async fn verify_payment(&self, payment: &GatewayPayment) -> Result<(), ApiError> {
        let response = self.request(Method::POST, "/payments/razorpay/verify").json(payment).send().await?;
        Self::read::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn create_order(&self, payload: &OrderPayload) -> Result<serde_json::Value, ApiError> {
        let response = self.request(Method::POST, "/orders").json(payload).send().await?;
        let created = Self::read::<CreatedOrder>(response).await?.data.ok_or(ApiError::MissingData("order"))?;
        Ok(created.order)
    }
}

#[async_trait]
impl BackendProbe for ApiClient {
    async fn probe(&self, method: ProbeMethod) -> Result<(), ApiError> {
        let method = match method { ProbeMethod::Head => Method::HEAD, ProbeMethod::Get => Method::GET };
        let response = self.request(method, PROBE_PATH).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Rejected { status: status.as_u16(), message: format!("backend answered {status}") });
        }
        Ok(())
    }
}
