//! Payment orchestration
//!
//! Drives the third-party checkout widget: prefetch the gateway key and order,
//! open the widget, verify the signature it hands back and create the order
//! record. The cart is never touched here; callers clear it on
//! [`PaymentOutcome::Completed`] only.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

#[cfg(test)]
use mockall::automock;

use crate::api::{ApiError, GatewayOrder, PaymentBackend};
use crate::domain::aggregates::{CustomerDetails, GatewayPayment, OrderDraft, OrderPayload};
use crate::domain::value_objects::CURRENCY;
use crate::toast::Notifier;

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub merchant_name: String,
    pub description: String,
    pub theme_color: String,
    pub ready_poll_interval: Duration,
    pub ready_timeout: Duration,
    /// Enforced by the widget itself.
    pub gateway_timeout: Duration,
    pub gateway_retries: u32,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            merchant_name: "VIBE BITES".to_string(),
            description: "Healthy snacks order".to_string(),
            theme_color: "#D9A25F".to_string(),
            ready_poll_interval: Duration::from_millis(100),
            ready_timeout: Duration::from_secs(5),
            gateway_timeout: Duration::from_secs(300),
            gateway_retries: 3,
        }
    }
}

/// Options handed to the widget when it opens.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GatewayOptions {
    pub key: String,
    pub amount: Decimal,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub prefill: Prefill,
    pub theme: Theme,
    /// Seconds.
    pub timeout: u64,
    pub retry: Retry,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Prefill { pub name: String, pub email: String, pub contact: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Theme { pub color: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Retry { pub enabled: bool, pub max_count: u32 }

/// How the widget session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayResponse {
    Paid(GatewayPayment),
    Dismissed,
    Failed { description: String },
}

/// The third-party checkout widget.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Whether the widget's client script has finished loading.
    fn is_loaded(&self) -> bool;

    /// Open the widget and wait until the shopper pays, gives up or the payment fails.
    async fn open(&self, options: GatewayOptions) -> GatewayResponse;
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Payment gateway is still loading. Please try again in a moment.")]
    GatewayNotLoaded,

    #[error("Invalid payment amount")]
    InvalidAmount(Decimal),

    #[error("{0}")]
    InvalidDetails(String),

    #[error("A payment is already in progress")]
    AlreadyProcessing,

    #[error("Could not start the payment. Please try again.")]
    Setup(#[source] ApiError),

    #[error("Payment failed: {0}")]
    GatewayFailure(String),

    #[error("Payment verification failed. Please contact support if money was deducted.")]
    Verification(#[source] ApiError),

    #[error("Payment received but your order could not be created. Please contact support with payment ID {payment_id} (reference {reference}).")]
    OrderCreation { payment_id: String, reference: Uuid, #[source] source: ApiError },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaymentSuccess { pub payment: GatewayPayment, pub order: serde_json::Value }

#[derive(Debug)]
pub enum PaymentOutcome {
    /// Payment verified and order recorded. The caller clears the cart.
    Completed(PaymentSuccess),
    Cancelled,
    Failed(PaymentError),
}

#[derive(Clone, Debug)]
pub struct CheckoutRequest { pub amount: Decimal, pub customer: CustomerDetails, pub draft: OrderDraft }

#[derive(Debug, Default)]
struct Prefetched { key: Option<String>, order: Option<(Decimal, GatewayOrder)> }

struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::SeqCst); }
}

pub struct PaymentOrchestrator {
    backend: Arc<dyn PaymentBackend>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    config: PaymentConfig,
    cache: Mutex<Prefetched>,
    processing: AtomicBool,
}

impl std::fmt::Debug for PaymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentOrchestrator").field("config", &self.config).field("processing", &self.processing).finish_non_exhaustive()
    }
}

impl PaymentOrchestrator {
    pub fn new(backend: Arc<dyn PaymentBackend>, gateway: Arc<dyn PaymentGateway>, notifier: Arc<dyn Notifier>, config: PaymentConfig) -> Self {
        Self { backend, gateway, notifier, config, cache: Mutex::new(Prefetched::default()), processing: AtomicBool::new(false) }
    }

    pub fn is_processing(&self) -> bool { self.processing.load(Ordering::SeqCst) }

    /// Fetch the gateway key and pre-create an order for `amount`. Failures are only logged.
    pub async fn prefetch(&self, amount: Decimal) {
        if amount <= Decimal::ZERO { return; }
        let (key, order) = tokio::join!(self.backend.gateway_key(), self.backend.create_gateway_order(amount, CURRENCY));
        let mut cache = match self.cache.lock() { Ok(cache) => cache, Err(_) => return };
        match key {
            Ok(key) => cache.key = Some(key),
            Err(e) => warn!(error = %e, "gateway key prefetch failed"),
        }
        match order {
            Ok(order) => { debug!(order_id = %order.order_id, "gateway order prefetched"); cache.order = Some((amount, order)); }
            Err(e) => warn!(error = %e, "gateway order prefetch failed"),
        }
    }

    /// Poll until the widget script is loaded or the readiness timeout passes.
    pub async fn wait_for_gateway(&self) -> bool {
        let deadline = Instant::now() + self.config.ready_timeout;
        loop {
            if self.gateway.is_loaded() { return true; }
            if Instant::now() >= deadline {
                warn!("payment gateway script did not load in time");
                return false;
            }
            tokio::time::sleep(self.config.ready_poll_interval).await;
        }
    }

    /// Run one checkout attempt to completion. Never returns early with a pending payment.
    pub async fn pay(&self, request: CheckoutRequest) -> PaymentOutcome {
        if self.processing.swap(true, Ordering::SeqCst) {
            return self.fail(PaymentError::AlreadyProcessing);
        }
        let _guard = ProcessingGuard(&self.processing);

        if !self.gateway.is_loaded() { return self.fail(PaymentError::GatewayNotLoaded); }
        if request.amount <= Decimal::ZERO { return self.fail(PaymentError::InvalidAmount(request.amount)); }
        if let Err(e) = request.customer.validate().and_then(|()| request.draft.shipping_address.validate()) {
            return self.fail(PaymentError::InvalidDetails(first_message(&e)));
        }

        let key = match self.key().await {
            Ok(key) => key,
            Err(e) => return self.fail(PaymentError::Setup(e)),
        };
        let order = match self.order_for(request.amount).await {
            Ok(order) => order,
            Err(e) => return self.fail(PaymentError::Setup(e)),
        };

        let options = self.options(key, &order, &request.customer);
        info!(order_id = %order.order_id, amount = %request.amount, "opening payment gateway");
        match self.gateway.open(options).await {
            GatewayResponse::Dismissed => {
                info!(order_id = %order.order_id, "payment dismissed");
                self.notifier.info("Payment cancelled");
                PaymentOutcome::Cancelled
            }
            GatewayResponse::Failed { description } => self.fail(PaymentError::GatewayFailure(description)),
            GatewayResponse::Paid(payment) => {
                // A paid gateway order cannot be opened again, whatever happens next.
                if let Ok(mut cache) = self.cache.lock() { cache.order = None; }
                self.finalize(payment, request.draft).await
            }
        }
    }

    async fn finalize(&self, payment: GatewayPayment, draft: OrderDraft) -> PaymentOutcome {
        if let Err(e) = self.backend.verify_payment(&payment).await {
            return self.fail(PaymentError::Verification(e));
        }
        let payload = OrderPayload::new(draft, &payment);
        match self.backend.create_order(&payload).await {
            Ok(order) => {
                info!(payment_id = %payment.payment_id, reference = %payload.client_reference, "order placed");
                self.notifier.success("Payment successful! Your order has been placed.");
                PaymentOutcome::Completed(PaymentSuccess { payment, order })
            }
            Err(source) => self.fail(PaymentError::OrderCreation { payment_id: payment.payment_id.clone(), reference: payload.client_reference, source }),
        }
    }

    async fn key(&self) -> Result<String, ApiError> {
        if let Some(key) = self.cache.lock().ok().and_then(|c| c.key.clone()) { return Ok(key); }
        let key = self.backend.gateway_key().await?;
        if let Ok(mut cache) = self.cache.lock() { cache.key = Some(key.clone()); }
        Ok(key)
    }

    /// A prefetched order is only reused for the amount it was created for.
    async fn order_for(&self, amount: Decimal) -> Result<GatewayOrder, ApiError> {
        let cached = self.cache.lock().ok().and_then(|c| c.order.clone());
        if let Some((cached_amount, order)) = cached {
            if cached_amount == amount { return Ok(order); }
        }
        let order = self.backend.create_gateway_order(amount, CURRENCY).await?;
        if let Ok(mut cache) = self.cache.lock() { cache.order = Some((amount, order.clone())); }
        Ok(order)
    }

    fn options(&self, key: String, order: &GatewayOrder, customer: &CustomerDetails) -> GatewayOptions {
        GatewayOptions {
            key, amount: order.amount, currency: order.currency.clone(),
            name: self.config.merchant_name.clone(), description: self.config.description.clone(), order_id: order.order_id.clone(),
            prefill: Prefill { name: customer.name.clone(), email: customer.email.clone(), contact: customer.phone.clone() },
            theme: Theme { color: self.config.theme_color.clone() },
            timeout: self.config.gateway_timeout.as_secs(),
            retry: Retry { enabled: self.config.gateway_retries > 0, max_count: self.config.gateway_retries },
        }
    }

    fn fail(&self, error: PaymentError) -> PaymentOutcome {
        match &error {
            PaymentError::OrderCreation { source, .. } | PaymentError::Verification(source) | PaymentError::Setup(source) => {
                warn!(error = %error, cause = %source, "payment failed");
            }
            _ => warn!(error = %error, "payment failed"),
        }
        self.notifier.error(&error.to_string());
        PaymentOutcome::Failed(error)
    }
}

fn first_message(errors: &ValidationErrors) -> String {
    errors.field_errors().values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Please check your details".to_string())
}
