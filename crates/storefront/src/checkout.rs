//! Checkout orchestration: cart to payment handoff.
//!
//! Checkout is a strict pipeline. Each step only runs if the previous one
//! succeeded, and each failure is classified by the step that produced it so
//! the caller can tell "your order wasn't saved" from "your order exists but
//! payment couldn't start". The cart is cleared only once a checkout URL is
//! in hand; any earlier failure leaves the cart intact for retry.

use std::future::Future;

use portal_sete_core::{OrderId, Price, UserId};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::backend::BackendError;
use crate::backend::auth::AuthSession;
use crate::cart::CartStore;
use crate::config::GatewayConfig;
use crate::models::{NewOrderItem, Order};

/// Response fields probed for the checkout URL, in precedence order.
const CHECKOUT_URL_FIELDS: [&str; 3] = ["url", "init_point", "checkout_url"];

/// Errors from the checkout pipeline, one variant per failing step.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No signed-in session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The cart holds no items.
    #[error("cart is empty")]
    EmptyCart,

    /// The pending order row could not be created.
    #[error("database error: {0}")]
    Database(String),

    /// The order exists but its line items could not be saved.
    #[error("failed to save items: {0}")]
    SaveItems(String),

    /// The payment-session function call failed.
    #[error("payment function failed: {0}")]
    PaymentFunction(String),

    /// The function succeeded but returned no usable checkout URL.
    #[error("payment session returned no checkout link")]
    NoCheckoutLink,
}

/// One purchasable line in the payment-session request.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentItem {
    pub name: String,
    pub price: Price,
    pub quantity: u32,
}

/// Post-payment return URLs, one per gateway outcome.
#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub pending: String,
    pub failure: String,
}

/// Everything the payment function needs to open a gateway session.
pub struct PaymentSessionRequest {
    pub order_id: OrderId,
    pub user_email: String,
    pub public_key: String,
    pub access_token: SecretString,
    pub items: Vec<PaymentItem>,
    pub back_urls: BackUrls,
}

/// Result of a successful checkout: the created order plus where to send
/// the shopper.
#[derive(Debug)]
pub struct CheckoutHandoff {
    pub order: Order,
    pub checkout_url: String,
}

/// The backend operations checkout depends on, as a seam for testing the
/// pipeline without a network.
pub trait CheckoutApi {
    fn create_order(
        &self,
        user_id: UserId,
        total: Price,
    ) -> impl Future<Output = Result<Order, BackendError>> + Send;

    fn create_order_items(
        &self,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn create_payment_session(
        &self,
        request: &PaymentSessionRequest,
    ) -> impl Future<Output = Result<Value, BackendError>> + Send;
}

/// Run the checkout pipeline for the current cart.
///
/// On success the cart is cleared and the returned handoff carries the
/// gateway URL. On failure the cart is untouched; the error names the step
/// that failed. A pending order created by a later-failing step is left for
/// server-side reconciliation rather than rolled back.
///
/// # Errors
///
/// See [`CheckoutError`]; every variant maps to one pipeline step.
#[instrument(skip_all, fields(user_id))]
pub async fn begin_checkout(
    api: &impl CheckoutApi,
    cart: &CartStore,
    session: Option<&AuthSession>,
    gateway: &GatewayConfig,
    base_url: &str,
) -> Result<CheckoutHandoff, CheckoutError> {
    let session = session.ok_or(CheckoutError::NotAuthenticated)?;
    tracing::Span::current().record("user_id", tracing::field::display(session.user_id));

    let lines = cart.lines();
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let order = api
        .create_order(session.user_id, cart.total())
        .await
        .map_err(|e| CheckoutError::Database(e.to_string()))?;

    let items: Vec<NewOrderItem> = lines
        .iter()
        .map(|line| NewOrderItem {
            order_id: order.id,
            product_id: line.product.id,
            price_at_purchase: line.product.price,
        })
        .collect();

    api.create_order_items(&items)
        .await
        .map_err(|e| CheckoutError::SaveItems(e.to_string()))?;

    let request = PaymentSessionRequest {
        order_id: order.id,
        user_email: session.email.as_str().to_string(),
        public_key: gateway.public_key.clone(),
        access_token: gateway.access_token.clone(),
        items: lines
            .iter()
            .map(|line| PaymentItem {
                name: line.product.name.clone(),
                price: line.product.price,
                quantity: line.quantity,
            })
            .collect(),
        back_urls: back_urls(base_url),
    };

    let response = api
        .create_payment_session(&request)
        .await
        .map_err(|e| CheckoutError::PaymentFunction(e.to_string()))?;

    let checkout_url = extract_checkout_url(&response).ok_or_else(|| {
        warn!(order_id = %order.id, "payment session response had no checkout link");
        CheckoutError::NoCheckoutLink
    })?;

    // Point of no return for the cart: the shopper is being handed to the
    // gateway, so the selection has served its purpose.
    cart.clear();
    info!(order_id = %order.id, "checkout handoff ready");

    Ok(CheckoutHandoff {
        order,
        checkout_url,
    })
}

/// Build the three return URLs from the configured base URL.
///
/// Anything after a `#` in the base is stripped first so the app-internal
/// route fragment composes cleanly.
fn back_urls(base_url: &str) -> BackUrls {
    let clean = base_url.split('#').next().unwrap_or(base_url);
    BackUrls {
        success: format!("{clean}#/success"),
        pending: format!("{clean}#/dashboard?tab=orders"),
        failure: format!("{clean}#/dashboard?tab=orders"),
    }
}

/// Probe the payment-session response for a checkout URL.
///
/// Gateways differ in which field carries the link, so several are tried in
/// a fixed precedence order; only non-empty strings count.
fn extract_checkout_url(response: &Value) -> Option<String> {
    CHECKOUT_URL_FIELDS.iter().find_map(|field| {
        response
            .get(field)
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(ToString::to_string)
    })
}
