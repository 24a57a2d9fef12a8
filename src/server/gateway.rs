//! Payment provider integration.
//!
//! Checkout hands the provider a list of priced lines and an optional percent
//! discount, then later asks whether the session was paid. `StripeGateway`
//! talks to Stripe's REST API; `OfflineGateway` keeps sessions in process and
//! reports them paid immediately.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::AppliedCoupon;
use crate::domain::value_objects::CartKey;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unknown payment session {0}")]
    UnknownSession(String),

    #[error("Invalid session data: {0}")]
    InvalidSession(String),
}

/// A priced line sent to the provider. Amounts are minor units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    #[serde(flatten)]
    pub key: CartKey,
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "price")]
    pub unit_amount: i64,
    pub quantity: u32,
}

#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub currency: String,
    pub lines: Vec<CheckoutLine>,
    pub coupon: Option<AppliedCoupon>,
    /// Expected total after discount, minor units.
    pub total_amount: i64,
    pub success_url: String,
    pub cancel_url: String,
}

/// Data stored with the session so the order can be rebuilt after payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub user_id: String,
    pub coupon_code: Option<String>,
    pub products: Vec<CheckoutLine>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentSession {
    pub id: String,
    pub paid: bool,
    pub amount_total: i64,
    pub currency: String,
    pub metadata: SessionMetadata,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: CheckoutRequest) -> Result<PaymentSession, GatewayError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession, GatewayError>;
}

/// In-process sessions, reported as paid. For development and tests only.
#[derive(Debug, Default)]
pub struct OfflineGateway {
    sessions: Mutex<HashMap<String, PaymentSession>>,
}

impl OfflineGateway {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl PaymentGateway for OfflineGateway {
    async fn create_session(&self, request: CheckoutRequest) -> Result<PaymentSession, GatewayError> {
        let session = PaymentSession {
            id: format!("cs_offline_{}", Uuid::new_v4().simple()),
            paid: true,
            amount_total: request.total_amount,
            currency: request.currency.to_lowercase(),
            metadata: SessionMetadata {
                user_id: request.user_id,
                coupon_code: request.coupon.map(|c| c.code.to_string()),
                products: request.lines,
            },
        };
        self.sessions.lock().unwrap_or_else(|p| p.into_inner()).insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession, GatewayError> {
        self.sessions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownSession(session_id.to_string()))
    }
}

/// Stripe Checkout over its form-encoded REST API.
#[derive(Clone, Debug)]
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    payment_status: Option<String>,
    amount_total: Option<i64>,
    currency: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeObject { id: String }

#[derive(Debug, Deserialize)]
struct StripeErrorBody { error: StripeErrorDetail }

#[derive(Debug, Deserialize)]
struct StripeErrorDetail { message: String }

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), secret_key: secret_key.into(), api_base: api_base.into().trim_end_matches('/').to_string() }
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, GatewayError> {
        let response = request.bearer_auth(&self.secret_key).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(GatewayError::Rejected { status: status.as_u16(), message });
        }
        Ok(response.json().await?)
    }

    /// One-off percent-off coupon on the provider side.
    async fn create_discount(&self, percent_off: u8) -> Result<String, GatewayError> {
        let params = [("percent_off", percent_off.to_string()), ("duration", "once".to_string())];
        let coupon: StripeObject = self.send(self.http.post(format!("{}/v1/coupons", self.api_base)).form(&params)).await?;
        Ok(coupon.id)
    }

    fn into_session(raw: StripeSession) -> Result<PaymentSession, GatewayError> {
        let products = raw.metadata.get("products").map(String::as_str).unwrap_or("[]");
        let products: Vec<CheckoutLine> = serde_json::from_str(products).map_err(|e| GatewayError::InvalidSession(e.to_string()))?;
        let user_id = raw.metadata.get("userId").cloned().ok_or_else(|| GatewayError::InvalidSession("missing userId".into()))?;
        Ok(PaymentSession {
            paid: raw.payment_status.as_deref() == Some("paid"),
            amount_total: raw.amount_total.unwrap_or_default(),
            currency: raw.currency.unwrap_or_default(),
            metadata: SessionMetadata {
                user_id,
                coupon_code: raw.metadata.get("couponCode").filter(|c| !c.is_empty()).cloned(),
                products,
            },
            id: raw.id,
        })
    }
}

fn session_form(request: &CheckoutRequest, discount_id: Option<String>) -> Result<Vec<(String, String)>, GatewayError> {
    let currency = request.currency.to_lowercase();
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("metadata[userId]".to_string(), request.user_id.clone()),
        ("metadata[couponCode]".to_string(), request.coupon.as_ref().map(|c| c.code.to_string()).unwrap_or_default()),
        ("metadata[products]".to_string(), serde_json::to_string(&request.lines).map_err(|e| GatewayError::InvalidSession(e.to_string()))?),
    ];
    for (i, line) in request.lines.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((format!("{prefix}[price_data][currency]"), currency.clone()));
        form.push((format!("{prefix}[price_data][product_data][name]"), line.name.clone()));
        form.push((format!("{prefix}[price_data][unit_amount]"), line.unit_amount.to_string()));
        form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
    }
    if let Some(id) = discount_id {
        form.push(("discounts[0][coupon]".to_string(), id));
    }
    Ok(form)
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(&self, request: CheckoutRequest) -> Result<PaymentSession, GatewayError> {
        let discount_id = match &request.coupon {
            Some(c) if c.discount_percentage.value() > 0 => Some(self.create_discount(c.discount_percentage.value()).await?),
            _ => None,
        };
        let form = session_form(&request, discount_id)?;
        let raw: StripeSession = self
            .send(self.http.post(format!("{}/v1/checkout/sessions", self.api_base)).form(&form))
            .await?;
        Self::into_session(raw)
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession, GatewayError> {
        let raw: StripeSession = self
            .send(self.http.get(format!("{}/v1/checkout/sessions/{session_id}", self.api_base)))
            .await?;
        Self::into_session(raw)
    }
}
