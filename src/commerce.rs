//! Order lookup against the commerce platform API.
//!
//! One read-only endpoint: fetch an order by id so a notification can be
//! addressed and worded. Missing customer data is a data error the worker
//! records per entry, never a crash.

use serde::Deserialize;
use tracing::debug;

/// HTTP request timeout for order lookups.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// User-Agent the platform requires on API calls.
const USER_AGENT: &str = "straylight (orders@straylight.dev)";

/// Errors from commerce lookups.
#[derive(Debug, thiserror::Error)]
pub enum CommerceError {
    /// HTTP request failed or returned a non-success status.
    #[error("order lookup failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The order has no customer record attached.
    #[error("order has no customer data")]
    MissingCustomer,

    /// The customer has no phone number on file.
    #[error("customer has no phone number on file")]
    MissingPhone,
}

/// Customer record on an order.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Full name as registered with the store.
    pub name: String,
    /// Phone number, if on file.
    pub phone: Option<String>,
}

/// An order as returned by the platform API. Only the fields the notifier
/// needs are modeled; the rest of the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    /// Storefront-facing order number.
    pub number: i64,
    /// Customer the order belongs to.
    pub customer: Option<Customer>,
    /// Carrier tracking number, once shipped.
    pub shipping_tracking_number: Option<String>,
    /// Carrier tracking URL, once shipped.
    pub shipping_tracking_url: Option<String>,
}

impl Order {
    /// The customer record, or a data error when absent.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::MissingCustomer`] when the order carries no
    /// customer.
    pub fn customer(&self) -> Result<&Customer, CommerceError> {
        self.customer.as_ref().ok_or(CommerceError::MissingCustomer)
    }
}

impl Customer {
    /// The customer's phone number, or a data error when absent or blank.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::MissingPhone`] when no usable number is on
    /// file.
    pub fn phone(&self) -> Result<&str, CommerceError> {
        match self.phone.as_deref() {
            Some(p) if !p.trim().is_empty() => Ok(p),
            _ => Err(CommerceError::MissingPhone),
        }
    }

    /// First name only, for message greetings.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Client for the commerce platform's order API.
#[derive(Debug, Clone)]
pub struct CommerceClient {
    client: reqwest::Client,
    base_url: String,
    store_id: String,
    access_token: String,
}

impl CommerceClient {
    /// Create a client for the given store.
    pub fn new(base_url: String, store_id: String, access_token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            store_id,
            access_token,
        }
    }

    /// Fetch an order by id.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or a non-success response.
    pub async fn fetch_order(&self, order_id: i64) -> Result<Order, CommerceError> {
        let url = format!("{}/v1/{}/orders/{order_id}", self.base_url, self.store_id);
        debug!(order_id, "fetching order details");
        let order = self
            .client
            .get(&url)
            .header("Authentication", format!("bearer {}", self.access_token))
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .json::<Order>()
            .await?;
        Ok(order)
    }
}
