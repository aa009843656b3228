// ============================================================================
// Collaborator Clients
// ============================================================================
//
// One trait per downstream service. The checkout core only sees these traits;
// `grpc` and `email` hold the network-backed implementations wired in main.
// Each call is attempted exactly once.
//
// ============================================================================

mod email;
mod grpc;

use async_trait::async_trait;
use std::future::Future;

use crate::domain::money::Money;
use crate::models::{Address, CartItem, CreditCardInfo, OrderResult};
use crate::utils::{CallContext, CancelReason};

pub use email::HttpEmailClient;
pub use grpc::{
    GrpcCartClient, GrpcCatalogClient, GrpcCurrencyClient, GrpcPaymentClient, GrpcShippingClient,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("expected 200, got {0}")]
    UnexpectedStatus(u16),

    #[error("response is missing field `{0}`")]
    MissingField(&'static str),

    #[error("{0}")]
    Cancelled(CancelReason),
}

impl From<CancelReason> for ClientError {
    fn from(reason: CancelReason) -> Self {
        ClientError::Cancelled(reason)
    }
}

/// Runs a collaborator call unless the caller's context ends first
pub async fn guarded<T, F>(ctx: &CallContext, request: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    ctx.run(request).await?
}

#[async_trait]
pub trait CartClient: Send + Sync {
    async fn get_cart(&self, user_id: &str) -> Result<Vec<CartItem>, ClientError>;

    async fn empty_cart(&self, user_id: &str) -> Result<(), ClientError>;
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Catalog price of a product, in USD
    async fn product_price(&self, product_id: &str) -> Result<Money, ClientError>;
}

#[async_trait]
pub trait CurrencyClient: Send + Sync {
    async fn convert(&self, from: &Money, to_code: &str) -> Result<Money, ClientError>;
}

#[async_trait]
pub trait ShippingClient: Send + Sync {
    /// Shipping quote, in USD
    async fn quote(&self, address: &Address, items: &[CartItem]) -> Result<Money, ClientError>;

    /// Returns the tracking id
    async fn ship_order(&self, address: &Address, items: &[CartItem]) -> Result<String, ClientError>;
}

#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Returns the transaction id
    async fn charge(&self, amount: &Money, card: &CreditCardInfo) -> Result<String, ClientError>;
}

#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send_order_confirmation(&self, email: &str, order: &OrderResult) -> Result<(), ClientError>;
}
