use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};

use super::{CartClient, CatalogClient, ClientError, CurrencyClient, PaymentClient, ShippingClient};
use crate::domain::money::Money;
use crate::models::{Address, CartItem, CreditCardInfo};
use crate::proto::pb;
use crate::proto::pb::cart_service_client::CartServiceClient;
use crate::proto::pb::currency_service_client::CurrencyServiceClient;
use crate::proto::pb::payment_service_client::PaymentServiceClient;
use crate::proto::pb::product_catalog_service_client::ProductCatalogServiceClient;
use crate::proto::pb::shipping_service_client::ShippingServiceClient;

// ============================================================================
// gRPC-backed collaborators
// ============================================================================
//
// Channels connect lazily: nothing is dialled until the first call, so the
// service starts even while collaborators are still coming up. Generated
// clients are cheap to clone and need `&mut self`, hence the per-call clone.
//
// ============================================================================

/// Lazily connected channel to `host:port` (or a full URI)
pub(crate) fn lazy_channel(addr: &str) -> Result<Channel, tonic::transport::Error> {
    let uri = if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    };
    Ok(Endpoint::from_shared(uri)?.connect_lazy())
}

fn cart_items(items: &[CartItem]) -> Vec<pb::CartItem> {
    items.iter().map(Into::into).collect()
}

#[derive(Clone)]
pub struct GrpcCartClient {
    inner: CartServiceClient<Channel>,
}

impl GrpcCartClient {
    pub fn connect_lazy(addr: &str) -> Result<Self, tonic::transport::Error> {
        Ok(Self {
            inner: CartServiceClient::new(lazy_channel(addr)?),
        })
    }
}

#[async_trait]
impl CartClient for GrpcCartClient {
    async fn get_cart(&self, user_id: &str) -> Result<Vec<CartItem>, ClientError> {
        let cart = self
            .inner
            .clone()
            .get_cart(pb::GetCartRequest {
                user_id: user_id.to_string(),
            })
            .await?
            .into_inner();

        Ok(cart.items.into_iter().map(Into::into).collect())
    }

    async fn empty_cart(&self, user_id: &str) -> Result<(), ClientError> {
        self.inner
            .clone()
            .empty_cart(pb::EmptyCartRequest {
                user_id: user_id.to_string(),
            })
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct GrpcCatalogClient {
    inner: ProductCatalogServiceClient<Channel>,
}

impl GrpcCatalogClient {
    pub fn connect_lazy(addr: &str) -> Result<Self, tonic::transport::Error> {
        Ok(Self {
            inner: ProductCatalogServiceClient::new(lazy_channel(addr)?),
        })
    }
}

#[async_trait]
impl CatalogClient for GrpcCatalogClient {
    async fn product_price(&self, product_id: &str) -> Result<Money, ClientError> {
        let product = self
            .inner
            .clone()
            .get_product(pb::GetProductRequest {
                id: product_id.to_string(),
            })
            .await?
            .into_inner();

        product
            .price_usd
            .map(Into::into)
            .ok_or(ClientError::MissingField("price_usd"))
    }
}

#[derive(Clone)]
pub struct GrpcCurrencyClient {
    inner: CurrencyServiceClient<Channel>,
}

impl GrpcCurrencyClient {
    pub fn connect_lazy(addr: &str) -> Result<Self, tonic::transport::Error> {
        Ok(Self {
            inner: CurrencyServiceClient::new(lazy_channel(addr)?),
        })
    }
}

#[async_trait]
impl CurrencyClient for GrpcCurrencyClient {
    async fn convert(&self, from: &Money, to_code: &str) -> Result<Money, ClientError> {
        let converted = self
            .inner
            .clone()
            .convert(pb::CurrencyConversionRequest {
                from: Some(from.into()),
                to_code: to_code.to_string(),
            })
            .await?
            .into_inner();

        Ok(converted.into())
    }
}

#[derive(Clone)]
pub struct GrpcShippingClient {
    inner: ShippingServiceClient<Channel>,
}

impl GrpcShippingClient {
    pub fn connect_lazy(addr: &str) -> Result<Self, tonic::transport::Error> {
        Ok(Self {
            inner: ShippingServiceClient::new(lazy_channel(addr)?),
        })
    }
}

#[async_trait]
impl ShippingClient for GrpcShippingClient {
    async fn quote(&self, address: &Address, items: &[CartItem]) -> Result<Money, ClientError> {
        let quote = self
            .inner
            .clone()
            .get_quote(pb::GetQuoteRequest {
                address: Some(address.into()),
                items: cart_items(items),
            })
            .await?
            .into_inner();

        quote
            .cost_usd
            .map(Into::into)
            .ok_or(ClientError::MissingField("cost_usd"))
    }

    async fn ship_order(&self, address: &Address, items: &[CartItem]) -> Result<String, ClientError> {
        let shipped = self
            .inner
            .clone()
            .ship_order(pb::ShipOrderRequest {
                address: Some(address.into()),
                items: cart_items(items),
            })
            .await?
            .into_inner();

        Ok(shipped.tracking_id)
    }
}

#[derive(Clone)]
pub struct GrpcPaymentClient {
    inner: PaymentServiceClient<Channel>,
}

impl GrpcPaymentClient {
    pub fn connect_lazy(addr: &str) -> Result<Self, tonic::transport::Error> {
        Ok(Self {
            inner: PaymentServiceClient::new(lazy_channel(addr)?),
        })
    }
}

#[async_trait]
impl PaymentClient for GrpcPaymentClient {
    async fn charge(&self, amount: &Money, card: &CreditCardInfo) -> Result<String, ClientError> {
        let charged = self
            .inner
            .clone()
            .charge(pb::ChargeRequest {
                amount: Some(amount.into()),
                credit_card: Some(card.into()),
            })
            .await?
            .into_inner();

        Ok(charged.transaction_id)
    }
}
