use std::sync::Arc;
use tracing::field::Empty;

use crate::clients::{guarded, CartClient, CatalogClient, ClientError, CurrencyClient, ShippingClient};
use crate::models::{Address, CartItem, OrderItem, OrderPrep};
use crate::utils::CallContext;

// ============================================================================
// Order Preparation
// ============================================================================
//
// cart -> price each item in the user's currency -> shipping quote (USD)
// -> convert the quote. Strictly sequential; the first failure aborts the
// whole preparation and nothing partial is returned.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PreparationError {
    #[error("cart failure: {0}")]
    Cart(#[source] ClientError),

    #[error("failed to prepare order: failed to get product #{product_id:?}: {source}")]
    Catalog {
        product_id: String,
        #[source]
        source: ClientError,
    },

    #[error("failed to prepare order: failed to convert price of {product_id:?} to {currency}: {source}")]
    PriceConversion {
        product_id: String,
        currency: String,
        #[source]
        source: ClientError,
    },

    #[error("shipping quote failure: {0}")]
    ShippingQuote(#[source] ClientError),

    #[error("failed to convert shipping cost to currency: {0}")]
    ShippingConversion(#[source] ClientError),
}

impl PreparationError {
    pub fn stage(&self) -> &'static str {
        match self {
            PreparationError::Cart(_) => "cart",
            PreparationError::Catalog { .. } => "catalog",
            PreparationError::PriceConversion { .. } => "price_conversion",
            PreparationError::ShippingQuote(_) => "shipping_quote",
            PreparationError::ShippingConversion(_) => "shipping_conversion",
        }
    }
}

pub struct OrderPreparer {
    cart: Arc<dyn CartClient>,
    catalog: Arc<dyn CatalogClient>,
    currency: Arc<dyn CurrencyClient>,
    shipping: Arc<dyn ShippingClient>,
}

impl OrderPreparer {
    pub fn new(
        cart: Arc<dyn CartClient>,
        catalog: Arc<dyn CatalogClient>,
        currency: Arc<dyn CurrencyClient>,
        shipping: Arc<dyn ShippingClient>,
    ) -> Self {
        Self {
            cart,
            catalog,
            currency,
            shipping,
        }
    }

    #[tracing::instrument(
        name = "prepare_order_items_and_shipping_quote",
        skip_all,
        fields(app.cart.items.count = Empty, app.order.items.count = Empty, app.shipping.amount = Empty)
    )]
    pub async fn prepare(
        &self,
        ctx: &CallContext,
        user_id: &str,
        user_currency: &str,
        address: &Address,
    ) -> Result<OrderPrep, PreparationError> {
        let cart_items = guarded(ctx, self.cart.get_cart(user_id))
            .await
            .map_err(PreparationError::Cart)?;

        let order_items = self.price_items(ctx, &cart_items, user_currency).await?;

        let shipping_usd = guarded(ctx, self.shipping.quote(address, &cart_items))
            .await
            .map_err(PreparationError::ShippingQuote)?;

        let shipping_cost_localized = guarded(ctx, self.currency.convert(&shipping_usd, user_currency))
            .await
            .map_err(PreparationError::ShippingConversion)?;

        let total_quantity: i64 = cart_items.iter().map(|item| i64::from(item.quantity)).sum();
        let span = tracing::Span::current();
        span.record("app.cart.items.count", total_quantity);
        span.record("app.order.items.count", order_items.len());
        span.record("app.shipping.amount", shipping_cost_localized.as_f64());

        Ok(OrderPrep {
            order_items,
            cart_items,
            shipping_cost_localized,
        })
    }

    async fn price_items(
        &self,
        ctx: &CallContext,
        items: &[CartItem],
        user_currency: &str,
    ) -> Result<Vec<OrderItem>, PreparationError> {
        let mut out = Vec::with_capacity(items.len());

        for item in items {
            let price_usd = guarded(ctx, self.catalog.product_price(&item.product_id))
                .await
                .map_err(|source| PreparationError::Catalog {
                    product_id: item.product_id.clone(),
                    source,
                })?;

            let cost = guarded(ctx, self.currency.convert(&price_usd, user_currency))
                .await
                .map_err(|source| PreparationError::PriceConversion {
                    product_id: item.product_id.clone(),
                    currency: user_currency.to_string(),
                    source,
                })?;

            out.push(OrderItem {
                item: item.clone(),
                cost,
            });
        }

        Ok(out)
    }
}
