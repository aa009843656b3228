use std::sync::Arc;

use crate::clients::{guarded, ClientError, ShippingClient};
use crate::models::{Address, CartItem};
use crate::utils::CallContext;

/// Requests shipment of the cart and returns the tracking id
pub struct FulfillmentOrchestrator {
    shipping: Arc<dyn ShippingClient>,
}

impl FulfillmentOrchestrator {
    pub fn new(shipping: Arc<dyn ShippingClient>) -> Self {
        Self { shipping }
    }

    pub async fn ship(
        &self,
        ctx: &CallContext,
        address: &Address,
        items: &[CartItem],
    ) -> Result<String, ClientError> {
        guarded(ctx, self.shipping.ship_order(address, items)).await
    }
}
