use std::sync::Arc;

use crate::clients::{guarded, ClientError, PaymentClient};
use crate::domain::money::Money;
use crate::flags::{bool_flag, FlagProvider, PAYMENT_UNREACHABLE};
use crate::models::CreditCardInfo;
use crate::utils::CallContext;

/// Address the fault-injection route dials; it never resolves
pub const UNREACHABLE_PAYMENT_ADDR: &str = "badAddress:50051";

/// Charges the card through the payment service, or through a dead endpoint
/// while `paymentUnreachable` is on. Routing is the only thing the flag does.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentClient>,
    unreachable: Arc<dyn PaymentClient>,
    flags: Arc<dyn FlagProvider>,
}

impl PaymentOrchestrator {
    pub fn new(
        gateway: Arc<dyn PaymentClient>,
        unreachable: Arc<dyn PaymentClient>,
        flags: Arc<dyn FlagProvider>,
    ) -> Self {
        Self {
            gateway,
            unreachable,
            flags,
        }
    }

    pub async fn charge(
        &self,
        ctx: &CallContext,
        amount: &Money,
        card: &CreditCardInfo,
    ) -> Result<String, ClientError> {
        let gateway = if bool_flag(ctx, self.flags.as_ref(), PAYMENT_UNREACHABLE, false).await {
            tracing::warn!(
                flag = PAYMENT_UNREACHABLE,
                target_addr = UNREACHABLE_PAYMENT_ADDR,
                "Routing charge to unreachable payment endpoint"
            );
            &self.unreachable
        } else {
            &self.gateway
        };

        guarded(ctx, gateway.charge(amount, card)).await
    }
}
