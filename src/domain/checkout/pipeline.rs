use std::sync::Arc;
use tracing::field::Empty;
use uuid::Uuid;

use crate::clients::{
    guarded, CartClient, CatalogClient, CurrencyClient, EmailClient, PaymentClient, ShippingClient,
};
use crate::domain::money::{Money, MoneyError};
use crate::flags::{int_flag, FlagProvider, CHECKOUT_FAILURE_THRESHOLD};
use crate::messaging::EventPublisher;
use crate::metrics::Metrics;
use crate::models::{OrderItem, OrderResult, PlaceOrderRequest};
use crate::utils::CallContext;

use super::errors::CheckoutError;
use super::fulfillment::FulfillmentOrchestrator;
use super::payment::PaymentOrchestrator;
use super::preparer::OrderPreparer;
use super::price_guard::{violation_report, PriceGuard};

// ============================================================================
// Checkout Pipeline
// ============================================================================
//
//   GenerateOrderId   fatal
//   Prepare           fatal
//   PriceGuard        fatal
//   ComputeTotal      fatal (contract violation)
//   Charge            fatal
//   Ship              fatal
//   EmptyCart         best-effort
//   SendEmail         best-effort
//   PublishEvent      best-effort, only with a broker configured
//
// Steps run one after another. A fatal failure skips everything after it,
// best-effort steps included.
//
// ============================================================================

pub trait OrderIdSource: Send + Sync {
    fn next_id(&self) -> anyhow::Result<Uuid>;
}

/// Time-ordered UUID v7 ids
pub struct TimeOrderedIds;

impl OrderIdSource for TimeOrderedIds {
    fn next_id(&self) -> anyhow::Result<Uuid> {
        Ok(Uuid::now_v7())
    }
}

/// Downstream services used by the pipeline
pub struct Collaborators {
    pub cart: Arc<dyn CartClient>,
    pub catalog: Arc<dyn CatalogClient>,
    pub currency: Arc<dyn CurrencyClient>,
    pub shipping: Arc<dyn ShippingClient>,
    pub payment: Arc<dyn PaymentClient>,
    /// Dialed instead of `payment` while `paymentUnreachable` is on
    pub unreachable_payment: Arc<dyn PaymentClient>,
    pub email: Arc<dyn EmailClient>,
}

pub struct CheckoutPipeline {
    ids: Arc<dyn OrderIdSource>,
    preparer: OrderPreparer,
    price_guard: PriceGuard,
    payments: PaymentOrchestrator,
    fulfillment: FulfillmentOrchestrator,
    cart: Arc<dyn CartClient>,
    email: Arc<dyn EmailClient>,
    flags: Arc<dyn FlagProvider>,
    publisher: Option<EventPublisher>,
    metrics: Arc<Metrics>,
}

impl CheckoutPipeline {
    pub fn new(
        clients: Collaborators,
        flags: Arc<dyn FlagProvider>,
        publisher: Option<EventPublisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            ids: Arc::new(TimeOrderedIds),
            preparer: OrderPreparer::new(
                clients.cart.clone(),
                clients.catalog,
                clients.currency.clone(),
                clients.shipping.clone(),
            ),
            price_guard: PriceGuard::new(clients.currency),
            payments: PaymentOrchestrator::new(clients.payment, clients.unreachable_payment, flags.clone()),
            fulfillment: FulfillmentOrchestrator::new(clients.shipping),
            cart: clients.cart,
            email: clients.email,
            flags,
            publisher,
            metrics,
        }
    }

    #[cfg(test)]
    pub fn with_id_source(mut self, ids: Arc<dyn OrderIdSource>) -> Self {
        self.ids = ids;
        self
    }

    #[tracing::instrument(
        name = "place_order",
        skip_all,
        fields(
            app.user.id = %req.user_id,
            app.user.currency = %req.user_currency,
            app.order.id = Empty,
            app.shipping.tracking.id = Empty,
            app.order.amount = Empty,
            app.shipping.amount = Empty,
            app.order.items.count = Empty,
        )
    )]
    pub async fn place_order(
        &self,
        ctx: &CallContext,
        req: &PlaceOrderRequest,
    ) -> Result<OrderResult, CheckoutError> {
        tracing::info!(user_id = %req.user_id, user_currency = %req.user_currency, "[PlaceOrder]");

        match self.run(ctx, req).await {
            Ok(order) => {
                self.metrics.orders_placed.inc();
                tracing::info!(order_id = %order.order_id, "order placed");
                Ok(order)
            }
            Err(e) => {
                let kind = e.kind();
                self.metrics.record_order_failed(kind.as_str());
                tracing::error!(error = %e, kind = kind.as_str(), "PlaceOrder failed");
                Err(e)
            }
        }
    }

    async fn run(&self, ctx: &CallContext, req: &PlaceOrderRequest) -> Result<OrderResult, CheckoutError> {
        let span = tracing::Span::current();

        let order_id = self
            .ids
            .next_id()
            .map_err(|e| CheckoutError::IdentityGeneration(e.to_string()))?;
        span.record("app.order.id", tracing::field::display(order_id));

        let prep = self
            .preparer
            .prepare(ctx, &req.user_id, &req.user_currency, &req.address)
            .await?;
        tracing::info!("prepared");

        let threshold = int_flag(ctx, self.flags.as_ref(), CHECKOUT_FAILURE_THRESHOLD, 0).await;
        if let Err(violation) = self.price_guard.check(ctx, &prep.order_items, threshold).await {
            tracing::warn!(
                app.checkout.threshold = threshold,
                app.product.id = %violation.product_id,
                "checkout_failed_expensive_items"
            );
            let report = violation_report(
                &violation,
                &prep.order_items,
                &req.user_currency,
                ctx.trace().trace_id(),
            );
            return Err(CheckoutError::PriceViolation { violation, report });
        }

        let total = order_total(&prep.shipping_cost_localized, &prep.order_items)?;

        let transaction_id = self
            .payments
            .charge(ctx, &total, &req.credit_card)
            .await
            .map_err(CheckoutError::Payment)?;
        tracing::info!(app.payment.transaction.id = %transaction_id, "charged");

        let tracking_id = self
            .fulfillment
            .ship(ctx, &req.address, &prep.cart_items)
            .await
            .map_err(CheckoutError::Fulfillment)?;
        tracing::info!("shipped");

        span.record("app.shipping.tracking.id", tracking_id.as_str());
        span.record("app.order.amount", total.as_f64());
        span.record("app.shipping.amount", prep.shipping_cost_localized.as_f64());
        span.record("app.order.items.count", prep.order_items.len());

        if let Err(e) = guarded(ctx, self.cart.empty_cart(&req.user_id)).await {
            tracing::warn!(error = %e, user_id = %req.user_id, "failed to empty user cart during checkout");
            self.metrics.record_best_effort_failure("empty_cart");
        }

        let order = OrderResult {
            order_id,
            shipping_tracking_id: tracking_id,
            shipping_cost: prep.shipping_cost_localized,
            shipping_address: req.address.clone(),
            items: prep.order_items,
        };

        match guarded(ctx, self.email.send_order_confirmation(&req.email, &order)).await {
            Ok(()) => tracing::info!(email = %req.email, "order confirmation email sent"),
            Err(e) => {
                tracing::warn!(error = %e, email = %req.email, "failed to send order confirmation");
                self.metrics.record_best_effort_failure("email");
            }
        }

        if let Some(publisher) = &self.publisher {
            let outcome = publisher.publish(ctx, &order).await;
            if !outcome.is_success() {
                self.metrics.record_best_effort_failure("publish");
            }
        }

        Ok(order)
    }
}

/// `shipping + sum(cost * quantity)`, in item order, with exact arithmetic
pub fn order_total(shipping: &Money, items: &[OrderItem]) -> Result<Money, MoneyError> {
    let mut total = shipping.clone();
    for item in items {
        let quantity = u32::try_from(item.item.quantity).map_err(|_| MoneyError::InvalidValue)?;
        total = total.sum(&item.cost.multiply(quantity)?)?;
    }
    Ok(total)
}
