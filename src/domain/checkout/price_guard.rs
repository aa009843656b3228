use std::fmt::Write;
use std::sync::Arc;

use crate::clients::{guarded, CurrencyClient};
use crate::models::OrderItem;
use crate::utils::CallContext;

// ============================================================================
// Price Guard
// ============================================================================
//
// Rejects an order as soon as one item costs more than the configured USD
// threshold. Only a threshold of exactly zero turns the rule off; a negative
// one is compared like any other, so every priced item exceeds it.
// If an item cannot be converted to USD its unconverted cost is compared
// instead; the check itself never fails on a conversion error.
//
// ============================================================================

pub const THRESHOLD_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("item {product_id} costs ${price_usd:.2} which exceeds the threshold of ${threshold}")]
pub struct PriceViolation {
    pub product_id: String,
    pub price_usd: f64,
    pub threshold: i64,
}

pub struct PriceGuard {
    currency: Arc<dyn CurrencyClient>,
}

impl PriceGuard {
    pub fn new(currency: Arc<dyn CurrencyClient>) -> Self {
        Self { currency }
    }

    /// Checks items in order and stops at the first one over the threshold
    pub async fn check(
        &self,
        ctx: &CallContext,
        items: &[OrderItem],
        threshold_usd: i64,
    ) -> Result<(), PriceViolation> {
        if threshold_usd == 0 {
            tracing::debug!(threshold = threshold_usd, "Price guard disabled");
            return Ok(());
        }

        tracing::debug!(
            items = items.len(),
            app.checkout.price_threshold = threshold_usd,
            "Checking items against price threshold"
        );

        for item in items {
            let price = match guarded(ctx, self.currency.convert(&item.cost, THRESHOLD_CURRENCY)).await {
                Ok(converted) => converted,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        product_id = %item.item.product_id,
                        "Failed to convert price to USD for threshold check, using original price"
                    );
                    item.cost.clone()
                }
            };

            let price_usd = price.as_f64();
            if price_usd > threshold_usd as f64 {
                tracing::warn!(
                    app.product.id = %item.item.product_id,
                    app.product.price_usd = price_usd,
                    app.checkout.threshold = threshold_usd,
                    "expensive_item_detected"
                );
                return Err(PriceViolation {
                    product_id: item.item.product_id.clone(),
                    price_usd,
                    threshold: threshold_usd,
                });
            }
        }

        Ok(())
    }
}

/// Plain-text diagnostic attached to a rejected order
pub fn violation_report(
    violation: &PriceViolation,
    items: &[OrderItem],
    user_currency: &str,
    trace_id: &str,
) -> String {
    let threshold = violation.threshold;
    let mut report = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(report, "\n\n=== CHECKOUT PRICE THRESHOLD REPORT ===");
    let _ = writeln!(report, "- Violation: {}", violation);
    let _ = writeln!(report, "- Flag: checkoutFailureThreshold = {}", threshold);
    let _ = writeln!(report, "- Trace ID: {}", trace_id);
    let _ = writeln!(report, "- User Currency: {}", user_currency);
    let _ = writeln!(report, "- Total Items: {}", items.len());
    let _ = writeln!(report, "\nITEM ANALYSIS:");

    for (idx, item) in items.iter().enumerate() {
        let price = item.cost.as_f64();
        let _ = writeln!(report, "- Item {}: {}", idx + 1, item.item.product_id);
        let _ = writeln!(report, "  * Price: ${:.2} {}", price, item.cost.currency_code);
        let _ = writeln!(report, "  * Quantity: {}", item.item.quantity);
        let _ = writeln!(
            report,
            "  * Exceeds Threshold: {} (threshold: ${})",
            price > threshold as f64,
            threshold
        );
    }

    let _ = writeln!(report, "=== END REPORT ===");
    report
}
