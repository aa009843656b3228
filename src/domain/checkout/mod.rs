// ============================================================================
// Checkout - order placement
// ============================================================================
//
// The stages of one PlaceOrder call, leaves first. `pipeline` sequences them
// and decides which failures end the call.
//
// ============================================================================

mod errors;
mod fulfillment;
mod payment;
mod pipeline;
mod preparer;
mod price_guard;

pub use payment::UNREACHABLE_PAYMENT_ADDR;
pub use pipeline::{CheckoutPipeline, Collaborators};
