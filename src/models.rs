use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Money;

// ============================================================================
// Checkout Models
// ============================================================================
//
// Plain Rust views of the oteldemo contract. Every value here is created by a
// single PlaceOrder call and dropped when that call (and its publish attempt)
// completes. Conversions to and from the generated protobuf types live in
// `proto.rs`.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: i32,
}

/// A cart line priced in the order's target currency
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OrderItem {
    pub item: CartItem,
    pub cost: Money,
}

/// Shipping address, passed through to collaborators untouched
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Address {
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct CreditCardInfo {
    pub credit_card_number: String,
    pub credit_card_cvv: i32,
    pub credit_card_expiration_year: i32,
    pub credit_card_expiration_month: i32,
}

// Card numbers must never reach the logs
impl std::fmt::Debug for CreditCardInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let number = &self.credit_card_number;
        let last_four = number
            .char_indices()
            .rev()
            .nth(3)
            .map_or("", |(idx, _)| &number[idx..]);
        f.debug_struct("CreditCardInfo")
            .field("credit_card_number", &format_args!("****{}", last_four))
            .field("credit_card_expiration_year", &self.credit_card_expiration_year)
            .field("credit_card_expiration_month", &self.credit_card_expiration_month)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct PlaceOrderRequest {
    pub user_id: String,
    pub user_currency: String,
    pub address: Address,
    pub email: String,
    pub credit_card: CreditCardInfo,
}

/// Intermediate result of the preparation stage
#[derive(Clone, Debug, PartialEq)]
pub struct OrderPrep {
    pub order_items: Vec<OrderItem>,
    pub cart_items: Vec<CartItem>,
    pub shipping_cost_localized: Money,
}

/// Externally visible outcome of a placed order, also the broker payload
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderResult {
    pub order_id: Uuid,
    pub shipping_tracking_id: String,
    pub shipping_cost: Money,
    pub shipping_address: Address,
    pub items: Vec<OrderItem>,
}

// ============================================================================
// Unit Tests
// ============================================================================
