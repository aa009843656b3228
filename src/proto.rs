// Generated oteldemo types and the conversions between them and `models`.

pub mod pb {
    tonic::include_proto!("oteldemo");

    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("oteldemo_descriptor");
}

use crate::domain::money::Money;
use crate::models::{Address, CartItem, CreditCardInfo, OrderItem, OrderResult, PlaceOrderRequest};

impl From<pb::Money> for Money {
    fn from(m: pb::Money) -> Self {
        Money::new(m.currency_code, m.units, m.nanos)
    }
}

impl From<&Money> for pb::Money {
    fn from(m: &Money) -> Self {
        pb::Money {
            currency_code: m.currency_code.clone(),
            units: m.units,
            nanos: m.nanos,
        }
    }
}

impl From<pb::CartItem> for CartItem {
    fn from(item: pb::CartItem) -> Self {
        CartItem {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}

impl From<&CartItem> for pb::CartItem {
    fn from(item: &CartItem) -> Self {
        pb::CartItem {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
        }
    }
}

impl From<pb::Address> for Address {
    fn from(a: pb::Address) -> Self {
        Address {
            street_address: a.street_address,
            city: a.city,
            state: a.state,
            country: a.country,
            zip_code: a.zip_code,
        }
    }
}

impl From<&Address> for pb::Address {
    fn from(a: &Address) -> Self {
        pb::Address {
            street_address: a.street_address.clone(),
            city: a.city.clone(),
            state: a.state.clone(),
            country: a.country.clone(),
            zip_code: a.zip_code.clone(),
        }
    }
}

impl From<pb::CreditCardInfo> for CreditCardInfo {
    fn from(c: pb::CreditCardInfo) -> Self {
        CreditCardInfo {
            credit_card_number: c.credit_card_number,
            credit_card_cvv: c.credit_card_cvv,
            credit_card_expiration_year: c.credit_card_expiration_year,
            credit_card_expiration_month: c.credit_card_expiration_month,
        }
    }
}

impl From<&CreditCardInfo> for pb::CreditCardInfo {
    fn from(c: &CreditCardInfo) -> Self {
        pb::CreditCardInfo {
            credit_card_number: c.credit_card_number.clone(),
            credit_card_cvv: c.credit_card_cvv,
            credit_card_expiration_year: c.credit_card_expiration_year,
            credit_card_expiration_month: c.credit_card_expiration_month,
        }
    }
}

impl From<&OrderItem> for pb::OrderItem {
    fn from(item: &OrderItem) -> Self {
        pb::OrderItem {
            item: Some((&item.item).into()),
            cost: Some((&item.cost).into()),
        }
    }
}

impl From<&OrderResult> for pb::OrderResult {
    fn from(order: &OrderResult) -> Self {
        pb::OrderResult {
            order_id: order.order_id.to_string(),
            shipping_tracking_id: order.shipping_tracking_id.clone(),
            shipping_cost: Some((&order.shipping_cost).into()),
            shipping_address: Some((&order.shipping_address).into()),
            items: order.items.iter().map(Into::into).collect(),
        }
    }
}

impl From<pb::PlaceOrderRequest> for PlaceOrderRequest {
    fn from(req: pb::PlaceOrderRequest) -> Self {
        PlaceOrderRequest {
            user_id: req.user_id,
            user_currency: req.user_currency,
            address: req.address.map(Into::into).unwrap_or_default(),
            email: req.email,
            credit_card: req.credit_card.map(Into::into).unwrap_or_default(),
        }
    }
}
