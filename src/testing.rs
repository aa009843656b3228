//! In-memory collaborators for unit tests. Every fake is `Clone` and shares
//! its recorded calls between clones, so a test can keep one handle while the
//! code under test owns another.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::clients::{
    CartClient, CatalogClient, ClientError, CurrencyClient, EmailClient, PaymentClient,
    ShippingClient,
};
use crate::domain::money::Money;
use crate::flags::FlagProvider;
use crate::messaging::{DeliveryAck, DeliveryReceipt, MessageProducer, OutboundMessage, PublishError};
use crate::models::{Address, CartItem, CreditCardInfo, OrderResult};

fn unavailable(what: &str) -> ClientError {
    ClientError::Rpc(tonic::Status::unavailable(format!("{} unavailable", what)))
}

// ============================================================================
// Journal - shared call log for ordering assertions
// ============================================================================

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ============================================================================
// Cart
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeCart {
    items: Option<Vec<CartItem>>,
    fail_empty: bool,
    emptied: Arc<Mutex<Vec<String>>>,
    journal: Journal,
}

impl FakeCart {
    pub fn with_items(items: Vec<CartItem>) -> Self {
        Self {
            items: Some(items),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn failing_empty(mut self) -> Self {
        self.fail_empty = true;
        self
    }

    pub fn recording_to(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn emptied(&self) -> Vec<String> {
        self.emptied.lock().unwrap().clone()
    }
}

#[async_trait]
impl CartClient for FakeCart {
    async fn get_cart(&self, _user_id: &str) -> Result<Vec<CartItem>, ClientError> {
        self.journal.record("get_cart");
        self.items.clone().ok_or_else(|| unavailable("cart"))
    }

    async fn empty_cart(&self, user_id: &str) -> Result<(), ClientError> {
        self.journal.record("empty_cart");
        if self.fail_empty {
            return Err(unavailable("cart"));
        }
        self.emptied.lock().unwrap().push(user_id.to_string());
        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeCatalog {
    prices: HashMap<String, Money>,
    journal: Journal,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, product_id: &str, price_usd: Money) -> Self {
        self.prices.insert(product_id.to_string(), price_usd);
        self
    }

    pub fn recording_to(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn product_price(&self, product_id: &str) -> Result<Money, ClientError> {
        self.journal.record("get_product");
        self.prices
            .get(product_id)
            .cloned()
            .ok_or_else(|| ClientError::Rpc(tonic::Status::not_found(format!("no product with ID {}", product_id))))
    }
}

// ============================================================================
// Currency
// ============================================================================

/// Converts by relabelling the amount; `with_rate` multiplies for one target
#[derive(Clone, Default)]
pub struct FakeCurrency {
    rates: HashMap<String, u32>,
    failing_for: Option<String>,
    calls: Arc<Mutex<u32>>,
    journal: Journal,
}

impl FakeCurrency {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn with_rate(code: &str, rate: u32) -> Self {
        let mut fake = Self::default();
        fake.rates.insert(code.to_string(), rate);
        fake
    }

    pub fn failing_for(code: &str) -> Self {
        Self {
            failing_for: Some(code.to_string()),
            ..Self::default()
        }
    }

    pub fn recording_to(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CurrencyClient for FakeCurrency {
    async fn convert(&self, from: &Money, to_code: &str) -> Result<Money, ClientError> {
        *self.calls.lock().unwrap() += 1;
        self.journal.record("convert");

        if self.failing_for.as_deref() == Some(to_code) {
            return Err(unavailable("currency"));
        }

        let rate = self.rates.get(to_code).copied().unwrap_or(1);
        let converted = from
            .multiply(rate)
            .map_err(|_| ClientError::Rpc(tonic::Status::out_of_range("conversion overflow")))?;

        Ok(Money::new(to_code, converted.units, converted.nanos))
    }
}

// ============================================================================
// Shipping
// ============================================================================

#[derive(Clone)]
pub struct FakeShipping {
    quote: Option<Money>,
    fail_ship: bool,
    quotes: Arc<Mutex<u32>>,
    shipments: Arc<Mutex<u32>>,
    journal: Journal,
}

impl FakeShipping {
    pub fn quoting(quote: Money) -> Self {
        Self {
            quote: Some(quote),
            fail_ship: false,
            quotes: Arc::default(),
            shipments: Arc::default(),
            journal: Journal::default(),
        }
    }

    /// Both quoting and shipping fail
    pub fn failing() -> Self {
        Self {
            quote: None,
            fail_ship: true,
            ..Self::quoting(Money::zero("USD"))
        }
    }

    pub fn failing_shipment(mut self) -> Self {
        self.fail_ship = true;
        self
    }

    pub fn recording_to(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn quotes(&self) -> u32 {
        *self.quotes.lock().unwrap()
    }

    pub fn shipments(&self) -> u32 {
        *self.shipments.lock().unwrap()
    }
}

#[async_trait]
impl ShippingClient for FakeShipping {
    async fn quote(&self, _address: &Address, _items: &[CartItem]) -> Result<Money, ClientError> {
        *self.quotes.lock().unwrap() += 1;
        self.journal.record("get_quote");
        self.quote.clone().ok_or_else(|| unavailable("shipping"))
    }

    async fn ship_order(&self, _address: &Address, items: &[CartItem]) -> Result<String, ClientError> {
        self.journal.record("ship_order");
        if self.fail_ship {
            return Err(unavailable("shipping"));
        }
        *self.shipments.lock().unwrap() += 1;

        let ids: Vec<&str> = items.iter().map(|item| item.product_id.as_str()).collect();
        Ok(format!("TRACK-{}", ids.join("-")))
    }
}

// ============================================================================
// Payment
// ============================================================================

#[derive(Clone)]
pub struct FakePayment {
    transaction_id: Option<String>,
    charged: Arc<Mutex<Vec<Money>>>,
    journal: Journal,
}

impl FakePayment {
    pub fn approving(transaction_id: &str) -> Self {
        Self {
            transaction_id: Some(transaction_id.to_string()),
            charged: Arc::default(),
            journal: Journal::default(),
        }
    }

    /// Behaves like a dial to a host that does not resolve
    pub fn unreachable() -> Self {
        Self {
            transaction_id: None,
            ..Self::approving("")
        }
    }

    pub fn recording_to(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    /// Every amount a charge was attempted for
    pub fn charged(&self) -> Vec<Money> {
        self.charged.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentClient for FakePayment {
    async fn charge(&self, amount: &Money, _card: &CreditCardInfo) -> Result<String, ClientError> {
        self.charged.lock().unwrap().push(amount.clone());
        self.journal.record("charge");
        self.transaction_id
            .clone()
            .ok_or_else(|| unavailable("payment"))
    }
}

// ============================================================================
// Email
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeEmail {
    failing: bool,
    sent: Arc<Mutex<Vec<(String, OrderResult)>>>,
    journal: Journal,
}

impl FakeEmail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn recording_to(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn sent(&self) -> Vec<(String, OrderResult)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailClient for FakeEmail {
    async fn send_order_confirmation(&self, email: &str, order: &OrderResult) -> Result<(), ClientError> {
        self.journal.record("send_email");
        if self.failing {
            return Err(ClientError::UnexpectedStatus(500));
        }
        self.sent.lock().unwrap().push((email.to_string(), order.clone()));
        Ok(())
    }
}

// ============================================================================
// Message producer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckMode {
    Success { partition: i32, offset: i64 },
    Error(String),
    /// Accepts the message but never acknowledges it
    Never,
    /// Never accepts the message
    BlockEnqueue,
}

struct ProducerState {
    first: AckMode,
    rest: Option<AckMode>,
    sent: Vec<OutboundMessage>,
    held: Vec<oneshot::Sender<Result<DeliveryAck, PublishError>>>,
}

#[derive(Clone)]
pub struct FakeProducer {
    state: Arc<Mutex<ProducerState>>,
    journal: Journal,
}

impl FakeProducer {
    pub fn new(mode: AckMode) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProducerState {
                first: mode,
                rest: None,
                sent: Vec::new(),
                held: Vec::new(),
            })),
            journal: Journal::default(),
        }
    }

    pub fn recording_to(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    /// Mode for every enqueue after the first one
    pub fn set_mode_after_first(&self, mode: AckMode) {
        self.state.lock().unwrap().rest = Some(mode);
    }

    pub fn enqueued(&self) -> Vec<OutboundMessage> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl MessageProducer for FakeProducer {
    async fn enqueue(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, PublishError> {
        let mode = {
            let state = self.state.lock().unwrap();
            match (&state.rest, state.sent.is_empty()) {
                (Some(rest), false) => rest.clone(),
                _ => state.first.clone(),
            }
        };

        if mode == AckMode::BlockEnqueue {
            std::future::pending::<()>().await;
        }

        self.journal.record("publish");
        let (tx, receipt) = DeliveryReceipt::channel();
        let mut state = self.state.lock().unwrap();
        state.sent.push(message.clone());

        match mode {
            AckMode::Success { partition, offset } => {
                let _ = tx.send(Ok(DeliveryAck { partition, offset }));
            }
            AckMode::Error(reason) => {
                let _ = tx.send(Err(PublishError::Broker(reason)));
            }
            AckMode::Never | AckMode::BlockEnqueue => state.held.push(tx),
        }

        Ok(receipt)
    }
}

// ============================================================================
// HangingFlags - a flag provider that never answers
// ============================================================================

pub struct HangingFlags;

#[async_trait]
impl FlagProvider for HangingFlags {
    async fn evaluate_bool(&self, _flag: &str, _default: bool) -> bool {
        std::future::pending().await
    }

    async fn evaluate_int(&self, _flag: &str, _default: i64) -> i64 {
        std::future::pending().await
    }
}
