use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::aggregate::OrderRecord;
use super::value_objects::{Address, Card, Money, Operation, OrderId, Weight};

// ============================================================================
// Order Collaborators
// ============================================================================
//
// The order talks to four external services through these traits:
// - ProductCatalog   price/weight lookup
// - ShippingCarrier  quote + synchronous dispatch
// - PaymentGateway   asynchronous pay/refund, answers through PaymentCallback
// - OrderRepository  persistence and id minting
//
// Implementations live outside the domain (see crate::adapters).
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("No catalog entry for {0}")]
    NotFound(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShippingError {
    #[error("Carrier rejected shipment: {0}")]
    Rejected(String),

    #[error("Carrier unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("Order has no identity yet")]
    Unidentified,

    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

pub trait ProductCatalog: Send + Sync {
    fn get_price(&self, product_name: &str) -> Result<Money, CatalogError>;

    fn get_weight(&self, product_name: &str) -> Result<Weight, CatalogError>;
}

pub trait ShippingCarrier: Send + Sync {
    /// Price quote for shipping `weight` to `address`
    fn get_price(&self, address: &Address, weight: Weight) -> Result<Money, ShippingError>;

    /// Dispatch immediately, returning the tracking code
    fn ship(&self, address: &Address, weight: Weight) -> Result<String, ShippingError>;
}

/// Asynchronous payment provider.
///
/// Both calls return without a result. The gateway must later call exactly one
/// of `on_success` / `on_error` on the callback it was handed, from any thread.
pub trait PaymentGateway: Send + Sync {
    fn pay(&self, card: &Card, amount: Money, callback: PaymentCallback);

    fn refund(&self, confirmation_code: &str, callback: PaymentCallback);
}

/// Blocking persistence. Failures are not retried by the order.
pub trait OrderRepository: Send + Sync {
    fn update(&self, order: &OrderRecord) -> Result<(), RepositoryError>;

    fn retrieve_order(&self, id: OrderId) -> Result<OrderRecord, RepositoryError>;

    /// Mint a fresh identifier; called once per order, at placement
    fn get_order_id(&self) -> Result<OrderId, RepositoryError>;
}

/// The four services an order is bound to for its whole life
#[derive(Clone)]
pub struct Collaborators {
    pub repository: Arc<dyn OrderRepository>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub payments: Arc<dyn PaymentGateway>,
    pub shipping: Arc<dyn ShippingCarrier>,
}

impl Collaborators {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        catalog: Arc<dyn ProductCatalog>,
        payments: Arc<dyn PaymentGateway>,
        shipping: Arc<dyn ShippingCarrier>,
    ) -> Self {
        Self {
            repository,
            catalog,
            payments,
            shipping,
        }
    }
}

// ============================================================================
// Completion Protocol
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayCall {
    Payment,
    Refund,
}

impl GatewayCall {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayCall::Payment => "payment",
            GatewayCall::Refund => "refund",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success(String),
    Error(String),
}

impl Outcome {
    pub fn code(&self) -> &str {
        match self {
            Outcome::Success(code) | Outcome::Error(code) => code,
        }
    }
}

/// Result of one gateway call, as delivered back to the order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub call: GatewayCall,
    /// Which request of this kind produced the completion, starting at 1
    pub attempt: u32,
    pub outcome: Outcome,
}

impl Completion {
    pub fn operation(&self) -> Operation {
        match (&self.call, &self.outcome) {
            (GatewayCall::Payment, Outcome::Success(_)) => Operation::PaymentSuccess,
            (GatewayCall::Payment, Outcome::Error(_)) => Operation::PaymentError,
            (GatewayCall::Refund, Outcome::Success(_)) => Operation::RefundSuccess,
            (GatewayCall::Refund, Outcome::Error(_)) => Operation::RefundError,
        }
    }
}

/// Where completion handles send their result
pub trait CompletionSink: Send + Sync {
    fn deliver(&self, completion: Completion);
}

/// Completion handle passed to the gateway with every pay/refund request.
///
/// `on_success` and `on_error` consume the handle, so it fires at most once.
pub struct PaymentCallback {
    call: GatewayCall,
    attempt: u32,
    sink: Arc<dyn CompletionSink>,
}

impl PaymentCallback {
    pub(crate) fn new(call: GatewayCall, attempt: u32, sink: Arc<dyn CompletionSink>) -> Self {
        Self { call, attempt, sink }
    }

    pub fn call(&self) -> GatewayCall {
        self.call
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn on_success(self, code: impl Into<String>) {
        self.finish(Outcome::Success(code.into()));
    }

    pub fn on_error(self, code: impl Into<String>) {
        self.finish(Outcome::Error(code.into()));
    }

    fn finish(self, outcome: Outcome) {
        tracing::debug!(
            call = self.call.as_str(),
            attempt = self.attempt,
            outcome = ?outcome,
            "Gateway callback fired"
        );

        self.sink.deliver(Completion {
            call: self.call,
            attempt: self.attempt,
            outcome,
        });
    }
}

impl fmt::Debug for PaymentCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentCallback")
            .field("call", &self.call)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Completion>>);

    impl CompletionSink for Collect {
        fn deliver(&self, completion: Completion) {
            self.0.lock().unwrap().push(completion);
        }
    }

    #[test]
    fn test_callback_delivers_once_with_its_attempt() {
        let sink = Arc::new(Collect::default());
        let callback = PaymentCallback::new(GatewayCall::Payment, 2, sink.clone());

        callback.on_error("ERR123");

        let delivered = sink.0.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(
            delivered[0],
            Completion {
                call: GatewayCall::Payment,
                attempt: 2,
                outcome: Outcome::Error("ERR123".to_string()),
            }
        );
        assert_eq!(delivered[0].operation(), Operation::PaymentError);
    }

    #[test]
    fn test_completion_operations() {
        let refund_ok = Completion {
            call: GatewayCall::Refund,
            attempt: 1,
            outcome: Outcome::Success("SUC123".into()),
        };
        assert_eq!(refund_ok.operation(), Operation::RefundSuccess);
        assert_eq!(refund_ok.outcome.code(), "SUC123");
    }
}
