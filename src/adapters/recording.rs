use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::order::{
    Address, Card, CatalogError, Collaborators, Completion, CompletionSink, Money, OrderId,
    OrderRecord, OrderRepository, OrderStatus, PaymentCallback, PaymentGateway, ProductCatalog,
    RepositoryError, ShippingCarrier, ShippingError, Weight,
};

use super::memory::{FlatRateCarrier, InMemoryOrderRepository, StaticCatalog};

// ============================================================================
// Recording Collaborators
// ============================================================================
//
// Test doubles that observe how an order talks to its collaborators:
// - Spy<T>               forwards to a real implementation, records each call
// - ManualPaymentGateway records requests, holds callbacks until a test fires them
// - CompletionQueue      completion sink that just queues what it receives
// - Harness              the above, wired together
//
// ============================================================================

/// One collaborator call, as seen by a `Spy`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetPrice { product_name: String },
    GetWeight { product_name: String },
    QuoteShipping { address: Address, weight: Weight },
    Ship { address: Address, weight: Weight },
    Update { id: Option<OrderId>, status: OrderStatus },
    RetrieveOrder { id: OrderId },
    GetOrderId,
}

/// Forwarding decorator that records every call made through it
#[derive(Debug)]
pub struct Spy<T> {
    inner: T,
    calls: Mutex<Vec<Call>>,
}

impl<T> Spy<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Statuses passed to `update`, in call order
    pub fn updates(&self) -> Vec<OrderStatus> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Update { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }
}

impl<T: ProductCatalog> ProductCatalog for Spy<T> {
    fn get_price(&self, product_name: &str) -> Result<Money, CatalogError> {
        self.record(Call::GetPrice {
            product_name: product_name.to_string(),
        });
        self.inner.get_price(product_name)
    }

    fn get_weight(&self, product_name: &str) -> Result<Weight, CatalogError> {
        self.record(Call::GetWeight {
            product_name: product_name.to_string(),
        });
        self.inner.get_weight(product_name)
    }
}

impl<T: ShippingCarrier> ShippingCarrier for Spy<T> {
    fn get_price(&self, address: &Address, weight: Weight) -> Result<Money, ShippingError> {
        self.record(Call::QuoteShipping {
            address: address.clone(),
            weight,
        });
        self.inner.get_price(address, weight)
    }

    fn ship(&self, address: &Address, weight: Weight) -> Result<String, ShippingError> {
        self.record(Call::Ship {
            address: address.clone(),
            weight,
        });
        self.inner.ship(address, weight)
    }
}

impl<T: OrderRepository> OrderRepository for Spy<T> {
    fn update(&self, order: &OrderRecord) -> Result<(), RepositoryError> {
        self.record(Call::Update {
            id: order.id(),
            status: order.status,
        });
        self.inner.update(order)
    }

    fn retrieve_order(&self, id: OrderId) -> Result<OrderRecord, RepositoryError> {
        self.record(Call::RetrieveOrder { id });
        self.inner.retrieve_order(id)
    }

    fn get_order_id(&self) -> Result<OrderId, RepositoryError> {
        self.record(Call::GetOrderId);
        self.inner.get_order_id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayRequest {
    Pay { card: Card, amount: Money },
    Refund { confirmation_code: String },
}

/// Gateway that never answers on its own
#[derive(Debug, Default)]
pub struct ManualPaymentGateway {
    requests: Mutex<Vec<GatewayRequest>>,
    pending: Mutex<VecDeque<PaymentCallback>>,
}

impl ManualPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Most recent callback not yet taken
    pub fn take_callback(&self) -> Option<PaymentCallback> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).pop_back()
    }

    pub fn pending_callbacks(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Forget recorded requests; pending callbacks stay available
    pub fn clear(&self) {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn capture(&self, request: GatewayRequest, callback: PaymentCallback) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(callback);
    }
}

impl PaymentGateway for ManualPaymentGateway {
    fn pay(&self, card: &Card, amount: Money, callback: PaymentCallback) {
        self.capture(
            GatewayRequest::Pay {
                card: card.clone(),
                amount,
            },
            callback,
        );
    }

    fn refund(&self, confirmation_code: &str, callback: PaymentCallback) {
        self.capture(
            GatewayRequest::Refund {
                confirmation_code: confirmation_code.to_string(),
            },
            callback,
        );
    }
}

/// Completion sink that queues completions for the test to apply
#[derive(Debug, Default)]
pub struct CompletionQueue {
    completions: Mutex<VecDeque<Completion>>,
}

impl CompletionQueue {
    pub fn pop(&self) -> Option<Completion> {
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.completions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CompletionSink for CompletionQueue {
    fn deliver(&self, completion: Completion) {
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(completion);
    }
}

/// Spied in-memory collaborators plus a manual gateway
pub struct Harness {
    pub repository: Arc<Spy<InMemoryOrderRepository>>,
    pub catalog: Arc<Spy<StaticCatalog>>,
    pub payments: Arc<ManualPaymentGateway>,
    pub shipping: Arc<Spy<FlatRateCarrier>>,
}

impl Harness {
    pub fn new(catalog: StaticCatalog, carrier: FlatRateCarrier) -> Self {
        Self {
            repository: Arc::new(Spy::new(InMemoryOrderRepository::new())),
            catalog: Arc::new(Spy::new(catalog)),
            payments: Arc::new(ManualPaymentGateway::new()),
            shipping: Arc::new(Spy::new(carrier)),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            self.repository.clone(),
            self.catalog.clone(),
            self.payments.clone(),
            self.shipping.clone(),
        )
    }

    /// Forget every recorded call
    pub fn clear_invocations(&self) {
        self.repository.clear();
        self.catalog.clear();
        self.payments.clear();
        self.shipping.clear();
    }
}
