use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::order::{
    Address, Card, CatalogError, Money, OrderId, OrderRecord, OrderRepository, Outcome,
    PaymentCallback, PaymentGateway, ProductCatalog, RepositoryError, ShippingCarrier,
    ShippingError, Weight,
};

// ============================================================================
// In-Memory Collaborators
// ============================================================================
//
// Stand-ins for the external services, used by the demo binary and tests.
//
// ============================================================================

/// Product table keyed by name; can be switched off to simulate an outage
#[derive(Debug, Default)]
pub struct StaticCatalog {
    products: HashMap<String, (Money, Weight)>,
    offline: AtomicBool,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, name: impl Into<String>, price: Money, weight: Weight) -> Self {
        self.products.insert(name.into(), (price, weight));
        self
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    fn entry(&self, product_name: &str) -> Result<&(Money, Weight), CatalogError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("catalog switched off".to_string()));
        }

        self.products
            .get(product_name)
            .ok_or_else(|| CatalogError::NotFound(product_name.to_string()))
    }
}

impl ProductCatalog for StaticCatalog {
    fn get_price(&self, product_name: &str) -> Result<Money, CatalogError> {
        self.entry(product_name).map(|(price, _)| *price)
    }

    fn get_weight(&self, product_name: &str) -> Result<Weight, CatalogError> {
        self.entry(product_name).map(|(_, weight)| *weight)
    }
}

/// Carrier that quotes the same rate for every parcel
#[derive(Debug)]
pub struct FlatRateCarrier {
    rate: Money,
    tracking_code: Option<String>,
    refusing: AtomicBool,
    offline: AtomicBool,
}

impl FlatRateCarrier {
    pub fn new(rate: Money) -> Self {
        Self {
            rate,
            tracking_code: None,
            refusing: AtomicBool::new(false),
            offline: AtomicBool::new(false),
        }
    }

    /// Hand out this tracking code instead of generating one per shipment
    pub fn with_tracking_code(mut self, code: impl Into<String>) -> Self {
        self.tracking_code = Some(code.into());
        self
    }

    pub fn refuse_shipments(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    /// When off, quotes and shipments both fail
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), ShippingError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ShippingError::Unavailable("carrier switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ShippingCarrier for FlatRateCarrier {
    fn get_price(&self, _address: &Address, _weight: Weight) -> Result<Money, ShippingError> {
        self.ensure_available()?;
        Ok(self.rate)
    }

    fn ship(&self, address: &Address, weight: Weight) -> Result<String, ShippingError> {
        self.ensure_available()?;
        if self.refusing.load(Ordering::SeqCst) {
            return Err(ShippingError::Rejected(format!(
                "no capacity for {} to {}",
                weight, address.city
            )));
        }

        Ok(self
            .tracking_code
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string().to_uppercase()))
    }
}

/// Repository backed by a map; can be switched off to simulate an outage
#[derive(Debug)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<OrderId, OrderRecord>>,
    available: AtomicBool,
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> Result<(), RepositoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable("in-memory store switched off".to_string()))
        }
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn update(&self, order: &OrderRecord) -> Result<(), RepositoryError> {
        self.ensure_available()?;
        let id = order.id().ok_or(RepositoryError::Unidentified)?;

        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, order.clone());
        Ok(())
    }

    fn retrieve_order(&self, id: OrderId) -> Result<OrderRecord, RepositoryError> {
        self.ensure_available()?;

        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    fn get_order_id(&self) -> Result<OrderId, RepositoryError> {
        self.ensure_available()?;
        Ok(OrderId::new())
    }
}

/// Gateway that answers every request with the next scripted outcome after
/// `delay`, on the ambient tokio runtime. Outside a runtime it answers inline.
/// An empty script answers with a generated success code.
#[derive(Debug)]
pub struct ScriptedPaymentGateway {
    payments: Mutex<VecDeque<Outcome>>,
    refunds: Mutex<VecDeque<Outcome>>,
    delay: Duration,
}

impl ScriptedPaymentGateway {
    pub fn new(delay: Duration) -> Self {
        Self {
            payments: Mutex::new(VecDeque::new()),
            refunds: Mutex::new(VecDeque::new()),
            delay,
        }
    }

    pub fn with_payment_outcomes(self, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.payments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(outcomes);
        self
    }

    pub fn with_refund_outcomes(self, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.refunds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(outcomes);
        self
    }

    fn answer(&self, script: &Mutex<VecDeque<Outcome>>, callback: PaymentCallback) {
        let outcome = script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Outcome::Success(format!("SUC-{}", Uuid::new_v4().simple())));
        let delay = self.delay;

        tracing::debug!(
            call = callback.call().as_str(),
            attempt = callback.attempt(),
            outcome = ?outcome,
            delay_ms = delay.as_millis() as u64,
            "Scheduling scripted gateway answer"
        );

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    fire(callback, outcome);
                });
            }
            Err(_) => fire(callback, outcome),
        }
    }
}

fn fire(callback: PaymentCallback, outcome: Outcome) {
    match outcome {
        Outcome::Success(code) => callback.on_success(code),
        Outcome::Error(code) => callback.on_error(code),
    }
}

impl PaymentGateway for ScriptedPaymentGateway {
    fn pay(&self, card: &Card, amount: Money, callback: PaymentCallback) {
        tracing::debug!(card_holder = %card.holder_name, amount = %amount, "Gateway accepted payment request");
        self.answer(&self.payments, callback);
    }

    fn refund(&self, confirmation_code: &str, callback: PaymentCallback) {
        tracing::debug!(confirmation_code, "Gateway accepted refund request");
        self.answer(&self.refunds, callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use chrono::Utc;

    #[test]
    fn test_catalog_lookup() {
        let catalog = StaticCatalog::new().with_product(
            "Apple Watch",
            Money::from_cents(1500),
            Weight::from_grams(350),
        );

        assert_eq!(catalog.get_price("Apple Watch").unwrap(), Money::from_cents(1500));
        assert_eq!(catalog.get_weight("Apple Watch").unwrap(), Weight::from_grams(350));
        assert_eq!(
            catalog.get_price("iPad").unwrap_err(),
            CatalogError::NotFound("iPad".to_string())
        );

        catalog.set_available(false);
        assert!(matches!(
            catalog.get_weight("Apple Watch"),
            Err(CatalogError::Unavailable(_))
        ));

        catalog.set_available(true);
        assert!(catalog.get_weight("Apple Watch").is_ok());
    }

    #[test]
    fn test_carrier_generates_tracking_codes() {
        let carrier = FlatRateCarrier::new(Money::from_cents(50));
        let address = Address::new("", "1011 Lincoln St", "", "", "Linden", "07036");

        let first = carrier.ship(&address, Weight::from_grams(700)).unwrap();
        let second = carrier.ship(&address, Weight::from_grams(700)).unwrap();
        assert_ne!(first, second);

        carrier.refuse_shipments(true);
        assert!(matches!(
            carrier.ship(&address, Weight::from_grams(700)),
            Err(ShippingError::Rejected(_))
        ));
    }

    #[test]
    fn test_carrier_outage() {
        let carrier = FlatRateCarrier::new(Money::from_cents(50));
        let address = Address::new("", "1011 Lincoln St", "", "", "Linden", "07036");

        carrier.set_available(false);
        assert!(matches!(
            carrier.get_price(&address, Weight::from_grams(700)),
            Err(ShippingError::Unavailable(_))
        ));
        assert!(matches!(
            carrier.ship(&address, Weight::from_grams(700)),
            Err(ShippingError::Unavailable(_))
        ));
    }

    #[test]
    fn test_repository_round_trip_and_outage() {
        let repository = InMemoryOrderRepository::new();
        let unplaced = OrderRecord {
            status: OrderStatus::Unplaced,
            placement: None,
            charge_amount: None,
            payment_confirm_code: None,
            tracking_code: None,
            payment_attempts: 0,
            refund_attempts: 0,
            updated_at: Utc::now(),
        };

        assert_eq!(repository.update(&unplaced), Err(RepositoryError::Unidentified));

        let id = repository.get_order_id().unwrap();
        assert_eq!(repository.retrieve_order(id), Err(RepositoryError::NotFound(id)));

        repository.set_available(false);
        assert!(matches!(
            repository.get_order_id(),
            Err(RepositoryError::Unavailable(_))
        ));
        assert!(repository.is_empty());
    }
}
