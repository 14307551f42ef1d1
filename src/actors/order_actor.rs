use actix::prelude::*;
use actix::WeakAddr;
use std::sync::Arc;

use crate::config::OrderConfig;
use crate::domain::order::{
    Address, Card, Collaborators, Completion, CompletionSink, GatewayCall, Operation, Order,
    OrderCommand, OrderError, OrderRecord, OrderStatus,
};
use crate::metrics::Metrics;

// ============================================================================
// Actor Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<OrderRecord, OrderError>")]
pub struct Execute(pub OrderCommand);

/// Gateway completion, normally sent by a `PaymentCallback`
#[derive(Message)]
#[rtype(result = "Result<OrderRecord, OrderError>")]
pub struct Complete(pub Completion);

#[derive(Message)]
#[rtype(result = "OrderRecord")]
pub struct GetRecord;

// ============================================================================
// Order Actor - One order, one mailbox
// ============================================================================
//
// Caller commands and gateway completions are both messages, so every
// mutation of the order is serialized. A gateway that fires its callback
// inside `pay` only enqueues the completion; it is applied after the `pay`
// message has finished.
//
// ============================================================================

pub struct OrderActor {
    order: Order,
    metrics: Arc<Metrics>,
}

impl OrderActor {
    fn observe(&self, operation: Operation, from: OrderStatus, result: &Result<(), OrderError>) {
        let to = self.order.status();

        // The status moves before persisting, so a request that went out is
        // visible here even when the operation failed afterwards.
        if let Some(kind) = issued_request(operation, from, to) {
            self.metrics.record_gateway_request(kind);
        }

        match result {
            Ok(()) => self.metrics.record_transition(operation, to),
            Err(e) if e.is_rejection() => self.metrics.record_rejection(operation),
            Err(e) => {
                self.metrics.record_failure(operation);
                tracing::error!(
                    order_id = ?self.order.id(),
                    %operation,
                    error = %e,
                    "Order operation failed"
                );
            }
        }
    }
}

/// Gateway request sent by `operation`, judged by the status it left behind
fn issued_request(operation: Operation, from: OrderStatus, to: OrderStatus) -> Option<GatewayCall> {
    if from.is_pending() || !to.is_pending() {
        return None;
    }

    match operation {
        Operation::Pay => Some(GatewayCall::Payment),
        Operation::Cancel => Some(GatewayCall::Refund),
        _ => None,
    }
}

impl Actor for OrderActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("OrderActor started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!(
            order_id = ?self.order.id(),
            status = %self.order.status(),
            "OrderActor stopped"
        );
    }
}

/// Routes completions into the actor's own mailbox.
///
/// Holds a weak address so outstanding gateway callbacks do not keep a
/// finished order alive.
struct MailboxSink(WeakAddr<OrderActor>);

impl CompletionSink for MailboxSink {
    fn deliver(&self, completion: Completion) {
        match self.0.upgrade() {
            Some(addr) => addr.do_send(Complete(completion)),
            None => tracing::warn!(
                call = completion.call.as_str(),
                attempt = completion.attempt,
                "Dropped completion for stopped order"
            ),
        }
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<Execute> for OrderActor {
    type Result = Result<OrderRecord, OrderError>;

    fn handle(&mut self, msg: Execute, _: &mut Self::Context) -> Self::Result {
        let operation = msg.0.operation();
        let from = self.order.status();
        let result = self.order.handle_command(msg.0);
        self.observe(operation, from, &result);
        result.map(|()| self.order.record())
    }
}

impl Handler<Complete> for OrderActor {
    type Result = Result<OrderRecord, OrderError>;

    fn handle(&mut self, msg: Complete, _: &mut Self::Context) -> Self::Result {
        let operation = msg.0.operation();
        let from = self.order.status();
        let result = self.order.apply_completion(msg.0);
        self.observe(operation, from, &result);
        result.map(|()| self.order.record())
    }
}

impl Handler<GetRecord> for OrderActor {
    type Result = MessageResult<GetRecord>;

    fn handle(&mut self, _: GetRecord, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.order.record())
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Async client for an order running in its own actor
#[derive(Clone)]
pub struct OrderHandle {
    addr: Addr<OrderActor>,
}

impl OrderHandle {
    /// Start an unplaced order. Must be called inside an actix system.
    pub fn spawn(collaborators: Collaborators, config: OrderConfig, metrics: Arc<Metrics>) -> Self {
        let addr = OrderActor::create(move |ctx| {
            let sink = Arc::new(MailboxSink(ctx.address().downgrade()));
            OrderActor {
                order: Order::with_config(collaborators, config, sink),
                metrics,
            }
        });

        Self { addr }
    }

    pub async fn place(
        &self,
        customer_name: impl Into<String>,
        product_name: impl Into<String>,
        quantity: u32,
        address: Address,
    ) -> Result<OrderRecord, OrderError> {
        self.execute(OrderCommand::Place {
            customer_name: customer_name.into(),
            product_name: product_name.into(),
            quantity,
            address,
        })
        .await
    }

    pub async fn pay(&self, card: Card) -> Result<OrderRecord, OrderError> {
        self.execute(OrderCommand::Pay { card }).await
    }

    pub async fn cancel(&self) -> Result<OrderRecord, OrderError> {
        self.execute(OrderCommand::Cancel).await
    }

    pub async fn ship(&self) -> Result<OrderRecord, OrderError> {
        self.execute(OrderCommand::Ship).await
    }

    /// Deliver a completion and wait for the verdict. Callbacks fired through
    /// `PaymentCallback` take the fire-and-forget route instead.
    pub async fn complete(&self, completion: Completion) -> Result<OrderRecord, OrderError> {
        self.addr.send(Complete(completion)).await?
    }

    pub async fn record(&self) -> Result<OrderRecord, OrderError> {
        Ok(self.addr.send(GetRecord).await?)
    }

    pub async fn status(&self) -> Result<OrderStatus, OrderError> {
        Ok(self.record().await?.status)
    }

    async fn execute(&self, command: OrderCommand) -> Result<OrderRecord, OrderError> {
        self.addr.send(Execute(command)).await?
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{FlatRateCarrier, ScriptedPaymentGateway, StaticCatalog};
    use crate::adapters::recording::{GatewayRequest, Harness};
    use crate::domain::order::{Money, Outcome, PaymentCallback, PaymentGateway, Weight};
    use std::time::Duration;

    /// Approves every payment before `pay` returns
    struct InlineGateway;

    impl PaymentGateway for InlineGateway {
        fn pay(&self, _card: &Card, _amount: Money, callback: PaymentCallback) {
            callback.on_success("SUC123");
        }

        fn refund(&self, _confirmation_code: &str, callback: PaymentCallback) {
            callback.on_success("REF123");
        }
    }

    fn harness() -> Harness {
        Harness::new(
            StaticCatalog::new().with_product(
                "Apple Watch",
                Money::from_cents(1500),
                Weight::from_grams(350),
            ),
            FlatRateCarrier::new(Money::from_cents(50)).with_tracking_code("ABC123"),
        )
    }

    fn address() -> Address {
        Address::new("", "1011 Lincoln St", "", "", "Linden", "07036")
    }

    fn card() -> Card {
        Card::new("111", "John Doe", 10, 2024)
    }

    fn spawn(h: &Harness) -> (OrderHandle, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new().unwrap());
        let handle = OrderHandle::spawn(h.collaborators(), OrderConfig::default(), metrics.clone());
        (handle, metrics)
    }

    #[actix::test]
    async fn test_callback_completes_through_mailbox() {
        let h = harness();
        let (order, metrics) = spawn(&h);

        let placed = order.place("John", "Apple Watch", 2, address()).await.unwrap();
        assert_eq!(placed.status, OrderStatus::Placed);

        let checking = order.pay(card()).await.unwrap();
        assert_eq!(checking.status, OrderStatus::PaymentCheck);

        h.payments.take_callback().unwrap().on_success("SUC123");

        let paid = order.record().await.unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert_eq!(paid.payment_confirm_code.as_deref(), Some("SUC123"));
        assert_eq!(metrics.gateway_requests.with_label_values(&["payment"]).get(), 1);
    }

    #[actix::test]
    async fn test_inline_callback_waits_for_pay_to_finish() {
        let h = harness();
        let mut collaborators = h.collaborators();
        collaborators.payments = Arc::new(InlineGateway);
        let metrics = Arc::new(Metrics::new().unwrap());
        let order = OrderHandle::spawn(collaborators, OrderConfig::default(), metrics.clone());
        order.place("John", "Apple Watch", 2, address()).await.unwrap();

        let checking = order.pay(card()).await.unwrap();
        assert_eq!(checking.status, OrderStatus::PaymentCheck);
        assert_eq!(checking.payment_confirm_code, None);

        let paid = order.record().await.unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert_eq!(paid.payment_confirm_code.as_deref(), Some("SUC123"));
        assert_eq!(
            metrics.transitions.with_label_values(&["payment_success", "PAID"]).get(),
            1
        );

        order.cancel().await.unwrap();
        assert_eq!(order.status().await.unwrap(), OrderStatus::Refunded);
        assert_eq!(metrics.gateway_requests.with_label_values(&["refund"]).get(), 1);
    }

    #[actix::test]
    async fn test_request_counted_when_persisting_fails() {
        let h = harness();
        let (order, metrics) = spawn(&h);
        order.place("John", "Apple Watch", 2, address()).await.unwrap();
        h.repository.inner().set_available(false);

        let err = order.pay(card()).await.unwrap_err();

        assert!(matches!(err, OrderError::Persistence(_)));
        assert_eq!(h.payments.requests().len(), 1);
        assert_eq!(metrics.gateway_requests.with_label_values(&["payment"]).get(), 1);
        assert_eq!(metrics.failures.with_label_values(&["pay"]).get(), 1);
        assert_eq!(order.status().await.unwrap(), OrderStatus::PaymentCheck);
    }

    #[actix::test]
    async fn test_failure_before_gateway_is_not_a_request() {
        let h = harness();
        let (order, metrics) = spawn(&h);
        order.place("John", "Apple Watch", 2, address()).await.unwrap();
        h.shipping.inner().set_available(false);

        let err = order.pay(card()).await.unwrap_err();

        assert!(matches!(err, OrderError::Shipping(_)));
        assert!(h.payments.requests().is_empty());
        assert_eq!(metrics.gateway_requests.with_label_values(&["payment"]).get(), 0);
        assert_eq!(metrics.failures.with_label_values(&["pay"]).get(), 1);
        assert_eq!(order.status().await.unwrap(), OrderStatus::Placed);
    }

    #[actix::test]
    async fn test_rejections_are_returned_and_counted() {
        let h = harness();
        let (order, metrics) = spawn(&h);
        order.place("John", "Apple Watch", 2, address()).await.unwrap();

        let err = order.ship().await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition { operation: Operation::Ship, status: OrderStatus::Placed }
        ));
        assert_eq!(metrics.rejections.with_label_values(&["ship"]).get(), 1);
        assert_eq!(order.status().await.unwrap(), OrderStatus::Placed);
    }

    #[actix::test]
    async fn test_duplicate_completion_is_rejected() {
        let h = harness();
        let (order, _metrics) = spawn(&h);
        order.place("John", "Apple Watch", 2, address()).await.unwrap();
        order.pay(card()).await.unwrap();

        let success = Completion {
            call: GatewayCall::Payment,
            attempt: 1,
            outcome: Outcome::Success("SUC123".into()),
        };
        order.complete(success.clone()).await.unwrap();
        h.clear_invocations();

        let err = order.complete(success).await.unwrap_err();

        assert!(err.is_rejection());
        assert!(h.repository.updates().is_empty());
        assert_eq!(order.status().await.unwrap(), OrderStatus::Paid);
    }

    #[actix::test]
    async fn test_refund_flow() {
        let h = harness();
        let (order, _metrics) = spawn(&h);
        order.place("John", "Apple Watch", 2, address()).await.unwrap();
        order.pay(card()).await.unwrap();
        h.payments.take_callback().unwrap().on_success("SUC123");

        let awaiting = order.cancel().await.unwrap();
        assert_eq!(awaiting.status, OrderStatus::AwaitRefund);
        assert!(h
            .payments
            .requests()
            .contains(&GatewayRequest::Refund { confirmation_code: "SUC123".into() }));

        h.payments.take_callback().unwrap().on_error("SUC123");
        assert_eq!(order.status().await.unwrap(), OrderStatus::RefundError);
    }

    #[actix::test]
    async fn test_scripted_gateway_answers_asynchronously() {
        let h = harness();
        let gateway = Arc::new(
            ScriptedPaymentGateway::new(Duration::from_millis(10)).with_payment_outcomes([
                Outcome::Error("ERR123".into()),
                Outcome::Success("SUC123".into()),
            ]),
        );
        let mut collaborators = h.collaborators();
        collaborators.payments = gateway;
        let order = OrderHandle::spawn(
            collaborators,
            OrderConfig::default(),
            Arc::new(Metrics::new().unwrap()),
        );

        order.place("John", "Apple Watch", 2, address()).await.unwrap();
        order.pay(card()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(order.status().await.unwrap(), OrderStatus::PaymentError);

        order.pay(card()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let record = order.record().await.unwrap();
        assert_eq!(record.status, OrderStatus::Paid);
        assert_eq!(record.payment_attempts, 2);

        let shipped = order.ship().await.unwrap();
        assert_eq!(shipped.tracking_code.as_deref(), Some("ABC123"));
    }
}
