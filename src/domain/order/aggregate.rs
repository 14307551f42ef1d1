use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::{ChargePolicy, OrderConfig};
use super::collaborators::{
    Collaborators, Completion, CompletionSink, GatewayCall, Outcome, PaymentCallback,
};
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::OrderEvent;
use super::value_objects::{Address, Card, Money, Operation, OrderId, OrderStatus, Weight};

// ============================================================================
// Order Aggregate - Lifecycle State Machine
// ============================================================================
//
// Every operation follows the same shape:
//   1. check the status transition is legal (no side effects on failure)
//   2. call collaborators
//   3. mutate fields, append an event
//   4. persist exactly once
//
// A persistence failure in step 4 is returned to the caller but the in-memory
// change from step 3 is kept. Callers that need the stored copy to agree must
// reload from the repository.
//
// ============================================================================

/// Fields fixed when the order is placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: OrderId,
    pub customer_name: String,
    pub product_name: String,
    pub quantity: u32,
    pub shipping_address: Address,
    pub total_price: Money,
    pub total_weight: Weight,
    pub placed_at: DateTime<Utc>,
}

/// Persisted snapshot of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub status: OrderStatus,
    pub placement: Option<Placement>,
    pub charge_amount: Option<Money>,
    pub payment_confirm_code: Option<String>,
    pub tracking_code: Option<String>,
    pub payment_attempts: u32,
    pub refund_attempts: u32,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn id(&self) -> Option<OrderId> {
        self.placement.as_ref().map(|p| p.id)
    }
}

pub struct Order {
    status: OrderStatus,
    placement: Option<Placement>,
    charge_amount: Option<Money>,
    payment_confirm_code: Option<String>,
    tracking_code: Option<String>,
    payment_attempts: u32,
    refund_attempts: u32,
    updated_at: DateTime<Utc>,
    history: Vec<OrderEvent>,

    collaborators: Collaborators,
    config: OrderConfig,
    completions: Arc<dyn CompletionSink>,
}

impl Order {
    /// Unplaced order bound to its collaborators. Gateway callbacks are
    /// delivered to `completions`.
    pub fn new(collaborators: Collaborators, completions: Arc<dyn CompletionSink>) -> Self {
        Self::with_config(collaborators, OrderConfig::default(), completions)
    }

    pub fn with_config(
        collaborators: Collaborators,
        config: OrderConfig,
        completions: Arc<dyn CompletionSink>,
    ) -> Self {
        Self {
            status: OrderStatus::Unplaced,
            placement: None,
            charge_amount: None,
            payment_confirm_code: None,
            tracking_code: None,
            payment_attempts: 0,
            refund_attempts: 0,
            updated_at: Utc::now(),
            history: Vec::new(),
            collaborators,
            config,
            completions,
        }
    }

    /// Rebuild an order from its stored record. The history starts empty.
    pub fn load(
        id: OrderId,
        collaborators: Collaborators,
        config: OrderConfig,
        completions: Arc<dyn CompletionSink>,
    ) -> Result<Self, OrderError> {
        let record = collaborators.repository.retrieve_order(id)?;

        tracing::debug!(order_id = %id, status = %record.status, "Loaded order");

        let mut order = Self::with_config(collaborators, config, completions);
        order.status = record.status;
        order.placement = record.placement;
        order.charge_amount = record.charge_amount;
        order.payment_confirm_code = record.payment_confirm_code;
        order.tracking_code = record.tracking_code;
        order.payment_attempts = record.payment_attempts;
        order.refund_attempts = record.refund_attempts;
        order.updated_at = record.updated_at;
        Ok(order)
    }

    // ------------------------------------------------------------------------
    // Caller-facing operations
    // ------------------------------------------------------------------------

    pub fn handle_command(&mut self, command: OrderCommand) -> Result<(), OrderError> {
        match command {
            OrderCommand::Place {
                customer_name,
                product_name,
                quantity,
                address,
            } => self.place(customer_name, product_name, quantity, address),
            OrderCommand::Pay { card } => self.pay(&card),
            OrderCommand::Cancel => self.cancel(),
            OrderCommand::Ship => self.ship(),
        }
    }

    pub fn place(
        &mut self,
        customer_name: impl Into<String>,
        product_name: impl Into<String>,
        quantity: u32,
        address: Address,
    ) -> Result<(), OrderError> {
        let next = self.guard(Operation::Place)?;

        if quantity == 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }

        let product_name = product_name.into();
        let catalog = &self.collaborators.catalog;
        let unit_price = catalog.get_price(&product_name)?;
        let unit_weight = catalog.get_weight(&product_name)?;

        let total_price = unit_price.times(quantity)?;
        let total_weight = unit_weight.times(quantity)?;

        let id = self.collaborators.repository.get_order_id()?;

        tracing::debug!(
            order_id = %id,
            product = %product_name,
            quantity,
            total_price = %total_price,
            total_weight = %total_weight,
            "Placing order"
        );

        self.placement = Some(Placement {
            id,
            customer_name: customer_name.into(),
            product_name,
            quantity,
            shipping_address: address,
            total_price,
            total_weight,
            placed_at: Utc::now(),
        });

        self.commit(
            Operation::Place,
            next,
            OrderEvent::Placed {
                order_id: id,
                total_price,
                total_weight,
            },
        )
    }

    /// Request payment. Also the retry path from `PaymentError`: a retry sends
    /// the amount computed by the first attempt.
    pub fn pay(&mut self, card: &Card) -> Result<(), OrderError> {
        let next = self.guard(Operation::Pay)?;

        let amount = match self.charge_amount {
            Some(amount) => amount,
            None => self.quote_charge()?,
        };
        let attempt = self.payment_attempts + 1;

        tracing::debug!(
            order_id = ?self.id(),
            attempt,
            amount = %amount,
            "Requesting payment"
        );

        let callback = PaymentCallback::new(GatewayCall::Payment, attempt, self.completions.clone());
        self.collaborators.payments.pay(card, amount, callback);

        self.payment_attempts = attempt;
        self.charge_amount = Some(amount);

        self.commit(Operation::Pay, next, OrderEvent::PaymentRequested { attempt, amount })
    }

    /// Cancel a placed order outright, or request a refund for a paid one.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        let next = self.guard(Operation::Cancel)?;

        if next != OrderStatus::AwaitRefund {
            return self.commit(Operation::Cancel, next, OrderEvent::Canceled);
        }

        let confirmation_code = self
            .payment_confirm_code
            .clone()
            .ok_or(OrderError::MissingConfirmationCode)?;
        let attempt = self.refund_attempts + 1;

        tracing::debug!(
            order_id = ?self.id(),
            confirmation_code = %confirmation_code,
            "Requesting refund"
        );

        let callback = PaymentCallback::new(GatewayCall::Refund, attempt, self.completions.clone());
        self.collaborators.payments.refund(&confirmation_code, callback);

        self.refund_attempts = attempt;

        self.commit(
            Operation::Cancel,
            next,
            OrderEvent::RefundRequested { confirmation_code },
        )
    }

    pub fn ship(&mut self) -> Result<(), OrderError> {
        let next = self.guard(Operation::Ship)?;
        let placement = self.placed(Operation::Ship)?;

        let carrier = &self.collaborators.shipping;
        let shipping_quote =
            carrier.get_price(&placement.shipping_address, placement.total_weight)?;
        let tracking_code = carrier.ship(&placement.shipping_address, placement.total_weight)?;

        tracing::debug!(
            order_id = %placement.id,
            shipping_quote = %shipping_quote,
            tracking_code = %tracking_code,
            "Shipment dispatched"
        );

        self.tracking_code = Some(tracking_code.clone());

        self.commit(
            Operation::Ship,
            next,
            OrderEvent::Shipped {
                tracking_code,
                shipping_quote,
            },
        )
    }

    // ------------------------------------------------------------------------
    // Gateway completions
    // ------------------------------------------------------------------------

    /// Apply a completion delivered through a `PaymentCallback`.
    ///
    /// Rejected when the order is not waiting for this kind of completion, or
    /// when it was issued by an earlier attempt than the current one.
    pub fn apply_completion(&mut self, completion: Completion) -> Result<(), OrderError> {
        self.guard(completion.operation())?;

        let current = match completion.call {
            GatewayCall::Payment => self.payment_attempts,
            GatewayCall::Refund => self.refund_attempts,
        };
        if completion.attempt != current {
            tracing::warn!(
                order_id = ?self.id(),
                call = completion.call.as_str(),
                attempt = completion.attempt,
                current,
                "Rejected stale completion"
            );
            return Err(OrderError::StaleCompletion {
                attempt: completion.attempt,
                current,
            });
        }

        match (completion.call, completion.outcome) {
            (GatewayCall::Payment, Outcome::Success(code)) => self.on_payment_success(code),
            (GatewayCall::Payment, Outcome::Error(code)) => self.on_payment_error(code),
            (GatewayCall::Refund, Outcome::Success(code)) => self.on_refund_success(code),
            (GatewayCall::Refund, Outcome::Error(code)) => self.on_refund_error(code),
        }
    }

    pub fn on_payment_success(
        &mut self,
        confirmation_code: impl Into<String>,
    ) -> Result<(), OrderError> {
        let next = self.guard(Operation::PaymentSuccess)?;
        let confirmation_code = confirmation_code.into();

        self.payment_confirm_code = Some(confirmation_code.clone());

        self.commit(
            Operation::PaymentSuccess,
            next,
            OrderEvent::PaymentConfirmed { confirmation_code },
        )
    }

    pub fn on_payment_error(&mut self, error_code: impl Into<String>) -> Result<(), OrderError> {
        let next = self.guard(Operation::PaymentError)?;

        self.commit(
            Operation::PaymentError,
            next,
            OrderEvent::PaymentFailed {
                error_code: error_code.into(),
            },
        )
    }

    pub fn on_refund_success(&mut self, code: impl Into<String>) -> Result<(), OrderError> {
        let next = self.guard(Operation::RefundSuccess)?;

        self.commit(
            Operation::RefundSuccess,
            next,
            OrderEvent::Refunded { code: code.into() },
        )
    }

    pub fn on_refund_error(&mut self, error_code: impl Into<String>) -> Result<(), OrderError> {
        let next = self.guard(Operation::RefundError)?;

        self.commit(
            Operation::RefundError,
            next,
            OrderEvent::RefundFailed {
                error_code: error_code.into(),
            },
        )
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> Option<OrderId> {
        self.placement.as_ref().map(|p| p.id)
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    pub fn total_price(&self) -> Option<Money> {
        self.placement.as_ref().map(|p| p.total_price)
    }

    pub fn total_weight(&self) -> Option<Weight> {
        self.placement.as_ref().map(|p| p.total_weight)
    }

    /// Amount sent to the gateway, fixed by the first payment attempt
    pub fn charge_amount(&self) -> Option<Money> {
        self.charge_amount
    }

    pub fn payment_confirm_code(&self) -> Option<&str> {
        self.payment_confirm_code.as_deref()
    }

    pub fn tracking_code(&self) -> Option<&str> {
        self.tracking_code.as_deref()
    }

    pub fn payment_attempts(&self) -> u32 {
        self.payment_attempts
    }

    pub fn history(&self) -> &[OrderEvent] {
        &self.history
    }

    pub fn record(&self) -> OrderRecord {
        OrderRecord {
            status: self.status,
            placement: self.placement.clone(),
            charge_amount: self.charge_amount,
            payment_confirm_code: self.payment_confirm_code.clone(),
            tracking_code: self.tracking_code.clone(),
            payment_attempts: self.payment_attempts,
            refund_attempts: self.refund_attempts,
            updated_at: self.updated_at,
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn guard(&self, operation: Operation) -> Result<OrderStatus, OrderError> {
        match self.status.next(operation) {
            Some(next) => Ok(next),
            None => {
                tracing::warn!(
                    order_id = ?self.id(),
                    %operation,
                    status = %self.status,
                    "Rejected operation"
                );
                Err(OrderError::InvalidTransition {
                    operation,
                    status: self.status,
                })
            }
        }
    }

    fn placed(&self, operation: Operation) -> Result<&Placement, OrderError> {
        self.placement
            .as_ref()
            .ok_or(OrderError::InvalidTransition {
                operation,
                status: self.status,
            })
    }

    fn quote_charge(&self) -> Result<Money, OrderError> {
        let placement = self.placed(Operation::Pay)?;

        match self.config.charge_policy {
            ChargePolicy::ProductOnly => Ok(placement.total_price),
            ChargePolicy::ProductPlusShipping => {
                let shipping = self
                    .collaborators
                    .shipping
                    .get_price(&placement.shipping_address, placement.total_weight)?;
                placement.total_price.checked_add(shipping)
            }
        }
    }

    fn commit(
        &mut self,
        operation: Operation,
        next: OrderStatus,
        event: OrderEvent,
    ) -> Result<(), OrderError> {
        let from = self.status;
        self.status = next;
        self.updated_at = Utc::now();

        tracing::info!(
            order_id = ?self.id(),
            %operation,
            from = %from,
            to = %next,
            event = event.event_type(),
            "Order transitioned"
        );

        self.history.push(event);

        self.collaborators
            .repository
            .update(&self.record())
            .map_err(|e| {
                tracing::error!(
                    order_id = ?self.id(),
                    status = %next,
                    error = %e,
                    "Failed to persist order, in-memory state kept"
                );
                OrderError::from(e)
            })
    }
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Order")
            .field("status", &self.status)
            .field("placement", &self.placement)
            .field("charge_amount", &self.charge_amount)
            .field("payment_confirm_code", &self.payment_confirm_code)
            .field("tracking_code", &self.tracking_code)
            .field("payment_attempts", &self.payment_attempts)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
