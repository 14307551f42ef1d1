use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::OrderError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Order identifier, minted by the repository at placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monetary amount in the smallest currency unit.
///
/// Integer only: totals are derived by multiplication and addition, never by
/// floating point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Result<Money, OrderError> {
        self.0.checked_add(other.0).map(Money).ok_or(OrderError::Overflow)
    }

    /// Line total for `quantity` units at this unit price
    pub fn times(self, quantity: u32) -> Result<Money, OrderError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Money)
            .ok_or(OrderError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shipping weight in grams
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Weight(u64);

impl Weight {
    pub const fn from_grams(grams: u64) -> Self {
        Weight(grams)
    }

    pub const fn grams(self) -> u64 {
        self.0
    }

    pub fn times(self, quantity: u32) -> Result<Weight, OrderError> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Weight)
            .ok_or(OrderError::Overflow)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}g", self.0)
    }
}

/// Shipping address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub line1: String,
    pub line2: String,
    pub district: String,
    pub city: String,
    pub postcode: String,
}

impl Address {
    pub fn new(
        name: impl Into<String>,
        line1: impl Into<String>,
        line2: impl Into<String>,
        district: impl Into<String>,
        city: impl Into<String>,
        postcode: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            line1: line1.into(),
            line2: line2.into(),
            district: district.into(),
            city: city.into(),
            postcode: postcode.into(),
        }
    }
}

/// Payment card details handed to the gateway as-is
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub holder_name: String,
    pub expire_month: u8,
    pub expire_year: u16,
}

impl Card {
    pub fn new(
        id: impl Into<String>,
        holder_name: impl Into<String>,
        expire_month: u8,
        expire_year: u16,
    ) -> Self {
        Self {
            id: id.into(),
            holder_name: holder_name.into(),
            expire_month,
            expire_year,
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Every operation that can move an order between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Place,
    Pay,
    PaymentSuccess,
    PaymentError,
    Cancel,
    RefundSuccess,
    RefundError,
    Ship,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Place => "place",
            Operation::Pay => "pay",
            Operation::PaymentSuccess => "payment_success",
            Operation::PaymentError => "payment_error",
            Operation::Cancel => "cancel",
            Operation::RefundSuccess => "refund_success",
            Operation::RefundError => "refund_error",
            Operation::Ship => "ship",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Constructed but not yet placed; has no identity
    Unplaced,
    Placed,
    PaymentCheck,
    PaymentError,
    Paid,
    AwaitRefund,
    Refunded,
    RefundError,
    Canceled,
    Shipped,
}

impl OrderStatus {
    /// Target status of `operation` from this status, `None` if not permitted.
    pub fn next(self, operation: Operation) -> Option<OrderStatus> {
        use Operation as Op;
        use OrderStatus::*;

        match (self, operation) {
            (Unplaced, Op::Place) => Some(Placed),
            (Placed | PaymentError, Op::Pay) => Some(PaymentCheck),
            (PaymentCheck, Op::PaymentSuccess) => Some(Paid),
            (PaymentCheck, Op::PaymentError) => Some(PaymentError),
            (Placed, Op::Cancel) => Some(Canceled),
            (Paid, Op::Cancel) => Some(AwaitRefund),
            (AwaitRefund, Op::RefundSuccess) => Some(Refunded),
            (AwaitRefund, Op::RefundError) => Some(RefundError),
            (Paid, Op::Ship) => Some(Shipped),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Canceled
                | OrderStatus::Refunded
                | OrderStatus::RefundError
                | OrderStatus::Shipped
        )
    }

    /// Waiting on a gateway callback
    pub fn is_pending(self) -> bool {
        matches!(self, OrderStatus::PaymentCheck | OrderStatus::AwaitRefund)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Unplaced => "UNPLACED",
            OrderStatus::Placed => "PLACED",
            OrderStatus::PaymentCheck => "PAYMENT_CHECK",
            OrderStatus::PaymentError => "PAYMENT_ERROR",
            OrderStatus::Paid => "PAID",
            OrderStatus::AwaitRefund => "AWAIT_REFUND",
            OrderStatus::Refunded => "REFUNDED",
            OrderStatus::RefundError => "REFUND_ERROR",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Shipped => "SHIPPED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
