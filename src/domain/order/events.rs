use serde::{Deserialize, Serialize};

use super::value_objects::{Money, OrderId, Weight};

// ============================================================================
// Order Events - Audit trail of accepted transitions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Placed {
        order_id: OrderId,
        total_price: Money,
        total_weight: Weight,
    },
    PaymentRequested {
        attempt: u32,
        amount: Money,
    },
    PaymentConfirmed {
        confirmation_code: String,
    },
    PaymentFailed {
        error_code: String,
    },
    Canceled,
    RefundRequested {
        confirmation_code: String,
    },
    Refunded {
        code: String,
    },
    RefundFailed {
        error_code: String,
    },
    /// The carrier quote is kept here for audit; it is not an order field
    Shipped {
        tracking_code: String,
        shipping_quote: Money,
    },
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed { .. } => "OrderPlaced",
            OrderEvent::PaymentRequested { .. } => "OrderPaymentRequested",
            OrderEvent::PaymentConfirmed { .. } => "OrderPaymentConfirmed",
            OrderEvent::PaymentFailed { .. } => "OrderPaymentFailed",
            OrderEvent::Canceled => "OrderCanceled",
            OrderEvent::RefundRequested { .. } => "OrderRefundRequested",
            OrderEvent::Refunded { .. } => "OrderRefunded",
            OrderEvent::RefundFailed { .. } => "OrderRefundFailed",
            OrderEvent::Shipped { .. } => "OrderShipped",
        }
    }
}
