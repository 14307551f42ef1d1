use super::collaborators::{CatalogError, RepositoryError, ShippingError};
use super::value_objects::{Operation, OrderStatus};

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Cannot {operation} an order in status {status}")]
    InvalidTransition {
        operation: Operation,
        status: OrderStatus,
    },

    /// Completion issued by an earlier payment attempt than the current one
    #[error("Stale completion from attempt {attempt}, current attempt is {current}")]
    StaleCompletion { attempt: u32, current: u32 },

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(u32),

    #[error("Paid order has no payment confirmation code")]
    MissingConfirmationCode,

    #[error("Amount overflow")]
    Overflow,

    #[error("Catalog lookup failed: {0}")]
    Catalog(#[source] CatalogError),

    #[error("Shipping failed: {0}")]
    Shipping(#[from] ShippingError),

    /// The preceding in-memory change is kept; see `Order` docs
    #[error("Persistence failed: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("Order actor unavailable: {0}")]
    Mailbox(String),
}

impl OrderError {
    /// True when the order refused the operation for its current state.
    /// Such errors never have side effects.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            OrderError::InvalidTransition { .. } | OrderError::StaleCompletion { .. }
        )
    }
}

impl From<CatalogError> for OrderError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(name) => OrderError::ProductNotFound(name),
            other => OrderError::Catalog(other),
        }
    }
}

impl From<actix::MailboxError> for OrderError {
    fn from(err: actix::MailboxError) -> Self {
        OrderError::Mailbox(err.to_string())
    }
}
