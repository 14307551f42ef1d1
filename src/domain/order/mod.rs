// ============================================================================
// Order Domain - Lifecycle of a single e-commerce order
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (Money, Weight, Address, Card, OrderStatus)
// - Collaborator traits and the payment completion protocol
// - Events (audit trail of accepted transitions)
// - Commands (Place, Pay, Cancel, Ship)
// - Errors (OrderError enum)
// - Aggregate (Order state machine)
//
// ============================================================================

pub mod value_objects;
pub mod collaborators;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;

// Re-export for convenience
pub use value_objects::*;
pub use collaborators::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
