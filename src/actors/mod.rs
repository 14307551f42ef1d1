// ============================================================================
// Actors Module
// ============================================================================
//
// Each order runs in its own actix actor. The mailbox is the only way in,
// for caller commands and gateway completions alike.
//
// ============================================================================

mod order_actor;

pub use order_actor::{Complete, Execute, GetRecord, OrderActor, OrderHandle};
