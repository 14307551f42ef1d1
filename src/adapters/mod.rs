// ============================================================================
// Collaborator Adapters
// ============================================================================
//
// - memory/     in-memory catalog, carrier, repository and scripted gateway
// - recording/  spies and manual fakes for observing an order in tests
//
// ============================================================================

pub mod memory;
pub mod recording;

pub use memory::{FlatRateCarrier, InMemoryOrderRepository, ScriptedPaymentGateway, StaticCatalog};
pub use recording::{Call, CompletionQueue, GatewayRequest, Harness, ManualPaymentGateway, Spy};
