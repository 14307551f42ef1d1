// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Pure state machine code. No runtime, no I/O: collaborators are reached
// through the traits in `order::collaborators`.
//
// ============================================================================

pub mod order;
