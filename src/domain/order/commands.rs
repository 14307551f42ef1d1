use super::value_objects::{Address, Card, Operation};

// ============================================================================
// Order Commands - Caller intent
// ============================================================================
//
// Gateway completions are not commands; they arrive as `Completion` values.
//
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    Place {
        customer_name: String,
        product_name: String,
        quantity: u32,
        address: Address,
    },
    Pay {
        card: Card,
    },
    Cancel,
    Ship,
}

impl OrderCommand {
    pub fn operation(&self) -> Operation {
        match self {
            OrderCommand::Place { .. } => Operation::Place,
            OrderCommand::Pay { .. } => Operation::Pay,
            OrderCommand::Cancel => Operation::Cancel,
            OrderCommand::Ship => Operation::Ship,
        }
    }
}
