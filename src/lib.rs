pub mod actors;
pub mod adapters;
pub mod config;
pub mod domain;
pub mod metrics;

pub use actors::OrderHandle;
pub use config::{ChargePolicy, OrderConfig};
pub use domain::order::{Order, OrderError, OrderRecord, OrderStatus};
pub use metrics::Metrics;
