use serde::{Deserialize, Serialize};

// ============================================================================
// Order Configuration
// ============================================================================

/// How the amount sent to the payment gateway is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargePolicy {
    /// Product total plus the carrier quote for the order's weight
    ProductPlusShipping,
    /// Product total only
    ProductOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfig {
    pub charge_policy: ChargePolicy,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            charge_policy: ChargePolicy::ProductPlusShipping,
        }
    }
}

impl OrderConfig {
    /// Charge the product total without shipping
    pub fn product_only() -> Self {
        Self {
            charge_policy: ChargePolicy::ProductOnly,
        }
    }
}

/// Default `EnvFilter` directive when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,order_lifecycle=debug";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_charges_shipping() {
        assert_eq!(OrderConfig::default().charge_policy, ChargePolicy::ProductPlusShipping);
        assert_eq!(OrderConfig::product_only().charge_policy, ChargePolicy::ProductOnly);
    }

    #[test]
    fn test_config_deserializes() {
        let config: OrderConfig =
            serde_json::from_str(r#"{"charge_policy":"product_only"}"#).unwrap();
        assert_eq!(config, OrderConfig::product_only());
    }
}
