use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::domain::order::{GatewayCall, Operation, OrderStatus};

// ============================================================================
// Metrics Module - Prometheus metrics for order lifecycles
// ============================================================================
//
// - accepted transitions, by operation and target status
// - rejected operations (wrong status, stale completions)
// - failed operations (collaborator or persistence errors)
// - payment/refund requests sent to the gateway, counted even when the
//   operation that sent them failed afterwards
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub transitions: IntCounterVec,
    pub rejections: IntCounterVec,
    pub failures: IntCounterVec,
    pub gateway_requests: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Accepted order status transitions"),
            &["operation", "to"],
        )?;
        registry.register(Box::new(transitions.clone()))?;

        let rejections = IntCounterVec::new(
            Opts::new(
                "order_transitions_rejected_total",
                "Operations refused for the order's current status",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(rejections.clone()))?;

        let failures = IntCounterVec::new(
            Opts::new(
                "order_operations_failed_total",
                "Operations that failed on a collaborator or on persistence",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(failures.clone()))?;

        let gateway_requests = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Requests sent to the payment gateway"),
            &["kind"],
        )?;
        registry.register(Box::new(gateway_requests.clone()))?;

        Ok(Self {
            registry,
            transitions,
            rejections,
            failures,
            gateway_requests,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, operation: Operation, to: OrderStatus) {
        self.transitions
            .with_label_values(&[operation.as_str(), to.as_str()])
            .inc();
    }

    pub fn record_rejection(&self, operation: Operation) {
        self.rejections.with_label_values(&[operation.as_str()]).inc();
    }

    pub fn record_failure(&self, operation: Operation) {
        self.failures.with_label_values(&[operation.as_str()]).inc();
    }

    pub fn record_gateway_request(&self, kind: GatewayCall) {
        self.gateway_requests.with_label_values(&[kind.as_str()]).inc();
    }

    /// Text exposition format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
