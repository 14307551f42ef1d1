use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_lifecycle::adapters::{
    FlatRateCarrier, InMemoryOrderRepository, ScriptedPaymentGateway, StaticCatalog,
};
use order_lifecycle::config::DEFAULT_LOG_FILTER;
use order_lifecycle::domain::order::{Address, Card, Collaborators, Money, Outcome, Weight};
use order_lifecycle::{Metrics, OrderConfig, OrderHandle, OrderStatus};

const GATEWAY_DELAY: Duration = Duration::from_millis(200);

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter, e.g. RUST_LOG=debug
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    tracing::info!("🚀 Starting order lifecycle demo");

    // === 1. Collaborators ===
    let catalog = StaticCatalog::new().with_product(
        "Apple Watch",
        Money::from_cents(1500),
        Weight::from_grams(350),
    );
    let gateway = ScriptedPaymentGateway::new(GATEWAY_DELAY)
        .with_payment_outcomes([
            Outcome::Error("ERR123".into()),
            Outcome::Success("SUC123".into()),
        ])
        .with_refund_outcomes([Outcome::Success("REF123".into())]);

    let collaborators = Collaborators::new(
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(catalog),
        Arc::new(gateway),
        Arc::new(FlatRateCarrier::new(Money::from_cents(50))),
    );

    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());
    let address = Address::new("John Doe", "1011 Lincoln St", "", "", "Linden", "07036");
    let card = Card::new("111", "John Doe", 10, 2030);

    // === 2. Declined payment, retry, then cancel with refund ===
    tracing::info!("📝 Order 1: place, pay twice, cancel");
    let order = OrderHandle::spawn(collaborators.clone(), OrderConfig::default(), metrics.clone());

    let record = order.place("John", "Apple Watch", 2, address.clone()).await?;
    tracing::info!(order_id = ?record.id(), total = ?record.placement.as_ref().map(|p| p.total_price), "✅ Order placed");

    order.pay(card.clone()).await?;
    wait_for(&order, OrderStatus::PaymentError).await?;
    tracing::info!("❌ First payment declined, retrying");

    order.pay(card.clone()).await?;
    let paid = wait_for(&order, OrderStatus::Paid).await?;
    tracing::info!(charged = ?paid.charge_amount, code = ?paid.payment_confirm_code, "✅ Order paid");

    order.cancel().await?;
    wait_for(&order, OrderStatus::Refunded).await?;
    tracing::info!("↩️  Order refunded");

    // === 3. Straight to shipment ===
    tracing::info!("📝 Order 2: place, pay, ship");
    let order = OrderHandle::spawn(collaborators, OrderConfig::default(), metrics.clone());

    order.place("Jane", "Apple Watch", 1, address).await?;
    order.pay(card).await?;
    wait_for(&order, OrderStatus::Paid).await?;

    let shipped = order.ship().await?;
    tracing::info!(tracking_code = ?shipped.tracking_code, "📦 Order shipped");

    // Shipped orders reject everything
    if let Err(e) = order.cancel().await {
        tracing::info!(error = %e, "Cancel after shipment refused");
    }

    println!("{}", metrics.render()?);
    tracing::info!("🎉 Demo complete!");

    Ok(())
}

/// Poll until the order reaches `target`, or give up after a few gateway delays
async fn wait_for(
    order: &OrderHandle,
    target: OrderStatus,
) -> anyhow::Result<order_lifecycle::OrderRecord> {
    for _ in 0..20 {
        let record = order.record().await?;
        if record.status == target {
            return Ok(record);
        }
        tokio::time::sleep(GATEWAY_DELAY / 4).await;
    }

    anyhow::bail!("order never reached {}", target)
}
