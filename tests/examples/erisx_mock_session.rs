//! ErisX client against the in-process mock venue
//!
//! Runs the whole client flow without network access or credentials:
//! logon on both sessions, security list, order book, place, list and
//! cancel an order, password change and logout. Set `RUST_LOG=debug` to
//! see every FIX message on the wire.

use keeper_core::prelude::*;
use keeper_core::wad;
use keeper_exchanges::erisx::ErisxApi;
use keeper_exchanges::fix::tags::msg_type;
use keeper_exchanges::Exchange;
use keeper_tests::{erisx_config, MockVenue, VenueScript};
use tracing::info;

#[monoio::main(timer_enabled = true)]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let venue = MockVenue::start(VenueScript::default())?;
    info!("🧪 Mock venue listening on {}", venue.endpoint());

    let api = ErisxApi::new(erisx_config(&venue)).await?;

    let markets = api.get_markets().await?;
    for (symbol, security) in &markets {
        info!("   {} tick {} ({})", symbol, security.min_price_increment, security.description);
    }

    let book = api.get_orderbook("eth-usd").await?;
    info!(
        "📖 {} best bid {:?} best ask {:?} mid {:?}",
        book.symbol,
        book.best_bid(),
        book.best_ask(),
        book.mid_price()
    );

    let timer = PerfTimer::start("mock_place_order");
    let order_id = api.place_order("eth-usd", true, wad!(151.25), wad!(0.5)).await?;
    info!("📋 Placed {} in {}μs", order_id, timer.elapsed_micros());

    let orders = api.get_orders("eth-usd").await?;
    println!("{}", serde_json::to_string_pretty(&orders)?);

    let cancelled = api.cancel_order(&order_id, "eth-usd", true).await?;
    info!("🗑️  Cancelled: {}", cancelled);

    api.reset_password("new-secret").await?;
    info!("🔑 Password changed");

    api.logout().await?;

    info!("📨 Venue received {} messages", venue.received().len());
    info!("   Logon: {}", venue.received_of(msg_type::LOGON).len());
    info!("   NewOrderSingle: {}", venue.received_of(msg_type::NEW_ORDER_SINGLE).len());
    info!("   MarketDataRequest: {}", venue.received_of(msg_type::MARKET_DATA_REQUEST).len());
    info!("✅ Mock session completed");
    Ok(())
}
