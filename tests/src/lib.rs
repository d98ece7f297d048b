//! Test support for the keeper workspace
//!
//! - [`mock_venue`]: scripted FIX counterparty used by the integration tests,
//!   the mock session demo and the benchmark

pub mod mock_venue;

pub use mock_venue::{MarketSpec, MockVenue, VenueScript};

use keeper_exchanges::erisx::ErisxConfig;
use std::time::Duration;

/// Password the default [`VenueScript`] accepts.
pub const VENUE_PASSWORD: &str = "secret";

/// Config pointing both ErisX sessions at `venue`, with short timeouts.
pub fn erisx_config(venue: &MockVenue) -> ErisxConfig {
    ErisxConfig::default()
        .with_trading(venue.endpoint(), "trader-1")
        .with_marketdata(venue.endpoint(), "md-1")
        .with_password(VENUE_PASSWORD)
        .with_response_timeout(Duration::from_secs(3))
}

/// Log to the test output once; honours `RUST_LOG`.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
