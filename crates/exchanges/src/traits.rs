//! Common exchange interface
//!
//! The keeper drives every venue through this trait. Venues implement the
//! calls they support; the rest answer `FeatureNotSupported`.

use crate::errors::{ExchangeError, Result};
use crate::types::*;
use async_trait::async_trait;
use keeper_core::Wad;
use std::collections::HashMap;

fn unsupported<T>(method: &str) -> Result<T> {
    Err(ExchangeError::FeatureNotSupported(method.to_string()))
}

/// Futures are `!Send`: sessions live on a single monoio thread.
#[async_trait(?Send)]
pub trait Exchange {
    fn name(&self) -> &str;

    /// Level 1 market data (last, OHLC, volume)
    async fn ticker(&self, _pair: &str) -> Result<Candle> {
        unsupported("ticker")
    }

    /// Instruments traded on the venue, keyed by symbol
    async fn get_markets(&self) -> Result<HashMap<String, Security>> {
        unsupported("get_markets")
    }

    async fn get_pair(&self, _pair: &str) -> Result<Security> {
        unsupported("get_pair")
    }

    async fn get_balances(&self) -> Result<Vec<Balance>> {
        unsupported("get_balances")
    }

    /// Our open orders
    async fn get_orders(&self, _pair: &str) -> Result<Vec<Order>> {
        unsupported("get_orders")
    }

    /// Returns the venue's order id
    async fn place_order(&self, _pair: &str, _is_sell: bool, _price: Wad, _amount: Wad) -> Result<String> {
        unsupported("place_order")
    }

    async fn cancel_order(&self, _order_id: &str, _pair: &str, _is_sell: bool) -> Result<bool> {
        unsupported("cancel_order")
    }

    /// Our own executions
    async fn get_trades(&self, _pair: &str, _page_number: u32) -> Result<Vec<Trade>> {
        unsupported("get_trades")
    }

    /// Prints from all market participants
    async fn get_all_trades(&self, _pair: &str, _page_number: u32) -> Result<Vec<Trade>> {
        unsupported("get_all_trades")
    }
}
