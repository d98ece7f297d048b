//! Shared data shapes
//!
//! Every binding maps its venue's replies into these few types, which is
//! what the keeper strategies consume.

use crate::errors::{ExchangeError, Result};
use keeper_core::Wad;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_is_sell(is_sell: bool) -> Self {
        if is_sell {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }

    /// Side (tag 54) code
    pub fn fix_code(&self) -> &'static str {
        match self {
            Side::Buy => "1",
            Side::Sell => "2",
        }
    }

    pub fn from_fix_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Side::Buy),
            "2" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// OHLCV bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: Wad,
    pub close: Wad,
    pub high: Wad,
    pub low: Wad,
    pub volume: Wad,
}

/// One of our resting orders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub timestamp: i64,
    pub pair: String,
    pub is_sell: bool,
    pub price: Wad,
    pub amount: Wad,
}

impl Order {
    pub fn new(
        order_id: impl Into<String>,
        timestamp: i64,
        pair: impl Into<String>,
        is_sell: bool,
        price: Wad,
        amount: Wad,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            timestamp,
            pair: pair.into(),
            is_sell,
            price,
            amount,
        }
    }

    pub fn side(&self) -> Side {
        Side::from_is_sell(self.is_sell)
    }

    pub fn sell_to_buy_price(&self) -> Wad {
        self.price
    }

    pub fn buy_to_sell_price(&self) -> Wad {
        self.price
    }

    /// Quote received if a sell fills, base received if a buy fills.
    pub fn remaining_buy_amount(&self) -> Wad {
        if self.is_sell {
            self.amount * self.price
        } else {
            self.amount
        }
    }

    pub fn remaining_sell_amount(&self) -> Wad {
        if self.is_sell {
            self.amount
        } else {
            self.amount * self.price
        }
    }
}

impl Hash for Order {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.order_id.hash(state);
        self.timestamp.hash(state);
        self.price.hash(state);
        self.amount.hash(state);
    }
}

/// One of our executions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub timestamp: i64,
    pub pair: String,
    pub is_sell: bool,
    pub price: Wad,
    pub amount: Wad,
}

impl Trade {
    /// Trades are synced across venues keyed by `BASE-QUOTE` pairs, so any
    /// other pair shape is refused here.
    pub fn new(
        trade_id: impl Into<String>,
        timestamp: i64,
        pair: impl Into<String>,
        is_sell: bool,
        price: Wad,
        amount: Wad,
    ) -> Result<Self> {
        let pair = pair.into();
        if !is_sync_pair(&pair) {
            return Err(ExchangeError::InvalidSymbol(format!(
                "trade pair must look like BASE-QUOTE, got {pair:?}"
            )));
        }
        Ok(Self {
            trade_id: trade_id.into(),
            timestamp,
            pair,
            is_sell,
            price,
            amount,
        })
    }
}

/// `<alnum+>-<alnum+>` at the start of the string.
fn is_sync_pair(pair: &str) -> bool {
    let Some((base, rest)) = pair.split_once('-') else {
        return false;
    };
    let quote_len = rest.chars().take_while(|c| c.is_ascii_alphanumeric()).count();
    !base.is_empty() && base.chars().all(|c| c.is_ascii_alphanumeric()) && quote_len > 0
}

/// Trading characteristics of one instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub symbol: String,
    pub product: String,
    pub min_price_increment: Wad,
    pub description: String,
    pub currency: String,
    pub min_trade_vol: Option<Wad>,
    pub max_trade_vol: Option<Wad>,
    pub round_lot: Option<Wad>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: Wad,
    pub quantity: Wad,
}

/// Aggregated book; bids best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
    pub timestamp: i64,
}

impl OrderBook {
    pub fn empty(symbol: impl Into<String>, timestamp: i64) -> Self {
        Self {
            symbol: symbol.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            timestamp,
        }
    }

    /// Put both sides in best-first order.
    pub fn sort(&mut self) {
        self.bids.sort_by(|a, b| b.price.cmp(&a.price));
        self.asks.sort_by(|a, b| a.price.cmp(&b.price));
    }

    pub fn best_bid(&self) -> Option<Wad> {
        self.bids.first().map(|level| level.price)
    }

    pub fn best_ask(&self) -> Option<Wad> {
        self.asks.first().map(|level| level.price)
    }

    pub fn spread(&self) -> Option<Wad> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<Wad> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Wad::from_i64(2)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: Wad,
    pub locked: Wad,
}

impl Balance {
    pub fn total(&self) -> Wad {
        self.free + self.locked
    }
}
