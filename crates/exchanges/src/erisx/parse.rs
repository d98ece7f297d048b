//! Venue replies to keeper types
//!
//! Pure functions over decoded messages so they can be tested without a
//! session.

use crate::errors::{ExchangeError, Result};
use crate::fix::tags::{md_entry_type, msg_type, ord_status, tag};
use crate::fix::FixMessage;
use crate::types::{Order, OrderBook, OrderBookLevel, Security, Side};
use keeper_core::timing::fix_timestamp_to_micros;
use keeper_core::Wad;
use std::collections::HashMap;
use tracing::debug;

/// MDUpdateAction (279) delete
const MD_UPDATE_DELETE: &str = "2";

/// OrderID the venue reports when a mass status request matched nothing
const UNKNOWN_ORDER_ID: &str = "UNKNOWN";

/// Keepers name pairs `eth-usd`; ErisX books are `ETH/USD`.
pub fn format_pair_string(pair: &str) -> String {
    pair.replace('-', "/").to_uppercase()
}

/// `<OrderID>|<ClOrdID>`, the id handed back by `place_order`.
pub fn join_order_id(order_id: &str, client_order_id: &str) -> String {
    format!("{order_id}|{client_order_id}")
}

pub fn split_order_id(order_id: &str) -> Result<(&str, &str)> {
    match order_id.split_once('|') {
        Some((venue_id, client_id)) if !venue_id.is_empty() && !client_id.is_empty() && !client_id.contains('|') => {
            Ok((venue_id, client_id))
        }
        _ => Err(ExchangeError::InvalidOrder(format!(
            "order id must be <OrderID>|<ClOrdID>, got {order_id:?}"
        ))),
    }
}

/// Instruments from a SecurityList (y), keyed by symbol.
pub fn parse_security_list(msg: &FixMessage) -> Result<HashMap<String, Security>> {
    let mt = msg.msg_type();
    let mut securities = HashMap::new();
    for entry in msg.group(tag::NO_RELATED_SYM, tag::SYMBOL) {
        let symbol = entry.require(tag::SYMBOL, mt)?.to_string();
        let security = Security {
            symbol: symbol.clone(),
            product: entry.require(tag::PRODUCT, mt)?.to_string(),
            min_price_increment: Wad::from_str_exact(entry.require(tag::MIN_PRICE_INCREMENT, mt)?)?,
            description: entry.require(tag::SECURITY_DESC, mt)?.to_string(),
            currency: entry.require(tag::CURRENCY, mt)?.to_string(),
            min_trade_vol: entry.wad(tag::MIN_TRADE_VOL)?,
            max_trade_vol: entry.wad(tag::MAX_TRADE_VOL)?,
            round_lot: entry.wad(tag::ROUND_LOT)?,
        };
        securities.insert(symbol, security);
    }
    Ok(securities)
}

/// Open orders from the ExecutionReports answering a mass status request.
///
/// Placeholder reports (OrderID `UNKNOWN`) and fully filled orders are
/// skipped. The amount is what is still working: LeavesQty when the venue
/// sends it, OrderQty otherwise.
pub fn parse_orders_list(reports: &[FixMessage]) -> Result<Vec<Order>> {
    let mut orders = Vec::with_capacity(reports.len());
    for report in reports {
        if report.msg_type() != msg_type::EXECUTION_REPORT {
            continue;
        }
        let venue_id = report.require(tag::ORDER_ID)?;
        if venue_id == UNKNOWN_ORDER_ID {
            continue;
        }
        if report.get(tag::ORD_STATUS) == Some(ord_status::FILLED) {
            continue;
        }

        let transact_time = report.require(tag::TRANSACT_TIME)?;
        let timestamp = fix_timestamp_to_micros(transact_time)
            .ok_or_else(|| ExchangeError::MalformedMessage(format!("bad TransactTime {transact_time:?}")))?;
        let amount = match report.get(tag::LEAVES_QTY) {
            Some(leaves) => Wad::from_str_exact(leaves)?,
            None => report.require_wad_nth(tag::ORDER_QTY, 1)?,
        };

        orders.push(Order::new(
            join_order_id(venue_id, report.require(tag::CL_ORD_ID)?),
            timestamp,
            report.require(tag::SYMBOL)?,
            report.get(tag::SIDE).and_then(Side::from_fix_code) == Some(Side::Sell),
            report.require_wad_nth(tag::PRICE, 1)?,
            amount,
        ));
    }
    Ok(orders)
}

/// Whether a market data message carries any bid or offer entry.
pub fn has_book_entries(msg: &FixMessage) -> bool {
    msg.group_from(tag::NO_MD_ENTRIES)
        .iter()
        .any(|entry| matches!(entry.get(tag::MD_ENTRY_TYPE), Some(md_entry_type::BID | md_entry_type::OFFER)))
}

/// Bid and offer levels of a snapshot (W) or incremental refresh (X).
/// Statistics entries and deletes are ignored.
pub fn parse_order_book(msg: &FixMessage, symbol: &str, timestamp: i64) -> Result<OrderBook> {
    let mt = msg.msg_type();
    let mut book = OrderBook::empty(symbol, timestamp);
    for entry in msg.group_from(tag::NO_MD_ENTRIES) {
        if entry.get(tag::MD_UPDATE_ACTION) == Some(MD_UPDATE_DELETE) {
            continue;
        }
        let side = match entry.get(tag::MD_ENTRY_TYPE) {
            Some(md_entry_type::BID) => &mut book.bids,
            Some(md_entry_type::OFFER) => &mut book.asks,
            other => {
                debug!("skipping market data entry type {:?}", other);
                continue;
            }
        };
        side.push(OrderBookLevel {
            price: Wad::from_str_exact(entry.require(tag::MD_ENTRY_PX, mt)?)?,
            quantity: Wad::from_str_exact(entry.require(tag::MD_ENTRY_SIZE, mt)?)?,
        });
    }
    book.sort();
    Ok(book)
}
